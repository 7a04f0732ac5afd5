use asquik::bot::handlers::{self, Command};
use asquik::bot::dispatch::Invocation;
use asquik::bot::{AccessGate, AppState, Delivery};
use asquik::config::Settings;
use asquik::imgur::ImgurClient;
use asquik::registry::UserRegistry;
use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    imgur1: Regex,
    imgur2: Regex,
    imgur3: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            imgur1: Regex::new(r"IMGUR_CLIENT_SECRET=[^\s&]+")?,
            imgur2: Regex::new(r"IMGUR_REFRESH_TOKEN=[^\s&]+")?,
            imgur3: Regex::new(r"refresh_token=[^\s&]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .imgur1
            .replace_all(&output, "IMGUR_CLIENT_SECRET=[MASKED]")
            .to_string();
        output = self
            .imgur2
            .replace_all(&output, "IMGUR_REFRESH_TOKEN=[MASKED]")
            .to_string();
        output = self
            .imgur3
            .replace_all(&output, "refresh_token=[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    // Setup logging with redaction
    init_logging(patterns);

    info!("Starting asquik bot...");

    let settings = init_settings();

    let registry = Arc::new(UserRegistry::load(
        settings.owner_id,
        settings.users_file.as_deref().map(Path::new),
    ));
    info!("User registry loaded ({} users).", registry.len());

    let imgur = init_imgur(&settings);

    let bot = match build_bot(&settings) {
        Ok(bot) => bot,
        Err(e) => {
            error!("Failed to build Telegram client: {}", e);
            std::process::exit(1);
        }
    };

    let delivery = Delivery::new(bot.clone(), ChatId(settings.owner_id));
    let gate = Arc::new(AccessGate::new(registry.clone()));
    let app_state = Arc::new(AppState::new());

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![delivery, gate, registry, imgur, app_state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_imgur(settings: &Settings) -> Arc<ImgurClient> {
    match ImgurClient::new(settings) {
        Ok(client) => {
            info!("Imgur client initialized.");
            Arc::new(client)
        }
        Err(e) => {
            error!("Failed to initialize Imgur client: {}", e);
            std::process::exit(1);
        }
    }
}

/// Build the Telegram client, routing through the configured proxy when set
fn build_bot(settings: &Settings) -> anyhow::Result<Bot> {
    let mut builder = teloxide::net::default_reqwest_settings();
    if let Some(proxy) = &settings.requests_proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    Ok(Bot::with_client(
        settings.telegram_token.clone(),
        builder.build()?,
    ))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo),
        )
}

async fn handle_command(
    msg: Message,
    cmd: Command,
    delivery: Delivery,
    gate: Arc<AccessGate>,
    registry: Arc<UserRegistry>,
    state: Arc<AppState>,
) -> Result<(), teloxide::RequestError> {
    let Some(invocation) = Invocation::from_message(&msg) else {
        return respond(());
    };

    if !gate.permit(&delivery, &invocation, cmd.required_access()).await {
        return respond(());
    }

    let res = match cmd {
        Command::Broadcast(args) => {
            handlers::broadcast(&delivery, &registry, &msg, &args).await
        }
        Command::Uptime => handlers::handle_uptime(&delivery, &state, &msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_photo(
    msg: Message,
    delivery: Delivery,
    imgur: Arc<ImgurClient>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::imgurize(&delivery, imgur, &msg).await {
        error!("Photo handler error: {}", e);
    }
    respond(())
}
