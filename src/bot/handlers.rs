//! Command and photo handlers.

use crate::bot::outbound::Delivery;
use crate::bot::AppState;
use crate::config::BROADCAST_PACING_MS;
use crate::imgur::ImgurClient;
use crate::registry::UserRegistry;
use crate::uptime;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
};
use teloxide::utils::command::{BotCommands, ParseError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Text commands available in private chats
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Поддерживаемые команды:")]
pub enum Command {
    /// Relay a message to every registered user
    #[command(description = "Переслать сообщение всем пользователям.", parse_with = rest)]
    Broadcast(String),
    /// Report how long the bot has been running
    #[command(description = "Сколько бот уже работает.")]
    Uptime,
}

/// Whole argument tail as-is; an empty tail is a valid (empty) argument
fn rest(input: String) -> Result<(String,), ParseError> {
    Ok((input,))
}

impl Command {
    /// Minimum access level required to run the command
    #[must_use]
    pub const fn required_access(&self) -> i64 {
        match self {
            Self::Broadcast(_) => 2,
            Self::Uptime => 1,
        }
    }
}

/// `/broadcast` — tag the text with the sender's name and relay it to every
/// registry member, pacing sends to stay under flood limits.
pub async fn broadcast(
    delivery: &Delivery,
    registry: &UserRegistry,
    msg: &Message,
    args: &str,
) -> Result<()> {
    let text = args.trim();
    if text.is_empty() {
        delivery.send_message(msg.chat.id, "А что передавать?").await;
        return Ok(());
    }

    let sender = msg
        .from
        .as_ref()
        .map_or_else(|| "???".to_string(), sender_name);
    let outgoing = broadcast_text(&sender, text);

    for user_id in registry.member_ids() {
        delivery.send_message(ChatId(user_id), outgoing.clone()).await;
        tokio::time::sleep(Duration::from_millis(BROADCAST_PACING_MS)).await;
    }

    delivery
        .send_message(msg.chat.id, "Броадкаст отправлен.")
        .await;
    Ok(())
}

fn sender_name(user: &teloxide::types::User) -> String {
    user.username.clone().unwrap_or_else(|| user.full_name())
}

fn broadcast_text(sender: &str, text: &str) -> String {
    format!("Сообщение от {sender}:\n{text}")
}

/// `/uptime` — reply with a human-readable breakdown of the run time
pub async fn handle_uptime(delivery: &Delivery, state: &AppState, msg: &Message) -> Result<()> {
    let diff = uptime::human_breakdown(state.started_at, Utc::now());
    delivery
        .send_message(msg.chat.id, format!("Бот работает уже:\n{diff}"))
        .await;
    Ok(())
}

/// Photo relay: download the largest variant, upload it to Imgur on the
/// blocking pool, echo the photo with its hosted link and follow up with the
/// reverse-image-search keyboard. The scratch file is removed when the guard
/// drops, whether or not the sequence completed.
pub async fn imgurize(
    delivery: &Delivery,
    imgur: Arc<ImgurClient>,
    msg: &Message,
) -> Result<()> {
    let photo = msg
        .photo()
        .and_then(<[_]>::last)
        .ok_or_else(|| anyhow!("message carries no photo"))?;

    let file = delivery.bot().get_file(photo.file.id.clone()).await?;
    let scratch = ScratchFile::for_remote(&file.path);
    {
        let mut dst = tokio::fs::File::create(scratch.path())
            .await
            .with_context(|| format!("creating {}", scratch.path().display()))?;
        delivery.bot().download_file(&file.path, &mut dst).await?;
        dst.flush().await?;
    }

    delivery
        .send_chat_action(msg.chat.id, ChatAction::UploadPhoto)
        .await;

    debug!("Image uploading begin");
    let upload_path = scratch.path().to_path_buf();
    let uploaded =
        tokio::task::spawn_blocking(move || imgur.upload_image(&upload_path)).await??;
    debug!("Image uploaded");

    delivery
        .send_photo(
            msg.chat.id,
            InputFile::file_id(photo.file.id.clone()),
            uploaded.link.clone(),
        )
        .await;
    delivery
        .send_message_with_markup(msg.chat.id, "Ссылка на Imgur'е", search_markup(&uploaded.link)?)
        .await;

    Ok(())
}

/// Inline keyboard with the direct link and the five reverse-image-search
/// shortcuts, all derived from the hosted link.
fn search_markup(link: &str) -> Result<InlineKeyboardMarkup> {
    let url = |raw: String| Url::parse(&raw).with_context(|| format!("bad search URL: {raw}"));

    Ok(InlineKeyboardMarkup::new([
        vec![InlineKeyboardButton::url(
            "Direct",
            url(link.to_string())?,
        )],
        vec![
            InlineKeyboardButton::url("IQDB", url(format!("http://iqdb.org/?url={link}"))?),
            InlineKeyboardButton::url(
                "Google",
                url(format!(
                    "https://www.google.com/searchbyimage?image_url={link}&hl=ru&newwindow=1"
                ))?,
            ),
        ],
        vec![
            InlineKeyboardButton::url("Trace.moe", url(format!("https://trace.moe/?url={link}"))?),
            InlineKeyboardButton::url(
                "SauceNao",
                url(format!(
                    "https://saucenao.com/search.php?db=999&dbmaski=32768&url={link}"
                ))?,
            ),
            InlineKeyboardButton::url(
                "TinEye",
                url(format!("https://tineye.com/search?url={link}"))?,
            ),
        ],
    ]))
}

/// Temporary download target, removed on drop
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Scratch path in the system temp dir, named after the remote file
    fn for_remote(remote_path: &str) -> Self {
        let name = remote_path.rsplit('/').next().unwrap_or(remote_path);
        Self {
            path: std::env::temp_dir().join(format!("asquik-{}-{name}", std::process::id())),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove scratch file {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_search_markup_has_six_link_buttons() -> Result<()> {
        let link = "https://i.imgur.com/abc123.jpg";
        let markup = search_markup(link)?;

        let buttons: Vec<_> = markup.inline_keyboard.iter().flatten().collect();
        assert_eq!(buttons.len(), 6);

        let labels: Vec<_> = buttons.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(
            labels,
            ["Direct", "IQDB", "Google", "Trace.moe", "SauceNao", "TinEye"]
        );

        for button in buttons {
            match &button.kind {
                InlineKeyboardButtonKind::Url(url) => {
                    assert!(url.as_str().contains("i.imgur.com/abc123.jpg"));
                }
                other => panic!("expected URL button, got {other:?}"),
            }
        }
        Ok(())
    }

    #[test]
    fn test_search_markup_row_layout() -> Result<()> {
        let markup = search_markup("https://i.imgur.com/abc123.jpg")?;
        let rows: Vec<_> = markup.inline_keyboard.iter().map(Vec::len).collect();
        assert_eq!(rows, [1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_broadcast_text_tags_sender() {
        assert_eq!(
            broadcast_text("alice", "привет всем"),
            "Сообщение от alice:\nпривет всем"
        );
    }

    #[test]
    fn test_command_access_requirements() {
        assert_eq!(Command::Broadcast(String::new()).required_access(), 2);
        assert_eq!(Command::Uptime.required_access(), 1);
    }

    #[test]
    fn test_scratch_file_removed_on_drop() -> Result<()> {
        let scratch = ScratchFile::for_remote("photos/file_42.jpg");
        std::fs::write(scratch.path(), b"bytes")?;
        let path = scratch.path().to_path_buf();
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_scratch_file_drop_tolerates_missing_file() {
        // Never created on disk; drop must not panic
        let scratch = ScratchFile::for_remote("photos/never_written.jpg");
        drop(scratch);
    }
}
