//! Resilient delivery wrapper for outbound Telegram calls.
//!
//! Every outbound API call goes through one policy: blocked, missing and
//! deactivated recipients are absorbed and logged, flood limits are slept
//! out and the call re-issued (bounded), anything else is logged and
//! dropped. Callers get `Some(payload)` on success and `None` otherwise;
//! delivery failures never propagate into command handlers.

use crate::config::RATE_LIMIT_MAX_ATTEMPTS;
use std::future::Future;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, ChatId, InlineKeyboardMarkup, InputFile, MessageId, True,
};
use teloxide::{ApiError, RequestError};
use tracing::error;

/// Execute one outbound operation under the uniform absorb/retry policy.
///
/// The closure is re-invoked verbatim for every rate-limit retry, so the
/// retried call carries the original arguments by construction.
pub(crate) async fn absorb<T, F, Fut>(op_name: &str, mut op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Some(value),
            Err(RequestError::Api(ApiError::BotBlocked)) => {
                error!("Unable to run {op_name}: blocked by user");
                return None;
            }
            Err(RequestError::Api(ApiError::ChatNotFound)) => {
                error!("Unable to run {op_name}: invalid user ID");
                return None;
            }
            Err(RequestError::Api(ApiError::UserDeactivated)) => {
                error!("Unable to run {op_name}: user is deactivated");
                return None;
            }
            Err(RequestError::RetryAfter(wait)) => {
                if attempt >= RATE_LIMIT_MAX_ATTEMPTS {
                    error!(
                        "Unable to run {op_name}: flood limit still exceeded after {attempt} attempts, giving up"
                    );
                    return None;
                }
                error!(
                    "Unable to run {op_name}: flood limit is exceeded, sleeping {} seconds",
                    wait.duration().as_secs()
                );
                tokio::time::sleep(wait.duration()).await;
                attempt += 1;
            }
            Err(err) => {
                error!("Unable to run {op_name}: failed: {err:?}");
                return None;
            }
        }
    }
}

/// Outbound Telegram surface with the absorb/retry policy applied to every
/// operation the bot performs.
#[derive(Clone)]
pub struct Delivery {
    bot: Bot,
    owner_id: ChatId,
}

impl Delivery {
    /// Wrap a bot; `owner_id` is the recipient of [`Self::msg_to_owner`]
    #[must_use]
    pub const fn new(bot: Bot, owner_id: ChatId) -> Self {
        Self { bot, owner_id }
    }

    /// The wrapped bot, for inbound-side calls (`get_file`, downloads)
    #[must_use]
    pub const fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Send a plain text message
    pub async fn send_message(&self, chat_id: ChatId, text: impl Into<String>) -> Option<Message> {
        let text = text.into();
        absorb("send_message", || {
            let req = self.bot.send_message(chat_id, text.clone());
            async move { req.await }
        })
        .await
    }

    /// Send a text message with an inline keyboard attached
    pub async fn send_message_with_markup(
        &self,
        chat_id: ChatId,
        text: impl Into<String>,
        markup: InlineKeyboardMarkup,
    ) -> Option<Message> {
        let text = text.into();
        absorb("send_message", || {
            let req = self
                .bot
                .send_message(chat_id, text.clone())
                .reply_markup(markup.clone());
            async move { req.await }
        })
        .await
    }

    /// Replace the text of an existing message
    pub async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: impl Into<String>,
    ) -> Option<Message> {
        let text = text.into();
        absorb("edit_message", || {
            let req = self.bot.edit_message_text(chat_id, message_id, text.clone());
            async move { req.await }
        })
        .await
    }

    /// Replace the inline keyboard of an existing message
    pub async fn edit_markup(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        markup: InlineKeyboardMarkup,
    ) -> Option<Message> {
        absorb("edit_markup", || {
            let req = self
                .bot
                .edit_message_reply_markup(chat_id, message_id)
                .reply_markup(markup.clone());
            async move { req.await }
        })
        .await
    }

    /// Delete a message
    pub async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Option<True> {
        absorb("delete_message", || {
            let req = self.bot.delete_message(chat_id, message_id);
            async move { req.await }
        })
        .await
    }

    /// Forward a message between chats
    pub async fn forward_message(
        &self,
        chat_id: ChatId,
        from_chat_id: ChatId,
        message_id: MessageId,
    ) -> Option<Message> {
        absorb("forward_message", || {
            let req = self.bot.forward_message(chat_id, from_chat_id, message_id);
            async move { req.await }
        })
        .await
    }

    /// Show a chat activity indicator (typing, uploading a photo, ...)
    pub async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Option<True> {
        absorb("send_chat_action", || {
            let req = self.bot.send_chat_action(chat_id, action);
            async move { req.await }
        })
        .await
    }

    /// Send a photo with a caption
    pub async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: InputFile,
        caption: impl Into<String>,
    ) -> Option<Message> {
        let caption = caption.into();
        absorb("send_photo", || {
            let req = self
                .bot
                .send_photo(chat_id, photo.clone())
                .caption(caption.clone());
            async move { req.await }
        })
        .await
    }

    /// Send a document, optionally captioned
    pub async fn send_document(
        &self,
        chat_id: ChatId,
        document: InputFile,
        caption: Option<String>,
    ) -> Option<Message> {
        absorb("send_document", || {
            let mut req = self.bot.send_document(chat_id, document.clone());
            if let Some(caption) = caption.clone() {
                req = req.caption(caption);
            }
            async move { req.await }
        })
        .await
    }

    /// Answer a callback query with a short notice
    pub async fn answer_callback(
        &self,
        callback_id: teloxide::types::CallbackQueryId,
        text: impl Into<String>,
    ) -> Option<True> {
        let text = text.into();
        absorb("answer_callback", || {
            let req = self
                .bot
                .answer_callback_query(callback_id.clone())
                .text(text.clone());
            async move { req.await }
        })
        .await
    }

    /// Send a text message straight to the owner
    pub async fn msg_to_owner(&self, text: impl Into<String>) -> Option<Message> {
        self.send_message(self.owner_id, text).await
    }
}
