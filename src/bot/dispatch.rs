//! Access-gated command dispatch.
//!
//! The gate sits between the update dispatcher and the command handlers: it
//! resolves the sender's access level against the registry and decides
//! whether the handler may run. Known-but-underprivileged senders get a
//! short notice; unknown senders get nothing, so they cannot tell a gated
//! command apart from a nonexistent one.

use crate::bot::outbound::Delivery;
use crate::registry::UserRegistry;
use std::sync::Arc;
use teloxide::types::{CallbackQuery, CallbackQueryId, ChatId, Message};
use tracing::debug;

/// Where a command invocation came from; decides the denial notice channel
#[derive(Debug, Clone)]
pub enum CommandOrigin {
    /// A private-chat message
    Message,
    /// An inline keyboard callback
    Callback(CallbackQueryId),
}

/// One inbound command invocation, reduced to what the gate needs
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Sender's Telegram user id
    pub user_id: i64,
    /// Channel the invocation arrived on
    pub origin: CommandOrigin,
}

impl Invocation {
    /// Invocation for a command message; `None` when the sender is missing
    /// (channel posts and the like)
    #[must_use]
    pub fn from_message(msg: &Message) -> Option<Self> {
        msg.from.as_ref().map(|user| Self {
            user_id: user.id.0.cast_signed(),
            origin: CommandOrigin::Message,
        })
    }

    /// Invocation for a callback query
    #[must_use]
    pub fn from_callback(q: &CallbackQuery) -> Self {
        Self {
            user_id: q.from.id.0.cast_signed(),
            origin: CommandOrigin::Callback(q.id.clone()),
        }
    }
}

/// Gate decision for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Sender meets the required level; run the handler
    Permit,
    /// Known sender below the required level; notify, do not run
    NotifyDenied,
    /// Unknown (level 0) sender; stay silent, do not run
    SilentDenied,
}

/// Minimum-access check applied before every gated command handler
pub struct AccessGate {
    registry: Arc<UserRegistry>,
}

impl AccessGate {
    /// Gate backed by the shared registry
    #[must_use]
    pub const fn new(registry: Arc<UserRegistry>) -> Self {
        Self { registry }
    }

    /// Decide what to do with a sender for a handler requiring `required`
    #[must_use]
    pub fn verdict(&self, user_id: i64, required: i64) -> Verdict {
        let level = self.registry.access_level(user_id);
        if level >= required {
            Verdict::Permit
        } else if level > 0 {
            Verdict::NotifyDenied
        } else {
            Verdict::SilentDenied
        }
    }

    /// Enforce the gate: returns `true` when the handler may run, sending
    /// the denial notice (over the invocation's own channel) when it may not.
    pub async fn permit(
        &self,
        delivery: &Delivery,
        invocation: &Invocation,
        required: i64,
    ) -> bool {
        match self.verdict(invocation.user_id, required) {
            Verdict::Permit => true,
            Verdict::NotifyDenied => {
                match &invocation.origin {
                    CommandOrigin::Callback(id) => {
                        delivery.answer_callback(id.clone(), "Not allowed!").await;
                    }
                    CommandOrigin::Message => {
                        delivery
                            .send_message(ChatId(invocation.user_id), "Not allowed!")
                            .await;
                    }
                }
                false
            }
            Verdict::SilentDenied => {
                debug!("Dropping command from unregistered user {}", invocation.user_id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{UserRecord, OWNER_ACCESS};

    const OWNER: i64 = 1000;

    fn gate_with_users(users: &[(i64, i64)]) -> AccessGate {
        let registry = Arc::new(UserRegistry::new(OWNER));
        for (id, access) in users {
            registry.upsert(*id, UserRecord::with_access(*access));
        }
        AccessGate::new(registry)
    }

    #[test]
    fn test_sufficient_access_is_permitted() {
        let gate = gate_with_users(&[(1, 2)]);
        assert_eq!(gate.verdict(1, 2), Verdict::Permit);
        assert_eq!(gate.verdict(1, 1), Verdict::Permit);
    }

    #[test]
    fn test_owner_always_permitted() {
        let gate = gate_with_users(&[]);
        assert_eq!(gate.verdict(OWNER, OWNER_ACCESS), Verdict::Permit);
    }

    #[test]
    fn test_known_but_insufficient_gets_notice() {
        let gate = gate_with_users(&[(1, 1)]);
        assert_eq!(gate.verdict(1, 2), Verdict::NotifyDenied);
    }

    #[test]
    fn test_unknown_sender_denied_silently() {
        let gate = gate_with_users(&[]);
        assert_eq!(gate.verdict(99, 1), Verdict::SilentDenied);
    }

    #[test]
    fn test_explicit_zero_access_denied_silently() {
        let gate = gate_with_users(&[(7, 0)]);
        assert_eq!(gate.verdict(7, 1), Verdict::SilentDenied);
    }
}
