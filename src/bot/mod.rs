//! Telegram-facing layer: delivery policy, access gate and handlers.

use chrono::{DateTime, Utc};

/// Access gate and invocation types
pub mod dispatch;
/// Command and photo handlers
pub mod handlers;
/// Resilient outbound delivery
pub mod outbound;

pub use dispatch::AccessGate;
pub use outbound::Delivery;

/// Process-wide state shared with handlers
pub struct AppState {
    /// Wall-clock instant the process came up, for `/uptime`
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// State anchored at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
