//! asquik — a small personal Telegram bot that relays photos to Imgur and
//! answers a handful of access-gated commands.
//!
//! The crate is split into the Telegram-facing layer ([`bot`]), the Imgur
//! client ([`imgur`]), the injected user registry ([`registry`]) and a few
//! pure helpers.

/// Telegram dispatch, delivery policy and command handlers
pub mod bot;
/// Configuration and settings management
pub mod config;
/// Imgur upload client
pub mod imgur;
/// In-memory user registry with access levels
pub mod registry;
/// Elapsed-time formatting
pub mod uptime;
