//! Twitch stream webhook registration and notification service.
//!
//! Users who link a Twitch account get a stream-change webhook registered on
//! a background queue. Twitch then calls back into the HTTP surface whenever
//! the channel goes live or offline, and the user's live status is updated.

pub mod adapters;
pub mod api;
pub mod common;
pub mod config;
pub mod error;
pub mod jobs;
pub mod registration;
pub mod users;

pub use config::Config;
pub use error::{Error, ErrorCategory, Result};
pub use jobs::{JobQueue, RegisterAllTwitchWebhooksWorker, TwitchWebhookRegistrationWorker};
pub use registration::{Registration, StreamWebhookRegistrar, TwitchWebhookRegistrar};
pub use users::{InMemoryUserStore, StreamingPlatform, User, UserId, UserStore};

/// Crate version reported by the health endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
