//! User records and the store they are read from.
//!
//! The user record is owned by the host platform; this crate only reads the
//! linked Twitch username and writes back the live-stream status.

mod memory;

pub use memory::InMemoryUserStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Primary key of a platform user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId(id)
    }
}

/// Streaming platform a user can be live on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingPlatform {
    Twitch,
}

/// The slice of a platform user this service cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Linked Twitch login, if any
    #[serde(default)]
    pub twitch_username: Option<String>,
    /// Where the user is currently live
    #[serde(default)]
    pub currently_streaming_on: Option<StreamingPlatform>,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            username: username.into(),
            twitch_username: None,
            currently_streaming_on: None,
        }
    }

    pub fn with_twitch_username(mut self, twitch_username: impl Into<String>) -> Self {
        self.twitch_username = Some(twitch_username.into());
        self
    }

    /// The Twitch login when it is set and not blank
    pub fn twitch_login(&self) -> Option<&str> {
        self.twitch_username
            .as_deref()
            .map(str::trim)
            .filter(|login| !login.is_empty())
    }

    /// True when a non-blank Twitch username is linked
    pub fn twitch_username_present(&self) -> bool {
        self.twitch_login().is_some()
    }
}

/// Read/write access to platform users
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user; `Ok(None)` when no such user exists
    async fn find(&self, id: UserId) -> Result<Option<User>>;

    /// Ids of every user with a linked Twitch username, ascending
    async fn ids_with_twitch_username(&self) -> Result<Vec<UserId>>;

    /// Record where a user is live; returns false when the user does not exist
    async fn set_currently_streaming_on(
        &self,
        id: UserId,
        platform: Option<StreamingPlatform>,
    ) -> Result<bool>;
}
