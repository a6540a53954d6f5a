use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use super::{StreamingPlatform, User, UserId, UserStore};
use crate::error::Result;

/// User store backed by a concurrent map
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<DashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given users
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::new();
        for user in users {
            store.insert(user);
        }
        store
    }

    /// Load users from a JSON array file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).await?;
        let users: Vec<User> = serde_json::from_str(&contents)?;
        info!(count = users.len(), path = %path.display(), "Loaded users");
        Ok(Self::with_users(users))
    }

    /// Insert or replace a user
    pub fn insert(&self, user: User) {
        debug!(user_id = %user.id, "Storing user");
        self.users.insert(user.id, user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn ids_with_twitch_username(&self) -> Result<Vec<UserId>> {
        let mut ids: Vec<UserId> = self
            .users
            .iter()
            .filter(|entry| entry.value().twitch_username_present())
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn set_currently_streaming_on(
        &self,
        id: UserId,
        platform: Option<StreamingPlatform>,
    ) -> Result<bool> {
        match self.users.get_mut(&id) {
            Some(mut entry) => {
                entry.currently_streaming_on = platform;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
