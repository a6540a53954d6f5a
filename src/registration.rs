//! Registering Twitch stream-change webhooks for platform users.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use twitch_api::types::UserId as TwitchUserId;

use crate::adapters::twitch_api::{StreamSubscription, TwitchApiClient};
use crate::adapters::twitch_auth::AppAccessTokenProvider;
use crate::config::{AppConfig, TwitchConfig};
use crate::error::{Error, Result};
use crate::users::{User, UserId};

/// Outcome of a registration attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The hub accepted the subscription request
    Subscribed {
        twitch_user_id: TwitchUserId,
        callback_url: String,
        lease_seconds: u64,
    },
    /// The user has no Twitch login to subscribe to
    Skipped,
}

/// Registers a user's stream-change webhook with their streaming platform
#[async_trait]
pub trait StreamWebhookRegistrar: Send + Sync {
    async fn register(&self, user: &User) -> Result<Registration>;
}

/// Registrar backed by the Twitch webhooks hub
pub struct TwitchWebhookRegistrar {
    api: TwitchApiClient,
    tokens: Arc<AppAccessTokenProvider>,
    callback_base: String,
    webhook_secret: String,
    lease_seconds: u64,
}

impl TwitchWebhookRegistrar {
    pub fn new(
        api: TwitchApiClient,
        tokens: Arc<AppAccessTokenProvider>,
        app: &AppConfig,
        twitch: &TwitchConfig,
    ) -> Self {
        Self {
            api,
            tokens,
            callback_base: format!("{}://{}", app.protocol, app.domain.trim_end_matches('/')),
            webhook_secret: twitch.webhook_secret.clone(),
            lease_seconds: twitch.lease_seconds,
        }
    }

    /// Where Twitch delivers stream notifications for a user
    pub fn callback_url(&self, user_id: UserId) -> String {
        format!("{}/users/{}/twitch_stream_updates", self.callback_base, user_id)
    }

    async fn subscribe(&self, user: &User, login: &str) -> Result<Registration> {
        let token = self.tokens.access_token().await?;
        let client_id = self.tokens.client_id();

        let twitch_user_id = self
            .api
            .lookup_user_id(client_id, &token, login)
            .await?
            .ok_or_else(|| Error::not_found("Twitch user", login))?;

        let subscription = StreamSubscription {
            callback_url: self.callback_url(user.id),
            twitch_user_id,
            lease_seconds: self.lease_seconds,
            secret: self.webhook_secret.clone(),
        };
        self.api
            .subscribe_stream_changes(client_id, &token, &subscription)
            .await?;

        Ok(Registration::Subscribed {
            twitch_user_id: subscription.twitch_user_id,
            callback_url: subscription.callback_url,
            lease_seconds: subscription.lease_seconds,
        })
    }
}

#[async_trait]
impl StreamWebhookRegistrar for TwitchWebhookRegistrar {
    #[instrument(skip(self, user), fields(user_id = %user.id), level = "debug")]
    async fn register(&self, user: &User) -> Result<Registration> {
        let Some(login) = user.twitch_login() else {
            return Ok(Registration::Skipped);
        };

        match self.subscribe(user, login).await {
            Ok(registration) => {
                info!(user_id = %user.id, login, "Registered Twitch stream webhook");
                Ok(registration)
            }
            Err(e @ Error::ApiAuthenticationFailed { .. }) => {
                warn!(user_id = %user.id, "Twitch rejected app token, dropping it");
                self.tokens.invalidate().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
