use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use twitch_api::types::{UserId as TwitchUserId, UserName};
use twitch_oauth2::{AccessToken, ClientId};

use crate::adapters::http_client::{HttpClient, SimpleHttpResponse};
use crate::config::TwitchConfig;
use crate::error::{Error, Result};

const SERVICE: &str = "Twitch Helix";

/// Subscription request sent to the webhooks hub
#[derive(Debug, Clone)]
pub struct StreamSubscription {
    /// Where Twitch should deliver stream notifications
    pub callback_url: String,
    /// Channel whose stream changes are watched
    pub twitch_user_id: TwitchUserId,
    /// Lifetime of the subscription in seconds
    pub lease_seconds: u64,
    /// Secret Twitch signs notifications with
    pub secret: String,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: TwitchUserId,
    login: UserName,
}

#[derive(Debug, Deserialize)]
struct HelixUsersResponse {
    data: Vec<HelixUser>,
}

/// Client for the Helix endpoints this service calls
#[derive(Clone)]
pub struct TwitchApiClient {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,
    base_url: String,
}

impl TwitchApiClient {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &TwitchConfig) -> Self {
        Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the webhooks hub
    pub fn hub_url(&self) -> String {
        format!("{}/webhooks/hub", self.base_url)
    }

    /// Hub topic for stream changes of one channel
    pub fn stream_topic(&self, twitch_user_id: &TwitchUserId) -> String {
        format!("{}/streams?user_id={}", self.base_url, twitch_user_id)
    }

    /// URL looking up a user by login
    pub fn users_url(&self, login: &str) -> Result<String> {
        Url::parse_with_params(&format!("{}/users", self.base_url), &[("login", login)])
            .map(String::from)
            .map_err(|e| Error::config_invalid("TWITCH_API_BASE_URL", self.base_url.clone(), e))
    }

    fn auth_headers(client_id: &ClientId, token: &AccessToken) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Client-ID".to_string(), client_id.as_str().to_string());
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", token.secret()),
        );
        headers
    }

    fn check_status(response: &SimpleHttpResponse) -> Result<()> {
        if response.is_success() {
            return Ok(());
        }

        if response.status() == 429 {
            let reset_after = response
                .header("ratelimit-reset")
                .and_then(|reset| reset.parse::<i64>().ok())
                .map(|reset| reset - chrono::Utc::now().timestamp())
                .filter(|secs| *secs > 0)
                .map(|secs| Duration::from_secs(secs as u64));
            warn!(?reset_after, "Twitch rate limit hit");
            return Err(Error::ApiRateLimited {
                service: SERVICE.to_string(),
                reset_after,
            });
        }

        Err(Error::from_status(SERVICE, response.status(), response.body()))
    }

    /// Resolve a Twitch login to its user id; `Ok(None)` when no such channel exists
    #[instrument(skip(self, client_id, token), level = "debug")]
    pub async fn lookup_user_id(
        &self,
        client_id: &ClientId,
        token: &AccessToken,
        login: &str,
    ) -> Result<Option<TwitchUserId>> {
        let url = self.users_url(login)?;
        let response = self
            .http_client
            .get(&url, Self::auth_headers(client_id, token))
            .await?;
        Self::check_status(&response)?;

        let users: HelixUsersResponse = response
            .json()
            .map_err(|e| Error::invalid_response(format!("users response: {}", e)))?;

        match users.data.into_iter().next() {
            Some(user) => {
                debug!(login = %user.login, twitch_user_id = %user.id, "Resolved Twitch user");
                Ok(Some(user.id))
            }
            None => Ok(None),
        }
    }

    /// Ask the hub to deliver stream changes for a channel to our callback
    #[instrument(skip(self, client_id, token, subscription), fields(twitch_user_id = %subscription.twitch_user_id), level = "debug")]
    pub async fn subscribe_stream_changes(
        &self,
        client_id: &ClientId,
        token: &AccessToken,
        subscription: &StreamSubscription,
    ) -> Result<()> {
        let body = json!({
            "hub.callback": subscription.callback_url,
            "hub.mode": "subscribe",
            "hub.topic": self.stream_topic(&subscription.twitch_user_id),
            "hub.lease_seconds": subscription.lease_seconds,
            "hub.secret": subscription.secret,
        });

        let mut headers = Self::auth_headers(client_id, token);
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let response = self
            .http_client
            .post(&self.hub_url(), headers, body.to_string())
            .await?;
        Self::check_status(&response)?;

        info!(
            callback = %subscription.callback_url,
            lease_seconds = subscription.lease_seconds,
            "Subscribed to Twitch stream changes"
        );
        Ok(())
    }
}
