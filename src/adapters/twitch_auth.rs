use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};
use twitch_oauth2::{AccessToken, ClientId, ClientSecret};

use crate::adapters::http_client::HttpClient;
use crate::config::TwitchConfig;
use crate::error::{Error, Result};

/// Refresh tokens this long before Twitch says they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Upper bound on how long a token is cached, whatever `expires_in` claims
const MAX_CACHE_LIFETIME: Duration = Duration::from_secs(60 * 24 * 60 * 60);

/// Body returned by the client-credentials grant
#[derive(Debug, Deserialize)]
struct AppTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedAppToken {
    access_token: AccessToken,
    refresh_at: Instant,
}

/// Fetches and caches a Twitch app access token
pub struct AppAccessTokenProvider {
    http_client: Arc<dyn HttpClient>,
    client_id: ClientId,
    client_secret: ClientSecret,
    token_url: String,
    /// Held across a fetch so concurrent callers share one request
    token: Mutex<Option<CachedAppToken>>,
}

impl AppAccessTokenProvider {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &TwitchConfig) -> Self {
        Self {
            http_client,
            client_id: ClientId::new(config.client_id.clone()),
            client_secret: ClientSecret::new(config.client_secret.clone()),
            token_url: format!("{}/oauth2/token", config.auth_base_url.trim_end_matches('/')),
            token: Mutex::new(None),
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Get a valid app access token, fetching a new one when needed
    #[instrument(skip(self), level = "debug")]
    pub async fn access_token(&self) -> Result<AccessToken> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                debug!("Using cached app access token");
                return Ok(token.access_token.clone());
            }
        }

        info!("Requesting new Twitch app access token");
        let fresh = self.fetch().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    /// Drop the cached token so the next call fetches a fresh one
    pub async fn invalidate(&self) {
        debug!("Invalidating cached app access token");
        *self.token.lock().await = None;
    }

    async fn fetch(&self) -> Result<CachedAppToken> {
        let form = vec![
            ("client_id".to_string(), self.client_id.as_str().to_string()),
            ("client_secret".to_string(), self.client_secret.secret().to_string()),
            ("grant_type".to_string(), "client_credentials".to_string()),
        ];

        let response = self
            .http_client
            .post_form(&self.token_url, HashMap::new(), form)
            .await?;

        if !response.is_success() {
            error!(status = response.status(), "Failed to get Twitch app access token");
            // A rejected grant means the credentials are wrong, not that a retry helps
            return Err(match response.status() {
                400..=403 => Error::config_invalid(
                    "TWITCH_CLIENT_SECRET",
                    "<redacted>",
                    format!("token request rejected: {}", response.body()),
                ),
                status => Error::from_status("Twitch auth", status, response.body()),
            });
        }

        let body: AppTokenResponse = response
            .json()
            .map_err(|e| Error::invalid_response(format!("token response: {}", e)))?;

        let lifetime = Duration::from_secs(body.expires_in)
            .saturating_sub(EXPIRY_MARGIN)
            .min(MAX_CACHE_LIFETIME);
        info!(expires_in = body.expires_in, "Obtained Twitch app access token");

        let now = Instant::now();
        Ok(CachedAppToken {
            access_token: AccessToken::new(body.access_token),
            refresh_at: now.checked_add(lifetime).unwrap_or(now),
        })
    }
}
