use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use streamhook::adapters::{AppAccessTokenProvider, ReqwestHttpClient, TwitchApiClient};
use streamhook::api::{self, AppState};
use streamhook::config::{self, Config};
use streamhook::jobs::{self, JobQueue};
use streamhook::{
    InMemoryUserStore, RegisterAllTwitchWebhooksWorker, TwitchWebhookRegistrar,
    TwitchWebhookRegistrationWorker, UserStore,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

async fn load_users(config: &Config) -> Result<InMemoryUserStore> {
    match &config.users_file {
        Some(path) => InMemoryUserStore::load_from_file(path)
            .await
            .with_context(|| format!("Failed to load users from {}", path.display())),
        None => {
            warn!("STREAMHOOK_USERS_FILE not set, starting with no users");
            Ok(InMemoryUserStore::new())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_file_path = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "streamhook=debug,tower_http=debug,warn".into()
            } else {
                "streamhook=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!(version = streamhook::VERSION, "streamhook starting");
    if let Some(path) = env_file_path {
        info!(path = %path.display(), "Loaded environment from file");
    }

    let config = config::load_config()
        .await
        .context("Invalid configuration")?;
    let users: Arc<dyn UserStore> = Arc::new(load_users(&config).await?);

    let http_client = Arc::new(ReqwestHttpClient::with_client(
        reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?,
    ));
    let tokens = Arc::new(AppAccessTokenProvider::new(http_client.clone(), &config.twitch));
    let api_client = TwitchApiClient::new(http_client, &config.twitch);
    let registrar = Arc::new(TwitchWebhookRegistrar::new(
        api_client,
        tokens,
        &config.app,
        &config.twitch,
    ));

    let queue = JobQueue::new(&config.queue);
    queue.register(TwitchWebhookRegistrationWorker::new(users.clone(), registrar));
    queue.register(RegisterAllTwitchWebhooksWorker::new(users.clone(), queue.clone()));
    queue.start().await;

    let renewal = config.renewal.enabled.then(|| {
        jobs::spawn_renewal(
            queue.clone(),
            Duration::from_secs(config.renewal.interval_secs),
        )
    });

    let listener = TcpListener::bind(config.server.addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.addr()))?;
    if config.server.api_token.is_none() {
        warn!("STREAMHOOK_API_TOKEN is not set, job endpoints will reject every request");
    }
    let state = AppState::new(users, queue.clone(), &config.twitch.webhook_secret)
        .with_api_token(config.server.api_token.as_deref());

    let served = api::serve(listener, state, shutdown_signal()).await;

    queue.shutdown().await;
    if let Some(renewal) = renewal {
        if let Err(e) = renewal.await {
            error!(%e, "Renewal schedule ended abnormally");
        }
    }

    let stats = queue.stats();
    info!(
        processed = stats.processed,
        failed = stats.failed,
        dead = stats.dead,
        "streamhook stopped"
    );

    served.context("HTTP server failed")
}
