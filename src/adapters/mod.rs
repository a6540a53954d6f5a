//! Clients for the external services this crate talks to.

pub mod http_client;
pub mod twitch_api;
pub mod twitch_auth;

#[cfg(test)]
pub(crate) mod tests;

pub use http_client::{HttpClient, ReqwestHttpClient, SimpleHttpResponse};
pub use twitch_api::{StreamSubscription, TwitchApiClient};
pub use twitch_auth::AppAccessTokenProvider;
