//! Tests for the app access token provider

use super::test_helpers::{mock_client, mock_token, test_twitch_config, TEST_TOKEN_URL};
use crate::adapters::http_client::HttpMethod;
use crate::adapters::twitch_auth::AppAccessTokenProvider;
use crate::error::Error;

#[tokio::test]
async fn test_fetches_token_with_client_credentials() {
    let (mock, client) = mock_client();
    mock_token(&mock, "app-token-1", 5_000_000);

    let provider = AppAccessTokenProvider::new(client, &test_twitch_config());
    let token = provider.access_token().await.unwrap();
    assert_eq!(token.secret(), "app-token-1");

    let requests = mock.requests_to(TEST_TOKEN_URL);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::POST);
    assert!(requests[0].body.contains("client_id=test_client_id"));
    assert!(requests[0].body.contains("client_secret=test_client_secret"));
    assert!(requests[0].body.contains("grant_type=client_credentials"));
}

#[tokio::test]
async fn test_caches_token_until_expiry_margin() {
    let (mock, client) = mock_client();
    mock_token(&mock, "long-lived", 5_000_000);

    let provider = AppAccessTokenProvider::new(client, &test_twitch_config());
    provider.access_token().await.unwrap();
    provider.access_token().await.unwrap();
    provider.access_token().await.unwrap();

    assert_eq!(mock.requests_to(TEST_TOKEN_URL).len(), 1);
}

#[tokio::test]
async fn test_refetches_token_inside_expiry_margin() {
    let (mock, client) = mock_client();
    // Expires within the refresh margin, so it is never reused
    mock_token(&mock, "short-lived", 60);
    mock_token(&mock, "replacement", 5_000_000);

    let provider = AppAccessTokenProvider::new(client, &test_twitch_config());
    assert_eq!(provider.access_token().await.unwrap().secret(), "short-lived");
    assert_eq!(provider.access_token().await.unwrap().secret(), "replacement");
    assert_eq!(mock.requests_to(TEST_TOKEN_URL).len(), 2);
}

#[tokio::test]
async fn test_absurd_expiry_is_capped() {
    let (mock, client) = mock_client();
    mock_token(&mock, "forever", u64::MAX);

    let provider = AppAccessTokenProvider::new(client, &test_twitch_config());
    assert_eq!(provider.access_token().await.unwrap().secret(), "forever");
    assert_eq!(provider.access_token().await.unwrap().secret(), "forever");
    assert_eq!(mock.requests_to(TEST_TOKEN_URL).len(), 1);
}

#[tokio::test]
async fn test_invalidate_forces_new_token() {
    let (mock, client) = mock_client();
    mock_token(&mock, "first", 5_000_000);
    mock_token(&mock, "second", 5_000_000);

    let provider = AppAccessTokenProvider::new(client, &test_twitch_config());
    assert_eq!(provider.access_token().await.unwrap().secret(), "first");

    provider.invalidate().await;
    assert_eq!(provider.access_token().await.unwrap().secret(), "second");
}

#[tokio::test]
async fn test_rejected_credentials_are_configuration_errors() {
    let (mock, client) = mock_client();
    mock.mock_response(TEST_TOKEN_URL, 403, r#"{"status":403,"message":"invalid client secret"}"#);

    let provider = AppAccessTokenProvider::new(client, &test_twitch_config());
    let err = provider.access_token().await.unwrap_err();
    assert!(matches!(err, Error::ConfigInvalid { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_auth_outage_is_retryable() {
    let (mock, client) = mock_client();
    mock.mock_response(TEST_TOKEN_URL, 503, "upstream unavailable");

    let provider = AppAccessTokenProvider::new(client, &test_twitch_config());
    let err = provider.access_token().await.unwrap_err();
    assert!(matches!(err, Error::ApiUnavailable { status: 503, .. }));
    assert!(err.is_retryable());
}
