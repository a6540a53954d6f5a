//! The notification callback served over real HTTP

use streamhook::api::signature;
use streamhook::{StreamingPlatform, User, UserId, UserStore};

use super::test_harness::{TestHarness, API_TOKEN, WEBHOOK_SECRET};

fn sign(body: &str) -> String {
    signature::sign(WEBHOOK_SECRET.as_bytes(), body.as_bytes()).unwrap()
}

#[tokio::test]
async fn test_subscription_verification_round_trip() {
    let harness = TestHarness::start(vec![User::new(7, "ada").with_twitch_username("ada_streams")]).await;
    let server = harness.spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .get(server.url("/users/7/twitch_stream_updates"))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.topic", "https://api.twitch.tv/helix/streams?user_id=9001"),
            ("hub.challenge", "challenge-token"),
            ("hub.lease_seconds", "864000"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(response.text().await.unwrap(), "challenge-token");

    server.stop().await;
    harness.shutdown().await;
}

#[tokio::test]
async fn test_stream_goes_live_then_offline() {
    let harness = TestHarness::start(vec![User::new(7, "ada").with_twitch_username("ada_streams")]).await;
    let server = harness.spawn_server().await;
    let client = reqwest::Client::new();
    let url = server.url("/users/7/twitch_stream_updates");

    let live = r#"{"data":[{"id":"1","user_id":"9001","user_name":"ada_streams","type":"live"}]}"#;
    let response = client
        .post(&url)
        .header("X-Hub-Signature", sign(live))
        .body(live)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    let ada = harness.users.find(UserId(7)).await.unwrap().unwrap();
    assert_eq!(ada.currently_streaming_on, Some(StreamingPlatform::Twitch));

    let offline = r#"{"data":[]}"#;
    let response = client
        .post(&url)
        .header("X-Hub-Signature", sign(offline))
        .body(offline)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    let ada = harness.users.find(UserId(7)).await.unwrap().unwrap();
    assert_eq!(ada.currently_streaming_on, None);

    server.stop().await;
    harness.shutdown().await;
}

#[tokio::test]
async fn test_forged_notification_is_rejected() {
    let harness = TestHarness::start(vec![User::new(7, "ada").with_twitch_username("ada_streams")]).await;
    let server = harness.spawn_server().await;

    let body = r#"{"data":[{"type":"live"}]}"#;
    let forged = signature::sign(b"not the secret", body.as_bytes()).unwrap();
    let response = reqwest::Client::new()
        .post(server.url("/users/7/twitch_stream_updates"))
        .header("X-Hub-Signature", forged)
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    let ada = harness.users.find(UserId(7)).await.unwrap().unwrap();
    assert_eq!(ada.currently_streaming_on, None);

    server.stop().await;
    harness.shutdown().await;
}

#[tokio::test]
async fn test_enqueue_endpoint_runs_registration() {
    let mut harness =
        TestHarness::start(vec![User::new(7, "ada").with_twitch_username("ada_streams")]).await;
    let _token = harness.mock_token(1).await;
    let _lookup = harness.mock_user_lookup("ada_streams", Some("9001")).await;
    let hub = harness.mock_hub(7, "9001", 202, 1).await;
    let server = harness.spawn_server().await;

    let response = reqwest::Client::new()
        .post(server.url("/jobs/twitch_webhook_registrations"))
        .bearer_auth(API_TOKEN)
        .json(&serde_json::json!({ "user_id": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["job_id"].is_string());

    harness.queue.wait_idle().await;
    hub.assert_async().await;

    server.stop().await;
    harness.shutdown().await;
}

#[tokio::test]
async fn test_enqueue_endpoint_rejects_anonymous_callers() {
    let harness =
        TestHarness::start(vec![User::new(7, "ada").with_twitch_username("ada_streams")]).await;
    let server = harness.spawn_server().await;

    let response = reqwest::Client::new()
        .post(server.url("/jobs/twitch_webhook_registrations"))
        .json(&serde_json::json!({ "user_id": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(harness.queue.stats().enqueued.get("low_priority"), Some(&0));

    server.stop().await;
    harness.shutdown().await;
}
