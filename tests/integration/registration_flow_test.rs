//! End-to-end webhook registration through the job queue

use streamhook::{RegisterAllTwitchWebhooksWorker, TwitchWebhookRegistrationWorker, User, UserId};

use super::test_harness::TestHarness;

#[tokio::test]
async fn test_registration_job_subscribes_linked_user() {
    let mut harness =
        TestHarness::start(vec![User::new(7, "ada").with_twitch_username("ada_streams")]).await;
    let token = harness.mock_token(1).await;
    let lookup = harness.mock_user_lookup("ada_streams", Some("9001")).await;
    let hub = harness.mock_hub(7, "9001", 202, 1).await;

    harness
        .queue
        .enqueue::<TwitchWebhookRegistrationWorker>(UserId(7))
        .await
        .unwrap();
    harness.queue.wait_idle().await;

    token.assert_async().await;
    lookup.assert_async().await;
    hub.assert_async().await;
    assert_eq!(harness.queue.stats().processed, 1);
    assert!(harness.queue.dead_jobs().await.is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_registration_job_ignores_unlinked_and_missing_users() {
    let mut harness = TestHarness::start(vec![User::new(1, "grace")]).await;
    let token = harness.mock_token(0).await;

    for id in [1, 404] {
        harness
            .queue
            .enqueue::<TwitchWebhookRegistrationWorker>(UserId(id))
            .await
            .unwrap();
    }
    harness.queue.wait_idle().await;

    token.assert_async().await;
    assert_eq!(harness.queue.stats().processed, 2);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_register_all_shares_one_app_token() {
    let mut harness = TestHarness::start(vec![
        User::new(1, "ada").with_twitch_username("ada_streams"),
        User::new(2, "grace"),
        User::new(3, "linus").with_twitch_username("linus_live"),
    ])
    .await;
    let token = harness.mock_token(1).await;
    let _ada_lookup = harness.mock_user_lookup("ada_streams", Some("101")).await;
    let _linus_lookup = harness.mock_user_lookup("linus_live", Some("303")).await;
    let ada_hub = harness.mock_hub(1, "101", 202, 1).await;
    let linus_hub = harness.mock_hub(3, "303", 202, 1).await;

    harness
        .queue
        .enqueue::<RegisterAllTwitchWebhooksWorker>(())
        .await
        .unwrap();
    harness.queue.wait_idle().await;

    token.assert_async().await;
    ada_hub.assert_async().await;
    linus_hub.assert_async().await;
    assert_eq!(harness.queue.stats().processed, 3);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_hub_outage_is_retried_once_then_dead() {
    let mut harness =
        TestHarness::start(vec![User::new(7, "ada").with_twitch_username("ada_streams")]).await;
    let _token = harness.mock_token(1).await;
    let _lookup = harness.mock_user_lookup("ada_streams", Some("9001")).await;
    let hub = harness.mock_hub(7, "9001", 503, 2).await;

    harness
        .queue
        .enqueue::<TwitchWebhookRegistrationWorker>(UserId(7))
        .await
        .unwrap();
    harness.queue.wait_idle().await;

    hub.assert_async().await;
    let dead = harness.queue.dead_jobs().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].envelope.retry_count, 1);
    assert!(dead[0].error.contains("503"));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_unknown_twitch_login_uses_one_retry_then_dies() {
    let mut harness =
        TestHarness::start(vec![User::new(8, "ghost").with_twitch_username("no_such_login")]).await;
    let _token = harness.mock_token(1).await;
    let _lookup = harness.mock_user_lookup("no_such_login", None).await;
    let hub = harness.mock_hub(8, "0", 202, 0).await;

    harness
        .queue
        .enqueue::<TwitchWebhookRegistrationWorker>(UserId(8))
        .await
        .unwrap();
    harness.queue.wait_idle().await;

    hub.assert_async().await;
    assert_eq!(harness.queue.stats().retried, 1);
    let dead = harness.queue.dead_jobs().await;
    assert_eq!(dead.len(), 1);
    assert!(dead[0].error.contains("no_such_login"));

    harness.shutdown().await;
}
