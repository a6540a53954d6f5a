//! Integration tests for streamhook
//! These drive the queue, registrar and HTTP surface together against a mock Twitch

pub mod test_harness;

pub mod registration_flow_test;
pub mod stream_updates_test;
