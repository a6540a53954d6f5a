//! Tests for the Twitch adapters
//!
//! Each module drives one client against the recording `MockHttpClient`.

pub mod twitch_auth_test;
