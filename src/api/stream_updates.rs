//! Callback endpoint Twitch delivers stream-change notifications to.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::error::ApiError;
use super::signature::{self, SIGNATURE_HEADER};
use super::AppState;
use crate::error::Error;
use crate::users::{StreamingPlatform, UserId};

/// Query parameters of a hub verification request
#[derive(Debug, Deserialize)]
pub struct HubVerification {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
    #[serde(rename = "hub.topic")]
    topic: Option<String>,
    #[serde(rename = "hub.reason")]
    reason: Option<String>,
}

/// Body of a stream-change notification; empty `data` means the stream ended
#[derive(Debug, Deserialize)]
struct StreamNotification {
    data: Vec<serde_json::Value>,
}

/// Answer the hub's intent verification for a subscription
#[instrument(skip_all)]
pub async fn verify_subscription(
    Path(user_id): Path<i64>,
    Query(query): Query<HubVerification>,
) -> Result<Response, ApiError> {
    if query.mode.as_deref() == Some("denied") {
        warn!(
            user_id,
            topic = ?query.topic,
            reason = ?query.reason,
            "Twitch denied stream webhook subscription"
        );
        return Ok(StatusCode::OK.into_response());
    }

    let challenge = query
        .challenge
        .ok_or_else(|| ApiError::BadRequest("missing hub.challenge".to_string()))?;

    info!(user_id, topic = ?query.topic, "Confirmed stream webhook subscription");
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        challenge,
    )
        .into_response())
}

/// Record a user's live status from a signed notification
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn receive_notification(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;
    if !signature::verify(state.webhook_secret.as_bytes(), &body, signature_header) {
        warn!(user_id, "Rejected stream notification with bad signature");
        return Err(ApiError::InvalidSignature);
    }

    let notification: StreamNotification = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid notification body: {}", e)))?;

    let platform = (!notification.data.is_empty()).then_some(StreamingPlatform::Twitch);
    let user_id = UserId(user_id);
    if !state
        .users
        .set_currently_streaming_on(user_id, platform)
        .await?
    {
        return Err(Error::not_found("User", user_id).into());
    }

    debug!(%user_id, live = platform.is_some(), "Updated streaming status");
    Ok(StatusCode::NO_CONTENT)
}
