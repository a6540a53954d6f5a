use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::error::ApiError;
use super::signature::tokens_match;
use super::AppState;
use crate::jobs::TwitchWebhookRegistrationWorker;
use crate::users::UserId;

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueuedJob {
    pub job_id: Uuid,
}

/// Require `Authorization: Bearer <api_token>`
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        warn!("Job endpoint called but no API token is configured");
        return Err(ApiError::Unauthorized);
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if tokens_match(expected, presented.trim()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Queue a webhook registration for one user
pub async fn enqueue_registration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<EnqueuedJob>), ApiError> {
    authorize(&state, &headers)?;
    let job_id = state
        .queue
        .enqueue::<TwitchWebhookRegistrationWorker>(request.user_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(EnqueuedJob { job_id })))
}
