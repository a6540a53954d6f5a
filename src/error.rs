use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error type for streamhook operations
#[derive(Error, Debug)]
pub enum Error {
    // Configuration related errors
    #[error("Required configuration key '{key}' is missing")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for '{key}': {reason}")]
    ConfigInvalid {
        key: String,
        value: String,
        reason: String,
    },

    // Twitch API related errors
    #[error("API authentication failed: {reason}")]
    ApiAuthenticationFailed { reason: String },

    #[error("{service} API rate limit exceeded")]
    ApiRateLimited {
        service: String,
        reset_after: Option<Duration>,
    },

    #[error("{service} API unavailable (HTTP {status})")]
    ApiUnavailable { service: String, status: u16 },

    #[error("API request failed (HTTP {status}): {reason}")]
    ApiRequestFailed { status: u16, reason: String },

    #[error("API response could not be understood: {reason}")]
    ApiResponseInvalid { reason: String },

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    // Storage errors
    #[error("User store error: {reason}")]
    Storage { reason: String },

    // Job queue errors
    #[error("Queue '{queue}' is not configured")]
    UnknownQueue { queue: String },

    #[error("Worker '{worker}' is not registered")]
    UnknownWorker { worker: String },

    #[error("Invalid arguments for worker '{worker}': {reason}")]
    InvalidJobArgs { worker: String, reason: String },

    #[error("Job queue has been shut down")]
    QueueClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for different retry strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Temporary network issues, timeouts, etc. - usually retryable
    Network,
    /// Authentication failures that might be fixed by fetching a new token
    Authentication,
    /// API rate limiting - retryable with backoff
    RateLimit,
    /// API service unavailable - retryable with longer backoff
    ServiceUnavailable,
    /// Backing store hiccups - retryable
    Storage,
    /// Rejected API requests - not retryable without input changes
    Api,
    /// Configuration errors - not retryable without reconfiguration
    Configuration,
    /// Resource not found - generally not retryable
    NotFound,
    /// Validation errors - not retryable without input changes
    Validation,
    /// Internal errors in our code - generally not retryable
    Internal,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network
            | Self::Authentication
            | Self::RateLimit
            | Self::ServiceUnavailable
            | Self::Storage => true,

            Self::Api | Self::Configuration | Self::NotFound | Self::Validation | Self::Internal => {
                false
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::ServiceUnavailable => "service_unavailable",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Api => "api",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

impl Error {
    /// Category used by the job queue to decide whether to retry
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ConfigMissing { .. } | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }
            Error::ApiAuthenticationFailed { .. } => ErrorCategory::Authentication,
            Error::ApiRateLimited { .. } => ErrorCategory::RateLimit,
            Error::ApiUnavailable { .. } => ErrorCategory::ServiceUnavailable,
            Error::ApiRequestFailed { .. } | Error::ApiResponseInvalid { .. } => ErrorCategory::Api,
            Error::Network(_) => ErrorCategory::Network,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Storage { .. } => ErrorCategory::Storage,
            Error::UnknownQueue { .. }
            | Error::UnknownWorker { .. }
            | Error::InvalidJobArgs { .. }
            | Error::Serialization(_) => ErrorCategory::Validation,
            Error::QueueClosed | Error::Io(_) | Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns true if the failed operation is worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Failures no retry can fix: the job itself cannot be dispatched
    pub fn is_permanent_job_failure(&self) -> bool {
        matches!(
            self,
            Error::InvalidJobArgs { .. } | Error::UnknownWorker { .. }
        )
    }

    /// Minimum wait the remote service asked for before trying again
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::ApiRateLimited { reset_after, .. } => *reset_after,
            _ => None,
        }
    }

    pub fn config_missing(key: impl Into<String>) -> Self {
        Error::ConfigMissing { key: key.into() }
    }

    pub fn config_invalid(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Error::ConfigInvalid {
            key: key.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl fmt::Display) -> Self {
        Error::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn storage(reason: impl fmt::Display) -> Self {
        Error::Storage {
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(reason: impl fmt::Display) -> Self {
        Error::ApiResponseInvalid {
            reason: reason.to_string(),
        }
    }

    /// Map a non-success HTTP status from a Twitch endpoint onto an error
    pub fn from_status(service: &str, status: u16, body: &str) -> Self {
        match status {
            401 => Error::ApiAuthenticationFailed {
                reason: body.to_string(),
            },
            429 => Error::ApiRateLimited {
                service: service.to_string(),
                reset_after: None,
            },
            500..=599 => Error::ApiUnavailable {
                service: service.to_string(),
                status,
            },
            _ => Error::ApiRequestFailed {
                status,
                reason: body.to_string(),
            },
        }
    }
}
