use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::ErrorBody;

/// Message used when a failure carries nothing more specific.
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred";
/// Message used when a request was sent but no response came back.
pub const NO_RESPONSE_MESSAGE: &str = "No response from server";

/// Error type returned by this crate.
///
/// Every failed call, whatever its cause, surfaces as this one shape.
/// `status` is `0` when no HTTP response was received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    /// Human readable description, preferring the server's own message.
    pub message: String,
    /// HTTP status code, or `0` for transport and setup failures.
    pub status: u16,
    /// Field-level validation errors returned by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    /// ISO-8601 time at which the failure was normalized.
    pub timestamp: String,
}

impl ApiError {
    pub(crate) fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            errors: None,
            timestamp: now_iso8601(),
        }
    }

    /// Returns `true` when no HTTP response was received.
    pub fn is_transport(&self) -> bool {
        self.status == 0
    }

    /// Returns the validation messages recorded for `field`, if any.
    pub fn field_errors(&self, field: &str) -> Option<&[String]> {
        self.errors.as_ref()?.get(field).map(Vec::as_slice)
    }
}

/// A failed attempt, before normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    /// The server answered with a non-success status.
    Response { status: u16, body: String },
    /// The request went out but no response arrived.
    NoResponse { timed_out: bool, message: String },
    /// The request could not be built or sent at all.
    Setup { message: String },
    /// A success response whose body is not the expected envelope.
    Decode { status: u16, message: String },
}

impl Failure {
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Setup {
                message: err.to_string(),
            }
        } else {
            Self::NoResponse {
                timed_out: err.is_timeout(),
                message: err.to_string(),
            }
        }
    }

    /// HTTP status of the failure, `None` when no response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Converts the failure into the public error shape.
    pub fn normalize(&self) -> ApiError {
        match self {
            Self::Response { status, body } => {
                let parsed = ErrorBody::parse(body);
                let message = parsed
                    .message
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| status_message(*status));
                ApiError {
                    errors: parsed.errors,
                    ..ApiError::new(message, *status)
                }
            }
            Self::NoResponse { .. } => ApiError::new(NO_RESPONSE_MESSAGE, 0),
            Self::Setup { message } => {
                let message = if message.is_empty() {
                    FALLBACK_MESSAGE
                } else {
                    message.as_str()
                };
                ApiError::new(message, 0)
            }
            Self::Decode { status, message } => ApiError::new(message.as_str(), *status),
        }
    }
}

fn status_message(status: u16) -> String {
    if status == 0 {
        FALLBACK_MESSAGE.to_owned()
    } else {
        format!("Request failed with status code {status}")
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Failure of a credential storage backend.
///
/// Never returned from [`crate::ApiClient`]; storage errors are logged and
/// treated as a missing token.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The storage area does not exist or access was denied.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// The backend rejected a write (quota exceeded, read-only, ...).
    #[error("storage write failed: {0}")]
    Write(String),
    /// The backend failed to read a value.
    #[error("storage read failed: {0}")]
    Read(String),
}

/// Invalid environment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
