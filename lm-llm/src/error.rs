use crate::types::Provider;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Longest slice of an offending payload kept on a validation error.
const PAYLOAD_PREVIEW_MAX: usize = 2000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{provider} transport error: {message}")]
    Transport {
        provider: Provider,
        message: String,
        timed_out: bool,
    },

    #[error("{provider} api error status={status} kind={kind:?}: {message}")]
    Upstream {
        provider: Provider,
        status: u16,
        kind: ApiErrorKind,
        message: String,
    },

    #[error("{provider} response validation failed: {message}")]
    Validation {
        provider: Provider,
        message: String,
        payload: String,
    },

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("no api credentials configured")]
    NoCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    BadRequest,
    Authentication,
    RateLimited,
    Server,
    Other,
}

impl ApiErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 404 | 409 | 413 | 422 => Self::BadRequest,
            401 | 403 => Self::Authentication,
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Maps the `error.type` string both providers put on error payloads.
    pub fn from_error_type(error_type: &str) -> Option<Self> {
        match error_type {
            "invalid_request_error" | "not_found_error" | "request_too_large" => {
                Some(Self::BadRequest)
            }
            "authentication_error" | "permission_error" => Some(Self::Authentication),
            "rate_limit_error" | "rate_limit_exceeded" => Some(Self::RateLimited),
            "api_error" | "overloaded_error" | "server_error" => Some(Self::Server),
            _ => None,
        }
    }
}

impl LlmError {
    pub(crate) fn transport(provider: Provider, e: reqwest::Error) -> Self {
        Self::Transport {
            provider,
            timed_out: e.is_timeout(),
            message: e.to_string(),
        }
    }

    pub(crate) fn upstream(provider: Provider, status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            status,
            kind: ApiErrorKind::from_status(status),
            message: message.into(),
        }
    }

    pub(crate) fn validation(
        provider: Provider,
        message: impl Into<String>,
        payload: &str,
    ) -> Self {
        Self::Validation {
            provider,
            message: message.into(),
            payload: truncate_payload(payload),
        }
    }

    /// Provider the failure belongs to, if it came from a provider call.
    pub fn provider(&self) -> Option<Provider> {
        match self {
            Self::Transport { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::Validation { provider, .. } => Some(*provider),
            Self::InvalidInput(_) | Self::UnsupportedProvider(_) | Self::NoCredentials => None,
        }
    }
}

fn truncate_payload(payload: &str) -> String {
    if payload.len() <= PAYLOAD_PREVIEW_MAX {
        return payload.to_string();
    }
    let mut end = PAYLOAD_PREVIEW_MAX;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &payload[..end])
}
