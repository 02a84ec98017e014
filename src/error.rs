//! Bifrost error types

use std::time::Duration;

use crate::router::ProviderFailure;

/// Bifrost error types
#[derive(Debug, thiserror::Error)]
pub enum BifrostError {
    // Provider/network errors
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    // Request errors
    #[error("permanent request error: {0}")]
    PermanentRequest(String),

    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),

    // Shared-store errors
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),

    /// Rate check could not reach the backing store. Fails closed: the
    /// caller must not proceed as if a token had been granted.
    #[error("rate limiter unavailable: {0}")]
    LimiterUnavailable(String),

    /// Token bucket denied the request (no tokens left).
    #[error("rate limit denied for resource '{resource}'")]
    Denied { resource: String },

    // Orchestration outcomes
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<BifrostError>,
    },

    #[error("all providers exhausted ({} failures)", .0.len())]
    ProvidersExhausted(Vec<ProviderFailure>),

    #[error("operation cancelled")]
    Cancelled,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no provider configured for tier")]
    NoProvider,
}

impl BifrostError {
    /// Whether a retry of the same operation is expected to help.
    ///
    /// Network errors, 5xx responses, and rate-limit pushback are
    /// transient. Auth failures, malformed requests, cancellation, and
    /// capability mismatches are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            BifrostError::TransientIo(_) => true,
            BifrostError::RateLimited { .. } => true,
            BifrostError::Api { status, .. } => *status >= 500,
            BifrostError::Denied { .. } => true,
            BifrostError::StoreUnavailable(_) => true,
            BifrostError::LimiterUnavailable(_) => true,
            _ => false,
        }
    }

    /// Server-suggested delay before retrying, if the provider sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BifrostError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BifrostError {
    fn from(err: reqwest::Error) -> Self {
        // Anything that failed before a response (connect, timeout, body
        // read) is worth retrying; a decode failure is not.
        if err.is_decode() {
            BifrostError::PermanentRequest(err.to_string())
        } else {
            BifrostError::TransientIo(err.to_string())
        }
    }
}

/// Result type alias for bifrost operations
pub type Result<T> = std::result::Result<T, BifrostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(BifrostError::TransientIo("timeout".into()).is_transient());
        assert!(
            BifrostError::Api {
                status: 503,
                message: "overloaded".into()
            }
            .is_transient()
        );
        assert!(BifrostError::RateLimited { retry_after: None }.is_transient());
        assert!(
            BifrostError::Denied {
                resource: "anthropic".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn permanent_classification() {
        assert!(!BifrostError::AuthenticationFailed.is_transient());
        assert!(!BifrostError::PermanentRequest("bad field".into()).is_transient());
        assert!(
            !BifrostError::Api {
                status: 400,
                message: "malformed".into()
            }
            .is_transient()
        );
        assert!(!BifrostError::Cancelled.is_transient());
        assert!(!BifrostError::UnsupportedCapability("nested tools".into()).is_transient());
    }

    #[test]
    fn retry_after_only_on_rate_limited() {
        let e = BifrostError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(e.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(BifrostError::AuthenticationFailed.retry_after(), None);
    }
}
