//! Client error types.
//!
//! Propagation policy: control-API failures are caught at the call site and
//! either retried (readiness polling), surfaced to the caller (connect and
//! resume failures), or absorbed when a fallback exists (history fetch).
//! Nothing here is allowed to panic across the library boundary;
//! `IllegalState` marks caller bugs, not user-facing conditions.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while driving a session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No credential available. Blocks the flow until one is provided;
    /// never retried automatically.
    #[error("authentication required: no credential available")]
    AuthRequired,

    /// The realtime handshake did not complete within its budget. Fatal to
    /// that attempt; retry is a caller decision.
    #[error("connection handshake did not complete within {budget_secs}s")]
    ConnectionTimeout { budget_secs: u64 },

    /// The backend never reported a routable runtime. Non-fatal: the caller
    /// may proceed best-effort or surface a retry.
    #[error("runtime not ready after {waited_secs}s of polling")]
    ReadinessTimeout { waited_secs: u64 },

    /// API misuse (e.g. send before connect). A programming error in the
    /// caller, not a user-facing condition.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Mid-session send/receive failure on the realtime channel. Logged;
    /// never triggers recovery on its own.
    #[error("transport error: {0}")]
    Transport(String),

    /// The fallback history fetch failed. Swallowed by the turn loop; the
    /// turn completes with whatever content was already collected.
    #[error("history fetch failed: {0}")]
    HistoryFetchFailed(String),

    /// The backend rejected a control-API call.
    #[error("backend error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Session not found under any status scheme.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// HTTP request failed before producing a response.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Local token/cache store failure.
    #[error("store error: {0}")]
    Store(String),
}

impl ClientError {
    /// Whether a readiness poll should swallow this error and try again.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Request(_) => true,
            ClientError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ClientError::ConnectionTimeout { budget_secs: 30 };
        assert_eq!(
            err.to_string(),
            "connection handshake did not complete within 30s"
        );

        let err = ClientError::Api {
            status: 502,
            message: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "backend error (502): bad gateway");
    }

    #[test]
    fn test_transient_classification() {
        assert!(
            ClientError::Api {
                status: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !ClientError::Api {
                status: 404,
                message: "missing".into()
            }
            .is_transient()
        );
        assert!(!ClientError::AuthRequired.is_transient());
    }
}
