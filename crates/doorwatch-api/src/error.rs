use thiserror::Error;

/// Top-level error type for the `doorwatch-api` crate.
///
/// Covers the two wire surfaces the pipeline talks to: raw smart-lock poll
/// payloads and the remote image classifier. `doorwatch-core` maps these
/// into pipeline errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A credential could not be turned into a request header.
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    // ── Classifier ──────────────────────────────────────────────────
    /// Non-success status from the classifier endpoint.
    #[error("Classifier error (HTTP {status}): {message}")]
    Classifier { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A lock poll payload that could not be read as a lock list.
    #[error("Malformed lock payload: {message}")]
    MalformedPayload { message: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Classifier { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if the request hit the client-side timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Classifier {
            status: 503,
            message: "warming up".into(),
        };
        assert!(err.is_transient());

        let err = Error::Classifier {
            status: 400,
            message: "bad image".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn malformed_payload_is_permanent() {
        let err = Error::MalformedPayload {
            message: "expected value".into(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_timeout());
    }
}
