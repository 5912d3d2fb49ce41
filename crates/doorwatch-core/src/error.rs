// ── Core error types ──
//
// Pipeline-level errors. Stage tasks log these and keep running; only
// startup (changelog replay) and config translation surface them to the
// caller. The `From<doorwatch_api::Error>` impl folds transport failures
// into classifier or config variants.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Changelog errors ─────────────────────────────────────────────
    #[error("Changelog '{log}' failed: {message}")]
    Changelog { log: String, message: String },

    #[error("Gate store has not replayed its changelog yet")]
    NotBootstrapped,

    // ── Classifier errors ────────────────────────────────────────────
    #[error("Classifier call failed: {message}")]
    Classifier { message: String },

    #[error("Classifier did not answer within {timeout:?}")]
    ClassifierTimeout { timeout: Duration },

    #[error("Classifier returned {got} probabilities for {expected} labels")]
    LabelMismatch { expected: usize, got: usize },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Pipeline is shut down")]
    ShutDown,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn changelog(log: &str, err: impl std::fmt::Display) -> Self {
        Self::Changelog {
            log: log.to_owned(),
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<doorwatch_api::Error> for CoreError {
    fn from(err: doorwatch_api::Error) -> Self {
        match err {
            doorwatch_api::Error::Transport(e) if e.is_timeout() => CoreError::Classifier {
                message: format!("request timed out: {e}"),
            },
            doorwatch_api::Error::Transport(e) => CoreError::Classifier {
                message: e.to_string(),
            },
            doorwatch_api::Error::Classifier { status, message } => CoreError::Classifier {
                message: format!("HTTP {status}: {message}"),
            },
            doorwatch_api::Error::Deserialization { message, body: _ } => CoreError::Classifier {
                message: format!("unreadable response: {message}"),
            },
            doorwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            doorwatch_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            doorwatch_api::Error::InvalidCredential(msg) => CoreError::Config {
                message: format!("Invalid credential: {msg}"),
            },
            doorwatch_api::Error::MalformedPayload { message } => {
                CoreError::Internal(format!("Malformed lock payload: {message}"))
            }
        }
    }
}
