//! CLI error type with miette diagnostics and stable exit codes.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use doorwatch_config::ConfigError;
use doorwatch_core::CoreError;

/// Exit codes. Usage errors exit with 2 from clap itself.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const STATE: i32 = 4;
    pub const CLASSIFIER: i32 = 5;
    pub const IO: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Invalid configuration: {field}: {reason}")]
    #[diagnostic(
        code(doorwatch::config),
        help("Set it in the config file or through the matching DOORWATCH_* variable, then run `doorwatch check`.")
    )]
    InvalidConfig { field: String, reason: String },

    #[error("Could not load configuration")]
    #[diagnostic(code(doorwatch::config_load))]
    ConfigLoad(#[source] Box<figment::Error>),

    #[error("State store failure: {message}")]
    #[diagnostic(
        code(doorwatch::state),
        help("Check that the state directory exists and is writable.")
    )]
    State { message: String },

    #[error("Classifier setup failed: {message}")]
    #[diagnostic(
        code(doorwatch::classifier),
        help("Check classifier.endpoint, the API key and the TLS settings.")
    )]
    Classifier { message: String },

    #[error("I/O error on {}", path.display())]
    #[diagnostic(code(doorwatch::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    #[diagnostic(code(doorwatch::internal))]
    Internal { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig { .. } | Self::ConfigLoad(_) => exit_code::CONFIG,
            Self::State { .. } => exit_code::STATE,
            Self::Classifier { .. } => exit_code::CLASSIFIER,
            Self::Io { .. } => exit_code::IO,
            Self::Internal { .. } => exit_code::GENERAL,
        }
    }

    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::InvalidConfig { field, reason },
            ConfigError::Figment(inner) => Self::ConfigLoad(inner),
            ConfigError::Serialization(e) => Self::Internal {
                message: format!("failed to render config: {e}"),
            },
            ConfigError::Io(source) => Self::Io {
                path: doorwatch_config::config_path(),
                source,
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Changelog { .. } | CoreError::NotBootstrapped => Self::State {
                message: err.to_string(),
            },
            CoreError::Classifier { .. }
            | CoreError::ClassifierTimeout { .. }
            | CoreError::LabelMismatch { .. } => Self::Classifier {
                message: err.to_string(),
            },
            CoreError::Config { message } => Self::InvalidConfig {
                field: "pipeline".into(),
                reason: message,
            },
            CoreError::ShutDown | CoreError::Internal(_) => Self::Internal {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_exit_with_config_code() {
        let err = CliError::from(ConfigError::Validation {
            field: "pipeline.timezone".into(),
            reason: "unknown".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONFIG);
        assert!(err.to_string().contains("pipeline.timezone"));
    }

    #[test]
    fn core_errors_map_by_concern() {
        let state = CliError::from(CoreError::Changelog {
            log: "gate".into(),
            message: "disk full".into(),
        });
        assert_eq!(state.exit_code(), exit_code::STATE);

        let classifier = CliError::from(CoreError::Classifier {
            message: "bad url".into(),
        });
        assert_eq!(classifier.exit_code(), exit_code::CLASSIFIER);

        assert_eq!(CliError::from(CoreError::ShutDown).exit_code(), exit_code::GENERAL);
    }
}
