//! CLI error types with exit code handling

use basecamp_core::{CoreError, ErrorKind};
use basecamp_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    #[diagnostic(code(basecamp::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Validation failed: {message}")]
    #[diagnostic(code(basecamp::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Undeclared names, duplicates and cycles
    #[error("Graph error: {message}")]
    #[diagnostic(code(basecamp::cli::graph))]
    Graph {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Allocation error: {message}")]
    #[diagnostic(code(basecamp::cli::allocation))]
    Allocation {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Materialization failed: {message}")]
    #[diagnostic(code(basecamp::cli::materialization))]
    Materialization { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(basecamp::cli::io))]
    Io { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(basecamp::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Graph { .. } => exit_codes::REFERENCE_ERROR,
            CliError::Allocation { .. } => exit_codes::ALLOCATION_ERROR,
            CliError::Materialization { .. } => exit_codes::MATERIALIZATION_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn config(message: impl Into<String>, help: Option<String>) -> Self {
        Self::Config {
            message: message.into(),
            help,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let help = match &err {
            CoreError::UnknownEnvironment { suggestion, .. } => suggestion
                .as_ref()
                .map(|s| format!("Did you mean '{}'? Run `basecamp environments` to list them", s))
                .or_else(|| Some("Run `basecamp environments` to list them".to_string())),
            CoreError::Reference { suggestion, .. } => {
                suggestion.as_ref().map(|s| format!("Did you mean '{}'?", s))
            }
            CoreError::CircularDependency { .. } => {
                Some("Remove one of the dependsOn entries that form the cycle".to_string())
            }
            CoreError::Allocation { .. } => {
                Some("Use a /16 base block and at most 127 availability zones".to_string())
            }
            _ => None,
        };

        match err.kind() {
            ErrorKind::Config => CliError::Config { message, help },
            ErrorKind::Validation => CliError::Validation { message, help },
            ErrorKind::Reference | ErrorKind::Graph => CliError::Graph { message, help },
            ErrorKind::Allocation => CliError::Allocation { message, help },
            ErrorKind::Materialization => CliError::Materialization { message },
            ErrorKind::Io => CliError::Io { message },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Core(core) => core.into(),
            KubeError::Kubeconfig(message) => CliError::Config {
                message: format!("invalid kubeconfig: {}", message),
                help: None,
            },
            other => CliError::Io {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(format!("failed to encode JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::internal(format!("failed to encode YAML: {}", err))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
