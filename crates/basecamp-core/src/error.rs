//! Core error types

use thiserror::Error;

/// Broad category of a [`CoreError`], used for reporting and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown environment or invalid configuration value
    Config,
    /// Zone count exceeds CIDR capacity
    Allocation,
    /// A declaration is missing required fields or carries malformed values
    Validation,
    /// A name was referenced before it was declared
    Reference,
    /// The graph itself is inconsistent (duplicates, cycles)
    Graph,
    /// The external engine failed to create a resource
    Materialization,
    /// Reading or parsing input files
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Allocation => write!(f, "allocation"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Reference => write!(f, "reference"),
            ErrorKind::Graph => write!(f, "graph"),
            ErrorKind::Materialization => write!(f, "materialization"),
            ErrorKind::Io => write!(f, "io"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown environment '{name}'. Valid environments are: {}", valid.join(", "))]
    UnknownEnvironment {
        name: String,
        valid: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Subnet allocation failed: {message}")]
    Allocation { message: String },

    #[error("Invalid {resource}: {message}")]
    Validation { resource: String, message: String },

    #[error("{consumer} references undeclared {kind} '{name}'")]
    Reference {
        consumer: String,
        kind: String,
        name: String,
        suggestion: Option<String>,
    },

    #[error("Resource already declared: {key}")]
    DuplicateResource { key: String },

    #[error("Component '{name}' is already owned as {existing}, not {requested}")]
    ComponentConflict {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Failed to materialize '{name}': {message}")]
    Materialization { name: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Create an invalid configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a validation error for the named resource
    pub fn validation(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create an allocation error
    pub fn allocation(message: impl Into<String>) -> Self {
        Self::Allocation {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::UnknownEnvironment { .. } | CoreError::InvalidConfig { .. } => {
                ErrorKind::Config
            }
            CoreError::Allocation { .. } => ErrorKind::Allocation,
            CoreError::Validation { .. } => ErrorKind::Validation,
            CoreError::Reference { .. } => ErrorKind::Reference,
            CoreError::DuplicateResource { .. }
            | CoreError::ComponentConflict { .. }
            | CoreError::CircularDependency { .. } => ErrorKind::Graph,
            CoreError::Materialization { .. } => ErrorKind::Materialization,
            CoreError::YamlParse(_) | CoreError::JsonParse(_) | CoreError::Io(_) => ErrorKind::Io,
        }
    }

    /// "Did you mean" hint, when one was computed
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            CoreError::UnknownEnvironment { suggestion, .. }
            | CoreError::Reference { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
