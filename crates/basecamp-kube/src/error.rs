//! Error types for basecamp-kube

use basecamp_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Result type for cluster client operations
pub type Result<T> = std::result::Result<T, KubeError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be parsed or turned into a client config
    #[error("invalid kubeconfig: {0}")]
    Kubeconfig(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<kube::config::KubeconfigError> for KubeError {
    fn from(e: kube::config::KubeconfigError) -> Self {
        KubeError::Kubeconfig(e.to_string())
    }
}

impl KubeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KubeError::Core(e) => e.kind(),
            KubeError::Kubeconfig(_) => ErrorKind::Config,
            KubeError::Api(_) | KubeError::Serialization(_) => ErrorKind::Io,
        }
    }
}
