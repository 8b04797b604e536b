//! Flux GitOps bootstrap
//!
//! The install chain is namespace -> controller release -> Git sources ->
//! kustomizations, with credentials depending on the namespace only and a
//! source depending on the credential it names. Every edge is declared, so
//! the engine never installs a consumer before its producer.

pub mod bootstrap;
pub mod credentials;
pub mod kustomization;
pub mod release;
pub mod source;

use basecamp_core::{CoreError, Result};
use humantime_serde::re::humantime;

pub use bootstrap::{BootstrapConfig, GitOpsBootstrap};
pub use credentials::{CredentialFields, CredentialSpec, CredentialType, GitAuth, GitCredential};
pub use kustomization::{AppSource, AppSpec, FluxApp, Kustomization, KustomizationOptions};
pub use release::ReleaseSettings;
pub use source::{GitRepository, GitSource, GitSourceSpec};

/// Namespace the controllers, sources and kustomizations live in
pub const DEFAULT_NAMESPACE: &str = "flux-system";

/// Reconcile interval for sources and kustomizations
pub const DEFAULT_INTERVAL: &str = "5m";

pub const DEFAULT_BRANCH: &str = "main";

fn validate_interval(resource: &str, interval: &str) -> Result<()> {
    match humantime::parse_duration(interval) {
        Ok(duration) if !duration.is_zero() => Ok(()),
        Ok(_) => Err(CoreError::validation(resource, "interval must be greater than zero")),
        Err(e) => Err(CoreError::validation(
            resource,
            format!("invalid interval '{}': {}", interval, e),
        )),
    }
}
