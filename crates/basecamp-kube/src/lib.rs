//! Basecamp Kube - the cluster and what runs on it
//!
//! This crate provides:
//! - **Cluster**: the EKS cluster bound to the network topology, plus the
//!   Kubernetes provider that consumes its kubeconfig
//! - **Client**: exec-auth kubeconfig generation and a `kube::Client` for the cluster
//! - **GitOps**: the Flux namespace, controller release, Git sources,
//!   credentials and kustomizations
//! - **Stack**: the whole graph for one environment and its outputs

pub mod client;
pub mod cluster;
pub mod error;
pub mod gitops;
pub mod stack;

pub use client::{ClusterAccess, ClusterClient, parse_kubeconfig};
pub use cluster::ClusterHandle;
pub use error::{KubeError, Result};
pub use gitops::{
    AppSpec, BootstrapConfig, CredentialFields, CredentialSpec, CredentialType, FluxApp,
    GitAuth, GitCredential, GitOpsBootstrap, GitSource, GitSourceSpec, KustomizationOptions,
    ReleaseSettings,
};
pub use stack::{Stack, build_stack};
