//! Core types for basecamp
//!
//! This crate provides the foundational types:
//! - Environment configuration (`EnvironmentTable`, `StackConfig`)
//! - The resource graph (`ResourceGraph`, `Declaration`, output references)
//! - The materialization interface (`ProvisioningEngine`, `materialize`)
//! - Naming helpers and the shared error type

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod naming;

pub use config::{
    AwsConfig, ClusterConfig, EnvironmentConfig, EnvironmentTable, NatMode, NetworkConfig,
    NodeGroupConfig, NodeGroups, StackConfig,
};
pub use engine::{
    CreateRequest, DryRunEngine, EngineFailure, MaterializedStack, ProvisioningEngine,
    ResourceOutputs, materialize,
};
pub use error::{CoreError, ErrorKind, Result};
pub use graph::{
    Component, ComponentRecord, Declaration, DependencyEdge, GraphSummary, OutputRef,
    ResourceGraph, ResourceId, ResourceKind, ResourceNode, WaveSummary, escape_literal,
    escape_literals, id_ref, output_ref,
};
pub use naming::{StackNames, closest_match, validate_object_name};
