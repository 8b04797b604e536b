//! Materialization interface
//!
//! The graph is only a description. A [`ProvisioningEngine`] turns each
//! declaration into a real resource and reports its outputs; [`materialize`]
//! walks the install waves, substitutes producer outputs into consumer specs,
//! and creates every resource of a wave concurrently.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::error::{CoreError, Result};
use crate::graph::{OutputRef, ResourceGraph, ResourceId, ResourceKind, substitute_refs};

/// One resource to create, with every placeholder already resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub kind: ResourceKind,
    pub name: String,
    pub spec: Value,
    pub depends_on: Vec<ResourceId>,
}

impl CreateRequest {
    pub fn id(&self) -> ResourceId {
        ResourceId::new(self.kind, self.name.clone())
    }
}

/// What the engine reports back for a created resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutputs {
    /// Provider-assigned id
    pub id: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,
}

impl ResourceOutputs {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    /// Look up an output; `id` is always available
    pub fn get(&self, output: &str) -> Option<Value> {
        match output {
            "id" => Some(Value::String(self.id.clone())),
            other => self.outputs.get(other).cloned(),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineFailure {
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The external system that creates resources
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Create one resource. Its producers have already been created.
    async fn create(
        &self,
        request: CreateRequest,
    ) -> std::result::Result<ResourceOutputs, EngineFailure>;
}

/// Outputs of every materialized resource, in creation order
#[derive(Debug, Clone, Default)]
pub struct MaterializedStack {
    resources: IndexMap<ResourceId, ResourceOutputs>,
}

impl MaterializedStack {
    pub fn get(&self, id: &ResourceId) -> Option<&ResourceOutputs> {
        self.resources.get(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &ResourceOutputs)> {
        self.resources.iter()
    }

    pub fn resolve(&self, reference: &OutputRef) -> Option<Value> {
        self.resources
            .get(&reference.resource)
            .and_then(|outputs| outputs.get(&reference.output))
    }

    /// Substitute every placeholder in `value` with a materialized output
    pub fn resolve_value(&self, value: &Value) -> std::result::Result<Value, OutputRef> {
        substitute_refs(value, &|reference: &OutputRef| self.resolve(reference))
    }
}

/// Create every resource of `graph` through `engine`
///
/// Waves run one after another; resources inside a wave are created
/// concurrently. The first failure aborts the run and names the resource.
pub async fn materialize(
    graph: &ResourceGraph,
    engine: &dyn ProvisioningEngine,
) -> Result<MaterializedStack> {
    let waves = graph.install_waves()?;
    let mut stack = MaterializedStack::default();

    tracing::info!(
        "materializing {} resources in {} waves with engine {}",
        graph.len(),
        waves.len(),
        engine.name()
    );

    for (number, wave) in waves.iter().enumerate() {
        let requests = wave
            .iter()
            .map(|node| {
                let spec = stack.resolve_value(&node.spec).map_err(|missing| {
                    CoreError::Materialization {
                        name: node.id.name.clone(),
                        message: format!("producer output {} is not available", missing),
                    }
                })?;
                Ok(CreateRequest {
                    kind: node.id.kind,
                    name: node.id.name.clone(),
                    spec,
                    depends_on: node.depends_on.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("wave {}: creating {} resources", number, requests.len());

        let created = futures::future::try_join_all(requests.into_iter().map(|request| async move {
            let id = request.id();
            match engine.create(request).await {
                Ok(outputs) => Ok((id, outputs)),
                Err(failure) => Err(CoreError::Materialization {
                    name: id.name,
                    message: failure.message,
                }),
            }
        }))
        .await?;

        for (id, outputs) in created {
            tracing::debug!("created {} as {}", id, outputs.id);
            stack.resources.insert(id, outputs);
        }
    }

    Ok(stack)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    clusters: Vec<NamedCluster>,
    contexts: Vec<NamedContext>,
    users: Vec<NamedUser>,
    current_context: String,
}

#[derive(Debug, Serialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Serialize)]
struct ClusterEntry {
    server: String,
}

#[derive(Debug, Serialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Debug, Serialize)]
struct ContextEntry {
    cluster: String,
    user: String,
}

#[derive(Debug, Serialize)]
struct NamedUser {
    name: String,
    user: BTreeMap<String, Value>,
}

/// Credential-less kubeconfig pointing at a fake endpoint
fn dry_run_kubeconfig(name: &str, endpoint: &str) -> std::result::Result<String, EngineFailure> {
    let kubeconfig = Kubeconfig {
        api_version: "v1",
        kind: "Config",
        clusters: vec![NamedCluster {
            name: name.to_string(),
            cluster: ClusterEntry {
                server: endpoint.to_string(),
            },
        }],
        contexts: vec![NamedContext {
            name: name.to_string(),
            context: ContextEntry {
                cluster: name.to_string(),
                user: name.to_string(),
            },
        }],
        users: vec![NamedUser {
            name: name.to_string(),
            user: BTreeMap::new(),
        }],
        current_context: name.to_string(),
    };
    serde_yaml::to_string(&kubeconfig)
        .map_err(|e| EngineFailure::new(format!("failed to serialize kubeconfig: {}", e)))
}

/// Engine that creates nothing and reports deterministic fake outputs
///
/// Ids are `<prefix>-<17 hex digits of sha256(name)>`, so two runs over the
/// same graph report the same ids.
#[derive(Debug, Default)]
pub struct DryRunEngine {
    calls: Mutex<Vec<ResourceId>>,
}

impl DryRunEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources created so far, in call order
    pub fn calls(&self) -> Vec<ResourceId> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn fake_id(kind: ResourceKind, name: &str) -> String {
        let digest = hex::encode(Sha256::digest(name.as_bytes()));
        format!("{}-{}", kind.id_prefix(), &digest[..17])
    }
}

#[async_trait]
impl ProvisioningEngine for DryRunEngine {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn create(
        &self,
        request: CreateRequest,
    ) -> std::result::Result<ResourceOutputs, EngineFailure> {
        let id = Self::fake_id(request.kind, &request.name);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.id());
        }

        let mut outputs = ResourceOutputs::new(id.clone());
        match request.kind {
            ResourceKind::EksCluster => {
                let endpoint = format!("https://{}.eks.dry-run.local", &id[4..]);
                outputs = outputs
                    .with_output("name", request.name.clone())
                    .with_output("endpoint", endpoint.clone())
                    .with_output("kubeconfig", dry_run_kubeconfig(&request.name, &endpoint)?);
            }
            _ => {
                if let Some(name) = request.spec.pointer("/metadata/name").and_then(Value::as_str) {
                    outputs = outputs.with_output("name", name);
                }
            }
        }
        Ok(outputs)
    }
}
