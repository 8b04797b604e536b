//! One environment's complete graph
//!
//! Network, cluster and GitOps bootstrap, built top-down from a resolved
//! [`StackConfig`]. The result is a static graph; nothing is contacted.

use basecamp_core::{ResourceGraph, Result, StackConfig};
use basecamp_network::NetworkTopology;
use indexmap::IndexMap;
use serde_json::Value;

use crate::cluster::ClusterHandle;
use crate::gitops::{BootstrapConfig, GitOpsBootstrap};

#[derive(Debug, Clone)]
pub struct Stack {
    pub config: StackConfig,
    pub graph: ResourceGraph,
    pub network: NetworkTopology,
    pub cluster: ClusterHandle,
    pub gitops: GitOpsBootstrap,
}

/// Build the graph for `config`
pub fn build_stack(config: &StackConfig, bootstrap: &BootstrapConfig) -> Result<Stack> {
    let stack = config.stack.as_str();
    let mut graph = ResourceGraph::new();

    let network = NetworkTopology::build(&mut graph, stack, &config.network)?;
    let cluster = ClusterHandle::build(&mut graph, stack, &config.cluster, &network)?;
    let gitops = bootstrap.declare(&mut graph, stack, &cluster)?;

    tracing::info!(
        "stack {}: {} resources, {} edges",
        stack,
        graph.len(),
        graph.edges().len()
    );

    Ok(Stack {
        config: config.clone(),
        graph,
        network,
        cluster,
        gitops,
    })
}

impl Stack {
    /// Stack outputs as placeholders, resolved once the graph is materialized
    pub fn outputs(&self) -> IndexMap<String, Value> {
        IndexMap::from([
            ("vpcId".to_string(), self.network.vpc_id_ref()),
            ("clusterName".to_string(), self.cluster.name_ref()),
            ("clusterEndpoint".to_string(), self.cluster.endpoint_ref()),
            ("kubeconfig".to_string(), self.cluster.kubeconfig_ref()),
            ("fluxNamespace".to_string(), self.gitops.namespace_ref()),
        ])
    }
}
