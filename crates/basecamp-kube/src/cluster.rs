//! Cluster provisioner
//!
//! Declares the EKS cluster on the VPC and public subnets of a
//! [`NetworkTopology`], and the Kubernetes provider every in-cluster resource
//! is created through.

use basecamp_core::{
    ClusterConfig, Component, CoreError, Declaration, ResourceGraph, ResourceId, ResourceKind,
    Result, StackNames, escape_literal, output_ref,
};
use basecamp_network::NetworkTopology;
use serde_json::{Value, json};

pub const COMPONENT_TYPE: &str = "basecamp:kubernetes:Cluster";

/// Handles to the declared cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterHandle {
    pub component: Component,
    pub cluster: ResourceId,
    pub provider: ResourceId,
    pub version: String,
    pub instance_type: String,
}

impl ClusterHandle {
    pub fn build(
        graph: &mut ResourceGraph,
        stack: &str,
        config: &ClusterConfig,
        network: &NetworkTopology,
    ) -> Result<Self> {
        let names = StackNames::new(stack, "k8s");
        let component = Component::new(COMPONENT_TYPE, names.prefix());
        let workers = config.workers();

        let Some(instance_type) = workers.instance_types.first() else {
            return Err(CoreError::validation(
                names.name("cluster"),
                "node group needs at least one instance type",
            ));
        };
        if workers.instance_types.len() > 1 {
            tracing::warn!(
                "{}: node group uses {} only, ignoring {:?}",
                names.prefix(),
                instance_type,
                &workers.instance_types[1..]
            );
        }

        let cluster = graph.declare(
            Declaration::new(
                ResourceKind::EksCluster,
                names.name("cluster"),
                json!({
                    "vpcId": network.vpc_id_ref(),
                    "subnetIds": network.public_subnet_id_refs(),
                    "version": escape_literal(&config.version),
                    "instanceType": escape_literal(instance_type),
                    "minSize": workers.min_size,
                    "maxSize": workers.max_size,
                    "desiredCapacity": workers.desired_size,
                }),
            )
            .depends_on_all(&network.public_route_table.associations)
            .owned_by(&component),
        )?;

        let provider = graph.declare(
            Declaration::new(
                ResourceKind::KubernetesProvider,
                names.name("provider"),
                json!({ "kubeconfig": output_ref(&cluster, "kubeconfig") }),
            )
            .owned_by(&component),
        )?;

        tracing::info!(
            "cluster {}: EKS {} on {} public subnets",
            cluster.name,
            config.version,
            network.public_subnets.len()
        );

        Ok(Self {
            component,
            cluster,
            provider,
            version: config.version.clone(),
            instance_type: instance_type.clone(),
        })
    }

    pub fn name_ref(&self) -> Value {
        output_ref(&self.cluster, "name")
    }

    pub fn endpoint_ref(&self) -> Value {
        output_ref(&self.cluster, "endpoint")
    }

    pub fn kubeconfig_ref(&self) -> Value {
        output_ref(&self.cluster, "kubeconfig")
    }
}
