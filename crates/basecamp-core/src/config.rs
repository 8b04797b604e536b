//! Per-environment configuration
//!
//! The configuration surface is a table keyed by environment name. It is
//! resolved exactly once, at graph-build entry, into an immutable
//! [`StackConfig`] that is passed explicitly through every builder.
//!
//! ```yaml
//! environments:
//!   dev:
//!     aws:
//!       region: ap-southeast-1
//!       roleArn: arn:aws:iam::123456789012:role/PulumiDeploymentRole
//!       accountId: "123456789012"
//!     vpc:
//!       cidrBlock: 10.0.0.0/16
//!       availabilityZones: [ap-southeast-1a, ap-southeast-1b]
//!     eks:
//!       version: "1.33"
//!       nodeGroups:
//!         workers:
//!           instanceTypes: [t2.medium]
//!           minSize: 1
//!           maxSize: 3
//!           desiredSize: 2
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::naming::{closest_match, validate_object_name};

/// Environment table keyed by environment (stack) name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentTable {
    #[serde(default)]
    pub environments: IndexMap<String, EnvironmentConfig>,
}

impl EnvironmentTable {
    /// Load a table from a YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a table from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let table: Self = serde_yaml::from_str(yaml)?;
        if table.environments.is_empty() {
            return Err(CoreError::config("no environments defined"));
        }
        Ok(table)
    }

    /// The three environments shipped with basecamp
    pub fn builtin() -> Self {
        let mut environments = IndexMap::new();
        environments.insert(
            "dev".to_string(),
            EnvironmentConfig {
                aws: AwsConfig {
                    region: "ap-southeast-1".to_string(),
                    profile: None,
                    role_arn: "arn:aws:iam::123456789012:role/PulumiDeploymentRole".to_string(),
                    account_id: "123456789012".to_string(),
                },
                vpc: NetworkConfig::new(
                    "10.0.0.0/16",
                    ["ap-southeast-1a", "ap-southeast-1b"],
                ),
                eks: ClusterConfig::new("1.33", NodeGroupConfig::new(["t2.medium"], 1, 3, 2)),
            },
        );
        environments.insert(
            "staging".to_string(),
            EnvironmentConfig {
                aws: AwsConfig {
                    region: "us-west-1".to_string(),
                    profile: None,
                    role_arn: "arn:aws:iam::123456789012:role/PulumiDeploymentRole-Staging"
                        .to_string(),
                    account_id: "123456789012".to_string(),
                },
                vpc: NetworkConfig::new("10.1.0.0/16", ["us-west-2a", "us-west-2b", "us-west-2c"]),
                eks: ClusterConfig::new("1.28", NodeGroupConfig::new(["t3.large"], 2, 5, 3)),
            },
        );
        environments.insert(
            "prod".to_string(),
            EnvironmentConfig {
                aws: AwsConfig {
                    region: "us-east-1".to_string(),
                    profile: None,
                    role_arn: "arn:aws:iam::456789012345:role/PulumiDeploymentRole-Prod"
                        .to_string(),
                    account_id: "456789012345".to_string(),
                },
                vpc: NetworkConfig::new("10.2.0.0/16", ["us-east-1a", "us-east-1b", "us-east-1c"]),
                eks: ClusterConfig::new("1.28", NodeGroupConfig::new(["m5.large"], 3, 10, 5)),
            },
        );
        Self { environments }
    }

    /// Environment names in table order
    pub fn names(&self) -> Vec<&str> {
        self.environments.keys().map(|k| k.as_str()).collect()
    }

    /// Get an environment without validation
    pub fn get(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.environments.get(name)
    }

    /// Resolve and validate the configuration for one stack
    pub fn resolve(&self, name: &str) -> Result<StackConfig> {
        let env = self.environments.get(name).ok_or_else(|| {
            let valid: Vec<String> = self.environments.keys().cloned().collect();
            CoreError::UnknownEnvironment {
                name: name.to_string(),
                suggestion: closest_match(name, valid.iter().map(|s| s.as_str())),
                valid,
            }
        })?;

        // the stack name prefixes every resource and component name
        validate_object_name("environment name", name)?;
        env.validate(name)?;

        Ok(StackConfig {
            stack: name.to_string(),
            aws: env.aws.clone(),
            network: env.vpc.clone(),
            cluster: env.eks.clone(),
        })
    }
}

/// Configuration for one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub aws: AwsConfig,
    pub vpc: NetworkConfig,
    pub eks: ClusterConfig,
}

impl EnvironmentConfig {
    fn validate(&self, stack: &str) -> Result<()> {
        let fail =
            |message: String| CoreError::config(format!("environment '{}': {}", stack, message));

        if self.aws.region.trim().is_empty() {
            return Err(fail("aws.region must not be empty".to_string()));
        }

        let zones = &self.vpc.availability_zones;
        if zones.is_empty() {
            return Err(fail("vpc.availabilityZones must list at least one zone".to_string()));
        }
        let mut seen = HashSet::new();
        for zone in zones {
            if !seen.insert(zone.as_str()) {
                return Err(fail(format!("availability zone '{}' listed twice", zone)));
            }
        }

        if self.eks.version.trim().is_empty() {
            return Err(fail("eks.version must not be empty".to_string()));
        }

        let workers = &self.eks.node_groups.workers;
        if workers.instance_types.is_empty() {
            return Err(fail(
                "eks.nodeGroups.workers.instanceTypes must not be empty".to_string(),
            ));
        }
        if workers.max_size == 0 {
            return Err(fail("eks.nodeGroups.workers.maxSize must be at least 1".to_string()));
        }
        if workers.min_size > workers.desired_size || workers.desired_size > workers.max_size {
            return Err(fail(format!(
                "node group sizes must satisfy minSize <= desiredSize <= maxSize \
                 (got {} / {} / {})",
                workers.min_size,
                workers.desired_size,
                workers.max_size
            )));
        }

        Ok(())
    }
}

/// Cloud account and session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsConfig {
    pub region: String,

    /// Named CLI profile, when credentials come from a shared config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    pub role_arn: String,

    pub account_id: String,
}

impl AwsConfig {
    /// Session name used when assuming `role_arn`
    pub fn assume_role_session(&self, stack: &str) -> String {
        format!("basecamp-{}", stack)
    }
}

/// NAT gateway placement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NatMode {
    /// One NAT gateway per availability zone
    #[default]
    PerAz,
    /// A single NAT gateway in the first zone, shared by every private subnet.
    /// Cheaper, but private egress for all zones fails with that one zone.
    Single,
}

/// Network configuration consumed by the topology builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub cidr_block: String,

    pub availability_zones: Vec<String>,

    #[serde(default)]
    pub nat_mode: NatMode,
}

impl NetworkConfig {
    pub fn new<I, S>(cidr_block: impl Into<String>, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cidr_block: cidr_block.into(),
            availability_zones: zones.into_iter().map(Into::into).collect(),
            nat_mode: NatMode::default(),
        }
    }

    pub fn with_nat_mode(mut self, nat_mode: NatMode) -> Self {
        self.nat_mode = nat_mode;
        self
    }
}

/// Cluster configuration consumed by the cluster provisioner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub version: String,
    pub node_groups: NodeGroups,
}

impl ClusterConfig {
    pub fn new(version: impl Into<String>, workers: NodeGroupConfig) -> Self {
        Self {
            version: version.into(),
            node_groups: NodeGroups { workers },
        }
    }

    pub fn workers(&self) -> &NodeGroupConfig {
        &self.node_groups.workers
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGroups {
    pub workers: NodeGroupConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupConfig {
    /// Only the first entry is honored; the node group is single-type
    pub instance_types: Vec<String>,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_size: u32,
}

impl NodeGroupConfig {
    pub fn new<I, S>(instance_types: I, min_size: u32, max_size: u32, desired_size: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            instance_types: instance_types.into_iter().map(Into::into).collect(),
            min_size,
            max_size,
            desired_size,
        }
    }
}

/// Fully resolved, validated configuration for one stack
#[derive(Debug, Clone, PartialEq)]
pub struct StackConfig {
    pub stack: String,
    pub aws: AwsConfig,
    pub network: NetworkConfig,
    pub cluster: ClusterConfig,
}
