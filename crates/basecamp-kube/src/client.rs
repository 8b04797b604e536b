//! Cluster-scoped Kubernetes client
//!
//! EKS clusters authenticate through `aws eks get-token`, so the kubeconfig
//! generated here carries an exec credential plugin instead of a static token.

use std::collections::HashMap;

use kube::config::{
    AuthInfo, Cluster, Context, ExecConfig, ExecInteractiveMode, KubeConfigOptions, Kubeconfig,
    NamedAuthInfo, NamedCluster, NamedContext,
};
use kube::{Client, Config};

use crate::error::{KubeError, Result};

const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

/// Everything needed to reach a materialized cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAccess {
    pub cluster_name: String,
    pub endpoint: String,
    /// Base64 PEM bundle, as reported by EKS
    pub certificate_authority_data: Option<String>,
    pub region: String,
    pub profile: Option<String>,
    pub role_arn: Option<String>,
}

impl ClusterAccess {
    pub fn new(
        cluster_name: impl Into<String>,
        endpoint: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            endpoint: endpoint.into(),
            certificate_authority_data: None,
            region: region.into(),
            profile: None,
            role_arn: None,
        }
    }

    pub fn with_certificate_authority(mut self, data: impl Into<String>) -> Self {
        self.certificate_authority_data = Some(data.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    fn exec_args(&self) -> Vec<String> {
        let mut args = vec![
            "eks".to_string(),
            "get-token".to_string(),
            "--cluster-name".to_string(),
            self.cluster_name.clone(),
            "--region".to_string(),
            self.region.clone(),
        ];
        if let Some(role) = &self.role_arn {
            args.push("--role-arn".to_string());
            args.push(role.clone());
        }
        args
    }

    /// Kubeconfig with a single context for this cluster
    pub fn kubeconfig(&self) -> Kubeconfig {
        let name = &self.cluster_name;

        let env = self.profile.as_ref().map(|profile| {
            vec![HashMap::from([
                ("name".to_string(), "AWS_PROFILE".to_string()),
                ("value".to_string(), profile.clone()),
            ])]
        });
        let exec = ExecConfig {
            api_version: Some(EXEC_API_VERSION.to_string()),
            command: Some("aws".to_string()),
            args: Some(self.exec_args()),
            env,
            drop_env: None,
            interactive_mode: Some(ExecInteractiveMode::Never),
            provide_cluster_info: false,
            cluster: None,
        };

        Kubeconfig {
            api_version: Some("v1".to_string()),
            kind: Some("Config".to_string()),
            clusters: vec![NamedCluster {
                name: name.clone(),
                cluster: Some(Cluster {
                    server: Some(self.endpoint.clone()),
                    certificate_authority_data: self.certificate_authority_data.clone(),
                    ..Cluster::default()
                }),
            }],
            contexts: vec![NamedContext {
                name: name.clone(),
                context: Some(Context {
                    cluster: name.clone(),
                    user: Some(name.clone()),
                    ..Context::default()
                }),
            }],
            auth_infos: vec![NamedAuthInfo {
                name: name.clone(),
                auth_info: Some(AuthInfo {
                    exec: Some(exec),
                    ..AuthInfo::default()
                }),
            }],
            current_context: Some(name.clone()),
            ..Kubeconfig::default()
        }
    }

    /// Kubeconfig document as YAML
    pub fn kubeconfig_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.kubeconfig())?)
    }
}

/// Parse kubeconfig text, e.g. the `kubeconfig` output of a cluster
pub fn parse_kubeconfig(yaml: &str) -> Result<Kubeconfig> {
    let kubeconfig: Kubeconfig = serde_yaml::from_str(yaml)?;
    if kubeconfig.clusters.is_empty() {
        return Err(KubeError::Kubeconfig("no clusters defined".to_string()));
    }
    Ok(kubeconfig)
}

/// A `kube::Client` bound to one cluster context
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
    context: String,
}

impl ClusterClient {
    /// Build a client from kubeconfig text
    ///
    /// Exec credential plugins run while the client is built.
    pub async fn from_kubeconfig(kubeconfig: Kubeconfig) -> Result<Self> {
        let context = kubeconfig
            .current_context
            .clone()
            .ok_or_else(|| KubeError::Kubeconfig("no current-context set".to_string()))?;

        let options = KubeConfigOptions {
            context: Some(context.clone()),
            ..KubeConfigOptions::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        let client = Client::try_from(config)?;

        tracing::debug!("kubernetes client ready for context {}", context);
        Ok(Self { client, context })
    }

    pub async fn connect(access: &ClusterAccess) -> Result<Self> {
        Self::from_kubeconfig(access.kubeconfig()).await
    }

    pub fn kube_client(&self) -> &Client {
        &self.client
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// API server git version; fails when the cluster is unreachable
    pub async fn server_version(&self) -> Result<String> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
