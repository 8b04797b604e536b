//! Applications (`Kustomization`)

use basecamp_core::{CoreError, Result, validate_object_name};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

use super::{DEFAULT_INTERVAL, validate_interval};

/// `kustomize.toolkit.fluxcd.io/v1` Kustomization
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[kube(
    group = "kustomize.toolkit.fluxcd.io",
    version = "v1",
    kind = "Kustomization",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct KustomizationSpec {
    pub interval: String,
    pub path: String,
    pub prune: bool,
    pub source_ref: CrossNamespaceSourceReference,
    pub target_namespace: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<DependencyReference>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CrossNamespaceSourceReference {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DependencyReference {
    pub name: String,
}

/// Where an application's manifests come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSource {
    /// Name of a declared Git source
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KustomizationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prune: Option<bool>,
    /// Namespace the manifests are applied to; the app namespace when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    /// Kustomizations that must be ready first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// An application entry of a bootstrap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    pub name: String,
    pub namespace: String,
    pub git_repository: AppSource,
    #[serde(default)]
    pub kustomization: KustomizationOptions,
}

impl AppSpec {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        source: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            git_repository: AppSource {
                name: source.into(),
                path: path.into(),
            },
            kustomization: KustomizationOptions::default(),
        }
    }

    pub fn depends_on(mut self, kustomization: impl Into<String>) -> Self {
        self.kustomization.depends_on.push(kustomization.into());
        self
    }
}

/// A validated application with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxApp {
    pub name: String,
    pub namespace: String,
    pub source: String,
    pub path: String,
    pub interval: String,
    pub prune: bool,
    pub target_namespace: String,
    pub depends_on: Vec<String>,
}

impl FluxApp {
    pub fn from_spec(spec: &AppSpec) -> Result<Self> {
        let resource = format!("app '{}'", spec.name);
        validate_object_name(&resource, &spec.name)?;
        validate_object_name(&resource, &spec.namespace)?;
        validate_object_name(&resource, &spec.git_repository.name)?;

        if spec.git_repository.path.trim().is_empty() {
            return Err(CoreError::validation(&resource, "path must not be empty"));
        }

        let options = &spec.kustomization;
        let interval = options
            .interval
            .clone()
            .unwrap_or_else(|| DEFAULT_INTERVAL.to_string());
        validate_interval(&resource, &interval)?;

        let target_namespace = options
            .target_namespace
            .clone()
            .unwrap_or_else(|| spec.namespace.clone());
        validate_object_name(&resource, &target_namespace)?;

        let mut depends_on: Vec<String> = Vec::with_capacity(options.depends_on.len());
        for dep in &options.depends_on {
            if *dep == spec.name {
                return Err(CoreError::CircularDependency {
                    cycle: format!("{} -> {}", spec.name, spec.name),
                });
            }
            if !depends_on.contains(dep) {
                depends_on.push(dep.clone());
            }
        }

        Ok(Self {
            name: spec.name.clone(),
            namespace: spec.namespace.clone(),
            source: spec.git_repository.name.clone(),
            path: spec.git_repository.path.clone(),
            interval,
            prune: options.prune.unwrap_or(true),
            target_namespace,
            depends_on,
        })
    }

    /// Stable resource name: `<stack>-<name>-kustomization`
    pub fn resource_name(&self, stack: &str) -> String {
        format!("{}-{}-kustomization", stack, self.name)
    }

    /// Owning component: `<stack>-app-<name>`, apart from the flux components
    pub fn component_name(&self, stack: &str) -> String {
        format!("{}-app-{}", stack, self.name)
    }

    /// The kustomization lives in the controller namespace, next to its source
    pub fn to_object(&self, controller_namespace: &str) -> Kustomization {
        let mut object = Kustomization::new(
            &self.name,
            KustomizationSpec {
                interval: self.interval.clone(),
                path: self.path.clone(),
                prune: self.prune,
                source_ref: CrossNamespaceSourceReference {
                    kind: "GitRepository".to_string(),
                    name: self.source.clone(),
                    namespace: controller_namespace.to_string(),
                },
                target_namespace: self.target_namespace.clone(),
                depends_on: self
                    .depends_on
                    .iter()
                    .map(|name| DependencyReference { name: name.clone() })
                    .collect(),
            },
        );
        object.metadata.namespace = Some(controller_namespace.to_string());
        object
    }
}
