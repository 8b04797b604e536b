//! Git sources (`GitRepository`)

use basecamp_core::{CoreError, Result, validate_object_name};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{DEFAULT_BRANCH, DEFAULT_INTERVAL, validate_interval};

const ALLOWED_SCHEMES: [&str; 3] = ["https", "http", "ssh"];

/// `source.toolkit.fluxcd.io/v1beta2` GitRepository
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[kube(
    group = "source.toolkit.fluxcd.io",
    version = "v1beta2",
    kind = "GitRepository",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    pub interval: String,
    pub url: String,
    #[serde(rename = "ref")]
    pub reference: GitRepositoryRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GitRepositoryRef {
    pub branch: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LocalObjectReference {
    pub name: String,
}

/// A Git source entry of a bootstrap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSourceSpec {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Name of the credential to authenticate with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

impl GitSourceSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            branch: None,
            secret_ref: None,
            interval: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_secret_ref(mut self, credential: impl Into<String>) -> Self {
        self.secret_ref = Some(credential.into());
        self
    }
}

/// A validated Git source with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub name: String,
    pub url: Url,
    pub branch: String,
    pub secret_ref: Option<String>,
    pub interval: String,
}

impl GitSource {
    pub fn from_spec(spec: &GitSourceSpec) -> Result<Self> {
        let resource = format!("git repository '{}'", spec.name);
        validate_object_name(&resource, &spec.name)?;

        let url = Url::parse(&spec.url).map_err(|e| {
            CoreError::validation(&resource, format!("invalid url '{}': {}", spec.url, e))
        })?;
        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(CoreError::validation(
                &resource,
                format!(
                    "unsupported url scheme '{}', expected one of {}",
                    url.scheme(),
                    ALLOWED_SCHEMES.join(", ")
                ),
            ));
        }

        let branch = spec.branch.clone().unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        if branch.trim().is_empty() {
            return Err(CoreError::validation(&resource, "branch must not be empty"));
        }

        let interval = spec.interval.clone().unwrap_or_else(|| DEFAULT_INTERVAL.to_string());
        validate_interval(&resource, &interval)?;

        if let Some(secret) = &spec.secret_ref {
            validate_object_name(&resource, secret)?;
        }

        Ok(Self {
            name: spec.name.clone(),
            url,
            branch,
            secret_ref: spec.secret_ref.clone(),
            interval,
        })
    }

    /// Stable resource name: `<stack>-flux-git-<name>`
    pub fn resource_name(&self, stack: &str) -> String {
        format!("{}-flux-git-{}", stack, self.name)
    }

    pub fn to_object(&self, namespace: &str) -> GitRepository {
        let mut object = GitRepository::new(
            &self.name,
            GitRepositorySpec {
                interval: self.interval.clone(),
                url: self.url.to_string(),
                reference: GitRepositoryRef {
                    branch: self.branch.clone(),
                },
                secret_ref: self
                    .secret_ref
                    .as_ref()
                    .map(|name| LocalObjectReference { name: name.clone() }),
            },
        );
        object.metadata.namespace = Some(namespace.to_string());
        object
    }
}
