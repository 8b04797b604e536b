//! Flux controller namespace and Helm release

use basecamp_core::{CoreError, Result, escape_literal};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

pub const FLUX_CHART: &str = "flux2";
pub const FLUX_CHART_VERSION: &str = "2.12.1";
pub const FLUX_CHART_REPOSITORY: &str = "https://fluxcd-community.github.io/helm-charts";

/// Chart values key of every controller the flux2 chart can install
pub const CONTROLLERS: [&str; 6] = [
    "sourceController",
    "kustomizeController",
    "helmController",
    "notificationController",
    "imageReflectorController",
    "imageAutomationController",
];

/// Controller release settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSettings {
    #[serde(default = "default_chart")]
    pub chart: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_repository")]
    pub repository: String,

    /// Controllers to install; the rest are disabled in the chart values
    #[serde(default = "default_controllers")]
    pub controllers: Vec<String>,

    /// How long the engine waits for the release to become ready
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_chart() -> String {
    FLUX_CHART.to_string()
}

fn default_version() -> String {
    FLUX_CHART_VERSION.to_string()
}

fn default_repository() -> String {
    FLUX_CHART_REPOSITORY.to_string()
}

fn default_controllers() -> Vec<String> {
    CONTROLLERS.iter().map(|c| c.to_string()).collect()
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            chart: default_chart(),
            version: default_version(),
            repository: default_repository(),
            controllers: default_controllers(),
            timeout: default_timeout(),
        }
    }
}

impl ReleaseSettings {
    pub fn validate(&self) -> Result<()> {
        let resource = format!("release '{}'", self.chart);
        if self.chart.trim().is_empty() || self.version.trim().is_empty() {
            return Err(CoreError::validation(resource, "chart and version are required"));
        }

        let repo = Url::parse(&self.repository).map_err(|e| {
            CoreError::validation(
                &resource,
                format!("invalid repository '{}': {}", self.repository, e),
            )
        })?;
        if !matches!(repo.scheme(), "https" | "http" | "oci") {
            return Err(CoreError::validation(
                &resource,
                format!("unsupported repository scheme '{}'", repo.scheme()),
            ));
        }

        if let Some(unknown) = self
            .controllers
            .iter()
            .find(|c| !CONTROLLERS.contains(&c.as_str()))
        {
            return Err(CoreError::validation(
                resource,
                format!(
                    "unknown controller '{}', expected one of {}",
                    unknown,
                    CONTROLLERS.join(", ")
                ),
            ));
        }

        if self.timeout.is_zero() {
            return Err(CoreError::validation(resource, "timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Chart values enabling exactly the configured controllers
    pub fn values(&self) -> Value {
        let mut values = Map::new();
        for controller in CONTROLLERS {
            let create = self.controllers.iter().any(|c| c == controller);
            values.insert(controller.to_string(), json!({ "create": create }));
        }
        Value::Object(values)
    }

    /// Release spec, installed into `namespace`
    pub fn spec(&self, namespace: Value) -> Value {
        json!({
            "chart": escape_literal(&self.chart),
            "version": escape_literal(&self.version),
            "repositoryOpts": { "repo": escape_literal(&self.repository) },
            "namespace": namespace,
            "timeout": self.timeout.as_secs(),
            "values": self.values(),
        })
    }
}

/// The controller namespace, labelled as part of flux
pub fn controller_namespace(name: &str) -> Namespace {
    let labels = BTreeMap::from([
        ("app.kubernetes.io/instance".to_string(), name.to_string()),
        ("app.kubernetes.io/part-of".to_string(), "flux".to_string()),
    ]);
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    }
}

/// A plain application namespace
pub fn app_namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    }
}
