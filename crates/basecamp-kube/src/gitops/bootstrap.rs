//! Bootstrap orchestration
//!
//! [`GitOpsBootstrap`] is the incremental API: each `add_*` call resolves its
//! references against what has already been added, so a Git source naming a
//! credential that was not added first is rejected. [`BootstrapConfig`] is
//! the declarative form read from a file; it validates the whole document up
//! front and then drives the incremental API in a safe order.

use basecamp_core::{
    Component, CoreError, Declaration, ResourceGraph, ResourceId, ResourceKind, ResourceNode,
    Result, closest_match, escape_literals, output_ref, validate_object_name,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use super::DEFAULT_NAMESPACE;
use super::credentials::{CredentialSpec, GitCredential};
use super::kustomization::{AppSpec, FluxApp};
use super::release::{ReleaseSettings, app_namespace, controller_namespace};
use super::source::{GitSource, GitSourceSpec};
use crate::cluster::ClusterHandle;

pub const BOOTSTRAP_COMPONENT: &str = "basecamp:flux:Bootstrap";
pub const CREDENTIALS_COMPONENT: &str = "basecamp:flux:GitCredentials";
pub const APP_COMPONENT: &str = "basecamp:flux:FluxApp";

/// Declared GitOps resources, keyed by their logical names
#[derive(Debug, Clone, PartialEq)]
pub struct GitOpsBootstrap {
    stack: String,
    component: Component,
    provider: ResourceId,
    namespace_name: String,
    namespace: ResourceId,
    release: ResourceId,
    credentials: IndexMap<String, ResourceId>,
    sources: IndexMap<String, ResourceId>,
    app_namespaces: IndexMap<String, ResourceId>,
    kustomizations: IndexMap<String, ResourceId>,
}

impl GitOpsBootstrap {
    /// Declare the controller namespace and the controller release
    pub fn install(
        graph: &mut ResourceGraph,
        stack: &str,
        cluster: &ClusterHandle,
        namespace: &str,
        release: &ReleaseSettings,
    ) -> Result<Self> {
        validate_object_name("flux namespace", namespace)?;
        release.validate()?;

        let component = Component::new(BOOTSTRAP_COMPONENT, format!("{}-flux", stack));
        let namespace_spec = serde_json::to_value(controller_namespace(namespace))?;

        let mut scratch = graph.clone();
        let namespace_id = scratch.declare(
            Declaration::new(
                ResourceKind::Namespace,
                format!("{}-flux-namespace", stack),
                namespace_spec,
            )
            .depends_on(&cluster.cluster)
            .depends_on(&cluster.provider)
            .owned_by(&component),
        )?;
        let release_id = scratch.declare(
            Declaration::new(
                ResourceKind::HelmRelease,
                format!("{}-flux-release", stack),
                release.spec(output_ref(&namespace_id, "name")),
            )
            .depends_on(&cluster.provider)
            .owned_by(&component),
        )?;
        *graph = scratch;

        tracing::debug!("flux {} {} in namespace {}", release.chart, release.version, namespace);

        Ok(Self {
            stack: stack.to_string(),
            component,
            provider: cluster.provider.clone(),
            namespace_name: namespace.to_string(),
            namespace: namespace_id,
            release: release_id,
            credentials: IndexMap::new(),
            sources: IndexMap::new(),
            app_namespaces: IndexMap::new(),
            kustomizations: IndexMap::new(),
        })
    }

    /// Declare the secret for `credential`; it depends on the namespace only
    ///
    /// Sources resolve `secretRef` in their own namespace, so the secret must
    /// live in the controller namespace.
    pub fn add_credential(
        &mut self,
        graph: &mut ResourceGraph,
        credential: &GitCredential,
    ) -> Result<ResourceId> {
        if self.credentials.contains_key(&credential.name) {
            return Err(CoreError::DuplicateResource {
                key: format!("credential '{}'", credential.name),
            });
        }
        if let Some(namespace) = credential
            .namespace
            .as_ref()
            .filter(|namespace| **namespace != self.namespace_name)
        {
            return Err(CoreError::validation(
                format!("credential '{}'", credential.name),
                format!(
                    "namespace '{}' differs from the flux namespace '{}'",
                    namespace, self.namespace_name
                ),
            ));
        }

        let component = Component::new(
            CREDENTIALS_COMPONENT,
            format!("{}-flux-{}", self.stack, credential.name),
        );
        let secret = serde_json::to_value(credential.secret(&self.namespace_name))?;
        let id = graph.declare(
            Declaration::new(
                ResourceKind::Secret,
                credential.resource_name(&self.stack),
                escape_literals(secret),
            )
            .depends_on(&self.namespace)
            .depends_on(&self.provider)
            .owned_by(&component),
        )?;

        tracing::debug!(
            "credential {} ({})",
            credential.name,
            credential.auth.credential_type()
        );
        self.credentials.insert(credential.name.clone(), id.clone());
        Ok(id)
    }

    /// Declare a GitRepository; its credential, if any, must already be added
    pub fn add_git_source(
        &mut self,
        graph: &mut ResourceGraph,
        source: &GitSource,
    ) -> Result<ResourceId> {
        let consumer =
            ResourceId::new(ResourceKind::GitRepository, source.resource_name(&self.stack));
        let object = serde_json::to_value(source.to_object(&self.namespace_name))?;

        let mut declaration =
            Declaration::new(consumer.kind, consumer.name.clone(), escape_literals(object))
            .depends_on(&self.release)
            .depends_on(&self.provider)
            .owned_by(&self.component);

        if let Some(secret) = &source.secret_ref {
            let credential = self.credentials.get(secret).ok_or_else(|| {
                unresolved(&consumer, "credential", secret, self.credentials.keys())
            })?;
            declaration = declaration.depends_on(credential);
        }

        let id = graph.declare(declaration)?;
        self.sources.insert(source.name.clone(), id.clone());
        Ok(id)
    }

    /// Declare an application: its namespace (once per namespace name) and
    /// its Kustomization. The source and every `dependsOn` entry must
    /// already be added.
    pub fn add_kustomization(
        &mut self,
        graph: &mut ResourceGraph,
        app: &FluxApp,
    ) -> Result<ResourceId> {
        let consumer =
            ResourceId::new(ResourceKind::Kustomization, app.resource_name(&self.stack));
        if graph.contains(&consumer) {
            return Err(CoreError::DuplicateResource {
                key: consumer.to_string(),
            });
        }

        let source = self
            .sources
            .get(&app.source)
            .ok_or_else(|| {
                unresolved(&consumer, "GitRepository", &app.source, self.sources.keys())
            })?
            .clone();

        let mut upstream = Vec::with_capacity(app.depends_on.len());
        for dep in &app.depends_on {
            let id = self.kustomizations.get(dep).ok_or_else(|| {
                unresolved(&consumer, "Kustomization", dep, self.kustomizations.keys())
            })?;
            upstream.push(id.clone());
        }

        let component = Component::new(APP_COMPONENT, app.component_name(&self.stack));
        let namespace = self.ensure_app_namespace(graph, &app.namespace, &component)?;
        let object = serde_json::to_value(app.to_object(&self.namespace_name))?;

        let id = graph.declare(
            Declaration::new(consumer.kind, consumer.name.clone(), escape_literals(object))
                .depends_on(&namespace)
                .depends_on(&source)
                .depends_on_all(&upstream)
                .depends_on(&self.provider)
                .owned_by(&component),
        )?;

        tracing::debug!("app {} from {}:{}", app.name, app.source, app.path);
        self.kustomizations.insert(app.name.clone(), id.clone());
        Ok(id)
    }

    fn ensure_app_namespace(
        &mut self,
        graph: &mut ResourceGraph,
        namespace: &str,
        owner: &Component,
    ) -> Result<ResourceId> {
        if namespace == self.namespace_name {
            return Ok(self.namespace.clone());
        }
        if let Some(id) = self.app_namespaces.get(namespace) {
            return Ok(id.clone());
        }

        let spec = serde_json::to_value(app_namespace(namespace))?;
        let id = graph.declare(
            Declaration::new(
                ResourceKind::Namespace,
                format!("{}-ns-{}", self.stack, namespace),
                spec,
            )
            .depends_on(&self.provider)
            .owned_by(owner),
        )?;
        self.app_namespaces.insert(namespace.to_string(), id.clone());
        Ok(id)
    }

    pub fn namespace_name(&self) -> &str {
        &self.namespace_name
    }

    pub fn namespace(&self) -> &ResourceId {
        &self.namespace
    }

    pub fn release(&self) -> &ResourceId {
        &self.release
    }

    pub fn credential(&self, name: &str) -> Option<&ResourceId> {
        self.credentials.get(name)
    }

    pub fn source(&self, name: &str) -> Option<&ResourceId> {
        self.sources.get(name)
    }

    pub fn kustomization(&self, name: &str) -> Option<&ResourceId> {
        self.kustomizations.get(name)
    }

    pub fn app_namespace(&self, name: &str) -> Option<&ResourceId> {
        self.app_namespaces.get(name)
    }

    /// Placeholder for the controller namespace name
    pub fn namespace_ref(&self) -> Value {
        output_ref(&self.namespace, "name")
    }
}

fn unresolved<'a>(
    consumer: &ResourceId,
    kind: &str,
    name: &str,
    known: impl Iterator<Item = &'a String>,
) -> CoreError {
    CoreError::Reference {
        consumer: consumer.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        suggestion: closest_match(name, known.map(String::as_str)),
    }
}

/// Declarative bootstrap, as read from a file
///
/// ```yaml
/// credentials:
///   - name: app1-git-token
///     type: token
///     token: ghp_xxx
/// gitRepositories:
///   - name: example-app-1
///     url: https://github.com/ducmanh79/flux-cd-test
///     branch: flux-cd
///     secretRef: app1-git-token
/// apps:
///   - name: example-app-1
///     namespace: app1-namespace
///     gitRepository:
///       name: example-app-1
///       path: ./flux-cd-test-app-1/deploy
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub release: ReleaseSettings,

    #[serde(default)]
    pub credentials: Vec<CredentialSpec>,

    #[serde(default)]
    pub git_repositories: Vec<GitSourceSpec>,

    #[serde(default)]
    pub apps: Vec<AppSpec>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            release: ReleaseSettings::default(),
            credentials: Vec::new(),
            git_repositories: Vec::new(),
            apps: Vec::new(),
        }
    }
}

impl BootstrapConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Validate the whole document, then declare it into `graph`
    ///
    /// Nothing is declared unless every credential, source and app is valid
    /// and every name they reference exists in the document.
    pub fn declare(
        &self,
        graph: &mut ResourceGraph,
        stack: &str,
        cluster: &ClusterHandle,
    ) -> Result<GitOpsBootstrap> {
        let credentials = self
            .credentials
            .iter()
            .map(GitCredential::from_spec)
            .collect::<Result<Vec<_>>>()?;
        let sources = self
            .git_repositories
            .iter()
            .map(GitSource::from_spec)
            .collect::<Result<Vec<_>>>()?;
        let apps = self
            .apps
            .iter()
            .map(FluxApp::from_spec)
            .collect::<Result<Vec<_>>>()?;

        unique("credential", credentials.iter().map(|c| c.name.as_str()))?;
        unique("git repository", sources.iter().map(|s| s.name.as_str()))?;
        unique("app", apps.iter().map(|a| a.name.as_str()))?;

        let credential_names: Vec<&String> = credentials.iter().map(|c| &c.name).collect();
        for source in &sources {
            let Some(secret) = &source.secret_ref else {
                continue;
            };
            if !credential_names.contains(&secret) {
                let consumer =
                    ResourceId::new(ResourceKind::GitRepository, source.resource_name(stack));
                return Err(unresolved(
                    &consumer,
                    "credential",
                    secret,
                    credential_names.iter().copied(),
                ));
            }
        }

        let source_names: Vec<&String> = sources.iter().map(|s| &s.name).collect();
        let app_names: Vec<&String> = apps.iter().map(|a| &a.name).collect();
        for app in &apps {
            let consumer = ResourceId::new(ResourceKind::Kustomization, app.resource_name(stack));
            if !source_names.contains(&&app.source) {
                return Err(unresolved(
                    &consumer,
                    "GitRepository",
                    &app.source,
                    source_names.iter().copied(),
                ));
            }
            if let Some(missing) = app.depends_on.iter().find(|d| !app_names.contains(d)) {
                return Err(unresolved(
                    &consumer,
                    "Kustomization",
                    missing,
                    app_names.iter().copied(),
                ));
            }
        }

        let ordered = order_apps(&apps)?;

        let mut scratch = graph.clone();
        let mut bootstrap =
            GitOpsBootstrap::install(&mut scratch, stack, cluster, &self.namespace, &self.release)?;
        for credential in &credentials {
            bootstrap.add_credential(&mut scratch, credential)?;
        }
        for source in &sources {
            bootstrap.add_git_source(&mut scratch, source)?;
        }
        for app in ordered {
            bootstrap.add_kustomization(&mut scratch, app)?;
        }
        *graph = scratch;

        tracing::info!(
            "flux bootstrap {}-flux: {} credentials, {} sources, {} apps",
            stack,
            credentials.len(),
            sources.len(),
            apps.len()
        );

        Ok(bootstrap)
    }
}

fn unique<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CoreError::DuplicateResource {
                key: format!("{} '{}'", what, name),
            });
        }
    }
    Ok(())
}

/// Order apps so every `dependsOn` target comes first; file order breaks ties
fn order_apps(apps: &[FluxApp]) -> Result<Vec<&FluxApp>> {
    let id = |name: &str| ResourceId::new(ResourceKind::Kustomization, name);
    let nodes = apps
        .iter()
        .map(|app| ResourceNode {
            id: id(app.name.as_str()),
            spec: Value::Null,
            depends_on: app.depends_on.iter().map(|d| id(d.as_str())).collect(),
            owner: None,
        })
        .collect();

    let order = ResourceGraph::from_nodes(nodes)?
        .install_order()?
        .into_iter()
        .map(|node| node.id.name.clone())
        .collect::<Vec<_>>();

    Ok(order
        .iter()
        .filter_map(|name| apps.iter().find(|app| app.name == *name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use basecamp_core::graph::substitute_refs;
    use basecamp_core::{ClusterConfig, ErrorKind, NetworkConfig, NodeGroupConfig, OutputRef};
    use basecamp_network::NetworkTopology;

    fn base_graph() -> (ResourceGraph, ClusterHandle) {
        let mut graph = ResourceGraph::new();
        let network = NetworkTopology::build(
            &mut graph,
            "dev",
            &NetworkConfig::new("10.0.0.0/16", ["ap-southeast-1a", "ap-southeast-1b"]),
        )
        .unwrap();
        let cluster = ClusterHandle::build(
            &mut graph,
            "dev",
            &ClusterConfig::new("1.33", NodeGroupConfig::new(["t2.medium"], 1, 3, 2)),
            &network,
        )
        .unwrap();
        (graph, cluster)
    }

    const EXAMPLE: &str = r#"
credentials:
  - name: app1-git-token
    type: token
    token: ghp_example
gitRepositories:
  - name: example-app-1
    url: https://github.com/ducmanh79/flux-cd-test
    branch: flux-cd
    secretRef: app1-git-token
apps:
  - name: example-app-2
    namespace: app2-namespace
    gitRepository:
      name: example-app-1
      path: ./flux-cd-test-app-2/deploy
    kustomization:
      interval: 10m
      dependsOn: [example-app-1]
  - name: example-app-1
    namespace: app1-namespace
    gitRepository:
      name: example-app-1
      path: ./flux-cd-test-app-1/deploy
"#;

    fn install(graph: &mut ResourceGraph, cluster: &ClusterHandle) -> GitOpsBootstrap {
        GitOpsBootstrap::install(graph, "dev", cluster, "flux-system", &ReleaseSettings::default())
            .unwrap()
    }

    fn kid(name: &str) -> ResourceId {
        ResourceId::new(ResourceKind::Kustomization, name)
    }

    #[test]
    fn test_declares_full_chain() {
        let (mut graph, cluster) = base_graph();
        let config = BootstrapConfig::from_yaml(EXAMPLE).unwrap();
        let flux = config.declare(&mut graph, "dev", &cluster).unwrap();

        assert_eq!(flux.namespace_name(), "flux-system");
        assert_eq!(flux.namespace().name, "dev-flux-namespace");
        assert_eq!(flux.release().name, "dev-flux-release");

        let namespace = graph.get(flux.namespace()).unwrap();
        assert!(namespace.depends_on.contains(&cluster.cluster));

        let release = graph.get(flux.release()).unwrap();
        assert!(release.depends_on.contains(flux.namespace()));
        assert_eq!(release.spec["namespace"], "${Namespace/dev-flux-namespace.name}");

        let secret_id = flux.credential("app1-git-token").unwrap();
        assert_eq!(secret_id.name, "dev-flux-app1-git-token-token-secret");
        let secret = graph.get(secret_id).unwrap();
        assert!(secret.depends_on.contains(flux.namespace()));
        assert!(!secret.depends_on.contains(flux.release()));
        assert_eq!(secret.spec["stringData"]["password"], "ghp_example");

        let source = graph.get(flux.source("example-app-1").unwrap()).unwrap();
        assert_eq!(source.id.name, "dev-flux-git-example-app-1");
        assert!(source.depends_on.contains(flux.release()));
        assert!(source.depends_on.contains(secret_id));

        let app2 = graph.get(&kid("dev-example-app-2-kustomization")).unwrap();
        assert!(app2.depends_on.contains(&kid("dev-example-app-1-kustomization")));
        assert!(app2.depends_on.contains(flux.app_namespace("app2-namespace").unwrap()));
        assert!(app2.depends_on.contains(&source.id));
        assert_eq!(app2.spec["spec"]["interval"], "10m");
        assert_eq!(app2.spec["metadata"]["namespace"], "flux-system");
    }

    #[test]
    fn test_install_order_is_safe() {
        let (mut graph, cluster) = base_graph();
        BootstrapConfig::from_yaml(EXAMPLE)
            .unwrap()
            .declare(&mut graph, "dev", &cluster)
            .unwrap();

        let order: Vec<&ResourceId> = graph
            .install_order()
            .unwrap()
            .into_iter()
            .map(|n| &n.id)
            .collect();
        let position = |name: &str| order.iter().position(|id| id.name == name).unwrap();

        assert!(position("dev-k8s-cluster") < position("dev-flux-namespace"));
        assert!(position("dev-flux-namespace") < position("dev-flux-release"));
        assert!(position("dev-flux-release") < position("dev-flux-git-example-app-1"));
        assert!(
            position("dev-flux-app1-git-token-token-secret")
                < position("dev-flux-git-example-app-1")
        );
        assert!(
            position("dev-flux-git-example-app-1") < position("dev-example-app-1-kustomization")
        );
        assert!(
            position("dev-example-app-1-kustomization")
                < position("dev-example-app-2-kustomization")
        );
    }

    #[test]
    fn test_invalid_credential_declares_nothing() {
        let (mut graph, cluster) = base_graph();
        let before = graph.clone();
        let config = BootstrapConfig::from_yaml(
            "credentials:\n  - name: deploy-key\n    type: ssh\n    knownHosts: github.com\n",
        )
        .unwrap();

        let err = config.declare(&mut graph, "dev", &cluster).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(graph, before);
        assert_eq!(graph.count(ResourceKind::Secret), 0);
    }

    #[test]
    fn test_missing_kustomization_dependency() {
        let (mut graph, cluster) = base_graph();
        let mut config = BootstrapConfig::from_yaml(EXAMPLE).unwrap();
        config.apps[1].kustomization.depends_on = vec!["missing-app".to_string()];

        let err = config.declare(&mut graph, "dev", &cluster).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(err.to_string().contains("'missing-app'"));
        assert_eq!(graph.count(ResourceKind::Kustomization), 0);
    }

    #[test]
    fn test_dangling_secret_ref() {
        let (mut graph, cluster) = base_graph();
        let mut config = BootstrapConfig::from_yaml(EXAMPLE).unwrap();
        config.credentials[0].name = "app1-git-tokn".to_string();

        let err = config.declare(&mut graph, "dev", &cluster).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.suggestion(), Some("app1-git-tokn"));
    }

    #[test]
    fn test_mutual_dependency_is_a_cycle() {
        let (mut graph, cluster) = base_graph();
        let mut config = BootstrapConfig::from_yaml(EXAMPLE).unwrap();
        config.apps[1].kustomization.depends_on = vec!["example-app-2".to_string()];

        let err = config.declare(&mut graph, "dev", &cluster).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);
    }

    #[test]
    fn test_duplicate_credential_names() {
        let (mut graph, cluster) = base_graph();
        let mut config = BootstrapConfig::from_yaml(EXAMPLE).unwrap();
        let mut second = config.credentials[0].clone();
        second.credential_type = crate::gitops::CredentialType::Basic;
        second.fields.username = Some("bot".to_string());
        second.fields.password = Some("pw".to_string());
        config.credentials.push(second);

        let err = config.declare(&mut graph, "dev", &cluster).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);
    }

    #[test]
    fn test_secret_ref_needs_credential_first() {
        let (mut graph, cluster) = base_graph();
        let mut flux = install(&mut graph, &cluster);
        let source = GitSource::from_spec(
            &GitSourceSpec::new("example-app-1", "https://github.com/ducmanh79/flux-cd-test")
                .with_secret_ref("app1-git-token"),
        )
        .unwrap();

        let err = flux.add_git_source(&mut graph, &source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(flux.source("example-app-1").is_none());

        flux.add_credential(&mut graph, &GitCredential::token("app1-git-token", "t"))
            .unwrap();
        let id = flux.add_git_source(&mut graph, &source).unwrap();
        let credential = flux.credential("app1-git-token").unwrap();
        assert!(graph.get(&id).unwrap().depends_on.contains(credential));
    }

    #[test]
    fn test_credential_outside_flux_namespace_rejected() {
        let (mut graph, cluster) = base_graph();
        let mut config = BootstrapConfig::from_yaml(EXAMPLE).unwrap();
        config.credentials[0].namespace = Some("elsewhere".to_string());
        let before = graph.clone();

        let err = config.declare(&mut graph, "dev", &cluster).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("'elsewhere'"));
        assert_eq!(graph, before);

        // naming the flux namespace explicitly is fine
        config.credentials[0].namespace = Some("flux-system".to_string());
        let flux = config.declare(&mut graph, "dev", &cluster).unwrap();
        let secret = graph.get(flux.credential("app1-git-token").unwrap()).unwrap();
        assert_eq!(secret.spec["metadata"]["namespace"], "flux-system");
    }

    #[test]
    fn test_app_named_like_bootstrap_keeps_own_component() {
        let (mut graph, cluster) = base_graph();
        let mut flux = install(&mut graph, &cluster);
        flux.add_git_source(
            &mut graph,
            &GitSource::from_spec(&GitSourceSpec::new("infra", "https://example.com/infra.git"))
                .unwrap(),
        )
        .unwrap();
        let app = FluxApp::from_spec(&AppSpec::new("flux", "web", "infra", "./web")).unwrap();
        let id = flux.add_kustomization(&mut graph, &app).unwrap();

        let bootstrap = graph.children_of("dev-flux");
        assert!(!bootstrap.contains(&id));
        assert!(bootstrap.iter().all(|child| child.kind != ResourceKind::Kustomization));

        let owned = graph.children_of("dev-app-flux");
        assert_eq!(owned.len(), 2);
        assert!(owned.contains(&id));
        assert!(owned.contains(flux.app_namespace("web").unwrap()));
    }

    #[test]
    fn test_placeholder_shaped_token_stays_literal() {
        let (mut graph, cluster) = base_graph();
        let mut flux = install(&mut graph, &cluster);
        let token = "${EksCluster/dev-k8s-cluster.kubeconfig}";
        let id = flux
            .add_credential(&mut graph, &GitCredential::token("app1-git-token", token))
            .unwrap();

        let secret = graph.get(&id).unwrap();
        assert!(!secret.depends_on.contains(&cluster.cluster));

        let resolved = substitute_refs(&secret.spec, &|_: &OutputRef| None).unwrap();
        assert_eq!(resolved["stringData"]["password"], token);
    }

    #[test]
    fn test_kustomization_needs_source_first() {
        let (mut graph, cluster) = base_graph();
        let mut flux = install(&mut graph, &cluster);
        let app = FluxApp::from_spec(&AppSpec::new("web", "web", "infra", "./web")).unwrap();

        let err = flux.add_kustomization(&mut graph, &app).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(graph.count(ResourceKind::Kustomization), 0);
    }

    #[test]
    fn test_app_namespaces_deduplicated() {
        let (mut graph, cluster) = base_graph();
        let mut flux = install(&mut graph, &cluster);
        flux.add_git_source(
            &mut graph,
            &GitSource::from_spec(&GitSourceSpec::new("infra", "https://example.com/infra.git"))
                .unwrap(),
        )
        .unwrap();

        for (name, namespace) in [("a", "shared"), ("b", "shared"), ("c", "flux-system")] {
            let app = FluxApp::from_spec(&AppSpec::new(name, namespace, "infra", "./x")).unwrap();
            flux.add_kustomization(&mut graph, &app).unwrap();
        }

        // flux-system plus one "shared"
        assert_eq!(graph.count(ResourceKind::Namespace), 2);
        assert_eq!(flux.app_namespace("shared").unwrap().name, "dev-ns-shared");
        let c = graph.get(flux.kustomization("c").unwrap()).unwrap();
        assert!(c.depends_on.contains(flux.namespace()));
    }

    #[test]
    fn test_declare_is_idempotent() {
        let config = BootstrapConfig::from_yaml(EXAMPLE).unwrap();
        let (mut first, cluster) = base_graph();
        let (mut second, _) = base_graph();
        let a = config.declare(&mut first, "dev", &cluster).unwrap();
        let b = config.declare(&mut second, "dev", &cluster).unwrap();

        assert_eq!(a, b);
        assert_eq!(first, second);
        assert_eq!(first.edges(), second.edges());
    }

    #[test]
    fn test_declaring_twice_into_one_graph_fails() {
        let config = BootstrapConfig::default();
        let (mut graph, cluster) = base_graph();
        config.declare(&mut graph, "dev", &cluster).unwrap();
        let before = graph.len();

        let err = config.declare(&mut graph, "dev", &cluster).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);
        assert_eq!(graph.len(), before);
    }
}
