//! Resource dependency graph
//!
//! Builders declare resources into a [`ResourceGraph`]. A declaration may only
//! depend on resources that are already declared, and every reference to
//! another resource's output inside a spec is recorded as an explicit
//! [`DependencyEdge`]. The finished graph is a static DAG handed to the
//! external engine, which materializes it wave by wave.
//!
//! Output references are embedded in specs as placeholder strings:
//!
//! ```text
//! "vpcId": "${Vpc/dev-networking-vpc.id}"
//! ```
//!
//! User-supplied text goes through [`escape_literal`] first, which writes a
//! placeholder-shaped literal as `$${...}` so it is neither collected nor
//! substituted. Materialization writes it back out as `${...}`.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, Result};
use crate::naming::closest_match;

static OUTPUT_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$?\$\{([A-Za-z]+)/([^}]+)\.([A-Za-z0-9_]+)\}").expect("valid regex")
});

/// Kind of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Vpc,
    InternetGateway,
    Subnet,
    ElasticIp,
    NatGateway,
    RouteTable,
    Route,
    RouteTableAssociation,
    EksCluster,
    KubernetesProvider,
    Namespace,
    HelmRelease,
    Secret,
    GitRepository,
    Kustomization,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 15] = [
        ResourceKind::Vpc,
        ResourceKind::InternetGateway,
        ResourceKind::Subnet,
        ResourceKind::ElasticIp,
        ResourceKind::NatGateway,
        ResourceKind::RouteTable,
        ResourceKind::Route,
        ResourceKind::RouteTableAssociation,
        ResourceKind::EksCluster,
        ResourceKind::KubernetesProvider,
        ResourceKind::Namespace,
        ResourceKind::HelmRelease,
        ResourceKind::Secret,
        ResourceKind::GitRepository,
        ResourceKind::Kustomization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "Vpc",
            ResourceKind::InternetGateway => "InternetGateway",
            ResourceKind::Subnet => "Subnet",
            ResourceKind::ElasticIp => "ElasticIp",
            ResourceKind::NatGateway => "NatGateway",
            ResourceKind::RouteTable => "RouteTable",
            ResourceKind::Route => "Route",
            ResourceKind::RouteTableAssociation => "RouteTableAssociation",
            ResourceKind::EksCluster => "EksCluster",
            ResourceKind::KubernetesProvider => "KubernetesProvider",
            ResourceKind::Namespace => "Namespace",
            ResourceKind::HelmRelease => "HelmRelease",
            ResourceKind::Secret => "Secret",
            ResourceKind::GitRepository => "GitRepository",
            ResourceKind::Kustomization => "Kustomization",
        }
    }

    /// Provider type token understood by the provisioning engine
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "aws:ec2/vpc:Vpc",
            ResourceKind::InternetGateway => "aws:ec2/internetGateway:InternetGateway",
            ResourceKind::Subnet => "aws:ec2/subnet:Subnet",
            ResourceKind::ElasticIp => "aws:ec2/eip:Eip",
            ResourceKind::NatGateway => "aws:ec2/natGateway:NatGateway",
            ResourceKind::RouteTable => "aws:ec2/routeTable:RouteTable",
            ResourceKind::Route => "aws:ec2/route:Route",
            ResourceKind::RouteTableAssociation => {
                "aws:ec2/routeTableAssociation:RouteTableAssociation"
            }
            ResourceKind::EksCluster => "eks:index:Cluster",
            ResourceKind::KubernetesProvider => "pulumi:providers:kubernetes",
            ResourceKind::Namespace => "kubernetes:core/v1:Namespace",
            ResourceKind::HelmRelease => "kubernetes:helm.sh/v3:Release",
            ResourceKind::Secret => "kubernetes:core/v1:Secret",
            ResourceKind::GitRepository => {
                "kubernetes:source.toolkit.fluxcd.io/v1beta2:GitRepository"
            }
            ResourceKind::Kustomization => {
                "kubernetes:kustomize.toolkit.fluxcd.io/v1:Kustomization"
            }
        }
    }

    /// Prefix of provider-assigned ids for this kind
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::InternetGateway => "igw",
            ResourceKind::Subnet => "subnet",
            ResourceKind::ElasticIp => "eipalloc",
            ResourceKind::NatGateway => "nat",
            ResourceKind::RouteTable => "rtb",
            ResourceKind::Route => "r",
            ResourceKind::RouteTableAssociation => "rtbassoc",
            ResourceKind::EksCluster => "eks",
            ResourceKind::KubernetesProvider => "provider",
            ResourceKind::Namespace => "ns",
            ResourceKind::HelmRelease => "release",
            ResourceKind::Secret => "secret",
            ResourceKind::GitRepository => "gitrepo",
            ResourceKind::Kustomization => "ks",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable identity of a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// A reference to one output of a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub resource: ResourceId,
    pub output: String,
}

impl std::fmt::Display for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${{{}.{}}}", self.resource, self.output)
    }
}

/// Placeholder for `output` of `id`, to embed in a spec
pub fn output_ref(id: &ResourceId, output: &str) -> Value {
    Value::String(
        OutputRef {
            resource: id.clone(),
            output: output.to_string(),
        }
        .to_string(),
    )
}

/// Placeholder for the provider-assigned id of `id`
pub fn id_ref(id: &ResourceId) -> Value {
    output_ref(id, "id")
}

/// Escape placeholder-shaped text so it stays a literal
pub fn escape_literal(text: &str) -> String {
    OUTPUT_REF
        .replace_all(text, |caps: &regex::Captures<'_>| format!("${}", &caps[0]))
        .into_owned()
}

/// [`escape_literal`] applied to every string in `value`
pub fn escape_literals(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape_literal(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(escape_literals).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, escape_literals(item)))
                .collect(),
        ),
        other => other,
    }
}

fn is_escaped(placeholder: &str) -> bool {
    placeholder.starts_with("$$")
}

/// Collect every output reference embedded in `spec`, in document order
///
/// Placeholders naming an unknown kind are reported as errors against `consumer`.
pub fn collect_refs(consumer: &ResourceId, spec: &Value) -> Result<Vec<OutputRef>> {
    let mut refs = Vec::new();
    collect_refs_into(consumer, spec, &mut refs)?;
    Ok(refs)
}

fn collect_refs_into(
    consumer: &ResourceId,
    value: &Value,
    refs: &mut Vec<OutputRef>,
) -> Result<()> {
    match value {
        Value::String(s) => {
            for caps in OUTPUT_REF.captures_iter(s) {
                if is_escaped(&caps[0]) {
                    continue;
                }
                let kind = ResourceKind::parse(&caps[1]).ok_or_else(|| CoreError::Reference {
                    consumer: consumer.to_string(),
                    kind: caps[1].to_string(),
                    name: caps[2].to_string(),
                    suggestion: None,
                })?;
                refs.push(OutputRef {
                    resource: ResourceId::new(kind, &caps[2]),
                    output: caps[3].to_string(),
                });
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs_into(consumer, item, refs)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_refs_into(consumer, item, refs)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replace every placeholder in `spec` using `resolve`
///
/// A string that consists of exactly one placeholder is replaced by the
/// resolved value itself; placeholders inside longer strings are spliced in
/// as text. Escaped placeholders lose their escape. Returns the first
/// reference `resolve` could not satisfy.
pub fn substitute_refs<F>(spec: &Value, resolve: &F) -> std::result::Result<Value, OutputRef>
where
    F: Fn(&OutputRef) -> Option<Value>,
{
    match spec {
        Value::String(s) => {
            // `None` marks an escaped literal
            let mut parsed = Vec::new();
            for caps in OUTPUT_REF.captures_iter(s) {
                let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
                if is_escaped(&caps[0]) {
                    parsed.push((whole, None));
                    continue;
                }
                let Some(kind) = ResourceKind::parse(&caps[1]) else {
                    continue;
                };
                let reference = OutputRef {
                    resource: ResourceId::new(kind, &caps[2]),
                    output: caps[3].to_string(),
                };
                parsed.push((whole, Some(reference)));
            }

            if parsed.is_empty() {
                return Ok(spec.clone());
            }

            match parsed.as_slice() {
                [(range, Some(reference))] if *range == (0..s.len()) => {
                    return resolve(reference).ok_or_else(|| reference.clone());
                }
                _ => {}
            }

            let mut out = String::with_capacity(s.len());
            let mut last = 0;
            for (range, reference) in parsed {
                out.push_str(&s[last..range.start]);
                match reference {
                    None => out.push_str(&s[range.start + 1..range.end]),
                    Some(reference) => match resolve(&reference).ok_or(reference)? {
                        Value::String(text) => out.push_str(&text),
                        other => out.push_str(&other.to_string()),
                    },
                }
                last = range.end;
            }
            out.push_str(&s[last..]);
            Ok(Value::String(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| substitute_refs(item, resolve))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                out.insert(key.clone(), substitute_refs(item, resolve)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// A logical grouping of resources (the parent in the ownership map)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub type_name: String,
    pub name: String,
}

impl Component {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }
}

/// Ownership record for one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub type_name: String,
    pub children: Vec<ResourceId>,
}

/// A resource about to be declared
#[derive(Debug, Clone)]
pub struct Declaration {
    id: ResourceId,
    spec: Value,
    depends_on: Vec<ResourceId>,
    owner: Option<Component>,
}

impl Declaration {
    pub fn new(kind: ResourceKind, name: impl Into<String>, spec: Value) -> Self {
        Self {
            id: ResourceId::new(kind, name),
            spec,
            depends_on: Vec::new(),
            owner: None,
        }
    }

    /// Add an explicit dependency that the spec does not reference
    pub fn depends_on(mut self, producer: &ResourceId) -> Self {
        if !self.depends_on.contains(producer) {
            self.depends_on.push(producer.clone());
        }
        self
    }

    pub fn depends_on_all<'a, I>(mut self, producers: I) -> Self
    where
        I: IntoIterator<Item = &'a ResourceId>,
    {
        for producer in producers {
            self = self.depends_on(producer);
        }
        self
    }

    pub fn owned_by(mut self, component: &Component) -> Self {
        self.owner = Some(component.clone());
        self
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// A declared resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    pub id: ResourceId,
    pub spec: Value,
    /// Producers, explicit ones first, then those referenced by the spec
    pub depends_on: Vec<ResourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Directed edge: `consumer` may not be materialized before `producer`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyEdge {
    pub consumer: ResourceId,
    pub producer: ResourceId,
}

/// The declared desired state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceGraph {
    nodes: IndexMap<ResourceId, ResourceNode>,
    components: IndexMap<String, ComponentRecord>,
}

/// A component name belongs to one component type
fn check_component(
    components: &IndexMap<String, ComponentRecord>,
    name: &str,
    type_name: &str,
) -> Result<()> {
    match components.get(name) {
        Some(record) if record.type_name != type_name => Err(CoreError::ComponentConflict {
            name: name.to_string(),
            existing: record.type_name.clone(),
            requested: type_name.to_string(),
        }),
        _ => Ok(()),
    }
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from nodes in any order
    ///
    /// Producers only have to exist somewhere in `nodes`, so the result may
    /// contain cycles; [`ResourceGraph::install_waves`] reports them.
    pub fn from_nodes(nodes: Vec<ResourceNode>) -> Result<Self> {
        let mut graph = Self::new();
        for node in nodes {
            if graph.nodes.contains_key(&node.id) {
                return Err(CoreError::DuplicateResource {
                    key: node.id.to_string(),
                });
            }
            graph.nodes.insert(node.id.clone(), node);
        }
        for node in graph.nodes.values() {
            for dep in &node.depends_on {
                if !graph.nodes.contains_key(dep) {
                    return Err(graph.unresolved(&node.id, dep));
                }
            }
        }
        Ok(graph)
    }

    /// Declare a resource; all producers must already be declared
    pub fn declare(&mut self, declaration: Declaration) -> Result<ResourceId> {
        let Declaration {
            id,
            spec,
            mut depends_on,
            owner,
        } = declaration;

        if self.nodes.contains_key(&id) {
            return Err(CoreError::DuplicateResource { key: id.to_string() });
        }

        for reference in collect_refs(&id, &spec)? {
            if !depends_on.contains(&reference.resource) {
                depends_on.push(reference.resource);
            }
        }

        for dep in &depends_on {
            if !self.nodes.contains_key(dep) {
                return Err(self.unresolved(&id, dep));
            }
        }

        if let Some(component) = &owner {
            check_component(&self.components, &component.name, &component.type_name)?;
            self.components
                .entry(component.name.clone())
                .or_insert_with(|| ComponentRecord {
                    type_name: component.type_name.clone(),
                    children: Vec::new(),
                })
                .children
                .push(id.clone());
        }

        tracing::trace!("declared {} ({} producers)", id, depends_on.len());

        self.nodes.insert(
            id.clone(),
            ResourceNode {
                id: id.clone(),
                spec,
                depends_on,
                owner: owner.map(|c| c.name),
            },
        );
        Ok(id)
    }

    /// Merge `other` into this graph, all or nothing
    pub fn absorb(&mut self, other: ResourceGraph) -> Result<()> {
        if let Some(dup) = other.nodes.keys().find(|id| self.nodes.contains_key(*id)) {
            return Err(CoreError::DuplicateResource {
                key: dup.to_string(),
            });
        }
        for (name, record) in &other.components {
            check_component(&self.components, name, &record.type_name)?;
        }
        for (name, record) in other.components {
            self.components
                .entry(name)
                .or_insert_with(|| ComponentRecord {
                    type_name: record.type_name.clone(),
                    children: Vec::new(),
                })
                .children
                .extend(record.children);
        }
        self.nodes.extend(other.nodes);
        Ok(())
    }

    fn unresolved(&self, consumer: &ResourceId, producer: &ResourceId) -> CoreError {
        let suggestion = closest_match(
            &producer.name,
            self.nodes
                .keys()
                .filter(|id| id.kind == producer.kind)
                .map(|id| id.name.as_str()),
        );
        CoreError::Reference {
            consumer: consumer.to_string(),
            kind: producer.kind.to_string(),
            name: producer.name.clone(),
            suggestion,
        }
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    /// Ids of one kind, in declaration order
    pub fn ids_of_kind(&self, kind: ResourceKind) -> Vec<&ResourceId> {
        self.nodes.keys().filter(|id| id.kind == kind).collect()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.nodes.keys().filter(|id| id.kind == kind).count()
    }

    /// Every dependency edge, in declaration order of the consumer
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.depends_on.iter().map(|producer| DependencyEdge {
                    consumer: node.id.clone(),
                    producer: producer.clone(),
                })
            })
            .collect()
    }

    /// Parent/child ownership map
    pub fn components(&self) -> impl Iterator<Item = (&String, &ComponentRecord)> {
        self.components.iter()
    }

    pub fn children_of(&self, component: &str) -> &[ResourceId] {
        self.components
            .get(component)
            .map(|record| record.children.as_slice())
            .unwrap_or(&[])
    }

    /// Group resources by dependency depth
    ///
    /// Wave `k` holds the resources whose producers all sit in earlier waves.
    /// Within a wave, resources keep declaration order.
    pub fn install_waves(&self) -> Result<Vec<Vec<&ResourceNode>>> {
        let index: HashMap<&ResourceId, usize> = self
            .nodes
            .keys()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();

        let mut pending: Vec<usize> = self.nodes.values().map(|n| n.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.values().enumerate() {
            for dep in &node.depends_on {
                if let Some(&p) = index.get(dep) {
                    dependents[p].push(i);
                }
            }
        }

        let mut waves = Vec::new();
        let mut placed = 0;
        let mut current: Vec<usize> = (0..self.nodes.len()).filter(|&i| pending[i] == 0).collect();

        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();
            for &i in &current {
                for &d in &dependents[i] {
                    pending[d] -= 1;
                    if pending[d] == 0 {
                        next.push(d);
                    }
                }
            }
            next.sort_unstable();
            waves.push(
                current
                    .iter()
                    .filter_map(|&i| self.nodes.get_index(i).map(|(_, node)| node))
                    .collect(),
            );
            current = next;
        }

        if placed < self.nodes.len() {
            let stuck: HashSet<usize> = (0..self.nodes.len()).filter(|&i| pending[i] > 0).collect();
            return Err(CoreError::CircularDependency {
                cycle: self.describe_cycle(&stuck, &index),
            });
        }

        Ok(waves)
    }

    /// Linearized install order: a consumer never precedes its producers
    pub fn install_order(&self) -> Result<Vec<&ResourceNode>> {
        Ok(self.install_waves()?.into_iter().flatten().collect())
    }

    fn describe_cycle(
        &self,
        stuck: &HashSet<usize>,
        index: &HashMap<&ResourceId, usize>,
    ) -> String {
        // Every stuck node has at least one stuck producer, so walking
        // producers from any stuck node must revisit a node.
        let Some(&start) = stuck.iter().min() else {
            return String::new();
        };
        let mut path: Vec<usize> = Vec::new();
        let mut current = start;
        loop {
            if let Some(pos) = path.iter().position(|&i| i == current) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .filter_map(|&i| self.nodes.get_index(i).map(|(id, _)| id.to_string()))
                    .collect();
                if let Some(first) = cycle.first().cloned() {
                    cycle.push(first);
                }
                return cycle.join(" -> ");
            }
            path.push(current);
            let next = self
                .nodes
                .get_index(current)
                .and_then(|(_, node)| {
                    node.depends_on
                        .iter()
                        .filter_map(|dep| index.get(dep).copied())
                        .find(|i| stuck.contains(i))
                });
            match next {
                Some(n) => current = n,
                None => break,
            }
        }
        path.iter()
            .filter_map(|&i| self.nodes.get_index(i).map(|(id, _)| id.to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn summary(&self) -> Result<GraphSummary> {
        let waves = self.install_waves()?;
        let mut by_kind: IndexMap<String, usize> = IndexMap::new();
        for kind in ResourceKind::ALL {
            let count = self.count(kind);
            if count > 0 {
                by_kind.insert(kind.to_string(), count);
            }
        }
        Ok(GraphSummary {
            total_resources: self.len(),
            total_edges: self.edges().len(),
            by_kind,
            waves: waves
                .iter()
                .enumerate()
                .map(|(i, wave)| WaveSummary {
                    number: i + 1,
                    resources: wave.iter().map(|n| n.id.to_string()).collect(),
                })
                .collect(),
        })
    }
}

/// Summary of a graph for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub total_resources: usize,
    pub total_edges: usize,
    pub by_kind: IndexMap<String, usize>,
    pub waves: Vec<WaveSummary>,
}

impl GraphSummary {
    /// Format as a human-readable string
    pub fn display(&self) -> String {
        let mut lines = vec![format!(
            "Plan: {} resources, {} edges in {} waves",
            self.total_resources,
            self.total_edges,
            self.waves.len()
        )];

        for wave in &self.waves {
            lines.push(format!(
                "  Wave {}: {} resources",
                wave.number,
                wave.resources.len()
            ));
            for resource in &wave.resources {
                lines.push(format!("    - {}", resource));
            }
        }

        lines.join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WaveSummary {
    /// 1-based
    pub number: usize,
    pub resources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn vpc() -> ResourceId {
        ResourceId::new(ResourceKind::Vpc, "dev-networking-vpc")
    }

    fn small_graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        let vpc = graph
            .declare(Declaration::new(
                ResourceKind::Vpc,
                "dev-networking-vpc",
                json!({"cidrBlock": "10.0.0.0/16"}),
            ))
            .unwrap();
        let igw = graph
            .declare(Declaration::new(
                ResourceKind::InternetGateway,
                "dev-networking-igw",
                json!({"vpcId": id_ref(&vpc)}),
            ))
            .unwrap();
        graph
            .declare(Declaration::new(
                ResourceKind::Subnet,
                "dev-networking-public-0",
                json!({"vpcId": id_ref(&vpc), "cidrBlock": "10.0.0.0/24"}),
            ))
            .unwrap();
        graph
            .declare(
                Declaration::new(
                    ResourceKind::RouteTable,
                    "dev-networking-public-rt",
                    json!({"vpcId": id_ref(&vpc)}),
                )
                .depends_on(&igw),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_resource_id_display() {
        assert_eq!(vpc().to_string(), "Vpc/dev-networking-vpc");
        assert_eq!(id_ref(&vpc()), json!("${Vpc/dev-networking-vpc.id}"));
        assert_eq!(ResourceKind::parse("NatGateway"), Some(ResourceKind::NatGateway));
        assert_eq!(ResourceKind::parse("Bucket"), None);
    }

    #[test]
    fn test_references_become_edges() {
        let graph = small_graph();
        let rt = graph
            .get(&ResourceId::new(ResourceKind::RouteTable, "dev-networking-public-rt"))
            .unwrap();

        // explicit dependency first, then the spec reference
        assert_eq!(rt.depends_on[0].kind, ResourceKind::InternetGateway);
        assert_eq!(rt.depends_on[1], vpc());
        assert_eq!(graph.edges().len(), 4);
    }

    #[test]
    fn test_undeclared_reference_rejected() {
        let mut graph = ResourceGraph::new();
        let err = graph
            .declare(Declaration::new(
                ResourceKind::InternetGateway,
                "dev-networking-igw",
                json!({"vpcId": id_ref(&vpc())}),
            ))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_reference_suggestion() {
        let mut graph = small_graph();
        let err = graph
            .declare(
                Declaration::new(ResourceKind::NatGateway, "dev-networking-nat-0", json!({}))
                    .depends_on(&ResourceId::new(ResourceKind::Subnet, "dev-networking-public-9")),
            )
            .unwrap_err();
        assert_eq!(err.suggestion(), Some("dev-networking-public-0"));
    }

    #[test]
    fn test_unknown_kind_in_placeholder() {
        let mut graph = ResourceGraph::new();
        let err = graph
            .declare(Declaration::new(
                ResourceKind::Route,
                "route",
                json!({"bucket": "${Bucket/logs.id}"}),
            ))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut graph = small_graph();
        let err = graph
            .declare(Declaration::new(ResourceKind::Vpc, "dev-networking-vpc", json!({})))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_install_waves() {
        let graph = small_graph();
        let waves = graph.install_waves().unwrap();

        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0].len(), 1);
        assert_eq!(waves[1].len(), 2);
        assert_eq!(waves[2][0].id.kind, ResourceKind::RouteTable);
    }

    #[test]
    fn test_install_order_respects_edges() {
        let graph = small_graph();
        let order = graph.install_order().unwrap();
        let position: HashMap<&ResourceId, usize> =
            order.iter().enumerate().map(|(i, n)| (&n.id, i)).collect();

        for edge in graph.edges() {
            assert!(position[&edge.producer] < position[&edge.consumer]);
        }
    }

    #[test]
    fn test_cycle_detected() {
        let a = ResourceId::new(ResourceKind::Kustomization, "a");
        let b = ResourceId::new(ResourceKind::Kustomization, "b");
        let c = ResourceId::new(ResourceKind::Kustomization, "c");
        let node = |id: &ResourceId, dep: &ResourceId| ResourceNode {
            id: id.clone(),
            spec: json!({}),
            depends_on: vec![dep.clone()],
            owner: None,
        };
        let graph =
            ResourceGraph::from_nodes(vec![node(&a, &b), node(&b, &c), node(&c, &a)]).unwrap();

        let err = graph.install_order().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);
        let expected = "Kustomization/a -> Kustomization/b -> Kustomization/c -> Kustomization/a";
        assert!(err.to_string().contains(expected));
    }

    #[test]
    fn test_from_nodes_rejects_missing_producer() {
        let a = ResourceId::new(ResourceKind::Namespace, "a");
        let err = ResourceGraph::from_nodes(vec![ResourceNode {
            id: a,
            spec: json!({}),
            depends_on: vec![vpc()],
            owner: None,
        }])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[test]
    fn test_absorb_is_all_or_nothing() {
        let mut graph = small_graph();
        let mut scratch = ResourceGraph::new();
        scratch
            .declare(Declaration::new(ResourceKind::Namespace, "apps", json!({})))
            .unwrap();
        scratch
            .declare(Declaration::new(ResourceKind::Vpc, "dev-networking-vpc", json!({})))
            .unwrap();

        assert!(graph.absorb(scratch).is_err());
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_ownership_map() {
        let owner = Component::new("basecamp:test:Component", "dev-test");
        let mut graph = ResourceGraph::new();
        graph
            .declare(Declaration::new(ResourceKind::Namespace, "a", json!({})).owned_by(&owner))
            .unwrap();
        graph
            .declare(Declaration::new(ResourceKind::Namespace, "b", json!({})).owned_by(&owner))
            .unwrap();

        assert_eq!(graph.children_of("dev-test").len(), 2);
        assert!(graph.children_of("missing").is_empty());
        let (name, record) = graph.components().next().unwrap();
        assert_eq!(name, "dev-test");
        assert_eq!(record.type_name, "basecamp:test:Component");
    }

    #[test]
    fn test_substitute_refs() {
        let spec = json!({
            "vpcId": "${Vpc/dev-networking-vpc.id}",
            "arn": "arn:aws:ec2:::vpc/${Vpc/dev-networking-vpc.id}",
            "sizes": [1, 2],
        });
        let resolved = substitute_refs(&spec, &|r: &OutputRef| {
            (r.output == "id").then(|| json!("vpc-123"))
        })
        .unwrap();

        assert_eq!(resolved["vpcId"], "vpc-123");
        assert_eq!(resolved["arn"], "arn:aws:ec2:::vpc/vpc-123");
        assert_eq!(resolved["sizes"], json!([1, 2]));

        let missing = substitute_refs(&spec, &|_: &OutputRef| None).unwrap_err();
        assert_eq!(missing.resource, vpc());
    }

    #[test]
    fn test_owner_type_must_match() {
        let mut graph = ResourceGraph::new();
        let bootstrap = Component::new("basecamp:flux:Bootstrap", "dev-flux");
        let app = Component::new("basecamp:flux:FluxApp", "dev-flux");
        graph
            .declare(Declaration::new(ResourceKind::Namespace, "a", json!({})).owned_by(&bootstrap))
            .unwrap();

        let err = graph
            .declare(Declaration::new(ResourceKind::Namespace, "b", json!({})).owned_by(&app))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);
        assert!(err.to_string().contains("basecamp:flux:Bootstrap"));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.children_of("dev-flux").len(), 1);

        let mut other = ResourceGraph::new();
        other
            .declare(Declaration::new(ResourceKind::Namespace, "c", json!({})).owned_by(&app))
            .unwrap();
        assert_eq!(graph.absorb(other).unwrap_err().kind(), ErrorKind::Graph);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_escaped_literals_are_not_references() {
        let token = "pre-${Vpc/dev-networking-vpc.id}-${Bucket/x.y}";
        let spec = json!({"password": escape_literal(token), "vpcId": id_ref(&vpc())});
        let mut graph = small_graph();
        let id = graph
            .declare(Declaration::new(ResourceKind::Secret, "dev-flux-git-secret", spec))
            .unwrap();

        // only the unescaped placeholder is an edge
        assert_eq!(graph.get(&id).unwrap().depends_on, vec![vpc()]);

        let resolved = substitute_refs(&graph.get(&id).unwrap().spec, &|_: &OutputRef| {
            Some(json!("vpc-123"))
        })
        .unwrap();
        assert_eq!(resolved["password"], token);
        assert_eq!(resolved["vpcId"], "vpc-123");
    }

    #[test]
    fn test_escape_literal_keeps_existing_dollars() {
        let literal = "$${Vpc/a.id} and ${Vpc/a.id} and ${not a ref}";
        let escaped = escape_literal(literal);
        assert_eq!(escaped, "$$${Vpc/a.id} and $${Vpc/a.id} and ${not a ref}");
        assert!(collect_refs(&vpc(), &json!(escaped)).unwrap().is_empty());

        let restored = substitute_refs(&json!(escaped), &|_: &OutputRef| None).unwrap();
        assert_eq!(restored, json!(literal));

        let nested = escape_literals(json!({"a": ["${Vpc/a.id}"], "n": 1}));
        assert_eq!(nested, json!({"a": ["$${Vpc/a.id}"], "n": 1}));
    }

    #[test]
    fn test_summary_display() {
        let summary = small_graph().summary().unwrap();
        assert_eq!(summary.by_kind["Subnet"], 1);
        insta::assert_snapshot!(summary.display(), @r"
        Plan: 4 resources, 4 edges in 3 waves
          Wave 1: 1 resources
            - Vpc/dev-networking-vpc
          Wave 2: 2 resources
            - InternetGateway/dev-networking-igw
            - Subnet/dev-networking-public-0
          Wave 3: 1 resources
            - RouteTable/dev-networking-public-rt
        ");
    }
}
