//! Display formatting for CLI output

use basecamp_core::{ResourceKind, ResourceNode};
use console::style;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Replacement for Secret data when secrets are hidden
pub const REDACTED: &str = "<redacted>";

/// One resource as printed by `render`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedResource {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(rename = "type")]
    pub type_token: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub spec: Value,
}

impl RenderedResource {
    pub fn from_node(node: &ResourceNode, show_secrets: bool) -> Self {
        let spec = if node.id.kind == ResourceKind::Secret && !show_secrets {
            redact_secret(&node.spec)
        } else {
            node.spec.clone()
        };
        Self {
            kind: node.id.kind,
            name: node.id.name.clone(),
            type_token: node.id.kind.type_token(),
            depends_on: node.depends_on.iter().map(|id| id.to_string()).collect(),
            owner: node.owner.clone(),
            spec,
        }
    }
}

/// Hide every value under `data` and `stringData`, keeping the keys
pub fn redact_secret(spec: &Value) -> Value {
    let mut spec = spec.clone();
    for field in ["stringData", "data"] {
        if let Some(Value::Object(entries)) = spec.get_mut(field) {
            for value in entries.values_mut() {
                *value = Value::String(REDACTED.to_string());
            }
        }
    }
    spec
}

/// Multi-document YAML, one document per resource
pub fn yaml_documents<'a, I>(nodes: I, show_secrets: bool) -> Result<String>
where
    I: IntoIterator<Item = &'a ResourceNode>,
{
    let mut out = String::new();
    for node in nodes {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&RenderedResource::from_node(
            node,
            show_secrets,
        ))?);
    }
    Ok(out)
}

/// Print stack outputs as aligned `key: value` lines
pub fn print_outputs(outputs: &IndexMap<String, Value>) {
    let width = outputs.keys().map(|k| k.len()).max().unwrap_or(0);
    for (key, value) in outputs {
        let text = match value {
            Value::String(s) if s.contains('\n') => {
                format!("<{} lines>", s.lines().count())
            }
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let key = format!("{:width$}", key, width = width);
        println!("  {}  {}", style(key).cyan(), text);
    }
}
