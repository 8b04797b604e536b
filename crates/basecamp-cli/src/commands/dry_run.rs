//! Dry-run command - materialize the graph offline and resolve stack outputs

use basecamp_core::{DryRunEngine, ProvisioningEngine, materialize};
use basecamp_kube::{ClusterAccess, parse_kubeconfig};
use console::style;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::Path;

use crate::display;
use crate::error::{CliError, Result};
use crate::inputs;

pub fn run(environment: &str, config: Option<&Path>, bootstrap: Option<&Path>) -> Result<()> {
    let stack = inputs::load_stack(environment, config, bootstrap)?;
    let engine = DryRunEngine::new();

    println!(
        "{} Materializing {} with the {} engine",
        style("→").blue(),
        style(environment).bold(),
        engine.name()
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let materialized = runtime.block_on(materialize(&stack.graph, &engine))?;

    for (id, outputs) in materialized.iter() {
        println!("  {} {} {}", style("✓").green(), id, style(&outputs.id).dim());
    }

    let mut resolved = IndexMap::new();
    for (key, placeholder) in stack.outputs() {
        let value = materialized.resolve_value(&placeholder).map_err(|missing| {
            CliError::internal(format!("output {} was not produced", missing.resource))
        })?;
        resolved.insert(key, value);
    }

    println!();
    println!("{}", style("Outputs:").bold());
    display::print_outputs(&resolved);

    // The generated kubeconfig must be loadable before anything talks to the cluster
    if let Some(Value::String(kubeconfig)) = resolved.get("kubeconfig") {
        let parsed = parse_kubeconfig(kubeconfig)?;
        tracing::debug!("kubeconfig defines {} cluster(s)", parsed.clusters.len());
    }

    let aws = &stack.config.aws;
    let mut access = ClusterAccess::new(
        output_str(&resolved, "clusterName"),
        output_str(&resolved, "clusterEndpoint"),
        aws.region.clone(),
    )
    .with_role_arn(aws.role_arn.clone());
    if let Some(profile) = &aws.profile {
        access = access.with_profile(profile.clone());
    }
    let context = access.kubeconfig().current_context.unwrap_or_default();

    println!();
    println!(
        "{} kubectl context {} via role session {}",
        style("→").blue(),
        style(context).cyan(),
        aws.assume_role_session(environment)
    );
    println!(
        "{} {} resources materialized",
        style("Dry run complete:").green().bold(),
        materialized.len()
    );

    Ok(())
}

fn output_str(outputs: &IndexMap<String, Value>, key: &str) -> String {
    outputs
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
