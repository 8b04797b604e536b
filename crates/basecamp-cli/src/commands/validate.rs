//! Validate command - check the configuration and bootstrap file without output

use basecamp_core::ResourceKind;
use console::style;
use serde_json::json;
use std::path::Path;

use crate::error::Result;
use crate::inputs;

pub fn run(
    environment: &str,
    config: Option<&Path>,
    bootstrap: Option<&Path>,
    json_output: bool,
) -> Result<()> {
    if !json_output {
        println!(
            "{} Validating {}",
            style("→").blue(),
            style(environment).bold()
        );
    }

    let stack = inputs::load_stack(environment, config, bootstrap)?;
    // Ordering also proves the graph is acyclic
    let waves = stack.graph.install_waves()?.len();

    let apps = stack.graph.count(ResourceKind::Kustomization);
    let sources = stack.graph.count(ResourceKind::GitRepository);

    if json_output {
        let output = json!({
            "valid": true,
            "stack": environment,
            "resources": stack.graph.len(),
            "waves": waves,
            "gitRepositories": sources,
            "kustomizations": apps,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "  {} {} zones, cluster {} (k8s {})",
        style("✓").green(),
        stack.network.availability_zones.len(),
        stack.cluster.cluster.name,
        stack.config.cluster.version
    );
    println!(
        "  {} {} Git repositories, {} apps in namespace {}",
        style("✓").green(),
        sources,
        apps,
        stack.gitops.namespace_name()
    );
    println!();
    println!(
        "{} {} resources in {} waves",
        style("Valid:").green().bold(),
        stack.graph.len(),
        waves
    );

    Ok(())
}
