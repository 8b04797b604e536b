//! Plan command - show the install waves of a stack

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
    let stack = inputs::load_stack(environment, config, bootstrap)?;
    let summary = stack.graph.summary()?;

    if json_output {
        let components: Vec<_> = stack
            .graph
            .components()
            .map(|(name, record)| {
                json!({
                    "name": name,
                    "type": record.type_name,
                    "children": record.children.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
                })
            })
            .collect();
        let edges: Vec<_> = stack
            .graph
            .edges()
            .iter()
            .map(|edge| {
                json!({
                    "consumer": edge.consumer.to_string(),
                    "producer": edge.producer.to_string(),
                })
            })
            .collect();
        let output = json!({
            "stack": environment,
            "summary": summary,
            "components": components,
            "edges": edges,
            "outputs": stack.outputs(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} Planning {} ({}, {})",
        style("→").blue(),
        style(environment).bold(),
        stack.config.aws.region,
        stack.config.network.cidr_block
    );
    println!();
    println!("{}", summary.display());
    println!();

    println!("{}", style("Components:").bold());
    for (name, record) in stack.graph.components() {
        println!(
            "  {} {} ({} resources)",
            style(name).cyan(),
            style(&record.type_name).dim(),
            record.children.len()
        );
    }

    Ok(())
}
