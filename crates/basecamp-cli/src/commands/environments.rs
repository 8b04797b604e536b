//! Environments command - list the environment table

use console::style;
use serde_json::json;
use std::path::Path;

use crate::error::Result;
use crate::inputs;

pub fn run(config: Option<&Path>, json_output: bool) -> Result<()> {
    let (table, source) = inputs::load_environments(config)?;

    if json_output {
        let envs: Vec<_> = table
            .environments
            .iter()
            .map(|(name, env)| {
                json!({
                    "name": name,
                    "region": env.aws.region,
                    "cidrBlock": env.vpc.cidr_block,
                    "availabilityZones": env.vpc.availability_zones,
                    "natMode": env.vpc.nat_mode,
                    "kubernetesVersion": env.eks.version,
                    "instanceTypes": env.eks.workers().instance_types,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&envs)?);
        return Ok(());
    }

    println!(
        "{} Environments from {}",
        style("→").blue(),
        style(source).dim()
    );

    let width = table.names().iter().map(|n| n.len()).max().unwrap_or(0);
    for (name, env) in &table.environments {
        println!(
            "  {}  {}  {}  {} zones  k8s {}  {}",
            style(format!("{:width$}", name, width = width)).bold(),
            env.aws.region,
            env.vpc.cidr_block,
            env.vpc.availability_zones.len(),
            env.eks.version,
            env.eks.workers().instance_types.join(",")
        );
    }

    Ok(())
}
