//! Basecamp CLI - plan, render and dry-run an EKS environment with Flux GitOps

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;
mod display;
mod error;
mod exit_codes;
mod inputs;

#[derive(Parser)]
#[command(name = "basecamp")]
#[command(author = "Basecamp Contributors")]
#[command(version)]
#[command(
    about = "Declare a VPC, an EKS cluster and a Flux bootstrap per environment",
    long_about = None
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

/// Arguments shared by every command that builds a stack
#[derive(Args, Debug)]
struct StackArgs {
    /// Environment (stack) name, e.g. dev, staging, prod
    environment: String,

    /// Environment table (defaults to the user config file, then built-ins)
    #[arg(short, long, env = "BASECAMP_CONFIG")]
    config: Option<PathBuf>,

    /// Bootstrap file with credentials, Git repositories and apps
    #[arg(short, long)]
    bootstrap: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known environments
    Environments {
        /// Environment table (defaults to the user config file, then built-ins)
        #[arg(short, long, env = "BASECAMP_CONFIG")]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the install plan: resources grouped into waves
    Plan {
        #[command(flatten)]
        stack: StackArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render every declared resource as YAML, in install order
    Render {
        #[command(flatten)]
        stack: StackArgs,

        /// Print Secret data instead of redacting it
        #[arg(long)]
        show_secrets: bool,
    },

    /// Validate the configuration and the bootstrap file
    Validate {
        #[command(flatten)]
        stack: StackArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Materialize the graph against the offline engine and print its outputs
    DryRun {
        #[command(flatten)]
        stack: StackArgs,
    },
}

fn init_tracing(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            let _ = e.print();
            std::process::exit(exit_codes::USAGE_ERROR);
        }
    };

    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Environments { config, json } => {
            commands::environments::run(config.as_deref(), json)
        }

        Commands::Plan { stack, json } => commands::plan::run(
            &stack.environment,
            stack.config.as_deref(),
            stack.bootstrap.as_deref(),
            json,
        ),

        Commands::Render {
            stack,
            show_secrets,
        } => commands::render::run(
            &stack.environment,
            stack.config.as_deref(),
            stack.bootstrap.as_deref(),
            show_secrets,
        ),

        Commands::Validate { stack, json } => commands::validate::run(
            &stack.environment,
            stack.config.as_deref(),
            stack.bootstrap.as_deref(),
            json,
        ),

        Commands::DryRun { stack } => commands::dry_run::run(
            &stack.environment,
            stack.config.as_deref(),
            stack.bootstrap.as_deref(),
        ),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
