//! llm-router - deployment router inspection tool
//!
//! Loads a router configuration, builds the deployment registry and reports
//! how each logical model name resolves to candidate tiers.

use anyhow::Context;
use clap::{Parser, Subcommand};
use llm_router::config::Config;
use llm_router::core::router::DeploymentRegistry;
use llm_router::utils::logging::init_logging;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "llm-router", version, about)]
struct Cli {
    /// Path to the router configuration file
    #[arg(
        short,
        long,
        env = "LLM_ROUTER_CONFIG",
        default_value = "config/router.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration and print a summary
    Check,
    /// Show candidate tiers for one model name (aliases are resolved)
    Candidates {
        /// Logical model name or alias
        model: String,
    },
    /// Show candidate tiers for every model name
    Models,
    /// Print build information
    Info,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Check);
    if let Command::Info = command {
        let info = llm_router::build_info();
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let config = Config::from_file(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&config.logging)?;

    let registry = config.build_registry()?;
    info!(
        deployments = registry.len(),
        models = registry.list_models().len(),
        "registry built"
    );

    match command {
        Command::Check => {
            println!(
                "configuration OK: {} deployments, {} models, strategy {}",
                registry.len(),
                registry.list_models().len(),
                config.router_settings.routing_strategy
            );
        }
        Command::Candidates { model } => print_candidates(&registry, &model),
        Command::Models => {
            for model in registry.list_models() {
                print_candidates(&registry, &model);
            }
        }
        Command::Info => {}
    }
    Ok(())
}

fn print_candidates(registry: &DeploymentRegistry, model: &str) {
    let resolved = registry.resolve_model_name(model);
    let tiers = registry.list_candidates(model);
    if tiers.is_empty() {
        println!("{}: no deployments configured", model);
        return;
    }

    if resolved == model {
        println!("{}", model);
    } else {
        println!("{} -> {}", model, resolved);
    }
    for tier in tiers {
        for deployment in tier {
            let tags = if deployment.tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", deployment.tags.join(", "))
            };
            println!(
                "  tier {:<3} {:<24} {:<18} {:<28} weight {}{}",
                deployment.tier(),
                deployment.id,
                deployment.provider.to_string(),
                deployment.model,
                deployment.weight(),
                tags
            );
        }
    }
}
