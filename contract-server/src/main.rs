//! `prompt-contracts` command-line interface.
//!
//! ```bash
//! # Serve POST /execute on the configured address
//! prompt-contracts serve --bind 0.0.0.0:8080
//!
//! # Run one execution from a request file
//! prompt-contracts execute --request request.json
//!
//! # Render a template without calling a model
//! prompt-contracts render --template detailed_analysis --input input.json
//!
//! # Render every template against its example input
//! prompt-contracts check-templates
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contract_config::ServiceConfig;
use contract_server::{AppState, create_router, telemetry, wiring};
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "prompt-contracts")]
#[command(about = "Contract-validated LLM prompt execution")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "PROMPT_CONTRACTS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the template root
    #[arg(long, global = true)]
    templates_dir: Option<PathBuf>,

    /// Override the schema root
    #[arg(long, global = true)]
    schemas_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,
    },

    /// Execute a request read from a JSON file
    Execute {
        /// Request file (`input`, `templateId`, `llmProvider`, `model`)
        #[arg(short, long)]
        request: PathBuf,
    },

    /// Validate input and render a template without calling a model
    Render {
        /// Template id
        #[arg(short, long)]
        template: String,

        /// JSON input file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Render every template against its declared example input
    CheckTemplates,

    /// List template ids
    ListTemplates,

    /// Print a dereferenced schema as JSON
    Schema {
        /// Schema reference relative to the schema root
        reference: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.templates_dir {
        config.templates_dir = dir;
    }
    if let Some(dir) = cli.schemas_dir {
        config.schemas_dir = dir;
    }
    if let Commands::Serve { bind: Some(bind) } = &cli.command {
        config.server.bind.clone_from(bind);
    }
    config.validate()?;
    telemetry::init(&config.log)?;

    let executor = wiring::executor(&config)?;

    match cli.command {
        Commands::Serve { .. } => {
            let router = create_router(AppState::new(
                executor,
                config.templates_dir.clone(),
                config.schemas_dir.clone(),
            ));
            let listener = tokio::net::TcpListener::bind(config.server.bind.as_str())
                .await
                .with_context(|| format!("failed to bind {}", config.server.bind))?;
            info!(bind = %config.server.bind, "prompt-contracts listening");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Execute { request } => {
            let body = std::fs::read(&request)
                .with_context(|| format!("failed to read {}", request.display()))?;
            let outcome = executor.execute_body(Some(&body)).await;
            print_json(&outcome.body())?;
            Ok(exit_code(outcome.failure().is_none()))
        }

        Commands::Render { template, input } => {
            let input = read_json(&input)?;
            match executor.render(&template, &input).await {
                Ok(prompt) => {
                    println!("{prompt}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(failure) => {
                    for detail in failure.errors() {
                        eprintln!("  {detail}");
                    }
                    report_failure(&failure.to_string())
                }
            }
        }

        Commands::CheckTemplates => {
            let report = executor.auditor().audit_all().await?;
            print_json(&serde_json::to_value(&report)?)?;
            eprintln!(
                "{} passed, {} failed, {} templates",
                report.passed(),
                report.failed(),
                report.templates().len()
            );
            Ok(exit_code(report.is_success()))
        }

        Commands::ListTemplates => {
            for template_id in executor.templates().discover().await? {
                println!("{template_id}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Schema { reference } => {
            let schema = executor.schemas().resolve(&reference).await?;
            print_json(schema.value())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_failure(message: &str) -> Result<ExitCode> {
    eprintln!("error: {message}");
    Ok(ExitCode::FAILURE)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
