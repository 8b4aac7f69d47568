//! # Swarm CLI Application
//!
//! Boots a swarm of agent actors from configuration and drives workflows through it.
//!
//! ## Usage
//!
//! ```bash
//! # Run the built-in research -> analysis -> writing pipeline
//! swarm demo --topic "grid scale batteries"
//!
//! # Execute a workflow file
//! swarm run resource/research_pipeline.yaml --step-timeout 30
//!
//! # Print the state of every configured actor
//! swarm status --config ./swarm.yaml
//! ```
//!
//! Logs go to stderr and are filtered by `SWARM_LOG` (or `RUST_LOG`).

use anyhow::Result;
use clap::Parser;
use swarm::{
    cli::{
        Cli, Commands,
        commands::{handle_demo_command, handle_run_command, handle_status_command}
    },
    config::load_config,
    shared::logging::{LogOptions, init_logging}
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(&LogOptions { json: cli.json_logs, level: None })?;

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(secs) = cli.step_timeout {
        config.runtime.step_timeout_secs = secs;
    }

    match cli.command {
        Commands::Run { file } => handle_run_command(&file, &config).await,
        Commands::Demo { topic } => handle_demo_command(topic.as_deref(), &config).await,
        Commands::Status => handle_status_command(&config).await
    }
}
