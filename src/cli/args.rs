//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config YAML file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Override the per-step deadline, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub step_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run a workflow YAML file through the swarm
    Run {
        /// Path to the workflow YAML file
        #[arg(value_name = "FILE")]
        file: PathBuf
    },
    /// Run the built-in research -> analysis -> writing pipeline
    Demo {
        /// Topic handed to the research step
        #[arg(long)]
        topic: Option<String>
    },
    /// Boot the swarm and print the status of every actor
    Status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["swarm", "run", "pipeline.yaml", "--step-timeout", "5", "--json-logs"]).unwrap();

        assert_eq!(cli.command, Commands::Run { file: PathBuf::from("pipeline.yaml") });
        assert_eq!(cli.step_timeout, Some(5));
        assert!(cli.json_logs);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["swarm"]).is_err());
    }
}
