//! CLI command definitions for the `twv` binary.
//!
//! Uses clap derive macros. Commands follow a noun-verb pattern
//! (`twv tools list`, `twv workflow run <file>`).

pub mod semver;
pub mod tools;
pub mod workflow;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

/// Register, inspect, and compose tools into dependency-aware workflows.
#[derive(Parser)]
#[command(name = "twv", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect, invoke, and toggle registered tools.
    Tools {
        #[command(subcommand)]
        action: tools::ToolsCommand,
    },

    /// Run, validate, and plan workflows from YAML files.
    #[command(alias = "wf")]
    Workflow {
        #[command(subcommand)]
        action: workflow::WorkflowCommand,
    },

    /// Semantic version range utilities.
    Semver {
        #[command(subcommand)]
        action: semver::SemverCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a `--input` argument; absent means `{}`.
pub fn parse_input(raw: Option<&str>) -> anyhow::Result<serde_json::Value> {
    match raw {
        None => Ok(serde_json::json!({})),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| anyhow::anyhow!("--input is not valid JSON: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["twv", "tools", "list", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn input_parsing() {
        assert_eq!(parse_input(None).unwrap(), serde_json::json!({}));
        assert_eq!(parse_input(Some("[1,2]")).unwrap(), serde_json::json!([1, 2]));
        assert!(parse_input(Some("{nope")).is_err());
    }
}
