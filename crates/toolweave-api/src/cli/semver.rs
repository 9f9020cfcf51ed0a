//! `twv semver` subcommands.

use anyhow::Result;
use clap::Subcommand;
use console::style;
use serde_json::json;

use toolweave_core::version::{VersionRange, parse_version};

use super::print_json;

#[derive(Subcommand)]
pub enum SemverCommand {
    /// Check whether VERSION satisfies RANGE (exit code 1 when it does not).
    Check {
        /// Version, e.g. `1.4.2`.
        version: String,

        /// Range, e.g. `^1.0.0`, `>=1.2.0 <2.0.0`, `1.x || 2.x`.
        range: String,
    },
}

pub fn handle_semver_command(cmd: SemverCommand, json: bool) -> Result<bool> {
    match cmd {
        SemverCommand::Check { version, range } => check(&version, &range, json),
    }
}

/// Returns whether the version satisfied the range.
fn check(version: &str, range: &str, json: bool) -> Result<bool> {
    let parsed = parse_version(version)?;
    let parsed_range = VersionRange::parse(range)?;
    let satisfied = parsed_range.matches(&parsed);

    if json {
        print_json(&json!({
            "version": parsed.to_string(),
            "range": parsed_range.as_str(),
            "satisfied": satisfied,
        }))?;
    } else if satisfied {
        println!(
            "  {} {} satisfies {}",
            style("✓").green().bold(),
            style(&parsed).cyan(),
            style(parsed_range.as_str()).cyan()
        );
    } else {
        println!(
            "  {} {} does not satisfy {}",
            style("✗").red().bold(),
            style(&parsed).cyan(),
            style(parsed_range.as_str()).cyan()
        );
    }

    Ok(satisfied)
}
