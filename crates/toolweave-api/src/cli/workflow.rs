//! `twv workflow` subcommands: run, validate, plan.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::json;

use toolweave_core::workflow::dag::build_execution_plan;
use toolweave_core::workflow::{OutcomeReport, WorkflowDefinition, load_workflow_file};
use toolweave_types::tool::CallerContext;
use toolweave_types::workflow::{StepStatus, WorkflowRunStatus};

use super::{parse_input, print_json};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Execute a workflow definition.
    Run {
        /// Path to the workflow YAML file.
        file: PathBuf,

        /// JSON object exposed to steps as `variables`.
        #[arg(long)]
        input: Option<String>,

        /// Caller user id.
        #[arg(long)]
        user: Option<String>,

        /// Permission granted to the caller (repeatable).
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },

    /// Parse and validate a workflow definition without running it.
    Validate { file: PathBuf },

    /// Show the execution waves of a workflow.
    Plan { file: PathBuf },
}

impl WorkflowCommand {
    /// `run` needs the registry; `validate` and `plan` only read the file.
    pub fn needs_state(&self) -> bool {
        matches!(self, Self::Run { .. })
    }
}

pub async fn handle_workflow_command(
    cmd: WorkflowCommand,
    state: Option<&AppState>,
    json: bool,
) -> Result<()> {
    match cmd {
        WorkflowCommand::Run {
            file,
            input,
            user,
            permissions,
        } => {
            let Some(state) = state else {
                bail!("workflow run requires an initialized registry");
            };
            let caller = CallerContext {
                user_id: user,
                platform: Some("cli".to_string()),
                ..CallerContext::default()
            }
            .with_permissions(permissions);
            run(state, &file, input.as_deref(), caller, json).await
        }
        WorkflowCommand::Validate { file } => validate(&file, json),
        WorkflowCommand::Plan { file } => plan(&file, json),
    }
}

fn load(file: &Path) -> Result<WorkflowDefinition> {
    load_workflow_file(file).with_context(|| format!("failed to load workflow {}", file.display()))
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

async fn run(
    state: &AppState,
    file: &Path,
    input: Option<&str>,
    caller: CallerContext,
    json: bool,
) -> Result<()> {
    let definition = load(file)?;
    let variables = parse_input(input)?;

    let outcome = state
        .engine
        .execute(&definition, caller, variables)
        .await
        .with_context(|| format!("workflow '{}' is not runnable", definition.name))?;
    let report = outcome.report();

    if json {
        print_json(&report)?;
    } else {
        print_report(&report)?;
    }

    if let Some(err) = outcome.error {
        bail!("workflow '{}' aborted: {err}", definition.name);
    }
    Ok(())
}

fn print_report(report: &OutcomeReport) -> Result<()> {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Tool"),
            Cell::new("Status"),
            Cell::new("Attempts"),
            Cell::new("Duration"),
            Cell::new("Error"),
        ]);

    for step in &report.steps {
        let status = match step.status {
            StepStatus::Completed => Cell::new("completed").fg(Color::Green),
            StepStatus::Failed => Cell::new("failed").fg(Color::Red),
            StepStatus::Skipped => Cell::new("skipped").fg(Color::DarkGrey),
            StepStatus::Running => Cell::new("running").fg(Color::Yellow),
            StepStatus::Pending => Cell::new("pending"),
        };
        table.add_row(vec![
            Cell::new(&step.step_id),
            Cell::new(&step.tool),
            status,
            Cell::new(step.attempts),
            Cell::new(format!("{}ms", step.duration_ms)),
            Cell::new(step.error.as_deref().unwrap_or("")),
        ]);
    }

    let status = match report.status {
        WorkflowRunStatus::Completed => style("completed").green().bold(),
        WorkflowRunStatus::Aborted => style("aborted").red().bold(),
        WorkflowRunStatus::Running => style("running").yellow().bold(),
    };

    println!();
    println!(
        "  {} {} in {}ms  {}",
        style(&report.workflow).cyan().bold(),
        status,
        report.duration_ms,
        style(&report.run_id).dim()
    );
    println!();
    println!("{table}");
    if let Some(output) = &report.output {
        println!();
        println!("  {}", style("Output").bold());
        println!("{}", serde_json::to_string_pretty(output)?);
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Validate / plan
// ---------------------------------------------------------------------------

fn validate(file: &Path, json: bool) -> Result<()> {
    let definition = load(file)?;
    if json {
        return print_json(&json!({
            "valid": true,
            "name": definition.name,
            "steps": definition.steps.len(),
        }));
    }
    println!();
    println!(
        "  {} {} ({} steps)",
        style("✓").green().bold(),
        style(&definition.name).cyan(),
        definition.steps.len()
    );
    println!();
    Ok(())
}

fn plan(file: &Path, json: bool) -> Result<()> {
    let definition = load(file)?;
    let waves = build_execution_plan(&definition.steps)?;

    if json {
        let waves: Vec<Vec<&str>> = waves
            .iter()
            .map(|wave| wave.iter().map(|s| s.id.as_str()).collect())
            .collect();
        return print_json(&json!({ "name": definition.name, "waves": waves }));
    }

    println!();
    println!("  {} {}", style("Plan").bold(), style(&definition.name).cyan());
    for (i, wave) in waves.iter().enumerate() {
        let steps: Vec<String> = wave
            .iter()
            .map(|s| {
                if s.parallel {
                    format!("{} ({}, parallel)", s.id, s.tool)
                } else {
                    format!("{} ({})", s.id, s.tool)
                }
            })
            .collect();
        println!("  {} {}", style(format!("wave {}:", i + 1)).dim(), steps.join(", "));
    }
    println!();
    Ok(())
}
