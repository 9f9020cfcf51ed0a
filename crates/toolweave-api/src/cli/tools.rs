//! `twv tools` subcommands: list, show, stats, invoke, enable, disable.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::json;

use toolweave_types::tool::{CallerContext, ToolFilter};

use super::{parse_input, print_json};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum ToolsCommand {
    /// List registered tools.
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        /// Only deprecated tools.
        #[arg(long)]
        deprecated: bool,

        /// Only enabled tools.
        #[arg(long)]
        enabled: bool,
    },

    /// Show a tool's descriptor, flags, and dependency status.
    Show {
        name: String,

        /// Resolve the highest version matching this range instead of the latest.
        #[arg(long)]
        range: Option<String>,
    },

    /// Per-tool invocation counters for this process.
    Stats,

    /// Invoke a tool once (or through a retry policy).
    Invoke {
        name: String,

        /// JSON input (default `{}`).
        #[arg(long)]
        input: Option<String>,

        /// Retry policy name; enables retries for idempotent tools.
        #[arg(long)]
        retry: Option<String>,

        /// Caller user id.
        #[arg(long)]
        user: Option<String>,

        /// Permission granted to the caller (repeatable).
        #[arg(long = "permission")]
        permissions: Vec<String>,

        /// Mark the call as approved for tools that require approval.
        #[arg(long)]
        approve: bool,
    },

    /// Enable a tool (persisted).
    Enable { name: String },

    /// Disable a tool (persisted).
    Disable { name: String },
}

pub async fn handle_tools_command(cmd: ToolsCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ToolsCommand::List {
            category,
            tag,
            deprecated,
            enabled,
        } => {
            let filter = ToolFilter {
                category,
                tag,
                deprecated: deprecated.then_some(true),
                enabled: enabled.then_some(true),
            };
            list(state, &filter, json).await
        }
        ToolsCommand::Show { name, range } => show(state, &name, range.as_deref(), json).await,
        ToolsCommand::Stats => stats(state, json).await,
        ToolsCommand::Invoke {
            name,
            input,
            retry,
            user,
            permissions,
            approve,
        } => {
            let mut caller = CallerContext {
                user_id: user,
                platform: Some("cli".to_string()),
                ..CallerContext::default()
            }
            .with_permissions(permissions);
            if approve {
                caller = caller.approved();
            }
            invoke(state, &name, input.as_deref(), retry.as_deref(), &caller, json).await
        }
        ToolsCommand::Enable { name } => set_enabled(state, &name, true, json).await,
        ToolsCommand::Disable { name } => set_enabled(state, &name, false, json).await,
    }
}

// ---------------------------------------------------------------------------
// List / show / stats
// ---------------------------------------------------------------------------

async fn list(state: &AppState, filter: &ToolFilter, json: bool) -> Result<()> {
    let tools = state.registry.list_tools(filter).await;
    if json {
        return print_json(&tools);
    }

    if tools.is_empty() {
        println!();
        println!("  No tools match.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Version"),
            Cell::new("Category"),
            Cell::new("Tags"),
            Cell::new("Risk"),
            Cell::new("Status"),
        ]);

    for t in &tools {
        let status = match (t.enabled, t.deprecated) {
            (false, _) => Cell::new("disabled").fg(Color::Red),
            (true, true) => Cell::new("deprecated").fg(Color::Yellow),
            (true, false) => Cell::new("enabled").fg(Color::Green),
        };
        table.add_row(vec![
            Cell::new(&t.name),
            Cell::new(&t.version),
            Cell::new(t.category.as_deref().unwrap_or("-")),
            Cell::new(t.tags.join(", ")),
            Cell::new(t.risk_tier),
            status,
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn show(state: &AppState, name: &str, range: Option<&str>, json: bool) -> Result<()> {
    let tool = match range {
        Some(range) => state.registry.resolve_matching(name, range).await?,
        None => state.registry.resolve(name).await?,
    };
    let flags = state.registry.flags(name);
    let dependencies = state.registry.resolve_dependencies(name).await?;
    let dependents = state.registry.dependents(name).await;

    if json {
        return print_json(&json!({
            "descriptor": tool.descriptor,
            "resolved_version": tool.version.to_string(),
            "enabled": flags.as_ref().map(|f| f.enabled),
            "deprecated": flags.as_ref().map(|f| f.deprecated),
            "dependencies": dependencies,
            "dependents": dependents,
        }));
    }

    let d = &tool.descriptor;
    println!();
    println!("  {} {}", style(&d.name).cyan().bold(), style(&tool.version).dim());
    if !d.description.is_empty() {
        println!("  {}", d.description);
    }
    println!();
    println!("  Category:   {}", d.category.as_deref().unwrap_or("-"));
    let tags = if d.tags.is_empty() { "-".to_string() } else { d.tags.join(", ") };
    println!("  Tags:       {tags}");
    println!("  Risk:       {}", d.security.risk_tier);
    println!("  Idempotent: {}", d.security.idempotent);
    if !d.security.permissions.is_empty() {
        let perms: Vec<&str> = d.security.permissions.iter().map(String::as_str).collect();
        println!("  Requires:   {}", perms.join(", "));
    }
    if let Some(flags) = &flags {
        println!("  Enabled:    {}", flags.enabled);
        if flags.deprecated {
            println!(
                "  {} {}",
                style("Deprecated:").yellow(),
                flags.deprecation_message.as_deref().unwrap_or("yes")
            );
        }
    }

    if !d.dependencies.is_empty() {
        println!();
        println!("  {}", style("Dependencies").bold());
        for dep in &d.dependencies {
            let kind = if dep.optional { "optional" } else { "required" };
            println!("    {} {} ({kind})", dep.name, style(&dep.version_range).dim());
        }
        let mark = if dependencies.satisfied {
            style("✓ satisfied").green()
        } else {
            style("✗ unsatisfied").red()
        };
        println!("    {mark}");
        for missing in &dependencies.missing_required {
            println!("    {} missing: {missing}", style("✗").red());
        }
        for missing in &dependencies.missing_optional {
            println!("    {} optional missing: {missing}", style("!").yellow());
        }
    }
    if !dependents.is_empty() {
        println!();
        println!("  Used by: {}", dependents.join(", "));
    }
    println!();
    Ok(())
}

async fn stats(state: &AppState, json: bool) -> Result<()> {
    let stats = state.registry.get_stats().await;
    if json {
        return print_json(&stats);
    }

    println!();
    println!(
        "  {} tools ({} versions), {} enabled, {} deprecated",
        stats.total_tools, stats.total_versions, stats.enabled_tools, stats.deprecated_tools
    );

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Tool").fg(Color::Cyan),
            Cell::new("Calls"),
            Cell::new("OK"),
            Cell::new("Failed"),
            Cell::new("Total ms"),
            Cell::new("Last"),
        ]);
    for (name, s) in &stats.per_tool {
        let last = s
            .last_invoked_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(name),
            Cell::new(s.invocations),
            Cell::new(s.successes),
            Cell::new(s.failures),
            Cell::new(s.total_duration_ms),
            Cell::new(last),
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Invoke / toggle
// ---------------------------------------------------------------------------

async fn invoke(
    state: &AppState,
    name: &str,
    input: Option<&str>,
    retry: Option<&str>,
    caller: &CallerContext,
    json: bool,
) -> Result<()> {
    let input = parse_input(input)?;
    let invocation = match retry {
        Some(policy) => {
            state
                .registry
                .invoke_with_retry_detailed(name, input, caller, Some(policy))
                .await
        }
        None => state.registry.invoke_detailed(name, input, caller).await,
    }
    .with_context(|| format!("invocation of '{name}' failed"))?;

    if json {
        return print_json(&invocation);
    }

    for warning in &invocation.warnings {
        eprintln!("  {} {warning}", style("warning:").yellow().bold());
    }
    println!("{}", serde_json::to_string_pretty(&invocation.output)?);
    eprintln!(
        "  {}",
        style(format!(
            "{}@{} in {}ms ({} attempt{})",
            invocation.tool,
            invocation.version,
            invocation.duration_ms,
            invocation.attempts,
            if invocation.attempts == 1 { "" } else { "s" }
        ))
        .dim()
    );
    Ok(())
}

async fn set_enabled(state: &AppState, name: &str, enabled: bool, json: bool) -> Result<()> {
    if state.registry.flags(name).is_none() {
        bail!("tool '{name}' is not registered");
    }
    state.registry.set_enabled(name, enabled)?;
    state
        .registry
        .persist_tool_flags(name, &state.flag_store)
        .await
        .context("failed to persist tool flags")?;

    if json {
        return print_json(&json!({ "tool": name, "enabled": enabled }));
    }
    let verb = if enabled { "Enabled" } else { "Disabled" };
    println!();
    println!("  {} {verb} {}", style("*").green().bold(), style(name).cyan());
    println!();
    Ok(())
}
