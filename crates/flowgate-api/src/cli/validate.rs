//! `flowgate validate`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use flowgate_core::execution::ExecutorRegistry;
use flowgate_infra::document::{load_document, load_schema};
use flowgate_types::validation::{ValidationIssue, ValidationResult};

use crate::state::AppState;

pub async fn validate(
    state: &AppState,
    document: &Path,
    schema: Option<&Path>,
    details: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let doc = load_document(document)
        .await
        .with_context(|| format!("Failed to load workflow {}", document.display()))?;
    let schema = load_schema(schema).await.context("Failed to load schema")?;

    let result = state
        .service(ExecutorRegistry::new())
        .validate(&doc, schema.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        print_result(&result, details);
    }

    if !result.is_valid {
        bail!("{} has {} validation error(s)", document.display(), result.errors.len());
    }
    Ok(())
}

/// Styled report. Errors are always listed; warnings and info with `details`.
pub(crate) fn print_result(result: &ValidationResult, details: bool) {
    println!();
    if result.is_valid {
        println!("  {} Workflow is valid", style("✓").green().bold());
    } else {
        println!("  {} Workflow is invalid", style("✗").red().bold());
    }
    println!(
        "  {} error(s), {} warning(s), {} info",
        style(result.errors.len()).red(),
        style(result.warnings.len()).yellow(),
        style(result.info.len()).cyan()
    );
    if let Some(version) = &result.schema_version {
        println!("  Schema version: {}", style(version).dim());
    }

    let listed: Vec<&ValidationIssue> = if details {
        result.issues().collect()
    } else {
        result.errors.iter().collect()
    };
    if !listed.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Severity").fg(Color::Cyan),
                Cell::new("Path"),
                Cell::new("Message"),
            ]);
        for issue in listed {
            table.add_row(vec![
                super::severity_cell(issue.severity),
                Cell::new(&issue.path),
                Cell::new(&issue.message),
            ]);
        }
        println!();
        println!("{table}");
    } else if !details && result.issue_count() > 0 {
        println!("  {}", style("Re-run with --details to list warnings and info").dim());
    }
    println!();
}
