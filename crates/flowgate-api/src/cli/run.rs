//! `flowgate run`: dry-run a workflow with the simulated executor.
//!
//! Streams step transitions while the run is in flight. Ctrl+C requests
//! cancellation: the step in flight finishes, nothing new starts.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use flowgate_core::execution::{
    BranchExecutor, DelayExecutor, ExecutionOptions, ExecutorRegistry, SimulatedExecutor,
};
use flowgate_core::service::ServiceError;
use flowgate_infra::document::{load_document, load_schema};
use flowgate_types::config::SimulationConfig;
use flowgate_types::event::ExecutionEvent;
use flowgate_types::execution::{ExecutionStep, ExecutionSummary, StepStatus};

use crate::state::AppState;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow document (JSON or YAML).
    pub document: PathBuf,

    /// Schema document enabling the schema tier.
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Let write-sensitive and approval nodes run.
    #[arg(long)]
    pub write_enabled: bool,

    /// Skip remaining steps after the first failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// Run dependency waves with at most N steps in flight.
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Seed for reproducible simulated latencies and failures.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the simulated failure rate (0.0 - 1.0).
    #[arg(long)]
    pub failure_rate: Option<f64>,

    /// Skip the simulated latency.
    #[arg(long)]
    pub instant: bool,
}

pub async fn run(state: &AppState, args: RunArgs, json: bool, quiet: bool) -> Result<()> {
    let doc = load_document(&args.document)
        .await
        .with_context(|| format!("Failed to load workflow {}", args.document.display()))?;
    let schema = load_schema(args.schema.as_deref())
        .await
        .context("Failed to load schema")?;

    let service = state.service(build_registry(&state.config.execution.simulation, &args));

    let mut options = ExecutionOptions::from_config(&state.config.execution)
        .with_write_enabled(args.write_enabled);
    if args.fail_fast {
        options = options.with_fail_fast(true);
    }
    if let Some(n) = args.parallel {
        options = options.parallel(n);
    }

    let mut run = match service.execute(&doc, schema.as_ref(), options) {
        Ok(run) => run,
        Err(ServiceError::Blocked(result)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if !quiet {
                super::validate::print_result(&result, false);
            }
            bail!("Workflow failed validation; nothing was executed");
        }
        Err(e) => return Err(e.into()),
    };
    let run_id = run.run_id;

    let engine = service.engine().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = engine.cancel(run_id);
        }
    });

    let show_progress = !json && !quiet;
    let total = run.initial_steps().len() as u64;
    let progress = if show_progress {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:30.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut finished: Option<(ExecutionSummary, u64)> = None;
    let mut cancelled = false;
    while let Some(event) = run.events.next().await {
        match event? {
            ExecutionEvent::StepUpdated { step, .. } => {
                if step.status == StepStatus::Running {
                    progress.set_message(step.node_label.clone());
                } else if step.status.is_terminal() {
                    progress.inc(1);
                    if show_progress {
                        progress.println(step_line(&step));
                    }
                }
            }
            ExecutionEvent::RunCancelled { remaining, .. } => {
                cancelled = true;
                progress.println(format!(
                    "  {} Cancelled, {remaining} step(s) not started",
                    style("!").yellow().bold()
                ));
            }
            ExecutionEvent::RunFinished {
                summary,
                duration_ms,
                ..
            } => finished = Some((summary, duration_ms)),
            ExecutionEvent::RunStarted { .. } => {}
        }
    }
    progress.finish_and_clear();
    interrupt.abort();

    let (summary, duration_ms) =
        finished.ok_or_else(|| anyhow::anyhow!("Run {run_id} ended without a summary"))?;
    let steps = service.engine().steps(run_id).unwrap_or_default();

    if json {
        let out = serde_json::json!({
            "run_id": run_id,
            "cancelled": cancelled,
            "duration_ms": duration_ms,
            "summary": summary,
            "steps": steps,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !quiet {
        print_report(&steps, &summary, duration_ms);
    }
    Ok(())
}

/// Simulated fallback plus the built-in `delay` and `branch` executors.
fn build_registry(config: &SimulationConfig, args: &RunArgs) -> ExecutorRegistry {
    let mut config = config.clone();
    if let Some(rate) = args.failure_rate {
        config.failure_rate = rate.clamp(0.0, 1.0);
    }
    let simulated = match args.seed {
        Some(seed) => SimulatedExecutor::with_seed(config, seed),
        None => SimulatedExecutor::new(config),
    };
    let simulated = if args.instant {
        simulated.instant()
    } else {
        simulated
    };
    ExecutorRegistry::new()
        .with("delay", DelayExecutor)
        .with("branch", BranchExecutor)
        .with_fallback(simulated)
}

fn step_line(step: &ExecutionStep) -> String {
    let marker = match step.status {
        StepStatus::Completed => style("✓").green(),
        StepStatus::Failed => style("✗").red(),
        _ => style("-").yellow(),
    };
    let detail = match (&step.error, &step.result) {
        (Some(err), _) => format!(" {}", style(err).red()),
        (None, Some(result)) if step.status == StepStatus::Skipped => result
            .get("message")
            .and_then(|m| m.as_str())
            .map(|m| format!(" {}", style(m).dim()))
            .unwrap_or_default(),
        _ => String::new(),
    };
    format!("  {marker} {}{detail}", step.node_label)
}

fn print_report(steps: &[ExecutionStep], summary: &ExecutionSummary, duration_ms: u64) {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node").fg(Color::Cyan),
            Cell::new("Class"),
            Cell::new("Status"),
            Cell::new("Duration"),
        ]);
    for step in steps {
        let duration = step
            .duration_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&step.node_label),
            Cell::new(step.node_class),
            super::status_cell(step.status),
            Cell::new(duration),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} completed, {} failed, {} skipped, {} pending ({duration_ms}ms)",
        style(summary.completed).green(),
        style(summary.failed).red(),
        style(summary.skipped).yellow(),
        style(summary.pending).dim()
    );
    println!();
}
