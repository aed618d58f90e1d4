//! CLI command definitions for the `flowgate` binary.
//!
//! Uses clap derive macros for argument parsing. Every command reads a
//! workflow document from disk; nothing is ever written back.

pub mod classify;
pub mod fingerprint;
pub mod layout;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use flowgate_types::execution::StepStatus;
use flowgate_types::validation::Severity;

/// Validate, lay out and dry-run workflow graphs.
#[derive(Parser)]
#[command(name = "flowgate", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Engine config file (default: $FLOWGATE_CONFIG_DIR or ~/.flowgate/flowgate.toml).
    #[arg(long, global = true, env = "FLOWGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a workflow document.
    Validate {
        /// Workflow document (JSON or YAML).
        document: PathBuf,

        /// Schema document enabling the schema tier.
        #[arg(long)]
        schema: Option<PathBuf>,

        /// List warnings and info as well as errors.
        #[arg(long)]
        details: bool,
    },

    /// Compute node positions.
    Layout {
        /// Workflow document (JSON or YAML).
        document: PathBuf,
    },

    /// Dry-run a workflow with the simulated executor.
    Run(run::RunArgs),

    /// Show the node class derived for a kind and label.
    Classify {
        /// Node kind (e.g. `add_knowledge`).
        kind: String,

        /// Node label.
        #[arg(long, default_value = "")]
        label: String,
    },

    /// Print the integrity id of a workflow document.
    Fingerprint {
        /// Workflow document (JSON or YAML).
        document: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared styling
// ---------------------------------------------------------------------------

pub(crate) fn status_cell(status: StepStatus) -> comfy_table::Cell {
    use comfy_table::{Cell, Color};
    let cell = Cell::new(status);
    match status {
        StepStatus::Pending => cell.fg(Color::DarkGrey),
        StepStatus::Running => cell.fg(Color::Blue),
        StepStatus::Completed => cell.fg(Color::Green),
        StepStatus::Failed => cell.fg(Color::Red),
        StepStatus::Skipped => cell.fg(Color::Yellow),
    }
}

pub(crate) fn severity_cell(severity: Severity) -> comfy_table::Cell {
    use comfy_table::{Cell, Color};
    let cell = Cell::new(severity);
    match severity {
        Severity::Error => cell.fg(Color::Red),
        Severity::Warning => cell.fg(Color::Yellow),
        Severity::Info => cell.fg(Color::Cyan),
    }
}
