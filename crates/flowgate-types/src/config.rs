//! Engine configuration types.
//!
//! `EngineConfig` is the top-level `flowgate.toml`. Every field has a
//! default, so an empty file (or no file) yields a working engine.

use serde::{Deserialize, Serialize};

use crate::workflow::NodeClass;

/// Top-level configuration for the workflow graph engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    /// Ordered kind/label keyword table used to derive node classes.
    #[serde(default = "default_classification")]
    pub classification: Vec<ClassificationRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            layout: LayoutConfig::default(),
            classification: default_classification(),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Deadline applied to nodes that do not declare their own `timeout`.
    #[serde(default = "default_step_timeout_secs")]
    pub default_step_timeout_secs: u64,

    /// Worker bound for the parallel executor.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Stop starting new steps after the first failure.
    #[serde(default)]
    pub fail_fast: bool,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_step_timeout_secs() -> u64 {
    300
}

fn default_max_parallel() -> usize {
    3
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_step_timeout_secs: default_step_timeout_secs(),
            max_parallel: default_max_parallel(),
            fail_fast: false,
            simulation: SimulationConfig::default(),
        }
    }
}

/// Behaviour of the dry-run executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
    /// Probability in `[0, 1]` that a simulated step fails.
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
}

fn default_min_latency_ms() -> u64 {
    1000
}

fn default_max_latency_ms() -> u64 {
    3000
}

fn default_failure_rate() -> f64 {
    0.1
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
            failure_rate: default_failure_rate(),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Geometry for the layered and grid layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub margin_x: f64,
    pub margin_y: f64,
    pub column_gap: f64,
    pub row_gap: f64,
    pub baseline_offset: f64,
    pub grid_origin_x: f64,
    pub grid_origin_y: f64,
    pub grid_column_gap: f64,
    pub grid_row_gap: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin_x: 50.0,
            margin_y: 50.0,
            column_gap: 200.0,
            row_gap: 100.0,
            baseline_offset: 200.0,
            grid_origin_x: 100.0,
            grid_origin_y: 100.0,
            grid_column_gap: 250.0,
            grid_row_gap: 150.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// One row of the classification table: any keyword contained in the
/// lower-cased `"{kind} {label}"` text selects `class`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub class: NodeClass,
    pub keywords: Vec<String>,
}

impl ClassificationRule {
    pub fn new(class: NodeClass, keywords: &[&str]) -> Self {
        Self {
            class,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Built-in table. Order matters: the first matching rule wins.
pub fn default_classification() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new(
            NodeClass::WriteSensitive,
            &[
                "add", "write", "delete", "save", "update", "edit", "move", "create", "vacuum",
                "backup", "restore",
            ],
        ),
        ClassificationRule::new(
            NodeClass::LlmDelegation,
            &["delegate", "llm", "claude", "deepseek", "gemini"],
        ),
        ClassificationRule::new(
            NodeClass::Computation,
            &["execute", "compute", "evaluate", "consensus"],
        ),
        ClassificationRule::new(NodeClass::Utility, &["branch", "parallel", "approval"]),
    ]
}
