//! Workflow execution.
//!
//! - `engine` -- `ExecutionEngine`: run registry, sequential and parallel
//!   drivers, event stream
//! - `executor` -- `NodeExecutor` port, boxed wrapper and kind registry
//! - `gate` -- write gate for write-sensitive and approval nodes
//! - `plan` -- dependency waves for the parallel driver
//! - `simulated` -- dry-run, delay and closure executors
//!
//! Every node gets one `ExecutionStep` per run, moved through
//! `pending -> running -> {completed | failed | skipped}` by the driver that
//! owns the run. Observers only see snapshots.

pub mod engine;
pub mod executor;
pub mod gate;
pub mod plan;
pub mod simulated;

use std::time::Duration;

use flowgate_types::config::ExecutionConfig;
use flowgate_types::error::StepTransitionError;
use uuid::Uuid;

pub use engine::{CompletionHook, ExecutionEngine, ExecutionRun, RunReport};
pub use executor::{BoxNodeExecutor, ExecutorRegistry, NodeExecutor, StepContext, StepError};
pub use gate::{GateDecision, WriteGate};
pub use simulated::{
    BranchExecutor, DEFAULT_DELAY_SECS, DelayExecutor, FnExecutor, SimulatedExecutor,
};

/// Default step-level timeout (5 minutes).
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;

/// Finished runs kept queryable per engine before the oldest are evicted.
pub const DEFAULT_MAX_RETAINED_RUNS: usize = 256;

/// Result message of steps skipped by fail-fast.
pub const FAIL_FAST_SKIP_REASON: &str = "Skipped after earlier failure";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One node at a time, in declaration order.
    Sequential,
    /// Dependency waves, at most `max_parallel` nodes in flight.
    Parallel { max_parallel: usize },
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel { .. } => "parallel",
        }
    }

    /// Worker bound; sequential is a bound of one.
    pub fn max_parallel(&self) -> usize {
        match self {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel { max_parallel } => (*max_parallel).max(1),
        }
    }
}

/// Per-run policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Let write-sensitive and approval nodes run.
    pub write_enabled: bool,
    /// Skip every not-yet-started step once one has failed.
    pub fail_fast: bool,
    /// Deadline for nodes that do not declare a `timeout`.
    pub default_step_timeout: Duration,
    pub mode: ExecutionMode,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            write_enabled: false,
            fail_fast: false,
            default_step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            mode: ExecutionMode::Sequential,
        }
    }
}

impl ExecutionOptions {
    /// Sequential options seeded from the `[execution]` config section.
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            write_enabled: false,
            fail_fast: config.fail_fast,
            default_step_timeout: Duration::from_secs(config.default_step_timeout_secs),
            mode: ExecutionMode::Sequential,
        }
    }

    pub fn with_write_enabled(mut self, write_enabled: bool) -> Self {
        self.write_enabled = write_enabled;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = timeout;
        self
    }

    pub fn parallel(mut self, max_parallel: usize) -> Self {
        self.mode = ExecutionMode::Parallel { max_parallel };
        self
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Run-level failures. Step failures are not here: they are recorded on the
/// step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("execution run not found: {0}")]
    RunNotFound(Uuid),

    /// A driver defect tried an illegal step transition.
    #[error(transparent)]
    InvalidTransition(#[from] StepTransitionError),

    /// A step task failed to join and could not be matched to its step.
    #[error("step task failed to join: {0}")]
    TaskJoin(String),

    #[error("cycle detected involving node '{0}'; the graph cannot run in dependency waves")]
    CyclicGraph(String),

    #[error("event stream of run {0} ended before the run finished")]
    Interrupted(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_config() {
        let config = ExecutionConfig {
            default_step_timeout_secs: 12,
            fail_fast: true,
            ..ExecutionConfig::default()
        };
        let options = ExecutionOptions::from_config(&config).with_write_enabled(true);
        assert!(options.write_enabled);
        assert!(options.fail_fast);
        assert_eq!(options.default_step_timeout, Duration::from_secs(12));
        assert_eq!(options.mode, ExecutionMode::Sequential);
    }

    #[test]
    fn parallel_bound_is_at_least_one() {
        let options = ExecutionOptions::default().parallel(0);
        assert_eq!(options.mode.max_parallel(), 1);
        assert_eq!(options.mode.as_str(), "parallel");
        assert_eq!(ExecutionMode::Sequential.max_parallel(), 1);
    }

    #[test]
    fn engine_error_display() {
        let err = EngineError::CyclicGraph("n2".into());
        assert!(err.to_string().contains("'n2'"));
        let err = EngineError::RunNotFound(Uuid::nil());
        assert!(err.to_string().contains("not found"));
    }
}
