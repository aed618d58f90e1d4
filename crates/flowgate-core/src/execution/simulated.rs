//! Built-in executors.
//!
//! - [`SimulatedExecutor`] -- dry run: random latency and a configurable
//!   failure rate, seedable for reproducible runs
//! - [`DelayExecutor`] -- waits `params.seconds` (default 1), for
//!   `kind = "delay"`
//! - [`BranchExecutor`] -- picks `true_path` or `false_path`, for
//!   `kind = "branch"`
//! - [`FnExecutor`] -- adapts a closure, mostly for tests and embedding

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use flowgate_types::config::SimulationConfig;
use flowgate_types::workflow::Node;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

use super::executor::{NodeExecutor, StepContext, StepError};

// ---------------------------------------------------------------------------
// SimulatedExecutor
// ---------------------------------------------------------------------------

/// Dry-run executor. Performs no side effects.
pub struct SimulatedExecutor {
    config: SimulationConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Same `seed` and step order give the same latencies and failures.
    pub fn with_seed(config: SimulationConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Drop the simulated latency; failures are still drawn.
    pub fn instant(mut self) -> Self {
        self.config.min_latency_ms = 0;
        self.config.max_latency_ms = 0;
        self
    }

    fn draw(&self) -> (Duration, bool) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let min = self.config.min_latency_ms;
        let max = self.config.max_latency_ms.max(min);
        let latency = Duration::from_millis(rng.gen_range(min..=max));
        let rate = self.config.failure_rate;
        let fail = rate > 0.0 && rng.gen_bool(rate.min(1.0));
        (latency, fail)
    }
}

impl NodeExecutor for SimulatedExecutor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn execute(&self, node: &Node, ctx: &StepContext) -> Result<Value, StepError> {
        let (latency, fail) = self.draw();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if fail {
            return Err(StepError::Failed(format!(
                "Simulated failure for {}",
                node.display_name()
            )));
        }
        Ok(json!({
            "simulated": true,
            "node_id": node.id,
            "kind": node.kind,
            "latency_ms": latency.as_millis() as u64,
            "write_enabled": ctx.write_enabled,
        }))
    }
}

// ---------------------------------------------------------------------------
// DelayExecutor
// ---------------------------------------------------------------------------

/// Seconds waited when a delay node does not say.
pub const DEFAULT_DELAY_SECS: f64 = 1.0;

/// Sleeps for `params.seconds`, or [`DEFAULT_DELAY_SECS`] when absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayExecutor;

impl NodeExecutor for DelayExecutor {
    fn name(&self) -> &str {
        "delay"
    }

    fn validate(&self, node: &Node) -> Vec<String> {
        match node.params.get("seconds") {
            Some(v) if !v.is_null() && !v.is_number() => {
                vec!["Delay seconds must be a number".to_string()]
            }
            _ => Vec::new(),
        }
    }

    async fn execute(&self, node: &Node, _ctx: &StepContext) -> Result<Value, StepError> {
        let seconds = match node.params.get("seconds") {
            None | Some(Value::Null) => DEFAULT_DELAY_SECS,
            Some(v) => v
                .as_f64()
                .ok_or_else(|| StepError::InvalidParams("'seconds' must be a number".into()))?,
        };
        let delay = Duration::try_from_secs_f64(seconds)
            .map_err(|_| StepError::InvalidParams(format!("cannot wait {seconds} seconds")))?;
        tokio::time::sleep(delay).await;
        Ok(json!({ "delayed_secs": seconds }))
    }
}

// ---------------------------------------------------------------------------
// BranchExecutor
// ---------------------------------------------------------------------------

/// Chooses between `params.true_path` and `params.false_path`.
///
/// `condition` is either a boolean or a string; a string holds when it
/// contains `true` (case-insensitive). There is no expression language.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchExecutor;

impl BranchExecutor {
    fn holds(condition: &Value) -> bool {
        match condition {
            Value::Bool(b) => *b,
            Value::String(s) => s.to_lowercase().contains("true"),
            _ => false,
        }
    }
}

impl NodeExecutor for BranchExecutor {
    fn name(&self) -> &str {
        "branch"
    }

    fn validate(&self, node: &Node) -> Vec<String> {
        let present = match node.params.get("condition") {
            Some(Value::Bool(_)) => true,
            Some(Value::String(s)) => !s.is_empty(),
            _ => false,
        };
        if present {
            Vec::new()
        } else {
            vec!["Branch node must have condition".to_string()]
        }
    }

    async fn execute(&self, node: &Node, _ctx: &StepContext) -> Result<Value, StepError> {
        let taken = node.params.get("condition").is_some_and(Self::holds);
        let path = if taken { "true_path" } else { "false_path" };
        Ok(json!({
            "branch": node.params.get(path).cloned().unwrap_or(Value::Null),
            "condition": taken,
        }))
    }
}

// ---------------------------------------------------------------------------
// FnExecutor
// ---------------------------------------------------------------------------

/// Executor backed by a synchronous closure.
pub struct FnExecutor<F> {
    name: String,
    f: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&Node, &StepContext) -> Result<Value, StepError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> NodeExecutor for FnExecutor<F>
where
    F: Fn(&Node, &StepContext) -> Result<Value, StepError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, node: &Node, ctx: &StepContext) -> Result<Value, StepError> {
        (self.f)(node, ctx)
    }
}
