//! `ExecutionEngine`: drives workflow runs and tracks their steps.
//!
//! # Execution flow
//!
//! 1. `execute` creates one pending step per node and registers the run under
//!    a fresh UUIDv7 run id.
//! 2. A driver task takes ownership of the steps. For each node it moves the
//!    step to `running`, applies the write gate (and fail-fast, when
//!    enabled), then dispatches to the node's executor under a deadline.
//! 3. Every transition is published as an `ExecutionEvent` on the run's
//!    stream and on the shared `EventBus`, and mirrored into the run
//!    registry so `steps(run_id)` always returns the latest snapshot.
//! 4. After the last step the driver releases the run's cancellation token,
//!    evicts the oldest finished runs beyond the retention cap, emits the
//!    summary and then calls the completion hook.
//!
//! Sequential runs follow declaration order, one node at a time. Parallel
//! runs process dependency waves with a bounded `JoinSet`. Cancellation is
//! cooperative: in-flight actions finish, nothing new starts. A panicking
//! executor fails its own step only.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use flowgate_types::error::StepTransitionError;
use flowgate_types::event::ExecutionEvent;
use flowgate_types::execution::{ExecutionStep, ExecutionSummary};
use flowgate_types::workflow::Node;
use futures_util::{FutureExt, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::event::EventBus;
use crate::graph::GraphModel;

use super::executor::{ExecutorRegistry, StepContext, StepError};
use super::gate::{GateDecision, WriteGate};
use super::plan::build_waves;
use super::{
    DEFAULT_MAX_RETAINED_RUNS, EngineError, ExecutionMode, ExecutionOptions, FAIL_FAST_SKIP_REASON,
};

/// Called once per run with the final step list, after `RunFinished`.
pub type CompletionHook = Arc<dyn Fn(Uuid, &[ExecutionStep]) + Send + Sync>;

/// Events of one run, in emission order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ExecutionEvent, EngineError>> + Send>>;

/// Deadline for `node`: its declared `timeout`, else `default`.
pub fn step_deadline(node: &Node, default: Duration) -> Duration {
    node.timeout_secs
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Run handle and report
// ---------------------------------------------------------------------------

/// A started run. Poll `events` to follow it.
pub struct ExecutionRun {
    pub run_id: Uuid,
    pub events: EventStream,
    initial: Vec<ExecutionStep>,
}

impl ExecutionRun {
    /// The all-pending steps the run started with.
    pub fn initial_steps(&self) -> &[ExecutionStep] {
        &self.initial
    }

    /// Drain the event stream into a report.
    pub async fn collect(self) -> Result<RunReport, EngineError> {
        let ExecutionRun {
            run_id,
            mut events,
            initial: mut steps,
        } = self;
        let mut cancelled = false;

        while let Some(event) = events.next().await {
            match event? {
                ExecutionEvent::StepUpdated { step, .. } => {
                    if let Some(slot) = steps.get_mut(step.index) {
                        *slot = step;
                    }
                }
                ExecutionEvent::RunCancelled { .. } => cancelled = true,
                ExecutionEvent::RunFinished {
                    summary,
                    duration_ms,
                    ..
                } => {
                    return Ok(RunReport {
                        run_id,
                        steps,
                        summary,
                        cancelled,
                        duration_ms,
                    });
                }
                ExecutionEvent::RunStarted { .. } => {}
            }
        }
        Err(EngineError::Interrupted(run_id))
    }
}

impl std::fmt::Debug for ExecutionRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRun")
            .field("run_id", &self.run_id)
            .field("steps", &self.initial.len())
            .finish()
    }
}

/// Final state of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub steps: Vec<ExecutionStep>,
    pub summary: ExecutionSummary,
    /// Cancellation left steps pending.
    pub cancelled: bool,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// ExecutionEngine
// ---------------------------------------------------------------------------

struct RunState {
    steps: Vec<ExecutionStep>,
    finished: bool,
}

/// Runs workflows against an executor registry.
///
/// Cheap to clone; clones share the registry, run registry and event bus.
/// Finished runs stay queryable until more than `max_retained_runs` of them
/// exist; the oldest are evicted first.
#[derive(Clone)]
pub struct ExecutionEngine {
    registry: Arc<ExecutorRegistry>,
    runs: Arc<DashMap<Uuid, RunState>>,
    /// Only runs still in flight have a token.
    cancellation_tokens: Arc<DashMap<Uuid, CancellationToken>>,
    max_retained_runs: usize,
    event_bus: EventBus,
    completion_hook: Option<CompletionHook>,
}

impl ExecutionEngine {
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            runs: Arc::new(DashMap::new()),
            cancellation_tokens: Arc::new(DashMap::new()),
            max_retained_runs: DEFAULT_MAX_RETAINED_RUNS,
            event_bus: EventBus::default(),
            completion_hook: None,
        }
    }

    /// Keep at most `max` finished runs (at least one).
    pub fn with_max_retained_runs(mut self, max: usize) -> Self {
        self.max_retained_runs = max.max(1);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_completion_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Uuid, &[ExecutionStep]) + Send + Sync + 'static,
    {
        self.completion_hook = Some(Arc::new(hook));
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Start a run and return its event stream.
    ///
    /// Must be called from within a tokio runtime. In parallel mode a cyclic
    /// graph is rejected before any step is created.
    pub fn execute(
        &self,
        graph: Arc<GraphModel>,
        options: ExecutionOptions,
    ) -> Result<ExecutionRun, EngineError> {
        let waves = match options.mode {
            ExecutionMode::Sequential => None,
            ExecutionMode::Parallel { .. } => Some(build_waves(&graph)?),
        };

        let run_id = Uuid::now_v7();
        let steps: Vec<ExecutionStep> = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, node)| ExecutionStep::pending(run_id, i, node))
            .collect();

        let token = CancellationToken::new();
        self.runs.insert(
            run_id,
            RunState {
                steps: steps.clone(),
                finished: false,
            },
        );
        self.cancellation_tokens.insert(run_id, token.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let driver = RunDriver {
            run_id,
            gate: WriteGate::new(options.write_enabled),
            graph,
            options,
            registry: Arc::clone(&self.registry),
            runs: Arc::clone(&self.runs),
            cancellation_tokens: Arc::clone(&self.cancellation_tokens),
            max_retained_runs: self.max_retained_runs,
            steps: steps.clone(),
            token,
            tx,
            event_bus: self.event_bus.clone(),
            completion_hook: self.completion_hook.clone(),
            any_failed: false,
        };
        tokio::spawn(driver.run(waves));

        let events: EventStream = Box::pin(async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        });

        Ok(ExecutionRun {
            run_id,
            events,
            initial: steps,
        })
    }

    /// Start a run and wait for it to finish.
    pub async fn run_to_completion(
        &self,
        graph: Arc<GraphModel>,
        options: ExecutionOptions,
    ) -> Result<RunReport, EngineError> {
        self.execute(graph, options)?.collect().await
    }

    /// Latest step snapshot. `None` means no run (never started or reset).
    pub fn steps(&self, run_id: Uuid) -> Option<Vec<ExecutionStep>> {
        self.runs.get(&run_id).map(|run| run.steps.clone())
    }

    pub fn summary(&self, run_id: Uuid) -> Option<ExecutionSummary> {
        self.runs
            .get(&run_id)
            .map(|run| ExecutionSummary::from_steps(&run.steps))
    }

    /// Stop starting new steps. The step in flight finishes normally.
    ///
    /// Cancelling a run that already finished is a no-op.
    pub fn cancel(&self, run_id: Uuid) -> Result<(), EngineError> {
        if let Some(token) = self.cancellation_tokens.get(&run_id) {
            token.cancel();
            tracing::info!(run_id = %run_id, "workflow run cancellation requested");
            return Ok(());
        }
        if self.runs.contains_key(&run_id) {
            tracing::debug!(run_id = %run_id, "workflow run already finished");
            return Ok(());
        }
        Err(EngineError::RunNotFound(run_id))
    }

    /// Cancel and forget the run. Returns whether it existed.
    pub fn reset(&self, run_id: Uuid) -> bool {
        if let Some((_, token)) = self.cancellation_tokens.remove(&run_id) {
            token.cancel();
        }
        let existed = self.runs.remove(&run_id).is_some();
        if existed {
            tracing::debug!(run_id = %run_id, "workflow run reset");
        }
        existed
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("registry", &self.registry)
            .field("runs", &self.runs.len())
            .field("in_flight", &self.cancellation_tokens.len())
            .field("max_retained_runs", &self.max_retained_runs)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

enum Prepared {
    /// Skipped without dispatch.
    Settled,
    Dispatch(Node, StepContext),
}

/// Owns the steps of one run for its whole lifetime.
struct RunDriver {
    run_id: Uuid,
    graph: Arc<GraphModel>,
    options: ExecutionOptions,
    gate: WriteGate,
    registry: Arc<ExecutorRegistry>,
    runs: Arc<DashMap<Uuid, RunState>>,
    cancellation_tokens: Arc<DashMap<Uuid, CancellationToken>>,
    max_retained_runs: usize,
    steps: Vec<ExecutionStep>,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<Result<ExecutionEvent, EngineError>>,
    event_bus: EventBus,
    completion_hook: Option<CompletionHook>,
    any_failed: bool,
}

impl RunDriver {
    async fn run(mut self, waves: Option<Vec<Vec<usize>>>) {
        let started = Instant::now();
        tracing::info!(
            run_id = %self.run_id,
            steps = self.steps.len(),
            write_enabled = self.options.write_enabled,
            mode = self.options.mode.as_str(),
            "workflow run started"
        );
        self.emit(ExecutionEvent::RunStarted {
            run_id: self.run_id,
            total_steps: self.steps.len(),
            write_enabled: self.options.write_enabled,
            mode: self.options.mode.as_str().to_string(),
        });

        let outcome = match waves {
            None => self.run_sequential().await,
            Some(waves) => self.run_parallel(waves).await,
        };

        match outcome {
            Ok(()) => self.finish(started),
            Err(e) => {
                tracing::error!(run_id = %self.run_id, error = %e, "workflow run aborted");
                self.release();
                let _ = self.tx.send(Err(e));
            }
        }
    }

    async fn run_sequential(&mut self) -> Result<(), EngineError> {
        for index in 0..self.steps.len() {
            if self.token.is_cancelled() {
                break;
            }
            if let Prepared::Dispatch(node, ctx) = self.prepare(index)? {
                let outcome = dispatch(&self.registry, &node, &ctx).await;
                self.settle(index, outcome)?;
            }
        }
        Ok(())
    }

    async fn run_parallel(&mut self, waves: Vec<Vec<usize>>) -> Result<(), EngineError> {
        let max_parallel = self.options.mode.max_parallel();

        for (wave_idx, wave) in waves.into_iter().enumerate() {
            if self.token.is_cancelled() {
                break;
            }
            tracing::debug!(
                run_id = %self.run_id,
                wave = wave_idx,
                steps = wave.len(),
                "processing wave"
            );

            let mut queue = wave.into_iter();
            let mut join_set = JoinSet::new();
            let mut in_flight = HashMap::new();
            loop {
                while join_set.len() < max_parallel && !self.token.is_cancelled() {
                    let Some(index) = queue.next() else {
                        break;
                    };
                    if let Prepared::Dispatch(node, ctx) = self.prepare(index)? {
                        let registry = Arc::clone(&self.registry);
                        let handle = join_set.spawn(async move {
                            let outcome = dispatch(&registry, &node, &ctx).await;
                            (index, outcome)
                        });
                        in_flight.insert(handle.id(), index);
                    }
                }

                match join_set.join_next_with_id().await {
                    None => break,
                    Some(Ok((id, (index, outcome)))) => {
                        in_flight.remove(&id);
                        self.settle(index, outcome)?;
                    }
                    // The task died outside the executor; its step fails and
                    // the siblings keep running.
                    Some(Err(e)) => match in_flight.remove(&e.id()) {
                        Some(index) => self.settle(index, Err(join_failure(e)))?,
                        None => return Err(EngineError::TaskJoin(e.to_string())),
                    },
                }
            }
        }
        Ok(())
    }

    /// Move the step to `running`, then either settle it as skipped or hand
    /// back what the executor needs.
    fn prepare(&mut self, index: usize) -> Result<Prepared, EngineError> {
        let node = self.graph.nodes()[index].clone();
        self.update(index, |step| step.start(Utc::now()))?;

        if let GateDecision::Skip { reason } = self.gate.check(&node) {
            tracing::debug!(run_id = %self.run_id, node_id = node.id.as_str(), "write gate skipped step");
            self.update(index, |step| step.skip(reason, Utc::now()))?;
            return Ok(Prepared::Settled);
        }
        if self.options.fail_fast && self.any_failed {
            self.update(index, |step| step.skip(FAIL_FAST_SKIP_REASON, Utc::now()))?;
            return Ok(Prepared::Settled);
        }

        let ctx = StepContext {
            run_id: self.run_id,
            write_enabled: self.options.write_enabled,
            deadline: step_deadline(&node, self.options.default_step_timeout),
        };
        Ok(Prepared::Dispatch(node, ctx))
    }

    fn settle(&mut self, index: usize, outcome: Result<Value, StepError>) -> Result<(), EngineError> {
        let now = Utc::now();
        match outcome {
            Ok(value) => self.update(index, |step| step.complete(value, now)),
            Err(err) => {
                self.any_failed = true;
                tracing::warn!(
                    run_id = %self.run_id,
                    node_id = self.steps[index].node_id.as_str(),
                    error = %err,
                    "step failed"
                );
                self.update(index, |step| step.fail(err.to_string(), now))
            }
        }
    }

    /// Apply a transition, mirror it into the registry and publish it.
    fn update(
        &mut self,
        index: usize,
        transition: impl FnOnce(&mut ExecutionStep) -> Result<(), StepTransitionError>,
    ) -> Result<(), EngineError> {
        let step = &mut self.steps[index];
        transition(step)?;
        let snapshot = step.clone();

        if let Some(mut run) = self.runs.get_mut(&self.run_id) {
            if let Some(slot) = run.steps.get_mut(index) {
                *slot = snapshot.clone();
            }
        }

        tracing::debug!(
            run_id = %self.run_id,
            node_id = snapshot.node_id.as_str(),
            status = %snapshot.status,
            elapsed_ms = snapshot.duration_ms,
            "step transition"
        );
        self.emit(ExecutionEvent::StepUpdated {
            run_id: self.run_id,
            step: snapshot,
        });
        Ok(())
    }

    fn finish(&mut self, started: Instant) {
        let summary = ExecutionSummary::from_steps(&self.steps);
        if self.token.is_cancelled() && summary.pending > 0 {
            tracing::info!(run_id = %self.run_id, remaining = summary.pending, "workflow run cancelled");
            self.emit(ExecutionEvent::RunCancelled {
                run_id: self.run_id,
                remaining: summary.pending,
            });
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %self.run_id,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            pending = summary.pending,
            duration_ms,
            "workflow run finished"
        );

        self.release();
        self.emit(ExecutionEvent::RunFinished {
            run_id: self.run_id,
            summary,
            duration_ms,
        });
        if let Some(hook) = &self.completion_hook {
            hook(self.run_id, &self.steps);
        }
    }

    /// Drop the run's token, mark it finished and evict the oldest other
    /// finished runs beyond the retention cap. This run is always kept.
    fn release(&self) {
        self.cancellation_tokens.remove(&self.run_id);
        if let Some(mut run) = self.runs.get_mut(&self.run_id) {
            run.finished = true;
        }

        let mut others: Vec<Uuid> = self
            .runs
            .iter()
            .filter(|run| run.finished && *run.key() != self.run_id)
            .map(|run| *run.key())
            .collect();
        if others.len() < self.max_retained_runs {
            return;
        }
        // UUIDv7 ids sort by creation time.
        others.sort_unstable();
        let excess = others.len() + 1 - self.max_retained_runs;
        for run_id in &others[..excess] {
            self.runs.remove(run_id);
        }
        tracing::debug!(run_id = %self.run_id, evicted = excess, "finished runs evicted");
    }

    fn emit(&self, event: ExecutionEvent) {
        self.event_bus.publish(event.clone());
        // The caller may have dropped the stream; the run continues.
        let _ = self.tx.send(Ok(event));
    }
}

/// Run the node's executor under its deadline. A panic fails the step.
async fn dispatch(
    registry: &ExecutorRegistry,
    node: &Node,
    ctx: &StepContext,
) -> Result<Value, StepError> {
    let guarded = AssertUnwindSafe(registry.execute(node, ctx)).catch_unwind();
    match tokio::time::timeout(ctx.deadline, guarded).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(payload)) => Err(StepError::Panicked(panic_message(&*payload))),
        Err(_) => Err(StepError::Timeout(ctx.deadline)),
    }
}

fn join_failure(err: JoinError) -> StepError {
    if err.is_panic() {
        let payload = err.into_panic();
        StepError::Panicked(panic_message(&*payload))
    } else {
        StepError::Failed(err.to_string())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use flowgate_types::execution::StepStatus;
    use flowgate_types::workflow::{Edge, NodeClass};
    use serde_json::json;

    use super::*;
    use crate::execution::executor::NodeExecutor;
    use crate::execution::gate::WRITE_SKIP_REASON;
    use crate::execution::simulated::{DelayExecutor, FnExecutor};
    use crate::graph::NodeClassifier;

    fn ok_registry() -> ExecutorRegistry {
        ExecutorRegistry::new().with_fallback(FnExecutor::new("ok", |node: &Node, _: &StepContext| {
            Ok(json!({ "ran": node.id }))
        }))
    }

    /// Fails nodes whose kind is "bad", succeeds otherwise.
    fn scripted_registry() -> ExecutorRegistry {
        ExecutorRegistry::new().with_fallback(FnExecutor::new(
            "scripted",
            |node: &Node, _: &StepContext| {
                if node.kind == "bad" {
                    Err(StepError::Failed(format!("{} exploded", node.id)))
                } else {
                    Ok(json!(null))
                }
            },
        ))
    }

    fn node(id: &str, kind: &str) -> Node {
        Node::new(id, kind, NodeClass::ReadOnly)
    }

    fn graph(nodes: Vec<Node>, edges: &[(&str, &str)]) -> Arc<GraphModel> {
        let edges = edges
            .iter()
            .enumerate()
            .map(|(i, (s, t))| Edge::new(format!("e{i}"), *s, *t))
            .collect();
        Arc::new(GraphModel::build(nodes, edges))
    }

    async fn events_of(run: ExecutionRun) -> Vec<ExecutionEvent> {
        run.events
            .map(|e| e.unwrap())
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn write_sensitive_step_is_skipped_when_writes_disabled() {
        let doc = json!({
            "nodes": [{"id": "n1"}, {"id": "n2", "nodeClass": "WRITE_SENSITIVE"}],
            "edges": [{"source": "n1", "target": "n2"}]
        });
        let graph = Arc::new(GraphModel::from_value(&doc, &NodeClassifier::default()).unwrap());
        let engine = ExecutionEngine::new(ok_registry());

        let report = engine
            .run_to_completion(graph, ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(
            report.summary,
            ExecutionSummary {
                completed: 1,
                failed: 0,
                skipped: 1,
                pending: 0
            }
        );
        let n2 = &report.steps[1];
        assert_eq!(n2.status, StepStatus::Skipped);
        assert_eq!(n2.result.as_ref().unwrap()["message"], WRITE_SKIP_REASON);
        assert!(n2.start_time.is_some() && n2.end_time.is_some());
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn gated_steps_never_reach_the_executor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let registry = ExecutorRegistry::new().with_fallback(FnExecutor::new(
            "failing",
            move |_: &Node, _: &StepContext| {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(StepError::Failed("boom".into()))
            },
        ));
        let nodes = vec![
            Node::new("w1", "save", NodeClass::WriteSensitive),
            Node::new("r1", "read", NodeClass::ReadOnly),
            Node::new("w2", "delete", NodeClass::WriteSensitive),
        ];
        let report = ExecutionEngine::new(registry)
            .run_to_completion(graph(nodes, &[]), ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(report.steps[0].status, StepStatus::Skipped);
        assert_eq!(report.steps[1].status, StepStatus::Failed);
        assert_eq!(report.steps[2].status, StepStatus::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn write_enabled_runs_write_and_approval_nodes() {
        let nodes = vec![
            Node::new("w1", "save", NodeClass::WriteSensitive),
            Node::new("a1", "publish", NodeClass::ReadOnly).with_approval("ship it"),
        ];
        let report = ExecutionEngine::new(ok_registry())
            .run_to_completion(
                graph(nodes.clone(), &[]),
                ExecutionOptions::default().with_write_enabled(true),
            )
            .await
            .unwrap();
        assert_eq!(report.summary.completed, 2);

        let report = ExecutionEngine::new(ok_registry())
            .run_to_completion(graph(nodes, &[]), ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(report.summary.skipped, 2);
    }

    #[tokio::test]
    async fn events_follow_declaration_order() {
        // Edges point backwards; sequential order ignores them.
        let nodes = vec![node("c", "t"), node("b", "t"), node("a", "t")];
        let engine = ExecutionEngine::new(ok_registry());
        let run = engine
            .execute(graph(nodes, &[("a", "b"), ("b", "c")]), ExecutionOptions::default())
            .unwrap();
        let events = events_of(run).await;

        assert!(matches!(events[0], ExecutionEvent::RunStarted { total_steps: 3, .. }));
        assert!(matches!(events.last(), Some(ExecutionEvent::RunFinished { .. })));

        let transitions: Vec<(String, StepStatus)> = events
            .iter()
            .filter_map(|e| e.step())
            .map(|s| (s.node_id.clone(), s.status))
            .collect();
        let expected: Vec<(String, StepStatus)> = ["c", "b", "a"]
            .iter()
            .flat_map(|id| {
                [
                    (id.to_string(), StepStatus::Running),
                    (id.to_string(), StepStatus::Completed),
                ]
            })
            .collect();
        assert_eq!(transitions, expected);
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_steps() {
        let nodes = vec![node("n1", "ok"), node("n2", "bad"), node("n3", "ok")];
        let report = ExecutionEngine::new(scripted_registry())
            .run_to_completion(graph(nodes, &[]), ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(report.steps[1].status, StepStatus::Failed);
        assert_eq!(report.steps[1].error.as_deref(), Some("n2 exploded"));
        assert_eq!(report.steps[2].status, StepStatus::Completed);
        assert_eq!(report.summary.completed, 2);
        assert_eq!(report.summary.failed, 1);
    }

    #[tokio::test]
    async fn fail_fast_skips_the_rest() {
        let nodes = vec![node("n1", "ok"), node("n2", "bad"), node("n3", "ok"), node("n4", "ok")];
        let report = ExecutionEngine::new(scripted_registry())
            .run_to_completion(
                graph(nodes, &[]),
                ExecutionOptions::default().with_fail_fast(true),
            )
            .await
            .unwrap();

        let statuses: Vec<StepStatus> = report.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                StepStatus::Completed,
                StepStatus::Failed,
                StepStatus::Skipped,
                StepStatus::Skipped
            ]
        );
        assert_eq!(
            report.steps[3].result.as_ref().unwrap()["message"],
            FAIL_FAST_SKIP_REASON
        );
    }

    #[tokio::test]
    async fn missing_executor_fails_the_step() {
        let registry = ExecutorRegistry::new().with("known", DelayExecutor);
        let report = ExecutionEngine::new(registry)
            .run_to_completion(graph(vec![node("n1", "unknown")], &[]), ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert!(report.steps[0].error.as_ref().unwrap().contains("'unknown'"));
    }

    #[tokio::test]
    async fn node_timeout_is_enforced() {
        let mut params = serde_json::Map::new();
        params.insert("seconds".into(), json!(5));
        let slow = Node::new("slow", "delay", NodeClass::Utility)
            .with_params(params)
            .with_timeout_secs(0.05);
        let registry = ExecutorRegistry::new().with("delay", DelayExecutor);

        let started = Instant::now();
        let report = ExecutionEngine::new(registry)
            .run_to_completion(graph(vec![slow], &[]), ExecutionOptions::default())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert!(report.steps[0].error.as_ref().unwrap().contains("timed out"));
    }

    #[test]
    fn deadline_prefers_node_timeout() {
        let default = Duration::from_secs(300);
        let n = node("n", "t");
        assert_eq!(step_deadline(&n, default), default);
        assert_eq!(
            step_deadline(&n.clone().with_timeout_secs(2.5), default),
            Duration::from_millis(2500)
        );
        assert_eq!(step_deadline(&n.clone().with_timeout_secs(0.0), default), default);
        assert_eq!(step_deadline(&n.with_timeout_secs(f64::NAN), default), default);
    }

    #[tokio::test]
    async fn cancel_stops_before_the_next_step() {
        let mut params = serde_json::Map::new();
        params.insert("seconds".into(), json!(0.2));
        let nodes: Vec<Node> = (0..4)
            .map(|i| Node::new(format!("n{i}"), "delay", NodeClass::Utility).with_params(params.clone()))
            .collect();
        let engine = ExecutionEngine::new(ExecutorRegistry::new().with("delay", DelayExecutor));
        let mut run = engine
            .execute(graph(nodes, &[]), ExecutionOptions::default())
            .unwrap();
        let run_id = run.run_id;

        // Wait for the first step to start, then cancel while it is in flight.
        while let Some(event) = run.events.next().await {
            if event.unwrap().step().is_some_and(|s| s.status == StepStatus::Running) {
                break;
            }
        }
        engine.cancel(run_id).unwrap();

        let report = run.collect().await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.steps[0].status, StepStatus::Completed);
        assert_eq!(report.summary.pending, 3);
        assert_eq!(engine.summary(run_id).unwrap().pending, 3);
    }

    #[tokio::test]
    async fn steps_and_reset() {
        let engine = ExecutionEngine::new(ok_registry());
        assert!(engine.steps(Uuid::now_v7()).is_none());
        assert_eq!(
            engine.cancel(Uuid::nil()),
            Err(EngineError::RunNotFound(Uuid::nil()))
        );

        let report = engine
            .run_to_completion(graph(vec![node("n1", "t")], &[]), ExecutionOptions::default())
            .await
            .unwrap();
        let steps = engine.steps(report.run_id).unwrap();
        assert_eq!(steps, report.steps);

        assert!(engine.reset(report.run_id));
        assert!(engine.steps(report.run_id).is_none());
        assert!(!engine.reset(report.run_id));
    }

    #[tokio::test]
    async fn runs_are_isolated() {
        let engine = ExecutionEngine::new(ok_registry());
        let g = graph(vec![node("n1", "t"), node("n2", "t")], &[]);
        let a = engine.run_to_completion(Arc::clone(&g), ExecutionOptions::default());
        let b = engine.run_to_completion(g, ExecutionOptions::default());
        let (a, b) = tokio::join!(a, b);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.run_id, b.run_id);
        assert!(a.steps.iter().all(|s| s.run_id == a.run_id));
        assert!(b.steps.iter().all(|s| s.run_id == b.run_id));
    }

    #[tokio::test]
    async fn completion_hook_runs_after_the_summary() {
        let bus = EventBus::default();
        let published = Mutex::new(bus.subscribe());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = ExecutionEngine::new(ok_registry())
            .with_event_bus(bus)
            .with_completion_hook(move |run_id, steps| {
                let done = steps.iter().filter(|s| s.status.is_terminal()).count();
                let mut published = published.lock().unwrap();
                let mut summary_seen = false;
                while let Ok(event) = published.try_recv() {
                    summary_seen |= matches!(event, ExecutionEvent::RunFinished { .. });
                }
                let _ = tx.send((run_id, done, summary_seen));
            });

        let report = engine
            .run_to_completion(graph(vec![node("a", "t"), node("b", "t")], &[]), ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some((report.run_id, 2, true)));
        assert!(rx.try_recv().is_err());
    }

    // -----------------------------------------------------------------------
    // Panicking executors
    // -----------------------------------------------------------------------

    /// Panics on node "n2", succeeds otherwise.
    fn panicking_registry() -> ExecutorRegistry {
        ExecutorRegistry::new().with_fallback(FnExecutor::new(
            "panicking",
            |node: &Node, _: &StepContext| {
                if node.id == "n2" {
                    panic!("{} blew up", node.id);
                }
                Ok(json!(null))
            },
        ))
    }

    async fn assert_panic_fails_only_its_step(options: ExecutionOptions) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = ExecutionEngine::new(panicking_registry()).with_completion_hook(move |run_id, _| {
            let _ = tx.send(run_id);
        });
        let nodes = vec![node("n1", "t"), node("n2", "t"), node("n3", "t")];

        // collect() only succeeds once RunFinished arrives.
        let report = engine
            .run_to_completion(graph(nodes, &[]), options)
            .await
            .unwrap();

        let statuses: Vec<StepStatus> = report.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Completed, StepStatus::Failed, StepStatus::Completed]
        );
        assert_eq!(
            report.steps[1].error.as_deref(),
            Some("executor panicked: n2 blew up")
        );
        assert!(report.steps[1].end_time.is_some());
        assert_eq!(report.summary.failed, 1);
        assert_eq!(rx.recv().await, Some(report.run_id));
        assert_eq!(engine.steps(report.run_id).unwrap(), report.steps);
    }

    #[tokio::test]
    async fn sequential_panic_fails_only_its_step() {
        assert_panic_fails_only_its_step(ExecutionOptions::default()).await;
    }

    #[tokio::test]
    async fn parallel_panic_fails_only_its_step() {
        assert_panic_fails_only_its_step(ExecutionOptions::default().parallel(3)).await;
    }

    #[test]
    fn join_failure_keeps_the_panic_message() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = rt
            .block_on(async { tokio::spawn(async { panic!("task blew up") }).await })
            .unwrap_err();
        assert_eq!(
            join_failure(err),
            StepError::Panicked("task blew up".to_string())
        );
    }

    // -----------------------------------------------------------------------
    // Run retention
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn finished_runs_are_evicted_oldest_first() {
        let engine = ExecutionEngine::new(ok_registry()).with_max_retained_runs(3);
        let g = graph(vec![node("n1", "t")], &[]);

        let mut run_ids = Vec::new();
        for _ in 0..10 {
            let report = engine
                .run_to_completion(Arc::clone(&g), ExecutionOptions::default())
                .await
                .unwrap();
            run_ids.push(report.run_id);
        }

        assert_eq!(engine.runs.len(), 3);
        assert!(engine.cancellation_tokens.is_empty());
        assert!(run_ids[..7].iter().all(|id| engine.steps(*id).is_none()));
        assert!(run_ids[7..].iter().all(|id| engine.steps(*id).is_some()));

        // Finished: cancelling is a no-op. Evicted: unknown.
        assert_eq!(engine.cancel(run_ids[9]), Ok(()));
        assert_eq!(
            engine.cancel(run_ids[0]),
            Err(EngineError::RunNotFound(run_ids[0]))
        );
    }

    #[tokio::test]
    async fn in_flight_runs_are_never_evicted() {
        let mut params = serde_json::Map::new();
        params.insert("seconds".into(), json!(0.2));
        let registry = ExecutorRegistry::new()
            .with("delay", DelayExecutor)
            .with_fallback(FnExecutor::new("ok", |_: &Node, _: &StepContext| Ok(json!(null))));
        let engine = ExecutionEngine::new(registry).with_max_retained_runs(1);

        let slow = Node::new("slow", "delay", NodeClass::Utility).with_params(params);
        let long = engine
            .execute(graph(vec![slow], &[]), ExecutionOptions::default())
            .unwrap();
        for _ in 0..3 {
            engine
                .run_to_completion(graph(vec![node("n1", "t")], &[]), ExecutionOptions::default())
                .await
                .unwrap();
        }
        assert!(engine.steps(long.run_id).is_some());
        assert_eq!(engine.runs.len(), 2);

        let long_id = long.run_id;
        let report = long.collect().await.unwrap();
        assert_eq!(report.summary.completed, 1);
        assert!(engine.steps(long_id).is_some());
        assert_eq!(engine.runs.len(), 1);
    }

    #[tokio::test]
    async fn bus_subscribers_see_the_same_events() {
        let engine = ExecutionEngine::new(ok_registry());
        let mut rx = engine.event_bus().subscribe();
        let run = engine
            .execute(graph(vec![node("a", "t")], &[]), ExecutionOptions::default())
            .unwrap();
        let streamed = events_of(run).await;

        let mut published = Vec::new();
        while let Ok(event) = rx.try_recv() {
            published.push(event);
        }
        assert_eq!(published, streamed);
        assert_eq!(streamed.len(), 4);
    }

    // -----------------------------------------------------------------------
    // Parallel mode
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    struct GaugedExecutor(Arc<Gauge>);

    impl NodeExecutor for GaugedExecutor {
        fn name(&self) -> &str {
            "gauged"
        }

        async fn execute(&self, _node: &Node, _ctx: &StepContext) -> Result<Value, StepError> {
            let now = self.0.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.0.current.fetch_sub(1, Ordering::SeqCst);
            Ok(json!(null))
        }
    }

    #[tokio::test]
    async fn parallel_respects_worker_bound() {
        let gauge = Arc::new(Gauge::default());
        let registry = ExecutorRegistry::new().with_fallback(GaugedExecutor(Arc::clone(&gauge)));
        let nodes = (0..6).map(|i| node(&format!("n{i}"), "t")).collect();

        let report = ExecutionEngine::new(registry)
            .run_to_completion(graph(nodes, &[]), ExecutionOptions::default().parallel(2))
            .await
            .unwrap();

        assert_eq!(report.summary.completed, 6);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn parallel_waits_for_dependencies() {
        let nodes = vec![node("a", "t"), node("b", "t"), node("c", "t"), node("d", "t")];
        let edges = [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")];
        let run = ExecutionEngine::new(ok_registry())
            .execute(graph(nodes, &edges), ExecutionOptions::default().parallel(4))
            .unwrap();
        let events = events_of(run).await;

        let position = |id: &str, status: StepStatus| {
            events
                .iter()
                .position(|e| e.step().is_some_and(|s| s.node_id == id && s.status == status))
                .unwrap()
        };
        let d_start = position("d", StepStatus::Running);
        assert!(position("b", StepStatus::Completed) < d_start);
        assert!(position("c", StepStatus::Completed) < d_start);
        assert!(position("a", StepStatus::Completed) < position("b", StepStatus::Running));
        // Within a wave, steps start in declaration order.
        assert!(position("b", StepStatus::Running) < position("c", StepStatus::Running));
    }

    #[tokio::test]
    async fn parallel_rejects_cycles_before_starting() {
        let engine = ExecutionEngine::new(ok_registry());
        let g = graph(vec![node("a", "t"), node("b", "t")], &[("a", "b"), ("b", "a")]);
        let err = engine
            .execute(g, ExecutionOptions::default().parallel(2))
            .unwrap_err();
        assert!(matches!(err, EngineError::CyclicGraph(_)));
        assert!(format!("{engine:?}").contains("runs: 0"));
    }

    #[tokio::test]
    async fn parallel_gates_writes_and_fails_fast() {
        let nodes = vec![
            node("a", "bad"),
            Node::new("w", "save", NodeClass::WriteSensitive),
            node("b", "ok"),
        ];
        let report = ExecutionEngine::new(scripted_registry())
            .run_to_completion(
                graph(nodes, &[("a", "b")]),
                ExecutionOptions::default().parallel(1).with_fail_fast(true),
            )
            .await
            .unwrap();
        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert_eq!(report.steps[1].status, StepStatus::Skipped);
        assert_eq!(
            report.steps[1].result.as_ref().unwrap()["message"],
            WRITE_SKIP_REASON
        );
        assert_eq!(
            report.steps[2].result.as_ref().unwrap()["message"],
            FAIL_FAST_SKIP_REASON
        );
    }
}
