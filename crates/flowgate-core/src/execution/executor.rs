//! Node executor port and kind-keyed dispatch.
//!
//! Follows the same blanket-impl pattern as the other boxed ports:
//! 1. `NodeExecutor` uses native async fn in traits (RPITIT)
//! 2. Object-safe `NodeExecutorDyn` with boxed futures, blanket-implemented
//!    for every `NodeExecutor`
//! 3. `BoxNodeExecutor` wraps `Box<dyn NodeExecutorDyn>` and delegates
//!
//! `ExecutorRegistry` maps `node.kind` to a `BoxNodeExecutor`, with an
//! optional fallback for kinds nobody registered.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use flowgate_types::workflow::Node;
use serde_json::Value;
use uuid::Uuid;

/// Why a single node's action failed. Recorded on the step, never
/// propagated past the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("step timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("no executor registered for kind '{0}'")]
    NoExecutor(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The executor rejected the node before running it.
    #[error("{}", .0.join("; "))]
    Rejected(Vec<String>),

    #[error("executor panicked: {0}")]
    Panicked(String),
}

/// What an executor knows about the run it is part of.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub run_id: Uuid,
    pub write_enabled: bool,
    /// Deadline the engine enforces around this step.
    pub deadline: Duration,
}

// ---------------------------------------------------------------------------
// NodeExecutor
// ---------------------------------------------------------------------------

/// Performs the action behind a node.
///
/// Implementations must not assume they are the only action in flight; the
/// parallel executor runs several at once.
pub trait NodeExecutor: Send + Sync {
    /// Short name used in logs (e.g. "simulated", "delay").
    fn name(&self) -> &str;

    /// Check the node's params before dispatch. Any message fails the step
    /// without running `execute`.
    fn validate(&self, _node: &Node) -> Vec<String> {
        Vec::new()
    }

    fn execute(
        &self,
        node: &Node,
        ctx: &StepContext,
    ) -> impl Future<Output = Result<Value, StepError>> + Send;
}

/// Object-safe version of [`NodeExecutor`] with boxed futures.
pub trait NodeExecutorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, node: &Node) -> Vec<String>;

    fn execute_boxed<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a StepContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, StepError>> + Send + 'a>>;
}

impl<T: NodeExecutor> NodeExecutorDyn for T {
    fn name(&self) -> &str {
        NodeExecutor::name(self)
    }

    fn validate(&self, node: &Node) -> Vec<String> {
        NodeExecutor::validate(self, node)
    }

    fn execute_boxed<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a StepContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, StepError>> + Send + 'a>> {
        Box::pin(self.execute(node, ctx))
    }
}

/// Type-erased executor for runtime registration.
pub struct BoxNodeExecutor {
    inner: Box<dyn NodeExecutorDyn + Send + Sync>,
}

impl BoxNodeExecutor {
    pub fn new<T: NodeExecutor + 'static>(executor: T) -> Self {
        Self {
            inner: Box::new(executor),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn validate(&self, node: &Node) -> Vec<String> {
        self.inner.validate(node)
    }

    pub async fn execute(&self, node: &Node, ctx: &StepContext) -> Result<Value, StepError> {
        self.inner.execute_boxed(node, ctx).await
    }
}

impl std::fmt::Debug for BoxNodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxNodeExecutor")
            .field("name", &self.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Strategy table from node kind to executor.
#[derive(Debug, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, BoxNodeExecutor>,
    fallback: Option<BoxNodeExecutor>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` for `kind`, replacing any previous one.
    pub fn register<T: NodeExecutor + 'static>(&mut self, kind: impl Into<String>, executor: T) {
        self.executors
            .insert(kind.into(), BoxNodeExecutor::new(executor));
    }

    pub fn with<T: NodeExecutor + 'static>(mut self, kind: impl Into<String>, executor: T) -> Self {
        self.register(kind, executor);
        self
    }

    /// Executor for kinds without their own registration.
    pub fn with_fallback<T: NodeExecutor + 'static>(mut self, executor: T) -> Self {
        self.fallback = Some(BoxNodeExecutor::new(executor));
        self
    }

    pub fn resolve(&self, kind: &str) -> Option<&BoxNodeExecutor> {
        self.executors.get(kind).or(self.fallback.as_ref())
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Validate, then run the executor for `node.kind`. A missing executor
    /// or a rejected node is a step error.
    pub async fn execute(&self, node: &Node, ctx: &StepContext) -> Result<Value, StepError> {
        match self.resolve(&node.kind) {
            Some(executor) => {
                tracing::trace!(
                    node_id = node.id.as_str(),
                    executor = executor.name(),
                    "dispatching step"
                );
                let problems = executor.validate(node);
                if !problems.is_empty() {
                    return Err(StepError::Rejected(problems));
                }
                executor.execute(node, ctx).await
            }
            None => Err(StepError::NoExecutor(node.kind.clone())),
        }
    }
}
