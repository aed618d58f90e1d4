//! Workflow pipeline service.
//!
//! Ties the pieces together the way a caller uses them: parse a document,
//! validate it, lay it out, fingerprint it and run it. Validation errors
//! block execution; warnings and info do not.

use std::sync::Arc;

use flowgate_types::config::EngineConfig;
use flowgate_types::error::MalformedInputError;
use flowgate_types::validation::ValidationResult;
use serde_json::Value;

use crate::execution::{EngineError, ExecutionEngine, ExecutionOptions, ExecutorRegistry, ExecutionRun};
use crate::graph::{GraphModel, NodeClassifier};
use crate::integrity::{self, IntegrityHasher};
use crate::layout::{LayeredLayoutEngine, Layout};
use crate::validator::WorkflowValidator;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("malformed workflow document: {0}")]
    Malformed(#[from] MalformedInputError),

    #[error("workflow blocked by {} validation error(s)", .0.errors.len())]
    Blocked(Box<ValidationResult>),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Service orchestrating the document-to-run pipeline.
///
/// Generic over the integrity hasher so flowgate-core never depends on a
/// hashing crate.
pub struct WorkflowService<H: IntegrityHasher> {
    classifier: NodeClassifier,
    validator: WorkflowValidator,
    layout: LayeredLayoutEngine,
    engine: ExecutionEngine,
    hasher: H,
}

impl<H: IntegrityHasher> WorkflowService<H> {
    /// Build the pipeline from configuration and the executors to run with.
    pub fn new(config: &EngineConfig, registry: ExecutorRegistry, hasher: H) -> Self {
        Self {
            classifier: NodeClassifier::new(config.classification.clone()),
            validator: WorkflowValidator::new(),
            layout: LayeredLayoutEngine::new(config.layout.clone()),
            engine: ExecutionEngine::new(registry),
            hasher,
        }
    }

    /// Replace the engine, e.g. to attach a completion hook or a shared bus.
    pub fn with_engine(mut self, engine: ExecutionEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn classifier(&self) -> &NodeClassifier {
        &self.classifier
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn validate(&self, document: &Value, schema: Option<&Value>) -> ValidationResult {
        self.validator.validate(document, schema)
    }

    pub fn load(&self, document: &Value) -> Result<GraphModel, ServiceError> {
        Ok(GraphModel::from_value(document, &self.classifier)?)
    }

    pub fn layout(&self, document: &Value) -> Result<Layout, ServiceError> {
        let graph = self.load(document)?;
        Ok(self.layout.layout(&graph))
    }

    /// 12-character integrity id over the document's nodes and edges.
    pub fn fingerprint(&self, document: &Value) -> Result<String, ServiceError> {
        Ok(integrity::integrity_id(document, &self.hasher)?)
    }

    /// Validate, then start a run.
    ///
    /// Returns `Blocked` with the full result when validation reports any
    /// error; nothing is executed in that case.
    pub fn execute(
        &self,
        document: &Value,
        schema: Option<&Value>,
        options: ExecutionOptions,
    ) -> Result<ExecutionRun, ServiceError> {
        let validation = self.validate(document, schema);
        if !validation.is_valid {
            tracing::warn!(
                errors = validation.errors.len(),
                "workflow failed validation; not executing"
            );
            return Err(ServiceError::Blocked(Box::new(validation)));
        }
        if !validation.warnings.is_empty() {
            tracing::info!(
                warnings = validation.warnings.len(),
                "executing workflow with validation warnings"
            );
        }

        let graph = Arc::new(self.load(document)?);
        Ok(self.engine.execute(graph, options)?)
    }
}
