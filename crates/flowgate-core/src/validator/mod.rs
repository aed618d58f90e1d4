//! Two-tier workflow validator.
//!
//! - `basic` -- presence, orphan and graph-integrity rules; always available
//! - `schema` -- identifier patterns, limits and policy notes; active only
//!   when a schema document is supplied
//!
//! Validation never fails. A document that is not even shape-valid yields a
//! result holding a single error; a schema that cannot be applied degrades
//! to the basic tier.

pub mod basic;
pub mod schema;

use flowgate_types::validation::ValidationResult;
use serde_json::Value;

use crate::graph::document::collections;

pub use schema::{SchemaProcessingError, SchemaRules};

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowValidator;

impl WorkflowValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `document`, applying schema rules when `schema` is given.
    pub fn validate(&self, document: &Value, schema: Option<&Value>) -> ValidationResult {
        match schema {
            None => self.validate_basic(document),
            Some(schema) => match self.validate_with_schema(document, schema) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, "schema validation unavailable, using basic rules");
                    self.validate_basic(document)
                }
            },
        }
    }

    pub fn validate_basic(&self, document: &Value) -> ValidationResult {
        let (nodes, edges) = match collections(document) {
            Ok(c) => c,
            Err(e) => return ValidationResult::single_error(e.path(), e.to_string()),
        };

        let mut issues = basic::basic_issues(nodes, edges);
        issues.extend(basic::graph_issues(document));
        let result = ValidationResult::from_issues(issues, None);
        log_result(&result);
        result
    }

    /// Schema tier only. Callers normally go through [`validate`](Self::validate),
    /// which falls back to the basic tier on error.
    pub fn validate_with_schema(
        &self,
        document: &Value,
        schema: &Value,
    ) -> Result<ValidationResult, SchemaProcessingError> {
        let rules = SchemaRules::from_schema(schema)?;
        let (nodes, edges) = match collections(document) {
            Ok(c) => c,
            Err(e) => return Ok(ValidationResult::single_error(e.path(), e.to_string())),
        };

        let mut issues = rules.issues(document, nodes, edges);
        issues.extend(basic::graph_issues(document));
        let result = ValidationResult::from_issues(issues, Some(rules.version.clone()));
        log_result(&result);
        Ok(result)
    }
}

fn log_result(result: &ValidationResult) {
    tracing::debug!(
        is_valid = result.is_valid,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        info = result.info.len(),
        schema_version = result.schema_version.as_deref().unwrap_or("none"),
        "workflow validated"
    );
}
