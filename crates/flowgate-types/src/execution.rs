//! Execution tracking types.
//!
//! Each node gets one [`ExecutionStep`] per run. Steps follow a strict state
//! machine:
//!
//! ```text
//! pending -> running -> { completed | failed | skipped }
//! ```
//!
//! Terminal states are final for that run. Steps never mutate the node they
//! describe; they only carry a copy of its identifying fields.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StepTransitionError;
use crate::workflow::{Node, NodeClass};

// ---------------------------------------------------------------------------
// Step status
// ---------------------------------------------------------------------------

/// Lifecycle state of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// `completed`, `failed` and `skipped` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }

    /// Whether `self -> next` is an edge of the step state machine.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Running, StepStatus::Completed)
                | (StepStatus::Running, StepStatus::Failed)
                | (StepStatus::Running, StepStatus::Skipped)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Execution step
// ---------------------------------------------------------------------------

/// Runtime record for one node in one execution run.
///
/// Owned by the engine driving the run. Observers only ever see clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Run this step belongs to.
    pub run_id: Uuid,
    /// Position of the node in declaration order.
    pub index: usize,
    pub node_id: String,
    pub node_label: String,
    pub node_class: NodeClass,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Wall time between `start_time` and `end_time`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStep {
    /// Fresh pending step for `node`.
    pub fn pending(run_id: Uuid, index: usize, node: &Node) -> Self {
        Self {
            run_id,
            index,
            node_id: node.id.clone(),
            node_label: node.display_name().to_string(),
            node_class: node.node_class,
            status: StepStatus::Pending,
            start_time: None,
            end_time: None,
            duration_ms: None,
            result: None,
            error: None,
        }
    }

    /// `pending -> running`, stamping `start_time`.
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), StepTransitionError> {
        self.transition(StepStatus::Running)?;
        self.start_time = Some(at);
        Ok(())
    }

    /// `running -> completed` with the action's result.
    pub fn complete(&mut self, result: Value, at: DateTime<Utc>) -> Result<(), StepTransitionError> {
        self.transition(StepStatus::Completed)?;
        self.result = Some(result);
        self.finish(at);
        Ok(())
    }

    /// `running -> failed` with the action's error message.
    pub fn fail(&mut self, error: impl Into<String>, at: DateTime<Utc>) -> Result<(), StepTransitionError> {
        self.transition(StepStatus::Failed)?;
        self.error = Some(error.into());
        self.finish(at);
        Ok(())
    }

    /// `running -> skipped`; the reason is recorded as the step result.
    pub fn skip(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Result<(), StepTransitionError> {
        self.transition(StepStatus::Skipped)?;
        self.result = Some(serde_json::json!({ "message": reason.into() }));
        self.finish(at);
        Ok(())
    }

    fn transition(&mut self, next: StepStatus) -> Result<(), StepTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StepTransitionError {
                node_id: self.node_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn finish(&mut self, at: DateTime<Utc>) {
        self.end_time = Some(at);
        self.duration_ms = self
            .start_time
            .map(|start| (at - start).num_milliseconds().max(0) as u64);
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Aggregate counts over the steps of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
}

impl ExecutionSummary {
    /// Count steps by status. Steps still `running` are not counted.
    pub fn from_steps(steps: &[ExecutionStep]) -> Self {
        steps.iter().fold(Self::default(), |mut acc, step| {
            match step.status {
                StepStatus::Completed => acc.completed += 1,
                StepStatus::Failed => acc.failed += 1,
                StepStatus::Skipped => acc.skipped += 1,
                StepStatus::Pending => acc.pending += 1,
                StepStatus::Running => {}
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.completed + self.failed + self.skipped + self.pending
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} completed, {} failed, {} skipped, {} pending",
            self.completed, self.failed, self.skipped, self.pending
        )
    }
}
