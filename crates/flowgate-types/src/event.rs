//! Execution events.
//!
//! `ExecutionEvent` is what the engine emits while driving a run: one event
//! per step transition, bracketed by run start and run end. All variants are
//! `Clone + Send + Sync` so they can travel over a tokio broadcast channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::execution::{ExecutionStep, ExecutionSummary};

/// Events emitted during a workflow execution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A run has been created; every step is pending.
    RunStarted {
        run_id: Uuid,
        total_steps: usize,
        write_enabled: bool,
        /// `sequential` or `parallel`.
        mode: String,
    },

    /// A step changed state. Carries a snapshot of the step after the change.
    StepUpdated { run_id: Uuid, step: ExecutionStep },

    /// Cancellation was observed; `remaining` steps were never started.
    RunCancelled { run_id: Uuid, remaining: usize },

    /// The run is over. Always the last event of a run.
    RunFinished {
        run_id: Uuid,
        summary: ExecutionSummary,
        duration_ms: u64,
    },
}

impl ExecutionEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            ExecutionEvent::RunStarted { run_id, .. }
            | ExecutionEvent::StepUpdated { run_id, .. }
            | ExecutionEvent::RunCancelled { run_id, .. }
            | ExecutionEvent::RunFinished { run_id, .. } => *run_id,
        }
    }

    /// The step snapshot, for `StepUpdated`.
    pub fn step(&self) -> Option<&ExecutionStep> {
        match self {
            ExecutionEvent::StepUpdated { step, .. } => Some(step),
            _ => None,
        }
    }
}
