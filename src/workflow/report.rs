//! Per-run record of every step and its outcome

use super::procedure::Procedure;
use crate::error::{HarvesterError, HarvesterResult};
use crate::tx::TxOutcome;

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub message: String,
}

/// Summary logged as JSON when a run ends
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub dry_run: bool,
    pub procedure: Option<Procedure>,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: run_id.into(),
            dry_run,
            procedure: None,
            steps: Vec::new(),
        }
    }

    /// Record a transaction step
    pub fn record(&mut self, step: &str, outcome: &TxOutcome) {
        self.note(step, outcome.message());
    }

    /// Record a step that produced no transaction
    pub fn note(&mut self, step: &str, message: impl Into<String>) {
        let message = message.into();
        info!("{}: {}", step, message);
        self.steps.push(StepRecord {
            step: step.to_string(),
            message,
        });
    }

    pub fn to_json(&self) -> HarvesterResult<String> {
        serde_json::to_string(self)
            .map_err(|e| HarvesterError::Internal(format!("Failed to serialize run report: {}", e)))
    }
}
