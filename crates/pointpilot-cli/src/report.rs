//! JSON results printed on stdout.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pointpilot_core::error::ApiError;
use pointpilot_core::geometry::Point;
use pointpilot_core::script::Step;
use pointpilot_core::sequencer::StepOutcome;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// 1-based position in the script.
    pub index: usize,
    pub action: String,
    pub status: StepStatus,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// Summary of one script run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: String,
    pub port: String,
    pub steps: Vec<StepReport>,
    /// Every step ran and succeeded.
    pub completed: bool,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(port: &str) -> Self {
        Self::starting_at(port, Utc::now())
    }

    fn starting_at(port: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: started_at.to_rfc3339(),
            port: port.to_string(),
            steps: Vec::new(),
            completed: false,
            cancelled: false,
        }
    }

    /// Record a step outcome. Returns true if the run should continue.
    pub fn record(&mut self, step: &Step, outcome: StepOutcome, elapsed: Duration) -> bool {
        let status = match outcome {
            StepOutcome::Done => StepStatus::Done,
            StepOutcome::Cancelled => StepStatus::Cancelled,
            _ => StepStatus::Failed,
        };
        self.steps.push(StepReport {
            index: self.steps.len() + 1,
            action: step.action().to_string(),
            status,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            error: outcome.into_error(),
        });
        if status == StepStatus::Cancelled {
            self.cancelled = true;
        }
        status == StepStatus::Done
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Set `completed` once the run has stopped.
    pub fn finish(mut self, total_steps: usize) -> Self {
        self.completed = !self.cancelled
            && self.steps.len() == total_steps
            && self.steps.iter().all(|s| s.status == StepStatus::Done);
        self
    }
}

/// Result of the `locate` command.
#[derive(Debug, Clone, Serialize)]
pub struct LocateReport {
    pub template: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}
