use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Stage;

/// Lifecycle status of a pipeline run as seen by observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run is in progress
    Running,
    /// The render was produced and published
    Succeeded,
    /// The run ended without a render
    Failed,
    /// The classifier declined the request
    Infeasible,
}

impl RunStatus {
    /// Check if this status indicates the run is finished
    pub fn is_complete(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Entry in the run status file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatusEntry {
    /// Run identifier
    pub id: String,
    /// The request text
    pub query: String,
    pub status: RunStatus,
    /// Last stage reported
    pub stage: Stage,
    /// Last reported completion percentage
    pub percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// When the run started
    pub created_at: DateTime<Utc>,
    /// When the entry was last updated
    pub updated_at: DateTime<Utc>,
    /// Failure reason if the run did not succeed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Link returned by the publisher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl RunStatusEntry {
    /// Create a new entry in Running status
    pub fn new(id: String, query: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            query,
            status: RunStatus::Running,
            stage: Stage::Initializing,
            percent: 0,
            detail: None,
            created_at: now,
            updated_at: now,
            error: None,
            link: None,
        }
    }

    /// Record a progress update
    pub fn update_progress(&mut self, stage: Stage, percent: u8, detail: Option<String>) {
        self.stage = stage;
        self.percent = self.percent.max(percent);
        self.detail = detail;
        self.updated_at = Utc::now();
    }

    /// Mark the run as succeeded
    pub fn set_succeeded(&mut self, link: String) {
        self.status = RunStatus::Succeeded;
        self.stage = Stage::Completed;
        self.percent = 100;
        self.link = Some(link);
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Mark the run as failed (or infeasible) with a reason
    pub fn set_failed(&mut self, status: RunStatus, error: String) {
        self.status = status;
        self.stage = Stage::Failed;
        self.percent = 100;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }
}
