use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage, used for progress reporting and to name the stage a run failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initializing,
    Feasibility,
    Description,
    CodeGeneration,
    CodeValidation,
    Repair,
    Reset,
    Render,
    Publish,
    Completed,
    Failed,
}

impl Stage {
    /// Label shown to observers
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing",
            Stage::Feasibility => "Checking Feasibility",
            Stage::Description => "Generating Description",
            Stage::CodeGeneration => "Generating Code",
            Stage::CodeValidation => "Checking Code",
            Stage::Repair => "Repairing Code",
            Stage::Reset => "Starting Over",
            Stage::Render => "Rendering",
            Stage::Publish => "Publishing",
            Stage::Completed => "Completed",
            Stage::Failed => "Failed",
        }
    }

    /// Nominal completion percentage when the stage is entered
    pub fn nominal_percent(&self) -> u8 {
        match self {
            Stage::Initializing => 10,
            Stage::Feasibility => 20,
            Stage::Description => 30,
            Stage::CodeGeneration => 50,
            Stage::CodeValidation => 55,
            Stage::Repair => 60,
            Stage::Reset => 60,
            Stage::Render => 70,
            Stage::Publish => 90,
            Stage::Completed | Stage::Failed => 100,
        }
    }

    /// Stable snake_case identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initializing => "initializing",
            Stage::Feasibility => "feasibility",
            Stage::Description => "description",
            Stage::CodeGeneration => "code_generation",
            Stage::CodeValidation => "code_validation",
            Stage::Repair => "repair",
            Stage::Reset => "reset",
            Stage::Render => "render",
            Stage::Publish => "publish",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress notification for an external observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: String,
    pub stage: Stage,
    /// Never decreases within one run
    pub percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_percent_ordering() {
        let forward = [
            Stage::Initializing,
            Stage::Feasibility,
            Stage::Description,
            Stage::CodeGeneration,
            Stage::CodeValidation,
            Stage::Render,
            Stage::Publish,
            Stage::Completed,
        ];
        for pair in forward.windows(2) {
            assert!(pair[0].nominal_percent() <= pair[1].nominal_percent());
        }
    }

    #[test]
    fn test_stage_serialization_matches_as_str() {
        for stage in [Stage::Feasibility, Stage::CodeValidation, Stage::Render] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
        }
    }

    #[test]
    fn test_terminal_stages() {
        assert!(Stage::Completed.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Render.is_terminal());
    }
}
