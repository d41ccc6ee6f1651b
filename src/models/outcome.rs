use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

use crate::models::{Category, QualityTier, Stage};

/// Counters describing how much work a run consumed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub refinement_count: u32,
    /// Repairs consumed since the last reset
    pub repair_attempts: u32,
    pub reset_count: u32,
    /// Generate-plus-execute cycles across all resets
    pub generation_cycles: u32,
}

/// Why a run ended without a render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The classifier declined the request
    Infeasible,
    /// Repair and reset budgets were used up
    Exhausted,
    /// A collaborator failed in a way that is not retried
    Fatal,
    /// The run-level wall-clock budget expired
    TimedOut,
    /// The caller cancelled the run
    Cancelled,
}

/// Successful terminal result
#[derive(Debug, Clone, Serialize)]
pub struct RenderSuccess {
    pub run_id: String,
    /// Stored copy reported by the publisher
    pub artifact_location: PathBuf,
    /// Retrievable link returned by the publisher
    pub link: String,
    pub generated_code: String,
    pub description: String,
    pub quality: QualityTier,
    pub chat_label: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(flatten)]
    pub counters: RunCounters,
}

/// Failed terminal result, with whatever partial context the run produced
#[derive(Debug, Clone, Serialize)]
pub struct RenderFailure {
    pub run_id: String,
    pub kind: FailureKind,
    /// Most specific error text available
    pub reason: String,
    pub failed_stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(flatten)]
    pub counters: RunCounters,
}

impl RenderFailure {
    pub fn new(run_id: impl Into<String>, kind: FailureKind, stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            kind,
            reason: reason.into(),
            failed_stage: stage,
            chat_label: None,
            description: None,
            generated_code: None,
            conversation_id: None,
            counters: RunCounters::default(),
        }
    }
}

/// Terminal result of one pipeline run
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Success(RenderSuccess),
    Failure(RenderFailure),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    pub fn run_id(&self) -> &str {
        match self {
            PipelineOutcome::Success(s) => &s.run_id,
            PipelineOutcome::Failure(f) => &f.run_id,
        }
    }

    pub fn counters(&self) -> RunCounters {
        match self {
            PipelineOutcome::Success(s) => s.counters,
            PipelineOutcome::Failure(f) => f.counters,
        }
    }

    /// The failed stage, if the run failed
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::Failure(f) => Some(f.failed_stage),
        }
    }

    pub fn as_success(&self) -> Option<&RenderSuccess> {
        match self {
            PipelineOutcome::Success(s) => Some(s),
            PipelineOutcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&RenderFailure> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::Failure(f) => Some(f),
        }
    }
}

#[derive(Serialize)]
struct Flagged<'a, T: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: &'a T,
}

impl Serialize for PipelineOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PipelineOutcome::Success(body) => Flagged { success: true, body }.serialize(serializer),
            PipelineOutcome::Failure(body) => Flagged { success: false, body }.serialize(serializer),
        }
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineOutcome::Success(s) => {
                writeln!(f, "Render succeeded: {}", s.chat_label)?;
                writeln!(f, "  Link:        {}", s.link)?;
                writeln!(f, "  Quality:     {}", s.quality)?;
                writeln!(f, "  Refinements: {}", s.counters.refinement_count)?;
                writeln!(f, "  Repairs:     {}", s.counters.repair_attempts)?;
                write!(f, "  Resets:      {}", s.counters.reset_count)
            }
            PipelineOutcome::Failure(fail) => {
                writeln!(f, "Render failed at stage '{}'", fail.failed_stage)?;
                write!(f, "  Reason: {}", fail.reason)?;
                if let Some(desc) = &fail.description {
                    let preview: String = desc.chars().take(120).collect();
                    write!(f, "\n  Description: {}", preview)?;
                }
                Ok(())
            }
        }
    }
}
