//! Description refinement loop
//!
//! `Generate -> Validate -> {Accept, Refine}`, with `Refine -> Validate`. The loop
//! force-accepts the current description once the refinement budget is spent.

use tracing::{debug, info, warn};

use crate::core::llm::CompletionGateway;
use crate::core::parser::{non_empty, DescriptionDraft, DescriptionVerdict};
use crate::core::progress::ProgressReporter;
use crate::core::prompts;
use crate::error::LlmError;
use crate::models::{Acceptance, DescriptionState, Stage};

/// Steps of the refinement loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionStep {
    Generate,
    Validate,
    Refine,
    Accept(Acceptance),
}

/// Bounded generate/validate/refine driver
pub struct DescriptionLoop<'a> {
    gateway: &'a CompletionGateway,
    max_refinements: u32,
}

impl<'a> DescriptionLoop<'a> {
    pub fn new(gateway: &'a CompletionGateway, max_refinements: u32) -> Self {
        Self {
            gateway,
            max_refinements,
        }
    }

    /// Routing rule evaluated right after a verdict
    pub fn route(&self, state: &DescriptionState) -> DescriptionStep {
        if state.is_accepted == Some(true) {
            DescriptionStep::Accept(Acceptance::Validated)
        } else if state.refinement_count >= self.max_refinements {
            DescriptionStep::Accept(Acceptance::Forced)
        } else {
            DescriptionStep::Refine
        }
    }

    /// Drive `state` to acceptance
    ///
    /// The state is updated in place so the caller keeps the latest description
    /// when a call fails.
    pub async fn run(
        &self,
        state: &mut DescriptionState,
        reporter: &ProgressReporter,
    ) -> Result<(), LlmError> {
        let mut step = DescriptionStep::Generate;

        loop {
            step = match step {
                DescriptionStep::Generate => {
                    reporter.report(Stage::Description, Some("drafting scene description".to_string()));
                    let draft: DescriptionDraft = self
                        .gateway
                        .structured(&prompts::describe(&state.source_query, state.category))
                        .await?;
                    state.current_description = draft.description.trim().to_string();
                    debug!("Drafted description ({} chars)", state.current_description.len());
                    DescriptionStep::Validate
                }
                DescriptionStep::Validate => {
                    let verdict: DescriptionVerdict = self
                        .gateway
                        .structured(&prompts::validate_description(
                            &state.source_query,
                            &state.current_description,
                        ))
                        .await?;
                    state.record_verdict(verdict.is_good, non_empty(&verdict.error));
                    if !verdict.is_good {
                        info!(
                            "Description rejected ({}/{} refinements used): {}",
                            state.refinement_count,
                            self.max_refinements,
                            state.last_validation_error.as_deref().unwrap_or("no reason given")
                        );
                    }
                    self.route(state)
                }
                DescriptionStep::Refine => {
                    let error = state
                        .last_validation_error
                        .clone()
                        .unwrap_or_else(|| "The description is not detailed enough to implement.".to_string());
                    reporter.report_at(
                        Stage::Description,
                        Stage::Description.nominal_percent() + refinement_progress(state.refinement_count),
                        Some(format!("refining description: {}", error)),
                    );
                    let draft: DescriptionDraft = self
                        .gateway
                        .structured(&prompts::refine_description(
                            &state.source_query,
                            &state.current_description,
                            &error,
                        ))
                        .await?;
                    state.replace_description(draft.description.trim().to_string());
                    DescriptionStep::Validate
                }
                DescriptionStep::Accept(acceptance) => {
                    state.acceptance = Some(acceptance);
                    match acceptance {
                        Acceptance::Validated => info!(
                            "Description accepted after {} refinement(s)",
                            state.refinement_count
                        ),
                        Acceptance::Forced => warn!(
                            "Refinement budget ({}) spent, keeping the last description",
                            self.max_refinements
                        ),
                    }
                    return Ok(());
                }
            };
        }
    }
}

/// Extra percent for refinement passes, kept below the code generation stage
fn refinement_progress(refinement_count: u32) -> u8 {
    refinement_count.min(15) as u8
}
