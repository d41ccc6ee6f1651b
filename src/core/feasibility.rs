use tracing::{debug, info};

use crate::core::llm::CompletionGateway;
use crate::core::parser::FeasibilityVerdict;
use crate::core::prompts;
use crate::error::LlmError;
use crate::models::FeasibilityResult;

/// Classify a request exactly once
///
/// Transport and parse failures are returned as-is; the caller treats them as
/// fatal. An infeasible verdict is a normal result.
pub async fn classify(gateway: &CompletionGateway, query: &str) -> Result<FeasibilityResult, LlmError> {
    debug!("Classifying request: {}", query);
    let verdict: FeasibilityVerdict = gateway.structured(&prompts::feasibility(query)).await?;
    let result = verdict.into_result()?;

    if result.is_feasible {
        info!(
            "Request is feasible ({}): {}",
            result.category.tag(),
            result.chat_label
        );
    } else {
        info!("Request declined: {}", result.reason);
    }
    Ok(result)
}
