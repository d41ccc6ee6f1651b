//! Parser module for extracting code and structured verdicts from LLM responses.

mod extract;

pub use extract::*;

use serde::Deserialize;

use crate::error::LlmError;
use crate::models::{Category, FeasibilityResult};

/// Wire shape of the feasibility verdict
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityVerdict {
    #[serde(alias = "isFesible", alias = "is_feasible")]
    pub is_feasible: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default, alias = "chatLabel", alias = "chat_name")]
    pub chat_name: String,
    #[serde(default, alias = "animationType")]
    pub category: Option<String>,
}

impl FeasibilityVerdict {
    /// Convert to the domain result, rejecting unknown category tags
    pub fn into_result(self) -> Result<FeasibilityResult, LlmError> {
        let category = match self.category.as_deref().map(str::trim) {
            Some(tag) if !tag.is_empty() => tag.parse::<Category>().map_err(|e| {
                LlmError::MalformedOutput {
                    kind: "feasibility".to_string(),
                    detail: e,
                }
            })?,
            // A declined request does not need a category
            _ if !self.is_feasible => Category::default(),
            _ => {
                return Err(LlmError::MalformedOutput {
                    kind: "feasibility".to_string(),
                    detail: "missing category for a feasible request".to_string(),
                })
            }
        };
        Ok(FeasibilityResult {
            is_feasible: self.is_feasible,
            reason: self.reason.trim().to_string(),
            chat_label: self.chat_name.trim().to_string(),
            category,
        })
    }
}

/// Wire shape of a generated or refined description
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionDraft {
    pub description: String,
}

/// Wire shape of the description validator's verdict
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionVerdict {
    #[serde(alias = "isThisGoodDescrription", alias = "isThisGoodDescription", alias = "is_good")]
    pub is_good: bool,
    #[serde(default, alias = "pickedOneError", alias = "errorMessage")]
    pub error: String,
}

/// Wire shape of the static code reviewer's verdict
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeVerdict {
    #[serde(alias = "isValid", alias = "is_code_good")]
    pub is_code_good: bool,
    #[serde(default, alias = "error")]
    pub error_message: String,
}

/// Reduce a free-text error to `None` when it carries no information
pub fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
