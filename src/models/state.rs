use serde::{Deserialize, Serialize};

use crate::models::Category;

/// Verdict of the feasibility classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibilityResult {
    pub is_feasible: bool,
    /// User-facing explanation, shown when the request is declined
    pub reason: String,
    /// Short title for the conversation
    pub chat_label: String,
    pub category: Category,
}

/// How the description loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acceptance {
    /// The validator approved the description
    Validated,
    /// The refinement budget ran out and the last description was kept
    Forced,
}

/// State of the description refinement loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionState {
    pub source_query: String,
    pub category: Category,
    /// Replaced on every refinement
    pub current_description: String,
    pub last_validation_error: Option<String>,
    pub refinement_count: u32,
    /// `None` until the validator has judged the current description
    pub is_accepted: Option<bool>,
    /// Set once the loop reaches a terminal state
    pub acceptance: Option<Acceptance>,
}

impl DescriptionState {
    /// Create the state at loop entry
    pub fn new(source_query: impl Into<String>, category: Category) -> Self {
        Self {
            source_query: source_query.into(),
            category,
            current_description: String::new(),
            last_validation_error: None,
            refinement_count: 0,
            is_accepted: None,
            acceptance: None,
        }
    }

    /// Record the validator's verdict on the current description
    pub fn record_verdict(&mut self, is_good: bool, error: Option<String>) {
        self.is_accepted = Some(is_good);
        self.last_validation_error = if is_good { None } else { error };
    }

    /// Swap in a refined description
    pub fn replace_description(&mut self, description: String) {
        self.current_description = description;
        self.refinement_count += 1;
        self.is_accepted = None;
    }

    pub fn was_forced(&self) -> bool {
        self.acceptance == Some(Acceptance::Forced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_state_new() {
        let state = DescriptionState::new("draw a sine wave", Category::Graph2d);
        assert_eq!(state.refinement_count, 0);
        assert!(state.is_accepted.is_none());
        assert!(state.current_description.is_empty());
        assert!(!state.was_forced());
    }

    #[test]
    fn test_record_verdict_clears_error_when_good() {
        let mut state = DescriptionState::new("q", Category::Text);
        state.record_verdict(false, Some("missing timing".to_string()));
        assert_eq!(state.last_validation_error.as_deref(), Some("missing timing"));
        assert_eq!(state.is_accepted, Some(false));

        state.record_verdict(true, None);
        assert!(state.last_validation_error.is_none());
        assert_eq!(state.is_accepted, Some(true));
    }

    #[test]
    fn test_replace_description_counts_refinements() {
        let mut state = DescriptionState::new("q", Category::Physics);
        state.current_description = "first".to_string();
        state.record_verdict(false, Some("vague".to_string()));
        state.replace_description("second".to_string());
        assert_eq!(state.current_description, "second");
        assert_eq!(state.refinement_count, 1);
        assert!(state.is_accepted.is_none());
        // The error that triggered the refinement stays until the next verdict
        assert_eq!(state.last_validation_error.as_deref(), Some("vague"));
    }
}
