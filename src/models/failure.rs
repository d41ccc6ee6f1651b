use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel a code failure was observed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureChannel {
    /// Static review of the staged source rejected it
    Validation,
    /// The renderer exited non-zero or ran out of time
    Execution,
}

impl FailureChannel {
    /// Get the human-readable name for this channel
    pub fn name(&self) -> &'static str {
        match self {
            FailureChannel::Validation => "Validation",
            FailureChannel::Execution => "Execution",
        }
    }

    /// Get the lowercase name for this channel
    pub fn lowercase_name(&self) -> &'static str {
        match self {
            FailureChannel::Validation => "validation",
            FailureChannel::Execution => "execution",
        }
    }

    /// Section header used when the channel's history is rendered into a prompt
    pub fn prompt_header(&self) -> &'static str {
        match self {
            FailureChannel::Validation => "## Previous Validation Failures",
            FailureChannel::Execution => "## Previous Render Failures",
        }
    }

    /// Repair hint specific to this channel
    pub fn fix_instructions(&self) -> &'static str {
        match self {
            FailureChannel::Validation => "Fix the issues the reviewer found. Focus on imports, removed or renamed APIs, and invalid arguments.",
            FailureChannel::Execution => "Fix the render failure. Focus on the traceback: the failing call, its arguments, and the objects it touches.",
        }
    }
}

impl fmt::Display for FailureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_channel_names() {
        assert_eq!(FailureChannel::Validation.name(), "Validation");
        assert_eq!(FailureChannel::Execution.lowercase_name(), "execution");
        assert_eq!(format!("{}", FailureChannel::Execution), "Execution");
    }

    #[test]
    fn test_prompt_headers_differ() {
        assert_ne!(
            FailureChannel::Validation.prompt_header(),
            FailureChannel::Execution.prompt_header()
        );
    }
}
