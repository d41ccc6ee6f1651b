use serde::Serialize;

use crate::models::FailureChannel;

/// Prior failure messages per channel, fed back into repair prompts
///
/// Entries are only appended while failures accumulate; both channels are
/// cleared together once a render succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorHistory {
    validation: Vec<String>,
    execution: Vec<String>,
}

impl ErrorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, channel: FailureChannel, message: impl Into<String>) {
        let message = message.into();
        match channel {
            FailureChannel::Validation => self.validation.push(message),
            FailureChannel::Execution => self.execution.push(message),
        }
    }

    pub fn entries(&self, channel: FailureChannel) -> &[String] {
        match channel {
            FailureChannel::Validation => &self.validation,
            FailureChannel::Execution => &self.execution,
        }
    }

    pub fn len(&self) -> usize {
        self.validation.len() + self.execution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validation.is_empty() && self.execution.is_empty()
    }

    /// Drop both channels at once
    pub fn clear(&mut self) {
        self.validation.clear();
        self.execution.clear();
    }

    /// Render one channel as a numbered prompt section, or `None` when empty
    pub fn render(&self, channel: FailureChannel) -> Option<String> {
        let entries = self.entries(channel);
        if entries.is_empty() {
            return None;
        }
        let mut section = format!("{}\n", channel.prompt_header());
        for (i, entry) in entries.iter().enumerate() {
            section.push_str(&format!("\n### Attempt {}\n{}\n", i + 1, entry.trim()));
        }
        Some(section)
    }

    /// Render both channels, validation first
    pub fn render_all(&self) -> String {
        [FailureChannel::Validation, FailureChannel::Execution]
            .iter()
            .filter_map(|c| self.render(*c))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
