//! Full restart of code generation once repairs run out.
//!
//! [`ResetController`] checks the run's reset count against its budget and
//! either restarts generation from a fresh artifact or ends the run.

use tracing::{info, warn};

use crate::core::generation::GenerationState;

/// What to do after the repair budget is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetDecision {
    /// Discard the artifact and generate from scratch
    Restart,
    /// Report a terminal failure
    Stop,
}

/// Bounded full restart of code generation
#[derive(Debug, Clone, Copy)]
pub struct ResetController {
    max_resets: u32,
}

impl ResetController {
    pub fn new(max_resets: u32) -> Self {
        Self { max_resets }
    }

    pub fn max_resets(&self) -> u32 {
        self.max_resets
    }

    pub fn decide(&self, reset_count: u32) -> ResetDecision {
        if reset_count < self.max_resets {
            ResetDecision::Restart
        } else {
            ResetDecision::Stop
        }
    }

    /// Handle a GiveUp: restart the state in place, or report that the run is over
    ///
    /// A restart drops the current artifact (its file is removed) and zeroes the
    /// repair counter. Error histories are kept for the fresh generation.
    pub fn handle_give_up(&self, state: &mut GenerationState) -> ResetDecision {
        let decision = self.decide(state.reset_count);
        match decision {
            ResetDecision::Restart => {
                state.restart();
                info!(
                    "Repair budget exhausted, restarting code generation (reset {}/{})",
                    state.reset_count, self.max_resets
                );
            }
            ResetDecision::Stop => warn!(
                "Repair budget exhausted after {} reset(s), giving up",
                state.reset_count
            ),
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::ArtifactStore;
    use crate::models::{Category, FailureChannel, PipelineRequest};
    use tempfile::TempDir;

    #[test]
    fn test_decide() {
        let controller = ResetController::new(1);
        assert_eq!(controller.decide(0), ResetDecision::Restart);
        assert_eq!(controller.decide(1), ResetDecision::Stop);
        assert_eq!(ResetController::new(0).decide(0), ResetDecision::Stop);
    }

    #[test]
    fn test_restart_discards_artifact_keeps_history() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        let request = PipelineRequest::new("circle");
        let mut state = GenerationState::new("a circle", Category::Graph2d, &request);

        let artifact = store.create().unwrap();
        let old_path = artifact.path().to_path_buf();
        state.install_artifact(artifact);
        state.repair_attempts = 3;
        state.history.push(FailureChannel::Execution, "NameError");

        let controller = ResetController::new(1);
        assert_eq!(controller.handle_give_up(&mut state), ResetDecision::Restart);
        assert_eq!(state.reset_count, 1);
        assert_eq!(state.repair_attempts, 0);
        assert!(state.scene_name().is_none());
        assert!(!old_path.exists());
        assert_eq!(state.history.entries(FailureChannel::Execution).len(), 1);

        assert_eq!(controller.handle_give_up(&mut state), ResetDecision::Stop);
        assert_eq!(state.reset_count, 1);
    }
}
