use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use crate::core::progress::ProgressSink;
use crate::error::StatusError;
use crate::models::{FailureKind, PipelineOutcome, ProgressEvent, RunStatus, RunStatusEntry};

/// Name of the run status file in the project directory
pub const STATUS_FILE_NAME: &str = "_runstatus.json";

/// Thread-safe wrapper for RunStatusManager
pub type SharedStatusManager = Arc<Mutex<RunStatusManager>>;

/// Run status file manager
pub struct RunStatusManager {
    /// Path to the status file
    status_file: PathBuf,
    /// In-memory cache of status entries
    entries: HashMap<String, RunStatusEntry>,
}

impl RunStatusManager {
    /// Create a new status manager and load existing status
    pub fn new(project_dir: &Path) -> Result<Self, StatusError> {
        let status_file = project_dir.join(STATUS_FILE_NAME);
        let mut manager = Self {
            status_file,
            entries: HashMap::new(),
        };
        manager.load()?;
        Ok(manager)
    }

    /// Create a new thread-safe shared status manager
    pub fn new_shared(project_dir: &Path) -> Result<SharedStatusManager, StatusError> {
        let manager = Self::new(project_dir)?;
        Ok(Arc::new(Mutex::new(manager)))
    }

    pub fn status_file(&self) -> &Path {
        &self.status_file
    }

    /// Load status from file
    fn load(&mut self) -> Result<(), StatusError> {
        if !self.status_file.exists() {
            debug!("Status file does not exist, starting fresh");
            return Ok(());
        }

        let content = fs::read_to_string(&self.status_file)
            .map_err(|e| StatusError::ReadError(self.status_file.clone(), e))?;

        if content.trim().is_empty() {
            return Ok(());
        }

        let entries: Vec<RunStatusEntry> = serde_json::from_str(&content)
            .map_err(|e| StatusError::ParseError(self.status_file.clone(), e.to_string()))?;

        self.entries = entries.into_iter().map(|e| (e.id.clone(), e)).collect();
        debug!("Loaded {} run status entries", self.entries.len());

        Ok(())
    }

    /// Save status to file atomically (write to temp, then rename)
    pub fn save(&self) -> Result<(), StatusError> {
        let entries = self.all_entries();

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| StatusError::ParseError(self.status_file.clone(), e.to_string()))?;

        // Write to temporary file first
        let temp_file = self.status_file.with_extension("json.tmp");
        fs::write(&temp_file, &json)
            .map_err(|e| StatusError::WriteError(temp_file.clone(), e))?;

        // Rename atomically
        fs::rename(&temp_file, &self.status_file)
            .map_err(|e| StatusError::WriteError(self.status_file.clone(), e))?;

        debug!("Saved {} run status entries", entries.len());
        Ok(())
    }

    /// Register a new run in Running status
    pub fn start_run(&mut self, run_id: &str, query: &str) -> Result<(), StatusError> {
        self.entries.insert(
            run_id.to_string(),
            RunStatusEntry::new(run_id.to_string(), query.to_string()),
        );
        self.save()
    }

    /// Record a progress event
    pub fn record_progress(&mut self, event: &ProgressEvent) -> Result<(), StatusError> {
        let entry = self
            .entries
            .get_mut(&event.run_id)
            .ok_or_else(|| StatusError::RunNotFound(event.run_id.clone()))?;
        entry.update_progress(event.stage, event.percent, event.detail.clone());
        self.save()
    }

    /// Record a run's terminal outcome
    pub fn record_outcome(&mut self, outcome: &PipelineOutcome) -> Result<(), StatusError> {
        let entry = self
            .entries
            .get_mut(outcome.run_id())
            .ok_or_else(|| StatusError::RunNotFound(outcome.run_id().to_string()))?;
        match outcome {
            PipelineOutcome::Success(s) => entry.set_succeeded(s.link.clone()),
            PipelineOutcome::Failure(f) => {
                let status = if f.kind == FailureKind::Infeasible {
                    RunStatus::Infeasible
                } else {
                    RunStatus::Failed
                };
                entry.set_failed(status, f.reason.clone());
            }
        }
        self.save()
    }

    /// Get a run's status
    pub fn get(&self, run_id: &str) -> Option<&RunStatusEntry> {
        self.entries.get(run_id)
    }

    /// Get all entries, oldest first
    pub fn all_entries(&self) -> Vec<&RunStatusEntry> {
        let mut entries: Vec<&RunStatusEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    /// Runs still marked as running (interrupted if no process owns them)
    pub fn running(&self) -> Vec<&RunStatusEntry> {
        self.all_entries()
            .into_iter()
            .filter(|e| !e.status.is_complete())
            .collect()
    }

    /// Remove finished entries, returning how many were removed
    pub fn prune_finished(&mut self) -> Result<usize, StatusError> {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.status.is_complete());
        let removed = before - self.entries.len();
        if removed > 0 {
            info!("Pruned {} finished run(s) from status", removed);
        }
        self.save()?;
        Ok(removed)
    }

    /// Mark runs left in Running status as failed
    pub fn fail_interrupted(&mut self) -> Result<usize, StatusError> {
        let mut count = 0;
        for entry in self.entries.values_mut() {
            if !entry.status.is_complete() {
                entry.set_failed(RunStatus::Failed, "interrupted".to_string());
                count += 1;
            }
        }
        self.save()?;
        Ok(count)
    }

    /// Get summary counts
    pub fn get_summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for entry in self.entries.values() {
            match entry.status {
                RunStatus::Running => summary.running += 1,
                RunStatus::Succeeded => summary.succeeded += 1,
                RunStatus::Failed => summary.failed += 1,
                RunStatus::Infeasible => summary.infeasible += 1,
            }
        }
        summary.total = self.entries.len();
        summary
    }
}

/// Summary of run statuses
#[derive(Debug, Default)]
pub struct StatusSummary {
    pub total: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub infeasible: usize,
}

impl std::fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total: {} | Running: {} | Succeeded: {} | Failed: {} | Infeasible: {}",
            self.total, self.running, self.succeeded, self.failed, self.infeasible
        )
    }
}

/// Progress sink that keeps the run status file current
///
/// Write failures are logged and never interrupt the run. On a multi-thread
/// runtime each file write runs through `block_in_place` so the worker's other
/// tasks move elsewhere while it blocks.
#[derive(Clone)]
pub struct StatusSink {
    manager: SharedStatusManager,
}

impl StatusSink {
    pub fn new(manager: SharedStatusManager) -> Self {
        Self { manager }
    }

    fn with_manager<F>(&self, action: &str, f: F)
    where
        F: FnOnce(&mut RunStatusManager) -> Result<(), StatusError>,
    {
        let update = || {
            let mut manager = match self.manager.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            f(&mut manager)
        };
        if let Err(e) = run_blocking(update) {
            warn!("Failed to {}: {}", action, e);
        }
    }
}

/// Run blocking file work, yielding the worker thread when the runtime allows it
fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        // block_in_place panics on a current-thread runtime
        _ => f(),
    }
}

impl ProgressSink for StatusSink {
    fn on_started(&self, run_id: &str, query: &str) {
        self.with_manager("record run start", |m| m.start_run(run_id, query));
    }

    fn on_event(&self, event: &ProgressEvent) {
        self.with_manager("record progress", |m| m.record_progress(event));
    }

    fn on_finished(&self, outcome: &PipelineOutcome) {
        self.with_manager("record outcome", |m| m.record_outcome(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RenderFailure, Stage};
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_manager() -> (TempDir, RunStatusManager) {
        let temp_dir = TempDir::new().unwrap();
        let manager = RunStatusManager::new(temp_dir.path()).unwrap();
        (temp_dir, manager)
    }

    fn event(run_id: &str, stage: Stage, percent: u8) -> ProgressEvent {
        ProgressEvent {
            run_id: run_id.to_string(),
            stage,
            percent,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_new_manager() {
        let (_temp_dir, manager) = create_test_manager();
        assert!(manager.entries.is_empty());
    }

    #[test]
    fn test_start_and_progress() {
        let (_temp_dir, mut manager) = create_test_manager();
        manager.start_run("run1", "draw a circle").unwrap();
        manager.record_progress(&event("run1", Stage::Description, 30)).unwrap();

        let entry = manager.get("run1").unwrap();
        assert_eq!(entry.status, RunStatus::Running);
        assert_eq!(entry.stage, Stage::Description);
        assert_eq!(entry.percent, 30);
    }

    #[test]
    fn test_progress_for_unknown_run() {
        let (_temp_dir, mut manager) = create_test_manager();
        let err = manager.record_progress(&event("ghost", Stage::Render, 70)).unwrap_err();
        assert!(matches!(err, StatusError::RunNotFound(_)));
    }

    #[test]
    fn test_record_infeasible_outcome() {
        let (_temp_dir, mut manager) = create_test_manager();
        manager.start_run("run1", "file my taxes").unwrap();
        let outcome = PipelineOutcome::Failure(RenderFailure::new(
            "run1",
            FailureKind::Infeasible,
            Stage::Feasibility,
            "not an animation",
        ));
        manager.record_outcome(&outcome).unwrap();

        let entry = manager.get("run1").unwrap();
        assert_eq!(entry.status, RunStatus::Infeasible);
        assert_eq!(entry.error.as_deref(), Some("not an animation"));
    }

    #[test]
    fn test_summary_and_prune() {
        let (_temp_dir, mut manager) = create_test_manager();
        manager.start_run("a", "q").unwrap();
        manager.start_run("b", "q").unwrap();
        let outcome = PipelineOutcome::Failure(RenderFailure::new(
            "b",
            FailureKind::Exhausted,
            Stage::Render,
            "NameError",
        ));
        manager.record_outcome(&outcome).unwrap();

        let summary = manager.get_summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.running, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.to_string().contains("Running: 1"));

        assert_eq!(manager.prune_finished().unwrap(), 1);
        assert!(manager.get("b").is_none());
        assert_eq!(manager.running().len(), 1);

        assert_eq!(manager.fail_interrupted().unwrap(), 1);
        assert_eq!(manager.get("a").unwrap().status, RunStatus::Failed);
    }

    #[test]
    fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut manager = RunStatusManager::new(temp_dir.path()).unwrap();
            manager.start_run("run1", "q").unwrap();
            manager.record_progress(&event("run1", Stage::Render, 70)).unwrap();
        }

        {
            let manager = RunStatusManager::new(temp_dir.path()).unwrap();
            assert_eq!(manager.get("run1").unwrap().percent, 70);
        }
    }

    #[test]
    fn test_status_sink_swallows_errors() {
        let temp_dir = TempDir::new().unwrap();
        let shared = RunStatusManager::new_shared(temp_dir.path()).unwrap();
        let sink = StatusSink::new(shared.clone());

        // No start recorded: the update fails but must not panic
        sink.on_event(&event("ghost", Stage::Render, 70));

        sink.on_started("run1", "q");
        sink.on_event(&event("run1", Stage::Render, 70));
        assert_eq!(shared.lock().unwrap().get("run1").unwrap().stage, Stage::Render);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_status_sink_on_multi_thread_runtime() {
        let temp_dir = TempDir::new().unwrap();
        let shared = RunStatusManager::new_shared(temp_dir.path()).unwrap();
        let sink = StatusSink::new(shared.clone());

        sink.on_started("run1", "q");
        sink.on_event(&event("run1", Stage::Render, 70));

        let reloaded = RunStatusManager::new(temp_dir.path()).unwrap();
        assert_eq!(reloaded.get("run1").unwrap().stage, Stage::Render);
        assert_eq!(shared.lock().unwrap().get("run1").unwrap().percent, 70);
    }

    #[tokio::test]
    async fn test_status_sink_on_current_thread_runtime() {
        let temp_dir = TempDir::new().unwrap();
        let shared = RunStatusManager::new_shared(temp_dir.path()).unwrap();
        let sink = StatusSink::new(shared.clone());

        sink.on_started("run1", "q");
        assert!(shared.lock().unwrap().get("run1").is_some());
    }
}
