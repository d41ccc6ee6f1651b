use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::core::{ArtifactStore, RunStatusManager};
use crate::error::SceneForgeError;
use crate::models::Config;

/// Result of cleanup operation
#[derive(Debug, Default)]
pub struct CleanupResult {
    /// Staged sources removed (or that would be removed in a dry run)
    pub removed_artifacts: Vec<PathBuf>,
    /// Finished runs pruned from the ledger
    pub pruned_runs: usize,
    /// Runs left in running status that were marked failed
    pub interrupted_runs: usize,
}

/// Remove staged sources left by cancelled runs and prune the run ledger
///
/// `interrupted` also marks runs still recorded as running as failed. Only use
/// it when no render is in progress.
pub fn cleanup_project(
    project_root: &Path,
    interrupted: bool,
    dry_run: bool,
) -> Result<CleanupResult, SceneForgeError> {
    let config = Config::load_from_dir(project_root)?.resolve_paths(project_root);
    let store = ArtifactStore::new(&config.render.staging_dir);
    let mut result = CleanupResult::default();

    for path in store.leftovers()? {
        if dry_run {
            info!("Would remove {}", path.display());
            result.removed_artifacts.push(path);
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed {}", path.display());
                result.removed_artifacts.push(path);
            }
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    if dry_run {
        return Ok(result);
    }

    let mut status = RunStatusManager::new(project_root)?;
    if interrupted {
        result.interrupted_runs = status.fail_interrupted()?;
    }
    result.pruned_runs = status.prune_finished()?;

    Ok(result)
}

/// Print cleanup result
pub fn print_cleanup_result(result: &CleanupResult, dry_run: bool) {
    let verb = if dry_run { "Would remove" } else { "Removed" };
    if result.removed_artifacts.is_empty() {
        println!("No leftover staged sources.");
    } else {
        println!("{} {} staged source(s):", verb, result.removed_artifacts.len());
        for path in &result.removed_artifacts {
            println!("  {}", path.display());
        }
    }
    if !dry_run {
        if result.interrupted_runs > 0 {
            println!("Marked {} interrupted run(s) as failed.", result.interrupted_runs);
        }
        println!("Pruned {} finished run(s) from the ledger.", result.pruned_runs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ARTIFACT_PREFIX;
    use tempfile::TempDir;

    fn stage_leftover(root: &Path) -> PathBuf {
        let staging = root.join("staging");
        fs::create_dir_all(&staging).unwrap();
        let path = staging.join(format!("{}deadbeef.py", ARTIFACT_PREFIX));
        fs::write(&path, "from manim import *").unwrap();
        // Unrelated files are never touched
        fs::write(staging.join("notes.py"), "x = 1").unwrap();
        path
    }

    #[test]
    fn test_cleanup_removes_leftovers() {
        let temp = TempDir::new().unwrap();
        let leftover = stage_leftover(temp.path());

        let result = cleanup_project(temp.path(), false, false).unwrap();
        assert_eq!(result.removed_artifacts, vec![leftover.clone()]);
        assert!(!leftover.exists());
        assert!(temp.path().join("staging").join("notes.py").exists());
    }

    #[test]
    fn test_cleanup_dry_run_keeps_files() {
        let temp = TempDir::new().unwrap();
        let leftover = stage_leftover(temp.path());

        let result = cleanup_project(temp.path(), false, true).unwrap();
        assert_eq!(result.removed_artifacts.len(), 1);
        assert!(leftover.exists());
    }

    #[test]
    fn test_cleanup_interrupted_runs() {
        let temp = TempDir::new().unwrap();
        {
            let mut status = RunStatusManager::new(temp.path()).unwrap();
            status.start_run("stuck", "a circle").unwrap();
        }

        let result = cleanup_project(temp.path(), true, false).unwrap();
        assert_eq!(result.interrupted_runs, 1);
        assert_eq!(result.pruned_runs, 1);
        assert!(RunStatusManager::new(temp.path()).unwrap().get("stuck").is_none());
    }
}
