use std::path::Path;

use crate::core::RunStatusManager;
use crate::error::SceneForgeError;
use crate::models::{RunStatus, RunStatusEntry};

/// Show the run ledger
pub fn show_status(project_root: &Path, verbose: bool, run_id: Option<&str>) -> Result<(), SceneForgeError> {
    let status_manager = RunStatusManager::new(project_root)?;

    if let Some(id) = run_id {
        return match status_manager.get(id) {
            Some(entry) => {
                print_entry_detail(entry);
                Ok(())
            }
            None => Err(crate::error::StatusError::RunNotFound(id.to_string()).into()),
        };
    }

    let summary = status_manager.get_summary();

    println!("=== SceneForge Status ===\n");
    println!("{}", summary);
    println!();

    if verbose {
        let entries = status_manager.all_entries();
        if entries.is_empty() {
            println!("No runs recorded.");
        } else {
            println!("Runs:");
            for entry in entries {
                print!(
                    "  {} [{}] {:>3}% {}",
                    short_id(&entry.id),
                    status_label(entry.status),
                    entry.percent,
                    truncate(&entry.query, 50)
                );
                if let Some(ref error) = entry.error {
                    print!(" - {}", truncate(error.lines().last().unwrap_or_default(), 80));
                } else if let Some(ref link) = entry.link {
                    print!(" -> {}", link);
                }
                println!();
            }
        }
    }

    // Runs left running by a process that is gone
    let running = status_manager.running();
    if !running.is_empty() {
        println!("\n{} run(s) still marked as running:", running.len());
        for entry in running {
            println!("  {} [{}] {}", short_id(&entry.id), entry.stage.label(), truncate(&entry.query, 50));
        }
        println!("\nUse 'sceneforge cleanup --interrupted' if no render is in progress");
    }

    Ok(())
}

fn print_entry_detail(entry: &RunStatusEntry) {
    println!("Run:      {}", entry.id);
    println!("Query:    {}", entry.query);
    println!("Status:   {}", status_label(entry.status));
    println!("Stage:    {} ({}%)", entry.stage.label(), entry.percent);
    if let Some(ref detail) = entry.detail {
        println!("Detail:   {}", detail.lines().next().unwrap_or_default());
    }
    println!("Started:  {}", entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated:  {}", entry.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(ref link) = entry.link {
        println!("Link:     {}", link);
    }
    if let Some(ref error) = entry.error {
        println!("Error:\n{}", error);
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "RUNNING",
        RunStatus::Succeeded => "SUCCEEDED",
        RunStatus::Failed => "FAILED",
        RunStatus::Infeasible => "INFEASIBLE",
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
