use std::fs;
use std::path::Path;
use tracing::info;

use crate::core::STATUS_FILE_NAME;
use crate::error::SceneForgeError;
use crate::models::{Category, Config, CONFIG_FILE_NAME};
use crate::templates::{rule_file, CONFIG};

/// Initialize a SceneForge project: config, rule files and working directories
pub fn init_project(project_root: &Path) -> Result<(), SceneForgeError> {
    println!("Initializing SceneForge project...");

    create_file_if_not_exists(&project_root.join(CONFIG_FILE_NAME), CONFIG)?;

    // Directories come from the freshly written (or existing) config
    let config = Config::load_from_dir(project_root)?.resolve_paths(project_root);

    for dir in [
        &config.output.rules_dir,
        &config.render.staging_dir,
        &config.output.dir,
    ] {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            info!("Created directory: {}", dir.display());
        } else {
            info!("Directory already exists: {}", dir.display());
        }
    }

    for category in Category::all() {
        create_file_if_not_exists(
            &config.output.rules_dir.join(category.rule_file_name()),
            &rule_file(*category),
        )?;
    }

    // Empty run ledger
    create_file_if_not_exists(&project_root.join(STATUS_FILE_NAME), "[]")?;

    info!("SceneForge project initialized successfully!");
    print_next_steps(project_root);

    Ok(())
}

fn create_file_if_not_exists(path: &Path, content: &str) -> Result<(), SceneForgeError> {
    if !path.exists() {
        fs::write(path, content)?;
        info!("Created file: {}", path.display());
    } else {
        info!("File already exists: {}", path.display());
    }
    Ok(())
}

fn print_next_steps(project_root: &Path) {
    println!("SceneForge project initialized at {}", project_root.display());
    println!("\nNext steps:");
    println!("1. Edit {} to point at your Ollama instance and models", CONFIG_FILE_NAME);
    println!("2. Adjust the per-category rules in rules/*.md");
    println!("3. Run 'sceneforge validate' to check the renderer and model");
    println!("4. Run 'sceneforge render \"<your animation idea>\"'");
}
