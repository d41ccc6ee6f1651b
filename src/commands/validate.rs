use std::path::Path;

use crate::core::{ArtifactStore, OllamaClient, ProcessRenderer, RuleBook};
use crate::error::SceneForgeError;
use crate::models::{Category, Config, CONFIG_FILE_NAME};

/// Validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Checks that passed, for display
    pub passed: Vec<String>,
}

impl ValidationResult {
    fn error(&mut self, message: String) {
        self.errors.push(message);
        self.valid = false;
    }
}

/// Validate the project: config, rule files, renderer and model server
///
/// `offline` skips the renderer and Ollama checks.
pub async fn validate_project(project_root: &Path, offline: bool) -> Result<ValidationResult, SceneForgeError> {
    let mut result = ValidationResult {
        valid: true,
        ..ValidationResult::default()
    };

    // Check config file
    if !project_root.join(CONFIG_FILE_NAME).exists() {
        result
            .warnings
            .push(format!("Missing {} (using defaults)", CONFIG_FILE_NAME));
    }

    let config = match Config::load_from_dir(project_root) {
        Ok(config) => config.resolve_paths(project_root),
        Err(e) => {
            result.error(e.to_string());
            return Ok(result);
        }
    };
    result.passed.push("Configuration parsed".to_string());

    check_rules(&config, &mut result);

    match ArtifactStore::new(&config.render.staging_dir).leftovers() {
        Ok(leftovers) if !leftovers.is_empty() => result.warnings.push(format!(
            "{} staged source file(s) left by earlier runs (run 'sceneforge cleanup')",
            leftovers.len()
        )),
        Ok(_) => {}
        Err(e) => result.warnings.push(format!(
            "Cannot read staging directory {}: {}",
            config.render.staging_dir.display(),
            e
        )),
    }

    if offline {
        return Ok(result);
    }

    let renderer = ProcessRenderer::new(config.render.clone(), project_root, false);
    match renderer.check_available().await {
        Ok(version) => result.passed.push(format!("Renderer available: {}", version)),
        Err(e) => result.error(e.to_string()),
    }

    check_ollama(&config, &mut result).await;

    Ok(result)
}

fn check_rules(config: &Config, result: &mut ValidationResult) {
    if !config.output.rules_dir.is_dir() {
        result.warnings.push(format!(
            "Rules directory {} not found (using built-in rules)",
            config.output.rules_dir.display()
        ));
        return;
    }

    match RuleBook::load(&config.output.rules_dir) {
        Ok(book) => {
            let builtin: Vec<&str> = Category::all()
                .iter()
                .filter(|c| !book.is_overridden(**c))
                .map(|c| c.tag())
                .collect();
            if builtin.is_empty() {
                result.passed.push("Rule files found for every category".to_string());
            } else {
                result.warnings.push(format!(
                    "No rule file for {} (using built-in rules)",
                    builtin.join(", ")
                ));
            }
        }
        Err(e) => result.error(e.to_string()),
    }
}

async fn check_ollama(config: &Config, result: &mut ValidationResult) {
    let client = match OllamaClient::new(config.llm.clone(), false) {
        Ok(client) => client,
        Err(e) => {
            result.error(e.to_string());
            return;
        }
    };

    match client.health_check().await {
        Ok(true) => result.passed.push(format!("Ollama reachable at {}", config.llm.url)),
        Ok(false) => {
            result.error(format!("Ollama at {} returned an error status", config.llm.url));
            return;
        }
        Err(e) => {
            result.error(e.to_string());
            return;
        }
    }

    let mut models = vec![config.llm.model.as_str()];
    if config.llm.fast_model() != config.llm.model {
        models.push(config.llm.fast_model());
    }
    for model in models {
        match client.check_model(model).await {
            Ok(true) => result.passed.push(format!("Model available: {}", model)),
            Ok(false) => result.error(format!("Model '{}' is not installed", model)),
            Err(e) => result.warnings.push(format!("Could not list models: {}", e)),
        }
    }
}

/// Print validation result
pub fn print_validation_result(result: &ValidationResult) {
    println!("=== Validation Result ===\n");

    if result.valid {
        println!("Status: VALID\n");
    } else {
        println!("Status: INVALID\n");
    }

    if !result.passed.is_empty() {
        println!("Checks:");
        for check in &result.passed {
            println!("  + {}", check);
        }
        println!();
    }

    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!("  - {}", error);
        }
        println!();
    }

    if !result.warnings.is_empty() {
        println!("Warnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
        println!();
    }

    if result.valid && result.errors.is_empty() && result.warnings.is_empty() {
        println!("All checks passed!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init_project;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_validate_initialized_project_offline() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path()).unwrap();

        let result = validate_project(temp.path(), true).await.unwrap();
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    }

    #[tokio::test]
    async fn test_validate_bad_rule_file() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path()).unwrap();
        fs::write(
            temp.path().join("rules").join("cooking.md"),
            "---\ncategory: COOKING\n---\nStir.\n",
        )
        .unwrap();

        let result = validate_project(temp.path(), true).await.unwrap();
        assert!(!result.valid);
        assert!(result.errors[0].contains("COOKING"));
    }

    #[tokio::test]
    async fn test_validate_bad_config() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "[render]\ntimeout_seconds = 0\n").unwrap();

        let result = validate_project(temp.path(), true).await.unwrap();
        assert!(!result.valid);
    }
}
