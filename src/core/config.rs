use std::path::Path;
use tracing::info;

use crate::error::SceneForgeError;
use crate::models::{Config, CONFIG_FILE_NAME};

/// Load configuration from the project directory with CLI overrides
///
/// Relative directories in the result are resolved against `project_root`.
pub fn load_config(
    project_root: &Path,
    model: Option<String>,
    url: Option<String>,
    timeout: Option<u64>,
    no_stream: bool,
) -> Result<Config, SceneForgeError> {
    let config = Config::load_from_dir(project_root)?
        .with_overrides(model, url, timeout, no_stream)
        .resolve_paths(project_root);
    config.validate()?;

    info!(
        "Configuration loaded: model={}, url={}, timeout={}s, renderer={}",
        config.llm.model, config.llm.url, config.llm.timeout_seconds, config.render.program
    );

    Ok(config)
}

/// Require an initialized project in `project_root`
pub fn require_project(project_root: &Path) -> Result<(), SceneForgeError> {
    let config_file = project_root.join(CONFIG_FILE_NAME);
    if config_file.is_file() {
        Ok(())
    } else {
        Err(SceneForgeError::NotInitialized(config_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(temp_dir.path(), None, None, None, false).unwrap();

        assert_eq!(config.llm.url, "http://localhost:11434");
        assert_eq!(config.limits.max_repairs, 3);
        assert_eq!(config.render.staging_dir, temp_dir.path().join("staging"));
    }

    #[test]
    fn test_load_config_with_overrides() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[llm]\nmodel = \"file-model\"\n\n[behavior]\nstream_output = true\n",
        )
        .unwrap();

        let config = load_config(
            temp_dir.path(),
            Some("cli-model".to_string()),
            None,
            Some(42),
            true,
        )
        .unwrap();

        assert_eq!(config.llm.model, "cli-model");
        assert_eq!(config.llm.timeout_seconds, 42);
        assert!(!config.behavior.stream_output);
    }

    #[test]
    fn test_load_config_rejects_zero_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_config(temp_dir.path(), None, None, Some(0), false).unwrap_err();
        assert!(matches!(err, SceneForgeError::Config(_)));
    }

    #[test]
    fn test_require_project() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            require_project(temp_dir.path()),
            Err(SceneForgeError::NotInitialized(_))
        ));
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        assert!(require_project(temp_dir.path()).is_ok());
    }
}
