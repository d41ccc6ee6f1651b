use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "sceneforge.toml";

/// Configuration loaded from sceneforge.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// LLM (Ollama chat API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama API URL
    #[serde(default = "default_llm_url")]
    pub url: String,
    /// Model used for description, code generation and repair
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for classification and validation calls (falls back to `model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_model: Option<String>,
    /// Timeout in seconds for one completion call
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

impl LlmConfig {
    pub fn fast_model(&self) -> &str {
        self.fast_model.as_deref().unwrap_or(&self.model)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_llm_url(),
            model: default_model(),
            fast_model: None,
            timeout_seconds: default_llm_timeout(),
        }
    }
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5-coder:32b".to_string()
}

fn default_llm_timeout() -> u64 {
    300
}

/// External renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Renderer executable
    #[serde(default = "default_program")]
    pub program: String,
    /// Subcommand placed before the artifact path
    #[serde(default = "default_subcommand")]
    pub subcommand: Option<String>,
    /// Extra arguments appended after the geometry and quality flags
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
    /// Wall-clock budget for one render
    #[serde(default = "default_render_timeout")]
    pub timeout_seconds: u64,
    /// Directory holding staged source files
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Directory the renderer writes its output to
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    /// Tool-version suffix the renderer appends to output names
    #[serde(default = "default_version_suffix")]
    pub version_suffix: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            subcommand: default_subcommand(),
            extra_args: default_extra_args(),
            timeout_seconds: default_render_timeout(),
            staging_dir: default_staging_dir(),
            media_dir: default_media_dir(),
            version_suffix: default_version_suffix(),
        }
    }
}

fn default_program() -> String {
    "manim".to_string()
}

fn default_subcommand() -> Option<String> {
    Some("render".to_string())
}

fn default_extra_args() -> Vec<String> {
    vec!["--custom_folders".to_string()]
}

fn default_render_timeout() -> u64 {
    1000
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("staging")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("videos")
}

fn default_version_suffix() -> String {
    "_ManimCE_v0.19.0".to_string()
}

/// Retry budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum description refinements before the description is force-accepted
    #[serde(default = "default_max_refinements")]
    pub max_refinements: u32,
    /// Repair budget shared by validation and execution failures
    #[serde(default = "default_max_repairs")]
    pub max_repairs: u32,
    /// Full code-generation restarts after the repair budget is exhausted
    #[serde(default = "default_max_resets")]
    pub max_resets: u32,
    /// Optional wall-clock budget for a whole run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_seconds: Option<u64>,
}

impl LimitsConfig {
    /// Upper bound on generate-plus-execute cycles in one run
    pub fn max_generation_cycles(&self) -> u32 {
        (self.max_resets + 1) * (self.max_repairs + 1)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_refinements: default_max_refinements(),
            max_repairs: default_max_repairs(),
            max_resets: default_max_resets(),
            run_timeout_seconds: None,
        }
    }
}

fn default_max_refinements() -> u32 {
    10
}

fn default_max_repairs() -> u32 {
    3
}

fn default_max_resets() -> u32 {
    1
}

/// Behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Stream LLM tokens and renderer lines to the terminal
    #[serde(default = "default_stream_output")]
    pub stream_output: bool,
    /// Keep the staged source file after a terminal outcome
    #[serde(default)]
    pub keep_artifacts: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            stream_output: default_stream_output(),
            keep_artifacts: false,
        }
    }
}

fn default_stream_output() -> bool {
    true
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination for published renders
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Directory holding per-category rule files
    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            rules_dir: default_rules_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_rules_dir() -> PathBuf {
    PathBuf::from("rules")
}

impl Config {
    /// Load config from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Try to load config from sceneforge.toml in the given directory
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Merge CLI overrides into the config
    pub fn with_overrides(
        mut self,
        model: Option<String>,
        url: Option<String>,
        timeout: Option<u64>,
        no_stream: bool,
    ) -> Self {
        if let Some(m) = model {
            self.llm.model = m;
        }
        if let Some(u) = url {
            self.llm.url = u;
        }
        if let Some(t) = timeout {
            self.llm.timeout_seconds = t;
        }
        if no_stream {
            self.behavior.stream_output = false;
        }
        self
    }

    /// Resolve the relative directories against the project root
    pub fn resolve_paths(mut self, project_root: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                project_root.join(p)
            }
        };
        self.render.staging_dir = resolve(&self.render.staging_dir);
        self.render.media_dir = resolve(&self.render.media_dir);
        self.output.dir = resolve(&self.output.dir);
        self.output.rules_dir = resolve(&self.output.rules_dir);
        self
    }

    /// Reject values that would make the pipeline unbounded or unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.program.trim().is_empty() {
            return Err(ConfigError::Invalid("render.program must not be empty".to_string()));
        }
        if self.render.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "render.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "llm.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.limits.run_timeout_seconds == Some(0) {
            return Err(ConfigError::Invalid(
                "limits.run_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.url, "http://localhost:11434");
        assert_eq!(config.llm.timeout_seconds, 300);
        assert_eq!(config.llm.fast_model(), config.llm.model);
        assert_eq!(config.render.program, "manim");
        assert_eq!(config.render.subcommand.as_deref(), Some("render"));
        assert_eq!(config.render.timeout_seconds, 1000);
        assert_eq!(config.limits.max_refinements, 10);
        assert_eq!(config.limits.max_repairs, 3);
        assert_eq!(config.limits.max_resets, 1);
        assert!(config.limits.run_timeout_seconds.is_none());
        assert!(config.behavior.stream_output);
        assert!(!config.behavior.keep_artifacts);
    }

    #[test]
    fn test_generation_cycle_ceiling() {
        assert_eq!(LimitsConfig::default().max_generation_cycles(), 8);
    }

    #[test]
    fn test_config_with_overrides() {
        let config = Config::default().with_overrides(
            Some("llama3".to_string()),
            Some("http://remote:11434".to_string()),
            Some(600),
            true,
        );
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.url, "http://remote:11434");
        assert_eq!(config.llm.timeout_seconds, 600);
        assert!(!config.behavior.stream_output);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[llm]
url = "http://custom:8080"
model = "codellama"
fast_model = "llama3.2"

[render]
timeout_seconds = 120
extra_args = []

[limits]
max_repairs = 2
run_timeout_seconds = 3600

[behavior]
stream_output = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.url, "http://custom:8080");
        assert_eq!(config.llm.fast_model(), "llama3.2");
        assert_eq!(config.render.timeout_seconds, 120);
        assert!(config.render.extra_args.is_empty());
        assert_eq!(config.render.program, "manim"); // default
        assert_eq!(config.limits.max_repairs, 2);
        assert_eq!(config.limits.max_refinements, 10); // default
        assert_eq!(config.limits.run_timeout_seconds, Some(3600));
        assert!(!config.behavior.stream_output);
    }

    #[test]
    fn test_resolve_paths() {
        let root = Path::new("/srv/project");
        let config = Config::default().resolve_paths(root);
        assert_eq!(config.render.staging_dir, root.join("staging"));
        assert_eq!(config.render.media_dir, root.join("videos"));
        assert_eq!(config.output.dir, root.join("output"));
        assert_eq!(config.output.rules_dir, root.join("rules"));
    }

    #[test]
    fn test_validate_rejects_zero_render_timeout() {
        let mut config = Config::default();
        config.render.timeout_seconds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
