//! Bundled templates for SceneForge project initialization
//!
//! This module provides the default configuration file and the per-category
//! rule files that `init` writes and that the rule book falls back to.

pub mod rules;

use crate::models::Category;

/// Default configuration content
pub const CONFIG: &str = r#"# SceneForge configuration

[llm]
url = "http://localhost:11434"
model = "qwen2.5-coder:32b"
# Model used for classification and review calls (defaults to `model`)
# fast_model = "qwen2.5-coder:7b"
timeout_seconds = 300

[render]
program = "manim"
subcommand = "render"
extra_args = ["--custom_folders"]
timeout_seconds = 1000
staging_dir = "staging"
media_dir = "videos"
version_suffix = "_ManimCE_v0.19.0"

[limits]
max_refinements = 10
max_repairs = 3
max_resets = 1
# run_timeout_seconds = 3600

[behavior]
stream_output = true
keep_artifacts = false

[output]
dir = "output"
rules_dir = "rules"
"#;

/// Rule file content (frontmatter plus body) for a category
pub fn rule_file(category: Category) -> String {
    format!(
        "---\ncategory: {}\ntitle: {}\n---\n\n{}\n",
        category.tag(),
        category.display_name(),
        rules::default_rules(category).trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    #[test]
    fn test_config_template_parses_to_defaults() {
        let config: Config = toml::from_str(CONFIG).unwrap();
        let defaults = Config::default();
        assert_eq!(config.llm.model, defaults.llm.model);
        assert_eq!(config.render.timeout_seconds, defaults.render.timeout_seconds);
        assert_eq!(config.render.extra_args, defaults.render.extra_args);
        assert_eq!(config.limits.max_refinements, defaults.limits.max_refinements);
        assert_eq!(config.limits.max_repairs, defaults.limits.max_repairs);
        assert_eq!(config.limits.max_resets, defaults.limits.max_resets);
        assert_eq!(config.output.rules_dir, defaults.output.rules_dir);
    }

    #[test]
    fn test_rule_file_has_frontmatter() {
        let content = rule_file(Category::ComputerDatastructure);
        assert!(content.starts_with("---\ncategory: COMPUTER_DATASTRUCTURE\n"));
        assert!(content.contains(rules::default_rules(Category::ComputerDatastructure).trim()));
    }
}
