use gray_matter::engine::YAML;
use gray_matter::Matter;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::RuleError;
use crate::models::Category;
use crate::templates::rules::default_rules;

/// Frontmatter of a rule file
#[derive(Debug, Deserialize)]
struct RuleFrontmatter {
    category: String,
    #[serde(default)]
    title: Option<String>,
}

/// Read-only map from category to the rule text injected into generation prompts
#[derive(Debug, Clone)]
pub struct RuleBook {
    rules: HashMap<Category, String>,
    /// Categories whose text came from a project file
    overridden: Vec<Category>,
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleBook {
    /// Rule book containing only the built-in rules
    pub fn builtin() -> Self {
        let rules = Category::all()
            .iter()
            .map(|c| (*c, default_rules(*c).trim().to_string()))
            .collect();
        Self {
            rules,
            overridden: Vec::new(),
        }
    }

    /// Load rule files from a directory, falling back to built-ins per category
    ///
    /// Files are `*.md`; underscore-prefixed files are skipped. A missing
    /// directory yields the built-in rules.
    pub fn load(dir: &Path) -> Result<Self, RuleError> {
        let mut book = Self::builtin();
        if !dir.is_dir() {
            debug!("Rules directory {} not found, using built-in rules", dir.display());
            return Ok(book);
        }

        let entries = fs::read_dir(dir).map_err(|e| RuleError::ReadError(dir.to_path_buf(), e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some("md")
                    && !path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with('_'))
                        .unwrap_or(true)
            })
            .collect();
        paths.sort();

        for path in paths {
            let (category, body) = Self::parse_rule_file(&path)?;
            if body.is_empty() {
                warn!("Rule file {} is empty, keeping built-in rules for {}", path.display(), category);
                continue;
            }
            if book.overridden.contains(&category) {
                warn!("Rule file {} overrides an earlier file for {}", path.display(), category);
            } else {
                book.overridden.push(category);
            }
            book.rules.insert(category, body);
        }

        info!("Loaded rule book: {} project override(s)", book.overridden.len());
        Ok(book)
    }

    /// Parse one rule file into its category and body
    ///
    /// The category comes from the `category:` frontmatter field, or from the
    /// file stem when the file has no frontmatter.
    pub fn parse_rule_file(path: &Path) -> Result<(Category, String), RuleError> {
        let content =
            fs::read_to_string(path).map_err(|e| RuleError::ReadError(path.to_path_buf(), e))?;

        let matter = Matter::<YAML>::new();
        let parsed = matter.parse(&content);

        let tag = match parsed.data {
            Some(data) => {
                let front: RuleFrontmatter = data
                    .deserialize()
                    .map_err(|e| RuleError::FrontmatterError(path.to_path_buf(), e.to_string()))?;
                if let Some(title) = &front.title {
                    debug!("Rule file {} titled '{}'", path.display(), title);
                }
                front.category
            }
            None => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
        };

        let category = tag
            .parse::<Category>()
            .map_err(|_| RuleError::UnknownCategory(path.to_path_buf(), tag.clone()))?;

        Ok((category, parsed.content.trim().to_string()))
    }

    /// Rule text for a category
    pub fn rules_for(&self, category: Category) -> &str {
        self.rules
            .get(&category)
            .map(String::as_str)
            .unwrap_or_else(|| default_rules(category))
    }

    pub fn is_overridden(&self, category: Category) -> bool {
        self.overridden.contains(&category)
    }
}
