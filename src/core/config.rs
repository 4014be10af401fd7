//! Layered configuration
//!
//! Later layers win: built-in defaults, user config
//! (`<config_dir>/sysprov/config.yaml`), project config
//! (`.sysprov/config.yaml`), then `SYSPROV_AUTHOR` / `SYSPROV_DATABASE`.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::category::{CategoryRuleSpec, CategoryRules};
use crate::core::error::{ProvisionError, Result};
use crate::core::project::Project;

/// Written by `sysprov init`
pub const DEFAULT_CONFIG: &str = r#"# sysprov project configuration
#
# author: Jane Doe               # recorded on scans and device configuration
# database: provisioning.db      # relative to .sysprov/
#
# notifications:
#   enabled: true
#
# Extra device-category rules, checked before the built-in ones.
# category_rules:
#   - pattern: "\\bthermal\\b"
#     category: camera
#     requires_ip: true
#
# label:
#   template: labels/device.tera
"#;

const DEFAULT_DATABASE: &str = "provisioning.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Tera template overriding the embedded label
    pub template: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub author: Option<String>,
    pub database: Option<String>,
    pub notifications: NotificationConfig,
    pub category_rules: Vec<CategoryRuleSpec>,
    pub label: LabelConfig,
}

/// One YAML file; absent keys leave the lower layer untouched
#[derive(Debug, Default, Deserialize)]
struct ConfigLayer {
    author: Option<String>,
    database: Option<String>,
    notifications: Option<NotificationConfig>,
    category_rules: Option<Vec<CategoryRuleSpec>>,
    label: Option<LabelConfig>,
}

impl Config {
    /// Load every layer that applies to `project`
    pub fn load(project: Option<&Project>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = Self::user_config_path() {
            config.merge_file(&path)?;
        }
        if let Some(project) = project {
            config.merge_file(&project.config_path())?;
        }
        config.merge_env();
        Ok(config)
    }

    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "sysprov").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn merge_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let text = fs::read_to_string(path)?;
        self.merge_yaml(&text)
            .map_err(|e| ProvisionError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded config layer");
        Ok(())
    }

    fn merge_yaml(&mut self, text: &str) -> std::result::Result<(), serde_yml::Error> {
        // A file of only comments parses as null
        let layer: Option<ConfigLayer> = serde_yml::from_str(text)?;
        let Some(layer) = layer else {
            return Ok(());
        };

        if layer.author.is_some() {
            self.author = layer.author;
        }
        if layer.database.is_some() {
            self.database = layer.database;
        }
        if let Some(notifications) = layer.notifications {
            self.notifications = notifications;
        }
        if let Some(rules) = layer.category_rules {
            self.category_rules = rules;
        }
        if let Some(label) = layer.label {
            self.label = label;
        }
        Ok(())
    }

    fn merge_env(&mut self) {
        if let Ok(author) = std::env::var("SYSPROV_AUTHOR") {
            if !author.trim().is_empty() {
                self.author = Some(author);
            }
        }
        if let Ok(db) = std::env::var("SYSPROV_DATABASE") {
            if !db.trim().is_empty() {
                self.database = Some(db);
            }
        }
    }

    /// Operator name, falling back to `$USER`
    pub fn author(&self) -> String {
        self.author
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Database location; relative paths resolve against `.sysprov/`
    pub fn database_path(&self, project: &Project) -> PathBuf {
        let name = self.database.as_deref().unwrap_or(DEFAULT_DATABASE);
        project.sysprov_dir().join(name)
    }

    /// Configured rules ahead of the built-in ones
    pub fn category_rules(&self) -> Result<CategoryRules> {
        CategoryRules::with_overrides(&self.category_rules)
    }
}
