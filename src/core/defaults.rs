use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::names::DEFAULT_NAME_LENGTH;

/// File name looked up in the project root when no explicit config is given.
pub const CONFIG_FILE_NAME: &str = "obscura.json";

/// Root configuration structure for obscura.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObscuraConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via obscura.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_tag")]
    pub tag: String,

    #[serde(default = "default_character_count")]
    pub character_count: usize,

    /// Name length for the tag pass that follows an indexer pass.
    #[serde(default = "default_manual_character_count")]
    pub manual_character_count: usize,

    #[serde(default)]
    pub ignore_modules: Vec<String>,

    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,

    #[serde(default = "default_markup_extensions")]
    pub markup_extensions: Vec<String>,

    /// Extra symbols never renamed on the indexer path.
    #[serde(default)]
    pub denylist: Vec<String>,

    #[serde(default = "default_map_directory")]
    pub map_directory: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            character_count: default_character_count(),
            manual_character_count: default_manual_character_count(),
            ignore_modules: Vec::new(),
            source_extensions: default_source_extensions(),
            markup_extensions: default_markup_extensions(),
            denylist: Vec::new(),
            map_directory: default_map_directory(),
        }
    }
}

impl Defaults {
    pub fn validate(&self) -> Result<()> {
        if self.tag.is_empty() {
            return Err(Error::config_invalid_value(
                "tag",
                Some(self.tag.clone()),
                "Tag must not be empty",
            ));
        }
        if !self.tag.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(Error::config_invalid_value(
                "tag",
                Some(self.tag.clone()),
                "Tag must only contain identifier characters",
            ));
        }
        for (key, value) in [
            ("character_count", self.character_count),
            ("manual_character_count", self.manual_character_count),
        ] {
            if value == 0 {
                return Err(Error::config_invalid_value(
                    key,
                    Some(value.to_string()),
                    "Name length must be positive",
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_tag() -> String {
    "__s".to_string()
}

fn default_character_count() -> usize {
    DEFAULT_NAME_LENGTH
}

fn default_manual_character_count() -> usize {
    30
}

fn default_source_extensions() -> Vec<String> {
    vec!["swift".to_string()]
}

fn default_markup_extensions() -> Vec<String> {
    vec!["storyboard".to_string(), "xib".to_string()]
}

fn default_map_directory() -> String {
    "obscura-maps".to_string()
}

// =============================================================================
// Loading functions
// =============================================================================

/// Resolve which config file applies: an explicit path, or obscura.json in the root.
pub fn config_path(root: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => root.join(CONFIG_FILE_NAME),
    }
}

/// Load config. A missing implicit file yields built-in defaults; a missing
/// explicit file or invalid JSON is an error.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<ObscuraConfig> {
    let path = config_path(root, explicit);

    if !path.exists() {
        if explicit.is_some() {
            return Err(Error::internal_io(
                "Config file not found",
                Some(format!("read {}", path.display())),
            ));
        }
        return Ok(ObscuraConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    let config: ObscuraConfig = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

    config.defaults.validate()?;
    Ok(config)
}
