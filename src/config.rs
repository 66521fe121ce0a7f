//! Configuration management
//!
//! Learning engine tunables and storage location, persisted as TOML in the
//! platform configuration directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LearningError, Result};
use crate::learning::analytics::DEFAULT_ANALYTICS_TOP_LIMIT;
use crate::learning::keywords::{DEFAULT_MAX_KEYWORDS, DEFAULT_MIN_KEYWORD_LEN};
use crate::learning::matcher::{MatchStrategy, DEFAULT_SUGGESTION_LIMIT};
use crate::learning::updater::DEFAULT_PATTERN_TYPE;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Learning engine settings
    #[serde(default)]
    pub learning: LearningConfig,
    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Learning engine tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Maximum keywords extracted per text
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    /// Keywords must be longer than this many characters
    #[serde(default = "default_min_keyword_len")]
    pub min_keyword_len: usize,
    /// Patterns returned for prompt enhancement
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,
    /// Patterns listed in analytics
    #[serde(default = "default_analytics_top_limit")]
    pub analytics_top_limit: usize,
    /// Keyword matching rule
    #[serde(default)]
    pub match_strategy: MatchStrategy,
    /// Type tag of newly learned patterns
    #[serde(default = "default_pattern_type")]
    pub pattern_type: String,
    /// Also drop common function words like "what" and "your"
    #[serde(default)]
    pub extended_stop_words: bool,
}

fn default_max_keywords() -> usize {
    DEFAULT_MAX_KEYWORDS
}

fn default_min_keyword_len() -> usize {
    DEFAULT_MIN_KEYWORD_LEN
}

fn default_suggestion_limit() -> usize {
    DEFAULT_SUGGESTION_LIMIT
}

fn default_analytics_top_limit() -> usize {
    DEFAULT_ANALYTICS_TOP_LIMIT
}

fn default_pattern_type() -> String {
    DEFAULT_PATTERN_TYPE.to_string()
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            max_keywords: default_max_keywords(),
            min_keyword_len: default_min_keyword_len(),
            suggestion_limit: default_suggestion_limit(),
            analytics_top_limit: default_analytics_top_limit(),
            match_strategy: MatchStrategy::default(),
            pattern_type: default_pattern_type(),
            extended_stop_words: false,
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    data_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("learning.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, writing defaults on first use
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LearningError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| LearningError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LearningError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = self.to_toml()?;

        std::fs::write(path, contents)
            .map_err(|e| LearningError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| LearningError::Config(format!("Failed to serialize config: {}", e)))
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "adaptive-learning", "adaptive-learning")
        .ok_or_else(|| LearningError::Config("Failed to get project directories".to_string()))
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = LearningConfig::default();
        assert_eq!(config.max_keywords, 5);
        assert_eq!(config.min_keyword_len, 3);
        assert_eq!(config.suggestion_limit, 3);
        assert_eq!(config.analytics_top_limit, 5);
        assert_eq!(config.match_strategy, MatchStrategy::Substring);
        assert_eq!(config.pattern_type, "contextual");
        assert!(!config.extended_stop_words);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [learning]
            suggestion_limit = 7
            match_strategy = "exact"
            extended_stop_words = true

            [storage]
            database_path = "/tmp/patterns.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.learning.suggestion_limit, 7);
        assert_eq!(config.learning.match_strategy, MatchStrategy::Exact);
        assert_eq!(config.learning.max_keywords, 5);
        assert!(config.learning.extended_stop_words);
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/patterns.db"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.learning.analytics_top_limit = 10;
        config.storage.database_path = dir.path().join("learning.db");
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "learning = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(LearningError::Config(_))));
    }
}
