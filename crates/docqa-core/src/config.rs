use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::DEFAULT_API_BASE;
use crate::validation::MAX_UPLOAD_BYTES;

/// Environment variable that overrides the configured service address.
pub const API_BASE_ENV: &str = "DOCQA_API_BASE";

/// Where configuration lives on disk
#[derive(Debug, Clone)]
pub struct Config {
    /// Config directory (~/.config/docqa)
    pub config_dir: PathBuf,
    /// Persisted settings (~/.config/docqa/settings.json)
    pub settings_file: PathBuf,
}

impl Config {
    pub fn load_or_default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docqa");
        Self::in_dir(config_dir)
    }

    pub fn in_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            settings_file: config_dir.join("settings.json"),
            config_dir,
        }
    }
}

/// User settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base address of the document service, without the `/api` suffix
    pub api_base: String,
    /// Initial state of the semantic-search toggle
    pub use_semantic_search: bool,
    /// Delay before the "indexed for semantic search" notice
    pub indexing_notice_delay_ms: u64,
    pub max_upload_bytes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            use_semantic_search: true,
            indexing_notice_delay_ms: 1500,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing or unreadable file yields defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Self::default();
        }

        match Self::read(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), "Ignoring settings file: {:#}", e);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read settings file")?;
        let settings = serde_json::from_str(&content).context("Failed to parse settings JSON")?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).context("Failed to write settings file")?;
        Ok(())
    }

    /// Apply `DOCQA_API_BASE` when set.
    pub fn with_env_overrides(self) -> Self {
        let api_base = std::env::var(API_BASE_ENV).ok();
        self.with_api_base(api_base.as_deref())
    }

    /// Replace the service address when `api_base` is non-empty.
    pub fn with_api_base(mut self, api_base: Option<&str>) -> Self {
        if let Some(base) = api_base.map(str::trim).filter(|b| !b.is_empty()) {
            self.api_base = base.to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api_base, "http://127.0.0.1:8000");
        assert_eq!(settings.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"api_base": "http://docs.internal:9000"}"#).unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.api_base, "http://docs.internal:9000");
        assert!(settings.use_semantic_search);
        assert_eq!(settings.indexing_notice_delay_ms, 1500);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let config = Config::in_dir(dir.path().join("docqa"));
        let settings = Settings {
            use_semantic_search: false,
            ..Settings::default()
        };

        settings.save(&config.settings_file).unwrap();
        assert_eq!(Settings::load(&config.settings_file), settings);
    }

    #[test]
    fn test_api_base_override() {
        let settings = Settings::default().with_api_base(Some("http://other:8080"));
        assert_eq!(settings.api_base, "http://other:8080");

        let unchanged = Settings::default().with_api_base(Some("  "));
        assert_eq!(unchanged.api_base, DEFAULT_API_BASE);
        assert_eq!(Settings::default().with_api_base(None), Settings::default());
    }
}
