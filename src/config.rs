//! YAML configuration
//!
//! ```yaml
//! database: /home/me/notes/marginalia.db
//! palette: ["❤", "⭐", "🔥"]
//! handoff_ttl_secs: 60
//! legacy_marker: "📝"
//! ```
//!
//! Every key is optional. A missing file means all defaults.

use crate::annotation::{MarkerPalette, DEFAULT_MARKERS};
use crate::controller::ControllerSettings;
use crate::storage::LEGACY_MARKER;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "marginalia";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database; defaults to `<data_dir>/marginalia/marginalia.db`
    pub database: Option<PathBuf>,
    /// Markers saved as the palette the first time one is needed
    pub palette: Vec<String>,
    /// Seconds a jump handoff stays valid
    pub handoff_ttl_secs: u64,
    /// Marker given to records that never had one
    pub legacy_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            palette: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            handoff_ttl_secs: 60,
            legacy_marker: LEGACY_MARKER.to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A file that does not exist yields the defaults; a file that exists
    /// but does not parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_yaml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // an empty file parses as null
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// `<config_dir>/marginalia/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.yaml"))
    }

    /// `<data_dir>/marginalia/marginalia.db`, falling back to `~/.local/share`
    pub fn default_db_path() -> PathBuf {
        let data_dir = dirs::data_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
        data_dir.join(APP_DIR).join("marginalia.db")
    }

    /// The configured database, or the default one
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(Self::default_db_path)
    }

    pub fn seed_palette(&self) -> MarkerPalette {
        let palette = MarkerPalette::new(&self.palette);
        if palette.is_empty() {
            MarkerPalette::default()
        } else {
            palette
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        // chrono durations top out at i64::MAX milliseconds
        let secs = i64::try_from(self.handoff_ttl_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        ControllerSettings {
            handoff_ttl: chrono::Duration::seconds(secs),
            seed_palette: self.seed_palette(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let config = Config::from_yaml("handoff_ttl_secs: 5\n").unwrap();
        assert_eq!(config.handoff_ttl_secs, 5);
        assert_eq!(config.legacy_marker, LEGACY_MARKER);
        assert_eq!(config.palette.len(), DEFAULT_MARKERS.len());
        assert!(config.database.is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_bad_yaml_is_an_error() {
        assert!(matches!(Config::from_yaml("palette: {"), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.yaml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "database: /tmp/x.db\npalette: [\"a\", \"a\", \" \", \"b\"]\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/x.db"));
        assert_eq!(config.seed_palette().markers(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_empty_palette_falls_back_to_defaults() {
        let config = Config::from_yaml("palette: []\n").unwrap();
        assert_eq!(config.seed_palette(), MarkerPalette::default());
        assert_eq!(config.controller_settings().handoff_ttl, chrono::Duration::seconds(60));
    }
}
