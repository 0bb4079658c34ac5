//! Runtime configuration for the sync core.
//!
//! Provides two loading methods, mirroring how rules are shipped elsewhere in
//! the app:
//! - `default_config()` - the embedded `config/sync_defaults.toml`
//! - `load_config(path)` - the embedded defaults overlaid with a user file
//!
//! Override files may be partial: any key they omit keeps its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::notation::CategoryEditMode;

const DEFAULT_CONFIG: &str = include_str!("../config/sync_defaults.toml");

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SyncConfig {
    pub history: HistoryConfig,
    pub autosave: AutosaveConfig,
    pub bridge: BridgeConfig,
    pub media: MediaConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HistoryConfig {
    /// Maximum number of undo snapshots; the oldest is evicted beyond it.
    pub depth: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AutosaveConfig {
    pub debounce_ceiling_ms: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub max_markers: usize,
    pub resync_interval_ms: u64,
    pub default_fps: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MediaConfig {
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScoringConfig {
    pub category_edit_mode: CategoryEditMode,
}

impl SyncConfig {
    pub fn debounce_ceiling(&self) -> Duration {
        Duration::from_millis(self.autosave.debounce_ceiling_ms)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_millis(self.bridge.resync_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.media.probe_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        default_config()
    }
}

/// The configuration embedded in the binary.
///
/// # Panics
/// Panics if the embedded TOML is invalid (a build-time bug).
pub fn default_config() -> SyncConfig {
    toml::from_str(DEFAULT_CONFIG).expect("embedded sync_defaults.toml must be valid TOML")
}

/// Load the embedded defaults overlaid with the TOML file at `path`.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    parse_with_defaults(&content).with_context(|| format!("Invalid config file {:?}", path))
}

/// Location of the user override file: `<config dir>/notation-sync/sync.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("notation-sync").join("sync.toml"))
}

/// Load the user override file when it exists, falling back to the defaults
/// (with a warning) when it is missing or unreadable.
pub fn load_or_default() -> SyncConfig {
    let Some(path) = config_path() else {
        return default_config();
    };
    if !path.exists() {
        return default_config();
    }
    match load_config(&path) {
        Ok(config) => {
            info!("Loaded sync config from {:?}", path);
            config
        }
        Err(e) => {
            warn!("Ignoring sync config {:?}: {:#}", path, e);
            default_config()
        }
    }
}

fn parse_with_defaults(overrides: &str) -> Result<SyncConfig> {
    let mut base: toml::Table = toml::from_str(DEFAULT_CONFIG)?;
    let overlay: toml::Table = toml::from_str(overrides)?;
    merge_tables(&mut base, overlay);
    let config: SyncConfig = toml::Value::Table(base).try_into()?;
    if config.history.depth == 0 {
        anyhow::bail!("history.depth must be at least 1");
    }
    Ok(config)
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_loads() {
        let config = default_config();
        assert_eq!(config.history.depth, 100);
        assert_eq!(config.autosave.debounce_ceiling_ms, 2500);
        assert_eq!(config.bridge.max_markers, 120);
        assert_eq!(config.scoring.category_edit_mode, CategoryEditMode::Distribute);
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config = parse_with_defaults(
            "[history]\ndepth = 5\n\n[scoring]\ncategory_edit_mode = \"strict\"\n",
        )
        .unwrap();
        assert_eq!(config.history.depth, 5);
        assert_eq!(config.scoring.category_edit_mode, CategoryEditMode::Strict);
        assert_eq!(config.autosave.debounce_ceiling_ms, 2500);
        assert_eq!(config.bridge.default_fps, 30.0);
    }

    #[test]
    fn test_zero_history_depth_rejected() {
        let result = parse_with_defaults("[history]\ndepth = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[autosave]\ndebounce_ceiling_ms = 1000").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.debounce_ceiling(), Duration::from_millis(1000));
    }

    #[test]
    fn test_config_path_is_app_scoped() {
        if let Some(path) = config_path() {
            assert!(path.ends_with("notation-sync/sync.toml"));
        }
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let result = load_config(Path::new("/nonexistent/sync.toml"));
        assert!(result.is_err());
    }
}
