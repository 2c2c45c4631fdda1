use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

/// Editor settings, stored as TOML in the user's config directory.
///
/// Missing fields take their defaults, so an older or partial file still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Wall-clock length of one scheduler tick; the virtual clock advances by
    /// the same amount.
    pub tick_period_ms: u64,
    pub skip_secs: f64,
    pub pixels_per_second: f64,
    pub snap_to_grid: bool,
    /// Fallback length for imported audio whose duration cannot be probed.
    pub default_block_secs: f64,
    pub generated_probe_timeout_secs: u64,
    pub upload_probe_timeout_secs: u64,
    pub storage_dir: Option<PathBuf>,
    /// Base directory for relative media references.
    pub media_root: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 100,
            skip_secs: 10.0,
            pixels_per_second: 800.0 / 180.0,
            snap_to_grid: true,
            default_block_secs: 30.0,
            generated_probe_timeout_secs: 15,
            upload_probe_timeout_secs: 5,
            storage_dir: None,
            media_root: None,
        }
    }
}

impl EditorConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("press-reel").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), "ignoring malformed config: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::default_path().ok_or_else(|| anyhow::anyhow!("no config directory"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }

    pub fn generated_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.generated_probe_timeout_secs)
    }

    pub fn upload_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_probe_timeout_secs)
    }

    /// Directory holding the persisted timeline.
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|p| p.join("press-reel")))
            .unwrap_or_else(|| PathBuf::from(".press-reel"))
    }
}
