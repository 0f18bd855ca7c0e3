//! Canvas settings
//!
//! Read from an optional JSON file; every field falls back to its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_HEIGHT, DEFAULT_SNAPSHOT_PATH, DEFAULT_WIDTH, MAX_CELLS, SAVE_INTERVAL};

/// Snapshot consistency level (selects the grid concurrency strategy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    /// Lock-free atomic cells; snapshots may mix before/after values
    #[default]
    Torn,
    /// Per-cell reader/writer locks; snapshots are point-in-time
    Exact,
}

impl Consistency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Consistency::Torn => "torn",
            Consistency::Exact => "exact",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "torn" | "atomic" => Some(Consistency::Torn),
            "exact" | "locked" => Some(Consistency::Exact),
            _ => None,
        }
    }
}

/// Service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Width of a fresh canvas (ignored when a snapshot loads)
    pub width: u32,
    /// Height of a fresh canvas (ignored when a snapshot loads)
    pub height: u32,
    /// Live snapshot file
    pub snapshot_path: PathBuf,
    /// Seconds between the end of one save and the start of the next
    pub save_interval_secs: u64,
    /// Grid strategy
    pub consistency: Consistency,
    /// Keep the previous snapshot as `<path>.bak`
    pub keep_backup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            save_interval_secs: SAVE_INTERVAL.as_secs(),
            consistency: Consistency::Torn,
            keep_backup: true,
        }
    }
}

impl Settings {
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("canvas size {}x{} is empty", self.width, self.height));
        }
        // A canvas the snapshot format cannot hold would never be saved
        if self.width as u64 * self.height as u64 > MAX_CELLS {
            return Err(format!(
                "canvas size {}x{} exceeds {} cells",
                self.width, self.height, MAX_CELLS
            ));
        }
        if self.save_interval_secs == 0 {
            return Err("save_interval_secs must be at least 1".to_string());
        }
        if self.snapshot_path.as_os_str().is_empty() {
            return Err("snapshot_path is empty".to_string());
        }
        Ok(())
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                log::info!("No settings at {} ({}), using defaults", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Settings>(&json) {
            Ok(settings) => match settings.validate() {
                Ok(()) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Invalid settings in {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to parse {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }
}
