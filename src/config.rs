use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MotionReplayError, Result};

/// Frame interval of the Visualize screen's playback
pub const PLAYBACK_INTERVAL_MS: u64 = 100;

/// Runtime settings, optionally read from a TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sensor sampling period in milliseconds
    pub sampling_period_ms: u64,
    /// Playback frame interval in milliseconds. Replay is defined at
    /// `PLAYBACK_INTERVAL_MS`; any other value changes replay speed and is
    /// only meant for tooling and tests.
    pub playback_interval_ms: u64,
    /// Directory holding the session store
    pub store_dir: PathBuf,
    /// Capacity of the controller's event queue
    pub event_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling_period_ms: 100,
            playback_interval_ms: PLAYBACK_INTERVAL_MS,
            store_dir: PathBuf::from("motion_replay_data"),
            event_queue_capacity: 500,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| MotionReplayError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MotionReplayError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sampling_period_ms == 0 {
            return Err(MotionReplayError::InvalidConfig(
                "sampling_period_ms must be positive".to_string(),
            ));
        }
        if self.playback_interval_ms == 0 {
            return Err(MotionReplayError::InvalidConfig(
                "playback_interval_ms must be positive".to_string(),
            ));
        }
        if self.event_queue_capacity == 0 {
            return Err(MotionReplayError::InvalidConfig(
                "event_queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sampling_period(&self) -> Duration {
        Duration::from_millis(self.sampling_period_ms)
    }

    pub fn playback_interval(&self) -> Duration {
        if self.playback_interval_ms != PLAYBACK_INTERVAL_MS {
            log::debug!(
                "[config] playback interval overridden to {} ms",
                self.playback_interval_ms
            );
        }
        Duration::from_millis(self.playback_interval_ms)
    }
}
