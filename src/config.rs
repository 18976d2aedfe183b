use crate::error::{CosegError, Result};
use serde::Deserialize;

/// How spatial dimensions relate across input streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamGeometry {
    /// All input streams must share the same (rows, cols)
    #[default]
    Shared,
    /// Each stream keeps its own dimensions (still fixed per epoch)
    Independent,
}

/// Tuning of the automatic model reset policy
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AutoResetConfig {
    /// Frames to wait after an automatic reset before the next one is eligible
    pub cooldown_frames: usize,
    /// Minimum frames since the last reset before drift is acted upon
    pub min_frames_between_resets: usize,
    /// Drift score above which a frame counts as unstable, in [0, 1]
    pub drift_threshold: f32,
    /// Consecutive unstable frames required to trigger a reset
    pub sustained_frames: usize,
}

impl Default for AutoResetConfig {
    fn default() -> Self {
        Self {
            cooldown_frames: 100,
            min_frames_between_resets: 30,
            drift_threshold: 0.5,
            sustained_frames: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub geometry: StreamGeometry,
    pub auto_reset_enabled: bool,
    pub auto_reset: AutoResetConfig,
}

impl EngineConfig {
    pub fn with_geometry(mut self, geometry: StreamGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_auto_reset(mut self, enabled: bool) -> Self {
        self.auto_reset_enabled = enabled;
        self
    }

    pub fn with_auto_reset_config(mut self, auto_reset: AutoResetConfig) -> Self {
        self.auto_reset = auto_reset;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let policy = &self.auto_reset;
        if policy.sustained_frames == 0 {
            return Err(CosegError::InvalidConfig(
                "auto_reset.sustained_frames must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&policy.drift_threshold) {
            return Err(CosegError::InvalidConfig(format!(
                "auto_reset.drift_threshold must be within [0, 1], got {}",
                policy.drift_threshold
            )));
        }
        Ok(())
    }
}
