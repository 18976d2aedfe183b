use crate::config::AutoResetConfig;

/// Instability score reported by an algorithm for one frame
///
/// 0 means the model explains the frame well, 1 means it does not explain it
/// at all. How the score is computed is up to the algorithm.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct DriftSignal(f32);

impl DriftSignal {
    pub fn new(score: f32) -> Self {
        if score.is_nan() {
            return Self(0.0);
        }
        Self(score.clamp(0.0, 1.0))
    }

    pub fn stable() -> Self {
        Self(0.0)
    }

    pub fn drifting() -> Self {
        Self(1.0)
    }

    pub fn score(&self) -> f32 {
        self.0
    }
}

/// Decides when sustained drift warrants rebuilding the model
#[derive(Debug, Clone)]
pub struct AutoResetPolicy {
    config: AutoResetConfig,
    enabled: bool,
    unstable_streak: usize,
}

impl AutoResetPolicy {
    pub fn new(config: AutoResetConfig, enabled: bool) -> Self {
        Self {
            config,
            enabled,
            unstable_streak: 0,
        }
    }

    pub fn config(&self) -> &AutoResetConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.unstable_streak = 0;
    }

    /// Forget accumulated drift, e.g. after the model was rebuilt
    pub fn clear(&mut self) {
        self.unstable_streak = 0;
    }

    /// Feed one frame's drift; returns true when a reset should happen now
    ///
    /// Must only be called while the reset cooldown is elapsed.
    pub fn evaluate(&mut self, drift: DriftSignal, frames_since_reset: usize) -> bool {
        if !self.enabled {
            return false;
        }

        if drift.score() > self.config.drift_threshold {
            self.unstable_streak += 1;
        } else {
            self.unstable_streak = 0;
        }

        let trigger = self.unstable_streak >= self.config.sustained_frames
            && frames_since_reset >= self.config.min_frames_between_resets;
        if trigger {
            tracing::debug!(
                "Drift sustained for {} frames (score={:.3}, {} frames since reset)",
                self.unstable_streak,
                drift.score(),
                frames_since_reset
            );
            self.unstable_streak = 0;
        }
        trigger
    }
}
