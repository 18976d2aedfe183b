use crate::error::{CosegError, Result};

/// Frame counters of one initialization epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounters {
    /// Frames processed since the last (re)initialization
    pub frame_index: usize,
    /// Frames processed since the last model reset, automatic or not
    pub frames_since_reset: usize,
    /// Frames left before an automatic reset is eligible again
    pub reset_cooldown: usize,
}

/// Initialization status of an engine
///
/// Counters only exist once parameters are initialized, so a running model
/// without ROIs or an uninitialized engine with a frame index cannot be
/// represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    /// ROIs and geometry are set; the next apply is a cold start
    ParamsInitialized(FrameCounters),
    /// Model built during initialization, no frame processed yet
    ModelInitialized(FrameCounters),
    /// Model built and updated by at least one frame
    Running(FrameCounters),
}

impl Lifecycle {
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Lifecycle::Uninitialized)
    }

    pub fn is_model_initialized(&self) -> bool {
        matches!(self, Lifecycle::ModelInitialized(_) | Lifecycle::Running(_))
    }

    pub fn counters(&self) -> Option<&FrameCounters> {
        match self {
            Lifecycle::Uninitialized => None,
            Lifecycle::ParamsInitialized(counters)
            | Lifecycle::ModelInitialized(counters)
            | Lifecycle::Running(counters) => Some(counters),
        }
    }

    fn counters_mut(&mut self) -> Option<&mut FrameCounters> {
        match self {
            Lifecycle::Uninitialized => None,
            Lifecycle::ParamsInitialized(counters)
            | Lifecycle::ModelInitialized(counters)
            | Lifecycle::Running(counters) => Some(counters),
        }
    }

    pub fn frame_index(&self) -> usize {
        self.counters().map_or(0, |c| c.frame_index)
    }

    pub fn frames_since_reset(&self) -> usize {
        self.counters().map_or(0, |c| c.frames_since_reset)
    }

    pub fn reset_cooldown(&self) -> usize {
        self.counters().map_or(0, |c| c.reset_cooldown)
    }

    /// Enter a new epoch with zeroed counters, from any state
    pub fn initialize(&mut self, model_ready: bool) {
        let counters = FrameCounters::default();
        *self = if model_ready {
            Lifecycle::ModelInitialized(counters)
        } else {
            Lifecycle::ParamsInitialized(counters)
        };
    }

    /// Record one successfully processed frame
    pub fn advance(&mut self, model_ready: bool) -> Result<()> {
        let mut counters = *self.counters().ok_or(CosegError::NotInitialized)?;
        counters.frame_index += 1;
        counters.frames_since_reset += 1;
        *self = if model_ready {
            Lifecycle::Running(counters)
        } else {
            Lifecycle::ParamsInitialized(counters)
        };
        Ok(())
    }

    /// Drop the model and start counting from zero, keeping parameters
    pub fn reset(&mut self) -> Result<()> {
        if !self.is_initialized() {
            return Err(CosegError::NotInitialized);
        }
        *self = Lifecycle::ParamsInitialized(FrameCounters::default());
        Ok(())
    }

    pub fn set_reset_cooldown(&mut self, frames: usize) {
        if let Some(counters) = self.counters_mut() {
            counters.reset_cooldown = frames;
        }
    }

    /// Count down the reset cooldown; returns true if it was already elapsed
    pub fn tick_cooldown(&mut self) -> bool {
        match self.counters_mut() {
            Some(counters) if counters.reset_cooldown > 0 => {
                counters.reset_cooldown -= 1;
                false
            }
            _ => true,
        }
    }

    /// Give up on the current epoch; used when a reset could not complete
    pub fn invalidate(&mut self) {
        *self = Lifecycle::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized() {
        let lifecycle = Lifecycle::default();
        assert!(!lifecycle.is_initialized());
        assert!(!lifecycle.is_model_initialized());
        assert_eq!(lifecycle.frame_index(), 0);
    }

    #[test]
    fn advance_requires_initialization() {
        let mut lifecycle = Lifecycle::default();
        assert!(matches!(
            lifecycle.advance(true),
            Err(CosegError::NotInitialized)
        ));
        assert_eq!(lifecycle, Lifecycle::Uninitialized);
    }

    #[test]
    fn cold_start_then_running() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.initialize(false);
        assert!(lifecycle.is_initialized());
        assert!(!lifecycle.is_model_initialized());

        lifecycle.advance(true).unwrap();
        lifecycle.advance(true).unwrap();

        assert!(matches!(lifecycle, Lifecycle::Running(_)));
        assert_eq!(lifecycle.frame_index(), 2);
        assert_eq!(lifecycle.frames_since_reset(), 2);
    }

    #[test]
    fn reset_zeroes_counters() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.initialize(true);
        lifecycle.advance(true).unwrap();
        lifecycle.set_reset_cooldown(3);

        lifecycle.reset().unwrap();

        assert_eq!(
            lifecycle,
            Lifecycle::ParamsInitialized(FrameCounters::default())
        );
    }

    #[test]
    fn cooldown_counts_down_to_zero() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.initialize(true);
        lifecycle.set_reset_cooldown(2);

        assert!(!lifecycle.tick_cooldown());
        assert!(!lifecycle.tick_cooldown());
        assert!(lifecycle.tick_cooldown());
        assert_eq!(lifecycle.reset_cooldown(), 0);
    }
}
