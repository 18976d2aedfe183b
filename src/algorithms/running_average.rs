use super::appearance::AppearanceModel;
use super::{BACKGROUND, FOREGROUND};
use crate::engine::{
    CosegmentationAlgorithm, FrameContext, InitContext, LearningRate, Segmentation,
};
use crate::frame::LabelMask;
use crate::reset_policy::DriftSignal;
use anyhow::Result;

/// Foreground/background segmentation against a per-pixel running mean
///
/// Every stream is labeled independently. The first frame after
/// initialization seeds the model and is labeled as background.
#[derive(Debug, Clone)]
pub struct RunningAverageCosegmentor<const N: usize> {
    threshold: f32,
    learning_rate: f64,
    model: AppearanceModel<N>,
}

impl<const N: usize> RunningAverageCosegmentor<N> {
    pub fn new(threshold: f32, learning_rate: f64) -> Self {
        Self {
            threshold,
            learning_rate,
            model: AppearanceModel::default(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl<const N: usize> Default for RunningAverageCosegmentor<N> {
    fn default() -> Self {
        Self::new(0.1, 0.05)
    }
}

impl<const N: usize> CosegmentationAlgorithm<u8, N, N> for RunningAverageCosegmentor<N> {
    fn name(&self) -> &'static str {
        "running-average"
    }

    fn default_learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn initialize_model(&mut self, _ctx: &InitContext<'_, N>) -> Result<bool> {
        self.model.clear();
        Ok(false)
    }

    fn segment(
        &mut self,
        ctx: &FrameContext<'_, u8, N, N>,
        rate: LearningRate,
    ) -> Result<Segmentation<u8, N>> {
        let _span = tracing::debug_span!("running_average_segment").entered();

        if !ctx.model_initialized || !self.model.is_built() {
            tracing::debug!("Seeding running average model");
            self.model.seed(ctx.images);
            return Ok(Segmentation {
                masks: std::array::from_fn(|s| LabelMask::from_elem(ctx.geometry[s], BACKGROUND)),
                model_ready: true,
                drift: DriftSignal::stable(),
            });
        }

        self.model.check(ctx.images)?;

        let mut drift = 0.0;
        let masks = std::array::from_fn(|stream| {
            let image = &ctx.images[stream];
            let roi = &ctx.rois[stream];
            let mut mask = LabelMask::from_elem(ctx.geometry[stream], BACKGROUND);
            let mut valid = 0usize;
            let mut foreground = 0usize;

            for ((r, c), &v) in roi.view().indexed_iter() {
                if v == 0 {
                    continue;
                }
                valid += 1;
                if self.model.distance(stream, image, r, c) > self.threshold {
                    mask[[r, c]] = FOREGROUND;
                    foreground += 1;
                }
                if let LearningRate::Rate(rate) = rate {
                    self.model.update(stream, image, r, c, rate as f32);
                }
            }

            if valid > 0 {
                drift += foreground as f32 / valid as f32;
            }
            mask
        });

        Ok(Segmentation {
            masks,
            model_ready: true,
            drift: DriftSignal::new(drift / N as f32),
        })
    }

    fn reset_model(&mut self) {
        self.model.clear();
    }
}
