use crate::config::{EngineConfig, StreamGeometry};
use crate::error::{CosegError, Result};
use crate::frame::{self, Frame, Geometry, Label, LabelMask};
use crate::history::FrameHistory;
use crate::lifecycle::Lifecycle;
use crate::reset_policy::{AutoResetPolicy, DriftSignal};
use crate::roi::{PixelCounts, RoiManager, RoiMask};

/// Model update strength requested for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LearningRate {
    /// Label the frame but leave the temporal model untouched
    Frozen,
    Rate(f64),
}

impl LearningRate {
    /// Map a caller-supplied rate: negative (or NaN) selects the default,
    /// zero freezes the model
    pub fn resolve(requested: f64, default: f64) -> Self {
        let rate = if requested.is_nan() || requested < 0.0 {
            default
        } else {
            requested
        };
        if rate > 0.0 {
            LearningRate::Rate(rate)
        } else {
            LearningRate::Frozen
        }
    }

    pub fn updates_model(&self) -> bool {
        matches!(self, LearningRate::Rate(_))
    }

    pub fn value(&self) -> f64 {
        match self {
            LearningRate::Frozen => 0.0,
            LearningRate::Rate(rate) => *rate,
        }
    }
}

/// Everything an algorithm sees when (re)building its model
pub struct InitContext<'a, const N: usize> {
    pub images: &'a [Frame; N],
    pub rois: &'a [RoiMask; N],
    pub pixel_counts: &'a [PixelCounts; N],
}

/// Everything an algorithm sees when segmenting one frame
pub struct FrameContext<'a, L, const N: usize, const M: usize> {
    pub images: &'a [Frame; N],
    pub rois: &'a [RoiMask; N],
    pub geometry: &'a [Geometry; N],
    /// Inputs of the previous frame, if one was processed in this epoch
    pub previous_inputs: Option<&'a [Frame; N]>,
    /// Masks of the previous frame, if one was processed in this epoch
    pub previous_masks: Option<&'a [LabelMask<L>; M]>,
    pub frame_index: usize,
    /// False on a cold start
    pub model_initialized: bool,
}

/// Output of one segmentation step
#[derive(Debug, Clone)]
pub struct Segmentation<L, const M: usize> {
    pub masks: [LabelMask<L>; M],
    /// Whether the algorithm's model is built after this frame
    pub model_ready: bool,
    pub drift: DriftSignal,
}

/// Labeling rule and temporal model of a cosegmentation method
///
/// Implementations only own their model; ROI handling, frame counting,
/// history and automatic resets are driven by [`Cosegmentor`].
pub trait CosegmentationAlgorithm<L: Label, const N: usize, const M: usize> {
    fn name(&self) -> &'static str;

    /// Margin required around valid pixels by the algorithm's spatial operators
    fn roi_border_size(&self) -> usize {
        0
    }

    fn default_learning_rate(&self) -> f64;

    /// (Re)build the model for a new epoch
    ///
    /// Returns true if the model is complete, false if it will be built on
    /// the first processed frame.
    fn initialize_model(&mut self, ctx: &InitContext<'_, N>) -> anyhow::Result<bool>;

    /// Label one frame and update the model according to `rate`
    ///
    /// # Arguments
    /// * `ctx` - Current images, validated ROIs, stream geometry and the
    ///   previous frame of this epoch
    /// * `rate` - `Frozen` labels without touching the model
    ///
    /// # Returns
    /// * One mask per output stream, each shaped like `ctx.geometry` of its
    ///   stream. Output stream `m` uses the geometry of input `min(m, N - 1)`.
    ///
    /// The engine rejects masks of any other shape after this call returns,
    /// so implementations must size their masks from `ctx.geometry` and
    /// only update the model once labeling succeeded. On error the model
    /// must be left as it was.
    fn segment(
        &mut self,
        ctx: &FrameContext<'_, L, N, M>,
        rate: LearningRate,
    ) -> anyhow::Result<Segmentation<L, M>>;

    /// Drop the model; the next frame is a cold start
    fn reset_model(&mut self);

    /// Called with validated ROIs before they replace the current ones
    ///
    /// Returns false if the model no longer holds and the engine should
    /// restart its epoch.
    fn on_rois_changed(&mut self, _rois: &[RoiMask; N]) -> anyhow::Result<bool> {
        Ok(true)
    }
}

impl<T, L, const N: usize, const M: usize> CosegmentationAlgorithm<L, N, M> for Box<T>
where
    T: CosegmentationAlgorithm<L, N, M> + ?Sized,
    L: Label,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn roi_border_size(&self) -> usize {
        (**self).roi_border_size()
    }

    fn default_learning_rate(&self) -> f64 {
        (**self).default_learning_rate()
    }

    fn initialize_model(&mut self, ctx: &InitContext<'_, N>) -> anyhow::Result<bool> {
        (**self).initialize_model(ctx)
    }

    fn segment(
        &mut self,
        ctx: &FrameContext<'_, L, N, M>,
        rate: LearningRate,
    ) -> anyhow::Result<Segmentation<L, M>> {
        (**self).segment(ctx, rate)
    }

    fn reset_model(&mut self) {
        (**self).reset_model()
    }

    fn on_rois_changed(&mut self, rois: &[RoiMask; N]) -> anyhow::Result<bool> {
        (**self).on_rois_changed(rois)
    }
}

/// Drives a cosegmentation algorithm over `N` synchronized input streams,
/// producing `M` label masks per frame
pub struct Cosegmentor<A, L, const N: usize, const M: usize> {
    algorithm: A,
    config: EngineConfig,
    lifecycle: Lifecycle,
    rois: RoiManager<N>,
    geometry: Option<[Geometry; N]>,
    history: FrameHistory<L, N, M>,
    policy: AutoResetPolicy,
}

impl<A, L, const N: usize, const M: usize> Cosegmentor<A, L, N, M>
where
    A: CosegmentationAlgorithm<L, N, M>,
    L: Label,
{
    pub fn new(algorithm: A, config: EngineConfig) -> Result<Self> {
        if N == 0 || M == 0 {
            return Err(CosegError::InvalidConfig(format!(
                "stream counts must be positive (inputs={N}, outputs={M})"
            )));
        }
        config.validate()?;

        let border_size = algorithm.roi_border_size();
        tracing::debug!(
            "Creating '{}' cosegmentor: {} inputs, {} outputs, ROI border {}px",
            algorithm.name(),
            N,
            M,
            border_size
        );

        let policy = AutoResetPolicy::new(config.auto_reset.clone(), config.auto_reset_enabled);
        Ok(Self {
            algorithm,
            config,
            lifecycle: Lifecycle::Uninitialized,
            rois: RoiManager::new(border_size),
            geometry: None,
            history: FrameHistory::default(),
            policy,
        })
    }

    /// (Re)initialize with every pixel of every stream in the ROI
    pub fn initialize_full(&mut self, images: &[Frame; N]) -> Result<()> {
        let rois = std::array::from_fn(|s| RoiMask::full(frame::geometry(&images[s])));
        self.initialize(images, &rois)
    }

    /// (Re)initialize the engine; must be called before the first `apply`
    ///
    /// Nothing changes if any check or the algorithm's model setup fails.
    pub fn initialize(&mut self, images: &[Frame; N], rois: &[RoiMask; N]) -> Result<()> {
        let geometry = self.check_initial_geometry(images)?;
        let set = self.rois.prepare(rois, &geometry)?;

        let ctx = InitContext {
            images,
            rois: set.rois(),
            pixel_counts: set.counts(),
        };
        let model_ready = self
            .algorithm
            .initialize_model(&ctx)
            .map_err(|source| CosegError::Algorithm {
                name: self.algorithm.name(),
                source,
            })?;

        self.rois.commit(set);
        self.geometry = Some(geometry);
        self.lifecycle.initialize(model_ready);
        self.history.clear();
        self.policy.clear();

        tracing::info!(
            "Initialized '{}' for {} stream(s) (model ready: {})",
            self.algorithm.name(),
            N,
            model_ready
        );
        Ok(())
    }

    pub fn default_learning_rate(&self) -> f64 {
        self.algorithm.default_learning_rate()
    }

    /// Segment one synchronized set of frames, updating the temporal model
    ///
    /// A negative `learning_rate` selects the algorithm's default, zero
    /// labels the frames without updating the model.
    pub fn apply(&mut self, images: &[Frame; N], learning_rate: f64) -> Result<[LabelMask<L>; M]> {
        let _span = tracing::debug_span!(
            "coseg_apply",
            algorithm = self.algorithm.name(),
            frame = self.lifecycle.frame_index()
        )
        .entered();

        if !self.lifecycle.is_initialized() {
            return Err(CosegError::NotInitialized);
        }
        let (Some(geometry), Some(rois)) = (self.geometry.as_ref(), self.rois.rois()) else {
            return Err(CosegError::NotInitialized);
        };

        for (stream, (image, &expected)) in images.iter().zip(geometry.iter()).enumerate() {
            let actual = frame::geometry(image);
            if actual != expected {
                return Err(CosegError::DimensionMismatch {
                    stream,
                    reason: format!("image is {actual:?} but this epoch uses {expected:?}"),
                });
            }
        }

        let rate = LearningRate::resolve(learning_rate, self.algorithm.default_learning_rate());
        let ctx = FrameContext {
            images,
            rois,
            geometry,
            previous_inputs: self.history.last_inputs(),
            previous_masks: self.history.last_masks(),
            frame_index: self.lifecycle.frame_index(),
            model_initialized: self.lifecycle.is_model_initialized(),
        };
        let segmentation = self
            .algorithm
            .segment(&ctx, rate)
            .map_err(|source| CosegError::Algorithm {
                name: self.algorithm.name(),
                source,
            })?;

        for (stream, mask) in segmentation.masks.iter().enumerate() {
            let expected = geometry[stream.min(N.saturating_sub(1))];
            if mask.dim() != expected {
                return Err(CosegError::DimensionMismatch {
                    stream,
                    reason: format!(
                        "'{}' produced a {:?} mask for {:?} images",
                        self.algorithm.name(),
                        mask.dim(),
                        expected
                    ),
                });
            }
        }

        self.lifecycle.advance(segmentation.model_ready)?;
        self.history.record(images.clone(), segmentation.masks.clone());

        let cooldown_elapsed = self.lifecycle.tick_cooldown();
        if cooldown_elapsed
            && self
                .policy
                .evaluate(segmentation.drift, self.lifecycle.frames_since_reset())
        {
            self.automatic_reset(images)?;
        }

        Ok(segmentation.masks)
    }

    /// Rebuild the model from the current frame and the stored ROIs
    fn automatic_reset(&mut self, images: &[Frame; N]) -> Result<()> {
        tracing::warn!(
            "Automatic model reset of '{}' after {} frames",
            self.algorithm.name(),
            self.lifecycle.frames_since_reset()
        );

        let Some(rois) = self.rois.rois_copy() else {
            return Err(CosegError::AutoResetFailed(Box::new(CosegError::NotInitialized)));
        };
        let latest = self.history.take();

        match self.initialize(images, &rois) {
            Ok(()) => {
                self.lifecycle
                    .set_reset_cooldown(self.policy.config().cooldown_frames);
                if let Some((inputs, masks)) = latest {
                    self.history.record(inputs, masks);
                }
                Ok(())
            }
            Err(err) => {
                tracing::error!("Automatic model reset failed: {}", err);
                // no epoch left: drop everything tied to the old one
                self.lifecycle.invalidate();
                self.history.clear();
                self.rois.clear();
                self.geometry = None;
                Err(CosegError::AutoResetFailed(Box::new(err)))
            }
        }
    }

    /// Drop the model and restart the epoch; ROIs and settings are kept
    pub fn reset(&mut self) -> Result<()> {
        self.lifecycle.reset()?;
        self.algorithm.reset_model();
        self.history.clear();
        self.policy.clear();
        tracing::info!("Reset '{}' model", self.algorithm.name());
        Ok(())
    }

    pub fn set_automatic_model_reset(&mut self, enabled: bool) {
        self.config.auto_reset_enabled = enabled;
        self.policy.set_enabled(enabled);
    }

    pub fn automatic_model_reset(&self) -> bool {
        self.policy.is_enabled()
    }

    /// Erode the given ROIs by the algorithm's border size
    pub fn validate_rois(&self, rois: &[RoiMask; N]) -> [RoiMask; N] {
        self.rois.validate_rois(rois)
    }

    /// Replace the ROIs of the current epoch
    pub fn set_rois(&mut self, rois: &[RoiMask; N]) -> Result<()> {
        let Some(geometry) = self.geometry.filter(|_| self.lifecycle.is_initialized()) else {
            return Err(CosegError::NotInitialized);
        };
        let set = self.rois.prepare(rois, &geometry)?;
        let model_valid = self
            .algorithm
            .on_rois_changed(set.rois())
            .map_err(|source| CosegError::Algorithm {
                name: self.algorithm.name(),
                source,
            })?;

        self.rois.commit(set);
        if !model_valid {
            self.lifecycle.reset()?;
            self.algorithm.reset_model();
            self.history.clear();
            self.policy.clear();
            tracing::info!("ROI change restarted the '{}' model", self.algorithm.name());
        }
        Ok(())
    }

    pub fn rois_copy(&self) -> Result<[RoiMask; N]> {
        if !self.lifecycle.is_initialized() {
            return Err(CosegError::NotInitialized);
        }
        self.rois.rois_copy().ok_or(CosegError::NotInitialized)
    }

    pub fn pixel_counts(&self) -> Result<&[PixelCounts; N]> {
        if !self.lifecycle.is_initialized() {
            return Err(CosegError::NotInitialized);
        }
        self.rois.pixel_counts().ok_or(CosegError::NotInitialized)
    }

    pub fn last_mask(&self, stream: usize) -> Result<&LabelMask<L>> {
        self.history.last_mask(stream)
    }

    pub fn last_input(&self, stream: usize) -> Result<&Frame> {
        self.history.last_input(stream)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_initialized()
    }

    pub fn is_model_initialized(&self) -> bool {
        self.lifecycle.is_model_initialized()
    }

    pub fn frame_index(&self) -> usize {
        self.lifecycle.frame_index()
    }

    pub fn frames_since_reset(&self) -> usize {
        self.lifecycle.frames_since_reset()
    }

    pub fn reset_cooldown(&self) -> usize {
        self.lifecycle.reset_cooldown()
    }

    pub fn roi_border_size(&self) -> usize {
        self.rois.border_size()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    fn check_initial_geometry(&self, images: &[Frame; N]) -> Result<[Geometry; N]> {
        let geometry: [Geometry; N] = std::array::from_fn(|s| frame::geometry(&images[s]));

        for (stream, &(rows, cols)) in geometry.iter().enumerate() {
            if rows == 0 || cols == 0 {
                return Err(CosegError::DimensionMismatch {
                    stream,
                    reason: format!("empty image ({rows}x{cols})"),
                });
            }
        }

        if let (StreamGeometry::Shared, Some(&first)) = (self.config.geometry, geometry.first()) {
            if let Some((stream, &actual)) = geometry
                .iter()
                .enumerate()
                .find(|&(_, &g)| g != first)
            {
                return Err(CosegError::DimensionMismatch {
                    stream,
                    reason: format!("image is {actual:?} but stream 0 is {first:?}"),
                });
            }
        }

        Ok(geometry)
    }
}
