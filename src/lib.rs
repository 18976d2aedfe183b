//! Runtime core for online video cosegmentation.
//!
//! A [`Cosegmentor`] owns the per-stream state shared by every
//! cosegmentation method: validated regions of interest, the
//! initialization lifecycle, the previous frame and the automatic model
//! reset policy. Methods plug in through [`CosegmentationAlgorithm`] and
//! only deal with their labeling rule and temporal model.
//!
//! ```no_run
//! use cosegm::{algorithms, Cosegmentor, EngineConfig, Frame};
//!
//! # fn main() -> cosegm::Result<()> {
//! let mut engine: Cosegmentor<_, u8, 2, 2> =
//!     Cosegmentor::new(algorithms::create_default_algorithm::<2>(), EngineConfig::default())?;
//! let frames = [Frame::zeros((240, 320, 3)), Frame::zeros((240, 320, 1))];
//! engine.initialize_full(&frames)?;
//! let masks = engine.apply(&frames, -1.0)?;
//! # let _ = masks;
//! # Ok(())
//! # }
//! ```

pub mod algorithms;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod graph;
pub mod history;
pub mod lifecycle;
pub mod reset_policy;
pub mod roi;

pub use config::{AutoResetConfig, EngineConfig, StreamGeometry};
pub use engine::{
    CosegmentationAlgorithm, Cosegmentor, FrameContext, InitContext, LearningRate, Segmentation,
};
pub use error::{CosegError, Result};
pub use frame::{Frame, Geometry, Label, LabelMask};
pub use graph::{FactorFunction, FactorGraph, InferenceBackend, ModelSummary};
pub use lifecycle::{FrameCounters, Lifecycle};
pub use reset_policy::DriftSignal;
pub use roi::{validate_roi, PixelCounts, RoiMask};
