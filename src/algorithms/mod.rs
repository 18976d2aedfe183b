mod appearance;
pub mod mrf;
mod running_average;

pub use appearance::AppearanceModel;
pub use mrf::{MrfCosegmentor, MrfParams};
pub use running_average::RunningAverageCosegmentor;

use crate::engine::CosegmentationAlgorithm;

/// Label of pixels explained by the model
pub const BACKGROUND: u8 = 0;
/// Label of pixels the model does not explain
pub const FOREGROUND: u8 = 255;

/// Boxed algorithm usable behind a single engine type
pub type DynAlgorithm<const N: usize> = Box<dyn CosegmentationAlgorithm<u8, N, N> + Send>;

/// Create the default algorithm, which needs no inference backend
pub fn create_default_algorithm<const N: usize>() -> DynAlgorithm<N> {
    Box::new(RunningAverageCosegmentor::<N>::default())
}
