use super::appearance::AppearanceModel;
use super::{BACKGROUND, FOREGROUND};
use crate::engine::{
    CosegmentationAlgorithm, FrameContext, InitContext, LearningRate, Segmentation,
};
use crate::frame::LabelMask;
use crate::graph::{FactorFunction, FactorGraph, InferenceBackend, ModelSummary};
use crate::reset_policy::DriftSignal;
use anyhow::{Context, Result};
use ndarray::Array2;

/// Weights of the binary labeling energy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MrfParams {
    /// Appearance distance at which foreground and background cost the same
    pub threshold: f32,
    /// Penalty for differing labels on 4-connected pixels of one stream
    pub smoothness: f32,
    /// Penalty for differing labels on co-located pixels of two streams
    pub cross_stream: f32,
    pub learning_rate: f64,
}

impl Default for MrfParams {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            smoothness: 0.05,
            cross_stream: 0.1,
            learning_rate: 0.05,
        }
    }
}

/// Joint foreground/background labeling of all streams through an
/// external inference backend
///
/// One binary variable per valid ROI pixel per stream. Pairwise Potts
/// factors link 4-connected pixels, and co-located pixels of every stream
/// with stream 0 when the two share their dimensions. Only pixels labeled
/// background feed the appearance model.
pub struct MrfCosegmentor<B, const N: usize> {
    backend: B,
    params: MrfParams,
    model: AppearanceModel<N>,
}

impl<B: InferenceBackend, const N: usize> MrfCosegmentor<B, N> {
    /// Create an MRF cosegmentor
    ///
    /// # Arguments
    /// * `backend` - Solver that labels the factor graph built for each frame
    /// * `params` - Energy weights and default learning rate
    ///
    /// The appearance model is seeded from the images given to `initialize`.
    pub fn new(backend: B, params: MrfParams) -> Self {
        Self {
            backend,
            params,
            model: AppearanceModel::default(),
        }
    }

    pub fn params(&self) -> &MrfParams {
        &self.params
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn build_graph(
        &self,
        ctx: &FrameContext<'_, u8, N, N>,
    ) -> Result<(FactorGraph, [Array2<Option<usize>>; N])> {
        let mut graph = FactorGraph::new();
        let mut index: [Array2<Option<usize>>; N] =
            std::array::from_fn(|s| Array2::from_elem(ctx.geometry[s], None));

        // One binary variable per valid pixel, with its appearance cost
        for stream in 0..N {
            let image = &ctx.images[stream];
            for ((r, c), &v) in ctx.rois[stream].view().indexed_iter() {
                if v == 0 {
                    continue;
                }
                let var = graph.add_variable(2)?;
                index[stream][[r, c]] = Some(var);
                let distance = self.model.distance(stream, image, r, c);
                graph.add_factor(
                    vec![var],
                    FactorFunction::Unary(vec![distance, self.params.threshold]),
                )?;
            }
        }

        // Smoothness between right and lower neighbours of the same stream
        let smooth = FactorFunction::Potts {
            equal: 0.0,
            different: self.params.smoothness,
        };
        for lookup in &index {
            let (rows, cols) = lookup.dim();
            for ((r, c), var) in lookup.indexed_iter() {
                let Some(var) = *var else { continue };
                let neighbours = [(r, c + 1), (r + 1, c)];
                for (nr, nc) in neighbours {
                    if nr >= rows || nc >= cols {
                        continue;
                    }
                    if let Some(other) = lookup[[nr, nc]] {
                        graph.add_factor(vec![var, other], smooth.clone())?;
                    }
                }
            }
        }

        // Tie co-located pixels to stream 0 when the layouts agree
        let tie = FactorFunction::Potts {
            equal: 0.0,
            different: self.params.cross_stream,
        };
        for stream in 1..N {
            if index[stream].dim() != index[0].dim() {
                continue;
            }
            for (a, b) in index[0].iter().zip(index[stream].iter()) {
                if let (Some(a), Some(b)) = (a, b) {
                    graph.add_factor(vec![*a, *b], tie.clone())?;
                }
            }
        }

        Ok((graph, index))
    }
}

impl<B: InferenceBackend, const N: usize> CosegmentationAlgorithm<u8, N, N>
    for MrfCosegmentor<B, N>
{
    fn name(&self) -> &'static str {
        "mrf"
    }

    fn roi_border_size(&self) -> usize {
        1
    }

    fn default_learning_rate(&self) -> f64 {
        self.params.learning_rate
    }

    fn initialize_model(&mut self, ctx: &InitContext<'_, N>) -> Result<bool> {
        self.model.seed(ctx.images);
        Ok(true)
    }

    fn segment(
        &mut self,
        ctx: &FrameContext<'_, u8, N, N>,
        rate: LearningRate,
    ) -> Result<Segmentation<u8, N>> {
        let _span = tracing::debug_span!("mrf_segment").entered();

        if !ctx.model_initialized || !self.model.is_built() {
            self.model.seed(ctx.images);
            return Ok(Segmentation {
                masks: std::array::from_fn(|s| LabelMask::from_elem(ctx.geometry[s], BACKGROUND)),
                model_ready: true,
                drift: DriftSignal::stable(),
            });
        }

        // Build and solve the labeling problem before touching the model
        self.model.check(ctx.images)?;
        let (graph, index) = self.build_graph(ctx)?;
        tracing::debug!("{}", ModelSummary::of(&graph));

        let labeling = self
            .backend
            .infer(&graph)
            .with_context(|| format!("inference backend '{}' failed", self.backend.name()))?;
        graph.check_labeling(&labeling)?;

        let mut foreground = 0usize;
        let masks = std::array::from_fn(|stream| {
            let mut mask = LabelMask::from_elem(ctx.geometry[stream], BACKGROUND);
            for ((r, c), var) in index[stream].indexed_iter() {
                let Some(var) = *var else { continue };
                if labeling[var] == 1 {
                    mask[[r, c]] = FOREGROUND;
                    foreground += 1;
                } else if let LearningRate::Rate(rate) = rate {
                    self.model
                        .update(stream, &ctx.images[stream], r, c, rate as f32);
                }
            }
            mask
        });

        let drift = if labeling.is_empty() {
            0.0
        } else {
            foreground as f32 / labeling.len() as f32
        };
        Ok(Segmentation {
            masks,
            model_ready: true,
            drift: DriftSignal::new(drift),
        })
    }

    fn reset_model(&mut self) {
        self.model.clear();
    }
}
