use crate::frame::Frame;
use anyhow::{ensure, Result};
use ndarray::s;

/// Per-pixel running mean of every input stream
#[derive(Debug, Clone, Default)]
pub struct AppearanceModel<const N: usize> {
    means: Option<[Frame; N]>,
}

impl<const N: usize> AppearanceModel<N> {
    pub fn is_built(&self) -> bool {
        self.means.is_some()
    }

    pub fn seed(&mut self, images: &[Frame; N]) {
        self.means = Some(images.clone());
    }

    pub fn clear(&mut self) {
        self.means = None;
    }

    /// Check that the images can be compared against the model
    pub fn check(&self, images: &[Frame; N]) -> Result<()> {
        let Some(means) = &self.means else {
            return Ok(());
        };
        for (stream, (mean, image)) in means.iter().zip(images.iter()).enumerate() {
            ensure!(
                mean.dim() == image.dim(),
                "stream {} frame is {:?}, model was built on {:?}",
                stream,
                image.dim(),
                mean.dim()
            );
        }
        Ok(())
    }

    /// Mean absolute channel difference between a pixel and its model
    pub fn distance(&self, stream: usize, image: &Frame, row: usize, col: usize) -> f32 {
        let Some(means) = &self.means else {
            return 0.0;
        };
        let pixel = image.slice(s![row, col, ..]);
        let mean = means[stream].slice(s![row, col, ..]);
        let channels = pixel.len().max(1) as f32;
        pixel
            .iter()
            .zip(mean.iter())
            .map(|(x, m)| (x - m).abs())
            .sum::<f32>()
            / channels
    }

    /// Move the model of a pixel towards the observed value
    pub fn update(&mut self, stream: usize, image: &Frame, row: usize, col: usize, rate: f32) {
        let Some(means) = &mut self.means else {
            return;
        };
        let rate = rate.clamp(0.0, 1.0);
        let pixel = image.slice(s![row, col, ..]);
        let mut mean = means[stream].slice_mut(s![row, col, ..]);
        mean.zip_mut_with(&pixel, |m, &x| *m += rate * (x - *m));
    }
}
