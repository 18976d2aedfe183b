use crate::error::{CosegError, Result};
use crate::frame::Geometry;
use image::GrayImage;
use ndarray::{Array2, ArrayView2};

/// Binary region of interest for one input stream
///
/// Keeps the mask supplied by the caller next to the pixels currently in use,
/// so validation always starts from the original region and never shrinks an
/// already validated mask any further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoiMask {
    mask: Array2<u8>,
    source: Array2<u8>,
}

impl RoiMask {
    /// Build a mask from raw values; any nonzero value marks a valid pixel
    pub fn new(values: Array2<u8>) -> Self {
        let source = values.mapv(|v| u8::from(v != 0));
        Self {
            mask: source.clone(),
            source,
        }
    }

    /// Mask with every pixel valid
    pub fn full(geometry: Geometry) -> Self {
        Self::new(Array2::ones(geometry))
    }

    pub fn from_luma(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(Array2::from_shape_fn(
            (height as usize, width as usize),
            |(y, x)| image.get_pixel(x as u32, y as u32)[0],
        ))
    }

    pub fn geometry(&self) -> Geometry {
        self.mask.dim()
    }

    /// Pixels in use, 1 = considered, 0 = excluded
    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.mask.view()
    }

    /// Pixels as supplied before border erosion
    pub fn source(&self) -> ArrayView2<'_, u8> {
        self.source.view()
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.mask.get((row, col)).is_some_and(|&v| v != 0)
    }

    /// Exclude a pixel from both the current and the source region
    pub fn exclude(&mut self, row: usize, col: usize) {
        if let Some(v) = self.source.get_mut((row, col)) {
            *v = 0;
        }
        if let Some(v) = self.mask.get_mut((row, col)) {
            *v = 0;
        }
    }

    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&v| v != 0).count()
    }

    pub fn source_count(&self) -> usize {
        self.source.iter().filter(|&&v| v != 0).count()
    }
}

/// Erode the source region of `roi` so that no valid pixel lies within
/// `border_size` of an excluded pixel or of the image edge
///
/// # Arguments
/// * `roi` - Mask to validate; only its source pixels are read
/// * `border_size` - Radius of the square neighbourhood that must be valid
///
/// # Returns
/// * A mask with the same source and the eroded pixels in use. Validating
///   the result again yields the same mask.
pub fn validate_roi(roi: &RoiMask, border_size: usize) -> RoiMask {
    RoiMask {
        mask: erode(&roi.source, border_size),
        source: roi.source.clone(),
    }
}

/// Square-neighbourhood erosion, separable into a row pass and a column pass;
/// pixels outside the image count as excluded
fn erode(source: &Array2<u8>, border_size: usize) -> Array2<u8> {
    if border_size == 0 {
        return source.clone();
    }

    let (rows, cols) = source.dim();

    // Row pass: keep pixels whose whole horizontal window is valid
    let mut horizontal = Array2::<u8>::zeros((rows, cols));
    for r in 0..rows {
        for c in border_size..cols.saturating_sub(border_size) {
            if (c - border_size..=c + border_size).all(|k| source[[r, k]] != 0) {
                horizontal[[r, c]] = 1;
            }
        }
    }

    // Column pass over the row result completes the square window
    let mut eroded = Array2::<u8>::zeros((rows, cols));
    for r in border_size..rows.saturating_sub(border_size) {
        for c in 0..cols {
            if (r - border_size..=r + border_size).all(|k| horizontal[[k, c]] != 0) {
                eroded[[r, c]] = 1;
            }
        }
    }
    eroded
}

/// Pixel counts of one stream: whole image, ROI before and after erosion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelCounts {
    pub total: usize,
    pub original_roi: usize,
    pub final_roi: usize,
}

/// Validated ROIs with their pixel counts, ready to be stored
#[derive(Debug, Clone)]
pub struct RoiSet<const N: usize> {
    rois: [RoiMask; N],
    counts: [PixelCounts; N],
}

impl<const N: usize> RoiSet<N> {
    pub fn rois(&self) -> &[RoiMask; N] {
        &self.rois
    }

    pub fn counts(&self) -> &[PixelCounts; N] {
        &self.counts
    }
}

/// Stores the per-stream ROIs of an engine and enforces the border margin
/// required by the algorithm's spatial operators
#[derive(Debug, Clone)]
pub struct RoiManager<const N: usize> {
    border_size: usize,
    current: Option<RoiSet<N>>,
}

impl<const N: usize> RoiManager<N> {
    pub fn new(border_size: usize) -> Self {
        Self {
            border_size,
            current: None,
        }
    }

    pub fn border_size(&self) -> usize {
        self.border_size
    }

    pub fn validate_rois(&self, rois: &[RoiMask; N]) -> [RoiMask; N] {
        std::array::from_fn(|s| validate_roi(&rois[s], self.border_size))
    }

    /// Check shapes and validate without touching the stored ROIs
    pub fn prepare(&self, rois: &[RoiMask; N], geometry: &[Geometry; N]) -> Result<RoiSet<N>> {
        for (stream, (roi, &expected)) in rois.iter().zip(geometry.iter()).enumerate() {
            if roi.geometry() != expected {
                return Err(CosegError::InvalidRoi {
                    stream,
                    reason: format!(
                        "mask is {:?} but the stream images are {:?}",
                        roi.geometry(),
                        expected
                    ),
                });
            }
        }

        let validated = self.validate_rois(rois);
        for (stream, roi) in validated.iter().enumerate() {
            if roi.count() == 0 {
                return Err(CosegError::InvalidRoi {
                    stream,
                    reason: format!(
                        "no valid pixel left after a {}px border erosion",
                        self.border_size
                    ),
                });
            }
        }

        let counts = std::array::from_fn(|s| {
            let (rows, cols) = geometry[s];
            PixelCounts {
                total: rows * cols,
                original_roi: validated[s].source_count(),
                final_roi: validated[s].count(),
            }
        });

        Ok(RoiSet {
            rois: validated,
            counts,
        })
    }

    pub fn commit(&mut self, set: RoiSet<N>) {
        for (stream, counts) in set.counts.iter().enumerate() {
            tracing::debug!(
                "Stream {} ROI: {} px total, {} px original, {} px after border cleanup",
                stream,
                counts.total,
                counts.original_roi,
                counts.final_roi
            );
        }
        self.current = Some(set);
    }

    /// Validate and store the given ROIs; nothing is stored on failure
    pub fn set_rois(&mut self, rois: &[RoiMask; N], geometry: &[Geometry; N]) -> Result<()> {
        let set = self.prepare(rois, geometry)?;
        self.commit(set);
        Ok(())
    }

    /// Forget the stored ROIs and counts
    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn rois(&self) -> Option<&[RoiMask; N]> {
        self.current.as_ref().map(|set| &set.rois)
    }

    pub fn rois_copy(&self) -> Option<[RoiMask; N]> {
        self.rois().cloned()
    }

    pub fn pixel_counts(&self) -> Option<&[PixelCounts; N]> {
        self.current.as_ref().map(|set| &set.counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_roi(rng: &mut StdRng) -> RoiMask {
        let rows = rng.random_range(1..24);
        let cols = rng.random_range(1..24);
        let density = rng.random_range(0.3..1.0);
        RoiMask::new(Array2::from_shape_fn((rows, cols), |_| {
            if rng.random_bool(density) {
                255
            } else {
                0
            }
        }))
    }

    #[test]
    fn full_mask_keeps_inner_square() {
        let validated = validate_roi(&RoiMask::full((10, 10)), 1);

        assert_eq!(validated.source_count(), 100);
        assert_eq!(validated.count(), 64);
        for r in 0..10 {
            for c in 0..10 {
                let inner = (1..9).contains(&r) && (1..9).contains(&c);
                assert_eq!(validated.is_valid(r, c), inner, "pixel ({r}, {c})");
            }
        }
    }

    #[test]
    fn erosion_grows_around_holes() {
        let mut roi = RoiMask::full((9, 9));
        roi.exclude(4, 4);

        let validated = validate_roi(&roi, 2);

        // 5x5 interior minus the 5x5 block around the hole
        assert_eq!(validated.count(), 0);
        let validated = validate_roi(&roi, 1);
        assert_eq!(validated.count(), 49 - 9);
        assert!(!validated.is_valid(3, 5));
        assert!(validated.is_valid(2, 2));
    }

    #[test]
    fn zero_border_only_normalizes() {
        let roi = RoiMask::new(Array2::from_elem((3, 3), 7));
        let validated = validate_roi(&roi, 0);
        assert_eq!(validated.count(), 9);
        assert!(validated.view().iter().all(|&v| v == 1));
    }

    #[test]
    fn validation_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let roi = random_roi(&mut rng);
            let border = rng.random_range(0..4);
            let once = validate_roi(&roi, border);
            let twice = validate_roi(&once, border);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn validated_pixels_keep_their_margin() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let roi = random_roi(&mut rng);
            let border = rng.random_range(0..4);
            let validated = validate_roi(&roi, border);
            let (rows, cols) = roi.geometry();

            for ((r, c), &v) in validated.view().indexed_iter() {
                if v == 0 {
                    continue;
                }
                assert!(r >= border && c >= border);
                assert!(r + border < rows && c + border < cols);
                for rr in r - border..=r + border {
                    for cc in c - border..=c + border {
                        assert_eq!(roi.source()[[rr, cc]], 1);
                    }
                }
            }
        }
    }

    #[test]
    fn counts_are_monotonic() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut manager = RoiManager::<2>::new(1);
        let mut stored = 0;
        for _ in 0..100 {
            let rois = [random_roi(&mut rng), random_roi(&mut rng)];
            let geometry = [rois[0].geometry(), rois[1].geometry()];
            if manager.set_rois(&rois, &geometry).is_err() {
                continue;
            }
            stored += 1;
            for counts in manager.pixel_counts().unwrap() {
                assert!(counts.final_roi <= counts.original_roi);
                assert!(counts.original_roi <= counts.total);
            }
        }
        assert!(stored > 0);
    }

    #[test]
    fn shape_mismatch_is_rejected_without_storing() {
        let mut manager = RoiManager::<1>::new(1);
        manager
            .set_rois(&[RoiMask::full((10, 10))], &[(10, 10)])
            .unwrap();

        let err = manager
            .set_rois(&[RoiMask::full((10, 12))], &[(10, 10)])
            .unwrap_err();
        assert!(matches!(err, CosegError::InvalidRoi { stream: 0, .. }));
        assert_eq!(manager.pixel_counts().unwrap()[0].final_roi, 64);
    }

    #[test]
    fn fully_eroded_mask_is_rejected() {
        let manager = RoiManager::<1>::new(2);
        let err = manager
            .prepare(&[RoiMask::full((4, 4))], &[(4, 4)])
            .unwrap_err();
        assert!(matches!(err, CosegError::InvalidRoi { stream: 0, .. }));
    }

    #[test]
    fn clear_forgets_stored_rois() {
        let mut manager = RoiManager::<1>::new(1);
        manager.set_rois(&[RoiMask::full((6, 6))], &[(6, 6)]).unwrap();

        manager.clear();

        assert!(manager.rois().is_none());
        assert!(manager.pixel_counts().is_none());
    }

    #[test]
    fn copies_do_not_alias_stored_rois() {
        let mut manager = RoiManager::<1>::new(1);
        manager.set_rois(&[RoiMask::full((6, 6))], &[(6, 6)]).unwrap();

        let mut copy = manager.rois_copy().unwrap();
        copy[0].exclude(2, 2);

        assert!(!copy[0].is_valid(2, 2));
        assert!(manager.rois().unwrap()[0].is_valid(2, 2));
    }
}
