use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use ndarray::{Array2, Array3};
use std::fmt::Debug;

/// Input frame for one stream, shape `(rows, cols, channels)`
///
/// Values are normalized to [0, 1] by the conversion helpers below, but
/// algorithms only rely on the spatial dimensions being stable.
pub type Frame = Array3<f32>;

/// Per-pixel discrete labels for one output stream
pub type LabelMask<L> = Array2<L>;

/// Spatial dimensions of a stream, as (rows, cols)
pub type Geometry = (usize, usize);

/// Pixel label value produced by a cosegmentation algorithm
pub trait Label: Copy + Default + PartialEq + Debug + Send + 'static {}

impl<T> Label for T where T: Copy + Default + PartialEq + Debug + Send + 'static {}

/// Spatial dimensions of a frame
pub fn geometry(frame: &Frame) -> Geometry {
    let (rows, cols, _) = frame.dim();
    (rows, cols)
}

/// Convert an RGB image into a 3-channel frame normalized to [0, 1]
pub fn from_rgb(image: &RgbImage) -> Frame {
    let (width, height) = image.dimensions();
    let mut frame = Frame::zeros((height as usize, width as usize, 3));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            frame[[y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
        }
    }

    frame
}

/// Convert an 8-bit grayscale image into a single-channel frame
pub fn from_luma(image: &GrayImage) -> Frame {
    let (width, height) = image.dimensions();
    Frame::from_shape_fn((height as usize, width as usize, 1), |(y, x, _)| {
        image.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
    })
}

/// Convert a 16-bit depth map into a single-channel frame
pub fn from_depth(image: &ImageBuffer<Luma<u16>, Vec<u16>>) -> Frame {
    let (width, height) = image.dimensions();
    Frame::from_shape_fn((height as usize, width as usize, 1), |(y, x, _)| {
        image.get_pixel(x as u32, y as u32)[0] as f32 / u16::MAX as f32
    })
}

/// Convert an 8-bit label mask to a grayscale image for visualization
pub fn mask_to_luma(mask: &LabelMask<u8>) -> GrayImage {
    let (rows, cols) = mask.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([mask[[y as usize, x as usize]]])
    })
}
