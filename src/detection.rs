use image::{GrayImage, Luma, RgbImage};

use crate::error::{ensure_non_empty, Result};
use crate::geometry::{Circle, Rect};

/// Locates circular features in a grayscale image.
///
/// Implementations return candidates best-first; callers consume only the
/// first one.
pub trait CircleDetector {
    fn detect_circles(&self, gray: &GrayImage) -> Vec<Circle>;
}

/// Locates quadrilateral panels in a grayscale image.
///
/// Candidates come back in the detector's native scan order; callers take
/// the first one.
pub trait QuadDetector {
    fn detect_quad_candidates(&self, gray: &GrayImage) -> Vec<Rect>;
}

/// Convert an RGB image to single-channel luma (0.299 R + 0.587 G + 0.114 B)
pub fn to_grayscale(img: &RgbImage) -> Result<GrayImage> {
    let (width, height) = img.dimensions();
    ensure_non_empty(width, height)?;

    let mut gray = GrayImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        // Standard luminance conversion
        let luma = 0.299 * f64::from(pixel[0])
            + 0.587 * f64::from(pixel[1])
            + 0.114 * f64::from(pixel[2]);
        gray.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }

    Ok(gray)
}
