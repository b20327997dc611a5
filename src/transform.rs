use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::error::{ensure_non_empty, Error, Result};
use crate::geometry::{Circle, Rect};

/// Binary mask with a filled disk (255) on a zero background
fn disk_mask(width: u32, height: u32, center: (i32, i32), radius: i32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    draw_filled_circle_mut(&mut mask, center, radius, Luma([255]));
    mask
}

/// Sub-image at `rect`, which must already lie inside `img`
fn extract(img: &RgbImage, rect: &Rect) -> RgbImage {
    imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}

fn empty_region(x: i64, y: i64, width: i64, height: i64, img: &RgbImage) -> Error {
    Error::EmptyRegion {
        x,
        y,
        width,
        height,
        image_width: img.width(),
        image_height: img.height(),
    }
}

/// Black out everything outside the disk, then crop to the disk's bounding
/// box, which includes the rim pixels at `center ± r`. A disk that runs off
/// the image is truncated on that side, not padded.
pub fn crop_circle(img: &RgbImage, circle: &Circle) -> Result<RgbImage> {
    let (width, height) = img.dimensions();
    ensure_non_empty(width, height)?;

    let radius = i32::try_from(circle.radius).map_err(|_| Error::InvalidArgument {
        arg: "radius",
        reason: format!("{} does not fit a drawing radius", circle.radius),
    })?;

    let r = i64::from(circle.radius);
    let bounds = circle.bounding_box(width, height).ok_or_else(|| {
        empty_region(
            i64::from(circle.x) - r,
            i64::from(circle.y) - r,
            2 * r + 1,
            2 * r + 1,
            img,
        )
    })?;

    let mask = disk_mask(width, height, (circle.x, circle.y), radius);
    let mut cropped = extract(img, &bounds);
    for (x, y, pixel) in cropped.enumerate_pixels_mut() {
        if mask.get_pixel(bounds.x + x, bounds.y + y)[0] == 0 {
            *pixel = Rgb([0, 0, 0]);
        }
    }

    Ok(cropped)
}

/// Plain sub-image extraction, clipped to the image bounds
pub fn crop_rect(img: &RgbImage, rect: &Rect) -> Result<RgbImage> {
    let (width, height) = img.dimensions();
    ensure_non_empty(width, height)?;

    let clipped = rect.clip_to(width, height).ok_or_else(|| {
        empty_region(
            i64::from(rect.x),
            i64::from(rect.y),
            i64::from(rect.width),
            i64::from(rect.height),
            img,
        )
    })?;

    Ok(extract(img, &clipped))
}

/// Output size for [`resize_to_fit`].
///
/// A wider-than-tall source gets exactly `target_width`; anything else gets
/// exactly `target_height`. The other side follows the source aspect ratio.
pub fn fitted_size(width: u32, height: u32, target_width: u32, target_height: u32) -> (u32, u32) {
    if width > height {
        let scaled = (f64::from(height) * f64::from(target_width) / f64::from(width)).round();
        (target_width, (scaled as u32).max(1))
    } else {
        let scaled = (f64::from(width) * f64::from(target_height) / f64::from(height)).round();
        ((scaled as u32).max(1), target_height)
    }
}

/// Resize so the longer side matches its target, preserving aspect ratio
pub fn resize_to_fit(img: &RgbImage, target_width: u32, target_height: u32) -> Result<RgbImage> {
    let (width, height) = img.dimensions();
    ensure_non_empty(width, height)?;
    if target_width == 0 || target_height == 0 {
        return Err(Error::InvalidArgument {
            arg: "target size",
            reason: format!("must be non-zero, got {}x{}", target_width, target_height),
        });
    }

    let (new_width, new_height) = fitted_size(width, height, target_width, target_height);
    if (new_width, new_height) == (width, height) {
        return Ok(img.clone());
    }

    Ok(imageops::resize(img, new_width, new_height, FilterType::Triangle))
}

/// Stack `top` above `bottom` on a black canvas as wide as the wider input.
/// No scaling happens here.
pub fn compose_vertical(top: &RgbImage, bottom: &RgbImage) -> RgbImage {
    let width = top.width().max(bottom.width());
    let height = top.height() + bottom.height();

    let mut canvas = RgbImage::new(width, height);
    imageops::replace(&mut canvas, top, 0, 0);
    imageops::replace(&mut canvas, bottom, 0, i64::from(top.height()));
    canvas
}
