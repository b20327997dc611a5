use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use nalgebra::Vector2;
use tracing::debug;

use crate::detection::CircleDetector;
use crate::geometry::Circle;

/// Tuning for the gradient Hough circle search.
///
/// The defaults are fitted to a wafer disk of roughly 200px radius in a
/// full-resolution scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughCircleParams {
    /// Minimum distance between accepted circle centers
    pub min_center_distance: f32,
    /// Upper Canny threshold; the lower one is half of it
    pub canny_high: f32,
    /// Smoothing applied before taking Sobel gradient directions
    pub gradient_sigma: f32,
    /// Votes a center (summed over its 3x3 neighbourhood) and its best
    /// radius each need to be accepted
    pub accumulator_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
}

impl Default for HoughCircleParams {
    fn default() -> Self {
        Self {
            min_center_distance: 100.0,
            canny_high: 100.0,
            gradient_sigma: 2.0,
            accumulator_threshold: 30,
            min_radius: 190,
            max_radius: 210,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HoughCircleDetector {
    pub params: HoughCircleParams,
}

impl HoughCircleDetector {
    pub fn new(params: HoughCircleParams) -> Self {
        Self { params }
    }
}

impl CircleDetector for HoughCircleDetector {
    fn detect_circles(&self, gray: &GrayImage) -> Vec<Circle> {
        detect_circles(gray, &self.params)
    }
}

/// A center candidate from the accumulator
#[derive(Debug, Clone, Copy)]
struct CenterCandidate {
    x: u32,
    y: u32,
    votes: u32,
}

/// Search window, in pixels either side, for refining a center candidate
const REFINE_RADIUS: i32 = 2;

/// Edge pixels with their unit gradient direction.
///
/// Edges come from the raw image; directions from a smoothed copy, since
/// Sobel on a hard digital edge is off by a degree or more and that moves a
/// vote several pixels at r = 200.
fn edge_points_with_direction(gray: &GrayImage, params: &HoughCircleParams) -> Vec<(Vector2<f32>, Vector2<f32>)> {
    let edges = canny(gray, params.canny_high / 2.0, params.canny_high);
    let smoothed = if params.gradient_sigma > 0.0 {
        gaussian_blur_f32(gray, params.gradient_sigma)
    } else {
        gray.clone()
    };
    let gx = horizontal_sobel(&smoothed);
    let gy = vertical_sobel(&smoothed);

    edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .filter_map(|(x, y, _)| {
            let gradient = Vector2::new(
                f32::from(gx.get_pixel(x, y)[0]),
                f32::from(gy.get_pixel(x, y)[0]),
            );
            let norm = gradient.norm();
            if norm == 0.0 {
                return None;
            }
            Some((Vector2::new(x as f32, y as f32), gradient / norm))
        })
        .collect()
}

/// Every edge point votes along its gradient line, in both directions, at
/// each radius of the accepted band.
fn accumulate(
    points: &[(Vector2<f32>, Vector2<f32>)],
    width: u32,
    height: u32,
    params: &HoughCircleParams,
) -> Vec<u32> {
    let mut accumulator = vec![0u32; (width as usize) * (height as usize)];

    for &(origin, direction) in points {
        for r in params.min_radius..=params.max_radius {
            for sign in [1.0_f32, -1.0] {
                let center = origin + direction * (sign * r as f32);
                let cx = center.x.round();
                let cy = center.y.round();
                if cx < 0.0 || cy < 0.0 || cx >= width as f32 || cy >= height as f32 {
                    continue;
                }
                accumulator[cy as usize * width as usize + cx as usize] += 1;
            }
        }
    }

    accumulator
}

/// Sum of each cell's 3x3 neighbourhood (clamped at the borders), so votes
/// scattered by a pixel around the true center still add up
fn neighbourhood_sum(accumulator: &[u32], width: u32, height: u32) -> Vec<u32> {
    let (w, h) = (width as usize, height as usize);
    let mut rows = vec![0u32; accumulator.len()];
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(1);
            let hi = (x + 1).min(w - 1);
            rows[y * w + x] = accumulator[y * w + lo..=y * w + hi].iter().sum();
        }
    }

    let mut summed = vec![0u32; accumulator.len()];
    for y in 0..h {
        let lo = y.saturating_sub(1);
        let hi = (y + 1).min(h - 1);
        for x in 0..w {
            summed[y * w + x] = (lo..=hi).map(|yy| rows[yy * w + x]).sum();
        }
    }
    summed
}

/// Local maxima above the threshold, most votes first (ties in raster order)
fn find_centers(accumulator: &[u32], width: u32, height: u32, threshold: u32) -> Vec<CenterCandidate> {
    let w = width as usize;
    let mut centers = Vec::new();

    if width < 3 || height < 3 {
        return centers;
    }

    for y in 1..(height as usize - 1) {
        for x in 1..(w - 1) {
            let idx = y * w + x;
            let votes = accumulator[idx];
            // Strict on one side, lenient on the other, so plateaus yield one peak
            if votes > threshold
                && votes > accumulator[idx - 1]
                && votes >= accumulator[idx + 1]
                && votes > accumulator[idx - w]
                && votes >= accumulator[idx + w]
            {
                centers.push(CenterCandidate {
                    x: x as u32,
                    y: y as u32,
                    votes,
                });
            }
        }
    }

    // Stable sort keeps raster order among equal vote counts
    centers.sort_by(|a, b| b.votes.cmp(&a.votes));
    centers
}

/// Best-supported radius for a center; ties go to the smaller radius
fn estimate_radius(
    center: Vector2<f32>,
    points: &[(Vector2<f32>, Vector2<f32>)],
    params: &HoughCircleParams,
) -> Option<(u32, u32)> {
    let bins = (params.max_radius - params.min_radius + 1) as usize;
    let mut histogram = vec![0u32; bins];

    for &(point, _) in points {
        let distance = (point - center).norm().round();
        if distance < params.min_radius as f32 || distance > params.max_radius as f32 {
            continue;
        }
        histogram[distance as usize - params.min_radius as usize] += 1;
    }

    let mut best: Option<(u32, u32)> = None;
    for (offset, &support) in histogram.iter().enumerate() {
        if best.map_or(true, |(_, s)| support > s) {
            best = Some((params.min_radius + offset as u32, support));
        }
    }

    best.filter(|&(_, support)| support >= params.accumulator_threshold)
}

/// Best (center, radius, support) within [`REFINE_RADIUS`] of a candidate.
/// Offsets are tried nearest first and only a strictly better support moves
/// the center.
fn refine_center(
    candidate: &CenterCandidate,
    points: &[(Vector2<f32>, Vector2<f32>)],
    params: &HoughCircleParams,
) -> Option<(Vector2<f32>, u32, u32)> {
    let mut offsets: Vec<(i32, i32)> = (-REFINE_RADIUS..=REFINE_RADIUS)
        .flat_map(|dy| (-REFINE_RADIUS..=REFINE_RADIUS).map(move |dx| (dx, dy)))
        .collect();
    offsets.sort_by_key(|&(dx, dy)| (dx * dx + dy * dy, dy, dx));

    let mut best: Option<(Vector2<f32>, u32, u32)> = None;
    for (dx, dy) in offsets {
        let center = Vector2::new(
            candidate.x as f32 + dx as f32,
            candidate.y as f32 + dy as f32,
        );
        if let Some((radius, support)) = estimate_radius(center, points, params) {
            if best.map_or(true, |(_, _, s)| support > s) {
                best = Some((center, radius, support));
            }
        }
    }
    best
}

/// Gradient Hough circle search. Circles come back best-first.
pub fn detect_circles(gray: &GrayImage, params: &HoughCircleParams) -> Vec<Circle> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || params.min_radius > params.max_radius {
        return Vec::new();
    }

    let points = edge_points_with_direction(gray, params);
    debug!("Hough: {} edge points", points.len());

    let accumulator = neighbourhood_sum(&accumulate(&points, width, height, params), width, height);
    let centers = find_centers(&accumulator, width, height, params.accumulator_threshold);
    debug!("Hough: {} center candidates", centers.len());

    let min_distance_sq = params.min_center_distance * params.min_center_distance;
    let mut circles: Vec<Circle> = Vec::new();

    for candidate in centers {
        let near_accepted = |center: Vector2<f32>| {
            circles.iter().any(|c| {
                let other = Vector2::new(c.x as f32, c.y as f32);
                (center - other).norm_squared() < min_distance_sq
            })
        };
        if near_accepted(Vector2::new(candidate.x as f32, candidate.y as f32)) {
            continue;
        }

        let Some((center, radius, support)) = refine_center(&candidate, &points, params) else {
            continue;
        };
        if near_accepted(center) {
            continue;
        }

        debug!(
            "Hough: circle at ({}, {}) r={} (votes {}, radius support {})",
            center.x, center.y, radius, candidate.votes, support
        );
        if let Some(circle) = Circle::new(center.x as i32, center.y as i32, radius) {
            circles.push(circle);
        }
    }

    circles
}
