use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::debug;

use crate::detection::QuadDetector;
use crate::geometry::{is_convex, Rect};

/// Tuning for the rectangular panel search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadParams {
    /// Blur applied before edge detection (a 5x5 Gaussian kernel's sigma)
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter
    pub approx_fraction: f64,
    /// Minimum bounding box size, inclusive
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for QuadParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 75.0,
            canny_high: 200.0,
            approx_fraction: 0.02,
            min_width: 940,
            min_height: 260,
        }
    }
}

impl QuadParams {
    /// Size filter separating the panel from incidental rectangles
    pub fn accepts_size(&self, bounds: &Rect) -> bool {
        bounds.width >= self.min_width && bounds.height >= self.min_height
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContourQuadDetector {
    pub params: QuadParams,
}

impl ContourQuadDetector {
    pub fn new(params: QuadParams) -> Self {
        Self { params }
    }
}

impl QuadDetector for ContourQuadDetector {
    fn detect_quad_candidates(&self, gray: &GrayImage) -> Vec<Rect> {
        detect_quads(gray, &self.params)
    }
}

/// Douglas-Peucker on a closed curve: split at the point farthest from the
/// start, simplify both open halves, and stitch them without repeating the
/// shared endpoints.
fn approximate_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }

    let start = points[0];
    let distance_sq = |p: &Point<i32>| {
        let dx = i64::from(p.x - start.x);
        let dy = i64::from(p.y - start.y);
        dx * dx + dy * dy
    };

    let mut far = 0;
    let mut far_distance = 0;
    for (i, p) in points.iter().enumerate().skip(1) {
        let d = distance_sq(p);
        if d > far_distance {
            far = i;
            far_distance = d;
        }
    }
    if far == 0 {
        return vec![start];
    }

    let mut polygon = approximate_polygon_dp(&points[..=far], epsilon, false);

    let mut back: Vec<Point<i32>> = points[far..].to_vec();
    back.push(start);
    let back = approximate_polygon_dp(&back, epsilon, false);

    // `far` ends the first half and starts the second; `start` closes the loop
    polygon.pop();
    polygon.extend(back);
    polygon.pop();
    polygon
}

/// Bounding box of a contour if it simplifies to a large convex quadrilateral
fn qualify(points: &[Point<i32>], params: &QuadParams) -> Option<Rect> {
    let perimeter = arc_length(points, true);
    let polygon = approximate_closed(points, params.approx_fraction * perimeter);
    if polygon.len() != 4 {
        return None;
    }

    let vertices: Vec<(i32, i32)> = polygon.iter().map(|p| (p.x, p.y)).collect();
    if !is_convex(&vertices) {
        return None;
    }

    let bounds = Rect::bounding(vertices)?;
    debug!("Quad: 4-vertex contour with bounds {:?}", bounds);
    params.accepts_size(&bounds).then_some(bounds)
}

/// Blur, edge-detect, trace top-level outer contours and keep those that
/// approximate to a qualifying quadrilateral, in contour scan order.
pub fn detect_quads(gray: &GrayImage, params: &QuadParams) -> Vec<Rect> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let blurred = gaussian_blur_f32(gray, params.blur_sigma);
    let edges = canny(&blurred, params.canny_low, params.canny_high);

    let contours = find_contours::<i32>(&edges);
    let outer: Vec<_> = contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect();
    debug!("Quad: {} outer contours", outer.len());

    outer
        .iter()
        .filter_map(|c| qualify(&c.points, params))
        .collect()
}
