use nalgebra::Vector2;

/// A detected circular feature in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Circle {
    /// Center column (may lie outside the image as long as the disk overlaps it)
    pub x: i32,
    /// Center row
    pub y: i32,
    /// Radius in pixels, always > 0
    pub radius: u32,
}

impl Circle {
    /// Returns `None` for a zero radius.
    pub fn new(x: i32, y: i32, radius: u32) -> Option<Self> {
        (radius > 0).then_some(Self { x, y, radius })
    }

    /// Bounding box of the disk, `[x - r, x + r] x [y - r, y + r]` (so
    /// `2r + 1` on a side), clipped to an image of the given size. `None` if
    /// the disk misses the image.
    pub fn bounding_box(&self, image_width: u32, image_height: u32) -> Option<Rect> {
        let r = i64::from(self.radius);
        Rect::clipped(
            i64::from(self.x) - r,
            i64::from(self.y) - r,
            2 * r + 1,
            2 * r + 1,
            image_width,
            image_height,
        )
    }
}

/// Axis-aligned box (x, y, width, height) lying inside some image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Intersect a signed region with `[0, image_width) x [0, image_height)`.
    /// Returns `None` when the intersection is empty.
    pub fn clipped(
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        image_width: u32,
        image_height: u32,
    ) -> Option<Rect> {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width.max(0)).min(i64::from(image_width));
        let y1 = (y + height.max(0)).min(i64::from(image_height));

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Rect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    /// Clip this box to an image of the given size.
    pub fn clip_to(&self, image_width: u32, image_height: u32) -> Option<Rect> {
        Rect::clipped(
            i64::from(self.x),
            i64::from(self.y),
            i64::from(self.width),
            i64::from(self.height),
            image_width,
            image_height,
        )
    }

    /// Inclusive bounding box of a point set (a single point yields 1x1).
    pub fn bounding<I>(points: I) -> Option<Rect>
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let mut iter = points.into_iter();
        let (fx, fy) = iter.next()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (fx, fx, fy, fy);

        for (x, y) in iter {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        // Contour points are non-negative pixel coordinates
        if min_x < 0 || min_y < 0 {
            return None;
        }

        Some(Rect {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }
}

/// True if the closed polygon turns the same way at every vertex.
/// Collinear vertices (zero cross product) are tolerated.
pub fn is_convex(polygon: &[(i32, i32)]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut sign = 0.0_f64;
    for i in 0..n {
        let (ax, ay) = polygon[i];
        let (bx, by) = polygon[(i + 1) % n];
        let (cx, cy) = polygon[(i + 2) % n];

        let ab = Vector2::new(f64::from(bx - ax), f64::from(by - ay));
        let bc = Vector2::new(f64::from(cx - bx), f64::from(cy - by));
        let cross = ab.perp(&bc);

        if cross == 0.0 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }

    sign != 0.0
}
