pub mod cli;
pub mod contour;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod hough;
pub mod pipeline;
pub mod transform;

pub use cli::Cli;
pub use contour::{ContourQuadDetector, QuadParams};
pub use detection::{to_grayscale, CircleDetector, QuadDetector};
pub use error::{Error, Result};
pub use geometry::{Circle, Rect};
pub use hough::{HoughCircleDetector, HoughCircleParams};
pub use pipeline::{
    load_source, BranchOutcome, Pipeline, PipelineConfig, PipelineResult, CIRCLE_TARGET,
    RECT_TARGET_WIDTH,
};
pub use transform::{compose_vertical, crop_circle, crop_rect, resize_to_fit};
