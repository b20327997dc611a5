//! Crate-level error type and `Result` alias.
//!
//! "No feature found" is deliberately absent here: a detector that finds
//! nothing is a normal outcome, reported as [`crate::BranchOutcome::Absent`].
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid image: dimensions must be non-zero, got {width}x{height}")]
    InvalidImage { width: u32, height: u32 },

    #[error("Unreadable source {path:?}: {source}")]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Region ({x}, {y}, {width}x{height}) does not intersect a {image_width}x{image_height} image")]
    EmptyRegion {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        image_width: u32,
        image_height: u32,
    },

    #[error("Invalid argument: {arg} ({reason})")]
    InvalidArgument { arg: &'static str, reason: String },

    #[error("Failed to write {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl Error {
    pub(crate) fn invalid_image(width: u32, height: u32) -> Self {
        Error::InvalidImage { width, height }
    }
}

/// Reject zero-sized images before any stage touches their pixels.
pub(crate) fn ensure_non_empty(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_image(width, height));
    }
    Ok(())
}
