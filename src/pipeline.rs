//! Orchestration of the two detection branches.
//!
//! Each invocation decodes the source once, runs the enabled branches
//! independently, and combines whatever they produced:
//!
//! ```text
//! Start -> LoadImage -> [CircleBranch] -> [RectBranch] -> Combine -> Done
//! ```
//!
//! An unreadable source or a branch that finds nothing is a normal outcome
//! ([`PipelineResult::NoResult`] / [`BranchOutcome::Absent`]). A branch that
//! fails is reported as [`BranchOutcome::Fault`] and never stops the other
//! branch.

use std::path::Path;

use image::{ImageReader, RgbImage};
use tracing::{debug, info, warn};

use crate::contour::ContourQuadDetector;
use crate::detection::{to_grayscale, CircleDetector, QuadDetector};
use crate::error::{ensure_non_empty, Error, Result};
use crate::hough::HoughCircleDetector;
use crate::transform::{compose_vertical, crop_circle, crop_rect, resize_to_fit};

/// Target footprint of the circular crop
pub const CIRCLE_TARGET: (u32, u32) = (400, 400);

/// Target width of the rectangular crop; its height follows the panel
pub const RECT_TARGET_WIDTH: u32 = 800;

/// Which branches to run. Read once at the start of each invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub include_circle: bool,
    pub include_rect: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            include_circle: true,
            include_rect: true,
        }
    }
}

/// Result of a single branch
#[derive(Debug)]
pub enum BranchOutcome {
    /// Cropped and resized region
    Found(RgbImage),
    /// Branch disabled, or the detector found nothing
    Absent,
    /// The branch failed; the error has already been logged
    Fault(Error),
}

impl BranchOutcome {
    fn from_result(branch: &str, result: Result<Option<RgbImage>>) -> Self {
        match result {
            Ok(Some(img)) => {
                info!("{} branch: {}x{} region", branch, img.width(), img.height());
                BranchOutcome::Found(img)
            }
            Ok(None) => {
                info!("{} branch: no feature detected", branch);
                BranchOutcome::Absent
            }
            Err(e) => {
                warn!("{} branch failed: {}", branch, e);
                BranchOutcome::Fault(e)
            }
        }
    }

    pub fn into_image(self) -> Option<RgbImage> {
        match self {
            BranchOutcome::Found(img) => Some(img),
            BranchOutcome::Absent | BranchOutcome::Fault(_) => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, BranchOutcome::Fault(_))
    }
}

/// Final outcome of an invocation
#[derive(Debug)]
pub enum PipelineResult {
    /// Exactly one branch produced a region
    Single(RgbImage),
    /// Circular region stacked above the rectangular one
    Composite(RgbImage),
    /// Nothing to return: unreadable source or no feature found
    NoResult,
}

impl PipelineResult {
    /// Combine the two branch outcomes.
    pub fn combine(circle: BranchOutcome, rect: BranchOutcome) -> Self {
        match (circle.into_image(), rect.into_image()) {
            (Some(top), Some(bottom)) => PipelineResult::Composite(compose_vertical(&top, &bottom)),
            (Some(img), None) | (None, Some(img)) => PipelineResult::Single(img),
            (None, None) => PipelineResult::NoResult,
        }
    }

    pub fn image(&self) -> Option<&RgbImage> {
        match self {
            PipelineResult::Single(img) | PipelineResult::Composite(img) => Some(img),
            PipelineResult::NoResult => None,
        }
    }

    pub fn into_image(self) -> Option<RgbImage> {
        match self {
            PipelineResult::Single(img) | PipelineResult::Composite(img) => Some(img),
            PipelineResult::NoResult => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PipelineResult::NoResult)
    }

    /// Write the image, format taken from the extension of `path`.
    /// Returns `false` without touching the filesystem for
    /// [`PipelineResult::NoResult`].
    pub fn save(&self, path: &Path) -> Result<bool> {
        let Some(img) = self.image() else {
            return Ok(false);
        };

        img.save(path).map_err(|source| Error::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved {:?}", path);
        Ok(true)
    }
}

/// Decode an image file into RGB
pub fn load_source(path: &Path) -> Result<RgbImage> {
    let unreadable = |source| Error::UnreadableSource {
        path: path.to_path_buf(),
        source,
    };

    let img = ImageReader::open(path)
        .map_err(|e| unreadable(image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| unreadable(image::ImageError::IoError(e)))?
        .decode()
        .map_err(unreadable)?;

    Ok(img.to_rgb8())
}

/// The detection, crop, resize and compose pipeline
#[derive(Debug, Clone, Default)]
pub struct Pipeline<C = HoughCircleDetector, Q = ContourQuadDetector> {
    config: PipelineConfig,
    circle_detector: C,
    quad_detector: Q,
}

impl Pipeline {
    /// Pipeline with the stock Hough and contour detectors
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_detectors(config, HoughCircleDetector::default(), ContourQuadDetector::default())
    }
}

impl<C: CircleDetector, Q: QuadDetector> Pipeline<C, Q> {
    pub fn with_detectors(config: PipelineConfig, circle_detector: C, quad_detector: Q) -> Self {
        Self {
            config,
            circle_detector,
            quad_detector,
        }
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    /// Grayscale, detect, mask-crop and resize to [`CIRCLE_TARGET`].
    /// Only the first (best) circle is used.
    pub fn circle_branch(&self, img: &RgbImage) -> BranchOutcome {
        BranchOutcome::from_result("Circle", self.try_circle(img))
    }

    /// Grayscale, detect, crop and resize to [`RECT_TARGET_WIDTH`] wide.
    /// The first qualifying quadrilateral in scan order wins.
    pub fn rect_branch(&self, img: &RgbImage) -> BranchOutcome {
        BranchOutcome::from_result("Rect", self.try_rect(img))
    }

    fn try_circle(&self, img: &RgbImage) -> Result<Option<RgbImage>> {
        let gray = to_grayscale(img)?;
        let circles = self.circle_detector.detect_circles(&gray);
        debug!("Circle branch: {} candidates", circles.len());

        let Some(circle) = circles.into_iter().next() else {
            return Ok(None);
        };
        debug!("Circle branch: using {:?}", circle);

        let cropped = crop_circle(img, &circle)?;
        resize_to_fit(&cropped, CIRCLE_TARGET.0, CIRCLE_TARGET.1).map(Some)
    }

    fn try_rect(&self, img: &RgbImage) -> Result<Option<RgbImage>> {
        let gray = to_grayscale(img)?;
        let quads = self.quad_detector.detect_quad_candidates(&gray);
        debug!("Rect branch: {} candidates", quads.len());

        let Some(rect) = quads.into_iter().next() else {
            return Ok(None);
        };
        debug!("Rect branch: using {:?}", rect);

        let cropped = crop_rect(img, &rect)?;
        let target_height = derived_height(cropped.width(), cropped.height());
        resize_to_fit(&cropped, RECT_TARGET_WIDTH, target_height).map(Some)
    }

    /// Run the enabled branches on an already decoded image.
    ///
    /// Returns `Err` only for a zero-sized input; everything else ends in a
    /// [`PipelineResult`].
    pub fn process_image(&self, img: &RgbImage) -> Result<PipelineResult> {
        ensure_non_empty(img.width(), img.height())?;
        let config = self.config;

        let circle = if config.include_circle {
            self.circle_branch(img)
        } else {
            BranchOutcome::Absent
        };

        let rect = if config.include_rect {
            self.rect_branch(img)
        } else {
            BranchOutcome::Absent
        };

        let result = PipelineResult::combine(circle, rect);
        match &result {
            PipelineResult::Composite(img) => info!("Composite result {}x{}", img.width(), img.height()),
            PipelineResult::Single(img) => info!("Single result {}x{}", img.width(), img.height()),
            PipelineResult::NoResult => info!("No region found"),
        }
        Ok(result)
    }

    /// Decode `input` and run the pipeline. An unreadable file gives
    /// [`PipelineResult::NoResult`]; an empty path is an error.
    pub fn process_path(&self, input: &Path) -> Result<PipelineResult> {
        if input.as_os_str().is_empty() {
            return Err(Error::InvalidArgument {
                arg: "input",
                reason: "path is empty".to_string(),
            });
        }

        let img = match load_source(input) {
            Ok(img) if img.width() > 0 && img.height() > 0 => img,
            Ok(img) => {
                warn!("Source {:?} decoded to an empty {}x{} image", input, img.width(), img.height());
                return Ok(PipelineResult::NoResult);
            }
            Err(e) => {
                warn!("{}", e);
                return Ok(PipelineResult::NoResult);
            }
        };
        debug!("Loaded {:?} ({}x{})", input, img.width(), img.height());

        self.process_image(&img)
    }

    /// Run the pipeline on `input` and write the result to `output`, with the
    /// format taken from the output extension. Returns whether anything was
    /// written.
    pub fn process_to_path(&self, input: &Path, output: &Path) -> Result<bool> {
        self.process_path(input)?.save(output)
    }
}

/// `round(h * 800 / w)`, the height paired with the fixed panel width.
/// `width` is non-zero for any cropped region.
fn derived_height(width: u32, height: u32) -> u32 {
    let scaled = (f64::from(height) * f64::from(RECT_TARGET_WIDTH) / f64::from(width)).round();
    (scaled as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Circle, Rect};
    use image::{GrayImage, Rgb};
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};

    struct FixedCircles(Vec<Circle>);

    impl CircleDetector for FixedCircles {
        fn detect_circles(&self, _gray: &GrayImage) -> Vec<Circle> {
            self.0.clone()
        }
    }

    struct FixedQuads(Vec<Rect>);

    impl QuadDetector for FixedQuads {
        fn detect_quad_candidates(&self, _gray: &GrayImage) -> Vec<Rect> {
            self.0.clone()
        }
    }

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * 3 + y) % 256) as u8])
        })
    }

    fn disk_image() -> RgbImage {
        let mut img = RgbImage::new(800, 700);
        draw_filled_circle_mut(&mut img, (400, 350), 200, Rgb([200, 200, 200]));
        img
    }

    fn disk_and_panel_image() -> RgbImage {
        let mut img = RgbImage::new(1400, 1200);
        draw_filled_circle_mut(&mut img, (400, 300), 200, Rgb([200, 200, 200]));
        draw_filled_rect_mut(
            &mut img,
            imageproc::rect::Rect::at(100, 650).of_size(1100, 300),
            Rgb([220, 220, 220]),
        );
        img
    }

    #[test]
    fn test_featureless_image_gives_no_result() {
        let img = RgbImage::from_pixel(1200, 800, Rgb([90, 90, 90]));
        let result = Pipeline::new(PipelineConfig::default()).process_image(&img).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_disabled_branches_give_no_result() {
        let config = PipelineConfig {
            include_circle: false,
            include_rect: false,
        };
        let pipeline = Pipeline::with_detectors(
            config,
            FixedCircles(vec![Circle::new(300, 300, 200).unwrap()]),
            FixedQuads(vec![Rect::new(0, 0, 100, 50)]),
        );
        let result = pipeline.process_image(&gradient_image(600, 600)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_single_disk_gives_square_masked_crop() {
        let config = PipelineConfig {
            include_circle: true,
            include_rect: false,
        };
        let result = Pipeline::new(config).process_image(&disk_image()).unwrap();

        let img = match result {
            PipelineResult::Single(img) => img,
            other => panic!("expected a single circular crop, got {:?}", other),
        };
        assert_eq!(img.width(), img.height());
        assert!(img.width() <= 400);
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(img.width() - 1, img.height() - 1), Rgb([0, 0, 0]));
        let mid = img.get_pixel(img.width() / 2, img.height() / 2);
        assert_eq!(*mid, Rgb([200, 200, 200]));
    }

    #[test]
    fn test_both_features_compose() {
        let pipeline = Pipeline::with_detectors(
            PipelineConfig::default(),
            FixedCircles(vec![Circle::new(300, 300, 200).unwrap()]),
            FixedQuads(vec![Rect::new(100, 600, 1000, 250)]),
        );
        let img = gradient_image(1200, 1000);
        let result = pipeline.process_image(&img).unwrap();

        let canvas = match result {
            PipelineResult::Composite(img) => img,
            other => panic!("expected a composite, got {:?}", other),
        };
        // 401px disk box scaled to 400x400, above an 800x200 panel
        assert_eq!(canvas.dimensions(), (800, 600));
        // Masked disk corner and the uncovered strip right of the disk
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(600, 100), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_only_first_candidates_are_used() {
        let pipeline = Pipeline::with_detectors(
            PipelineConfig::default(),
            FixedCircles(vec![
                Circle::new(100, 100, 50).unwrap(),
                Circle::new(300, 300, 200).unwrap(),
            ]),
            FixedQuads(vec![Rect::new(0, 0, 200, 100), Rect::new(0, 0, 1000, 250)]),
        );
        let img = gradient_image(1200, 1000);

        let circle = pipeline.circle_branch(&img).into_image().unwrap();
        // 100x100 crop scaled up to 400x400
        assert_eq!(circle.dimensions(), (400, 400));

        let rect = pipeline.rect_branch(&img).into_image().unwrap();
        assert_eq!(rect.dimensions(), (800, 400));
    }

    #[test]
    fn test_faulting_branch_does_not_stop_the_other() {
        let pipeline = Pipeline::with_detectors(
            PipelineConfig::default(),
            FixedCircles(vec![Circle::new(-5000, -5000, 10).unwrap()]),
            FixedQuads(vec![Rect::new(100, 100, 1000, 250)]),
        );
        let img = gradient_image(1200, 600);

        assert!(pipeline.circle_branch(&img).is_fault());

        let result = pipeline.process_image(&img).unwrap();
        let panel = match result {
            PipelineResult::Single(img) => img,
            other => panic!("expected the rectangular crop alone, got {:?}", other),
        };
        assert_eq!(panel.dimensions(), (800, 200));
    }

    #[test]
    fn test_detected_features_compose_deterministically() {
        let img = disk_and_panel_image();
        let pipeline = Pipeline::new(PipelineConfig::default());

        let first = pipeline.process_image(&img).unwrap();
        let second = pipeline.process_image(&img).unwrap();

        let a = match first {
            PipelineResult::Composite(img) => img,
            other => panic!("expected a composite, got {:?}", other),
        };
        let b = second.into_image().unwrap();

        assert_eq!(a.width(), 800);
        // 400 for the disk plus roughly 300 * 800 / 1100 for the panel
        assert!((610..=626).contains(&a.height()), "height {}", a.height());
        assert_eq!(a.dimensions(), b.dimensions());
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_zero_sized_image_is_rejected() {
        let pipeline = Pipeline::new(PipelineConfig::default());
        assert!(matches!(
            pipeline.process_image(&RgbImage::new(0, 0)),
            Err(Error::InvalidImage { .. })
        ));
    }

    #[test]
    fn test_missing_file_gives_no_result() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineConfig::default());
        let result = pipeline.process_path(&dir.path().join("missing.png")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_garbage_file_gives_no_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"not an image").unwrap();

        let pipeline = Pipeline::new(PipelineConfig::default());
        assert!(pipeline.process_path(&path).unwrap().is_none());
        assert!(matches!(load_source(&path), Err(Error::UnreadableSource { .. })));
    }

    #[test]
    fn test_empty_path_is_rejected() {
        let pipeline = Pipeline::new(PipelineConfig::default());
        assert!(matches!(
            pipeline.process_path(Path::new("")),
            Err(Error::InvalidArgument { arg: "input", .. })
        ));
    }

    #[test]
    fn test_process_to_path_writes_result() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wafer.png");
        let output = dir.path().join("wafer_roi.png");
        disk_image().save(&input).unwrap();

        let config = PipelineConfig {
            include_circle: true,
            include_rect: false,
        };
        let written = Pipeline::new(config).process_to_path(&input, &output).unwrap();

        assert!(written);
        let saved = load_source(&output).unwrap();
        assert_eq!(saved.width(), saved.height());
        assert!(saved.width() <= 400);
    }

    #[test]
    fn test_save_writes_only_when_there_is_an_image() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("none.png");
        assert!(!PipelineResult::NoResult.save(&missing).unwrap());
        assert!(!missing.exists());

        let written = dir.path().join("single.png");
        let single = PipelineResult::Single(gradient_image(40, 30));
        assert!(single.save(&written).unwrap());
        assert_eq!(load_source(&written).unwrap().dimensions(), (40, 30));
    }

    #[test]
    fn test_save_reports_encode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("result.not-a-format");
        let single = PipelineResult::Single(gradient_image(8, 8));
        assert!(matches!(single.save(&bogus), Err(Error::Encode { .. })));
    }

    #[test]
    fn test_process_to_path_skips_write_without_result() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("blank.png");
        let output = dir.path().join("blank_roi.png");
        RgbImage::from_pixel(300, 300, Rgb([10, 10, 10])).save(&input).unwrap();

        let written = Pipeline::new(PipelineConfig::default())
            .process_to_path(&input, &output)
            .unwrap();

        assert!(!written);
        assert!(!output.exists());
    }
}
