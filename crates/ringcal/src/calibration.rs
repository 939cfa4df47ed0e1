//! Per-view point correspondences for camera calibration.
//!
//! Detection runs image by image; every successful view contributes the
//! board's node positions (z = 0 plane) and the detected centers in the
//! same row-major order. Solving is left to a [`CalibrationSolver`].

use nalgebra::{Isometry3, Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::core::GrayImageView;
use crate::rings::{
    Binarizer, CoarseGridDetector, EllipseFitter, RingBoardSpec, RingGridDetection,
    RingGridDetector, RingGridError, SubpixelContourExtractor,
};

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
}

/// Brown-Conrady radial-tangential distortion coefficients.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RadialTangentialDistortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

/// Output of a [`CalibrationSolver`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub intrinsics: CameraIntrinsics,
    pub distortion: RadialTangentialDistortion,
    /// RMS reprojection error in pixels.
    pub reprojection_error: f64,
    /// Board-to-camera pose of every view, in view order.
    pub poses: Vec<Isometry3<f64>>,
}

/// Camera calibration from planar correspondences.
pub trait CalibrationSolver {
    type Error;

    /// `world[k]` and `image[k]` are the matching point lists of view `k`.
    fn calibrate(
        &self,
        world: &[Vec<Point3<f32>>],
        image: &[Vec<Point2<f32>>],
        image_size: (usize, usize),
    ) -> Result<CalibrationResult, Self::Error>;
}

/// A view that could not be used.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("view {index}: {source}")]
pub struct ViewError {
    /// Position of the image in submission order.
    pub index: usize,
    #[source]
    pub source: RingGridError,
}

/// Correspondences of one accepted view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationView {
    /// Submission index of the image.
    pub index: usize,
    pub world: Vec<Point3<f32>>,
    pub image: Vec<Point2<f32>>,
}

/// Accumulates correspondences over a set of images of one board.
#[derive(Debug, Clone)]
pub struct CalibrationViews {
    board: RingBoardSpec,
    world: Vec<Point3<f32>>,
    image_size: Option<(usize, usize)>,
    views: Vec<CalibrationView>,
    failed: Vec<usize>,
    submitted: usize,
}

impl CalibrationViews {
    pub fn new(board: RingBoardSpec) -> Self {
        Self {
            board,
            world: board.world_points(),
            image_size: None,
            views: Vec::new(),
            failed: Vec::new(),
            submitted: 0,
        }
    }

    #[inline]
    pub fn board(&self) -> &RingBoardSpec {
        &self.board
    }

    /// Detect the board in `image` and keep the view on success.
    ///
    /// A failed view is recorded and returned as [`ViewError`]; the caller
    /// decides whether to abort or continue with the next image. Every view
    /// must have the size of the first submitted image.
    pub fn add_image<B, G, C, F>(
        &mut self,
        detector: &RingGridDetector<B, G, C, F>,
        image: &GrayImageView<'_>,
    ) -> Result<&CalibrationView, ViewError>
    where
        B: Binarizer,
        G: CoarseGridDetector,
        C: SubpixelContourExtractor,
        F: EllipseFitter,
    {
        let size = (image.width, image.height);
        let result = self.check_size(size).and_then(|()| detector.detect(image));
        self.accept(size, result)
    }

    /// Keep an externally produced detection on an image of `image_size`
    /// (`(width, height)`) as the next view.
    pub fn add_detection(
        &mut self,
        detection: RingGridDetection,
        image_size: (usize, usize),
    ) -> Result<&CalibrationView, ViewError> {
        let result = self.check_size(image_size).map(|()| detection);
        self.accept(image_size, result)
    }

    fn check_size(&self, size: (usize, usize)) -> Result<(), RingGridError> {
        match self.image_size {
            Some(expected) if expected != size => Err(RingGridError::InvalidImage {
                width: expected.0,
                height: expected.1,
            }),
            _ => Ok(()),
        }
    }

    fn accept(
        &mut self,
        size: (usize, usize),
        result: Result<RingGridDetection, RingGridError>,
    ) -> Result<&CalibrationView, ViewError> {
        let index = self.submitted;
        self.submitted += 1;
        match result {
            Ok(detection) => {
                self.image_size.get_or_insert(size);
                self.views.push(CalibrationView {
                    index,
                    world: self.world.clone(),
                    image: detection.points,
                });
                Ok(&self.views[self.views.len() - 1])
            }
            Err(source) => {
                log::warn!("view {index} rejected: {source}");
                self.failed.push(index);
                Err(ViewError { index, source })
            }
        }
    }

    pub fn views(&self) -> &[CalibrationView] {
        &self.views
    }

    /// Submission indices of rejected images.
    pub fn failed(&self) -> &[usize] {
        &self.failed
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn image_size(&self) -> Option<(usize, usize)> {
        self.image_size
    }

    pub fn world_points(&self) -> Vec<Vec<Point3<f32>>> {
        self.views.iter().map(|v| v.world.clone()).collect()
    }

    pub fn image_points(&self) -> Vec<Vec<Point2<f32>>> {
        self.views.iter().map(|v| v.image.clone()).collect()
    }

    /// Run `solver` over the accepted views.
    pub fn solve<S: CalibrationSolver>(&self, solver: &S) -> Result<CalibrationResult, S::Error> {
        let size = self.image_size.unwrap_or((0, 0));
        solver.calibrate(&self.world_points(), &self.image_points(), size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rings::synthetic::{render_board, RenderParams};
    use crate::rings::RingGridParams;
    use crate::core::GrayImage;

    fn board() -> RingBoardSpec {
        RingBoardSpec {
            rows: 3,
            cols: 4,
            spacing: 80.0,
            radii: [10.0, 16.0, 24.0, 30.0],
        }
    }

    /// Reports the view count and sizes instead of solving.
    struct CountingSolver;

    impl CalibrationSolver for CountingSolver {
        type Error = String;

        fn calibrate(
            &self,
            world: &[Vec<Point3<f32>>],
            image: &[Vec<Point2<f32>>],
            image_size: (usize, usize),
        ) -> Result<CalibrationResult, Self::Error> {
            if world.len() != image.len() {
                return Err("view count mismatch".into());
            }
            Ok(CalibrationResult {
                intrinsics: CameraIntrinsics {
                    fx: world.len() as f64,
                    fy: image.iter().map(Vec::len).sum::<usize>() as f64,
                    cx: image_size.0 as f64,
                    cy: image_size.1 as f64,
                },
                distortion: RadialTangentialDistortion::default(),
                reprojection_error: 0.0,
                poses: vec![Isometry3::identity(); world.len()],
            })
        }
    }

    #[test]
    fn failed_views_are_indexed_and_skippable() {
        let detector = RingGridDetector::new(board(), RingGridParams::default()).unwrap();
        let good = render_board(&board(), &RenderParams::default());
        let blank = GrayImage::filled(good.width, good.height, 128);

        let mut views = CalibrationViews::new(board());
        assert!(views.add_image(&detector, &good.view()).is_ok());
        let err = views.add_image(&detector, &blank.view()).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.source, RingGridError::CoarseGridNotFound);
        assert!(views.add_image(&detector, &good.view()).is_ok());

        assert_eq!(views.len(), 2);
        assert_eq!(views.failed(), &[1]);
        assert_eq!(views.views()[1].index, 2);
        assert_eq!(views.views()[0].world.len(), views.views()[0].image.len());

        let result = views.solve(&CountingSolver).unwrap();
        assert_eq!(result.intrinsics.fx, 2.0);
        assert_eq!(result.intrinsics.fy, 24.0);
        assert_eq!(result.intrinsics.cx, good.width as f64);
    }

    #[test]
    fn external_detections_carry_their_image_size() {
        let detector = RingGridDetector::new(board(), RingGridParams::default()).unwrap();
        let good = render_board(&board(), &RenderParams::default());
        let detection = detector.detect(&good.view()).unwrap();
        let size = (good.width, good.height);

        let mut views = CalibrationViews::new(board());
        views.add_detection(detection.clone(), size).unwrap();
        assert_eq!(views.image_size(), Some(size));

        let err = views.add_detection(detection, (640, 480)).unwrap_err();
        assert_eq!(err.index, 1);
        assert!(matches!(err.source, RingGridError::InvalidImage { .. }));

        let result = views.solve(&CountingSolver).unwrap();
        assert_eq!(result.intrinsics.cx, good.width as f64);
        assert_eq!(result.intrinsics.cy, good.height as f64);
    }

    #[test]
    fn mismatched_image_size_is_rejected() {
        let detector = RingGridDetector::new(board(), RingGridParams::default()).unwrap();
        let good = render_board(&board(), &RenderParams::default());
        let small = GrayImage::filled(50, 50, 0);

        let mut views = CalibrationViews::new(board());
        views.add_image(&detector, &good.view()).unwrap();
        let err = views.add_image(&detector, &small.view()).unwrap_err();
        assert!(matches!(err.source, RingGridError::InvalidImage { .. }));
        assert_eq!(views.len(), 1);
    }
}
