//! Concentric ring calibration target detection.
//!
//! ## Quickstart
//!
//! ```
//! use ringcal_rings::synthetic::{render_board, RenderParams};
//! use ringcal_rings::{RingBoardSpec, RingGridDetector, RingGridParams};
//!
//! let board = RingBoardSpec { rows: 3, cols: 4, spacing: 80.0, radii: [10.0, 16.0, 24.0, 30.0] };
//! let image = render_board(&board, &RenderParams::default());
//!
//! let detector = RingGridDetector::new(board, RingGridParams::default()).unwrap();
//! let detection = detector.detect(&image.view()).unwrap();
//! assert_eq!(detection.points.len(), 12);
//! ```
//!
//! Pipeline:
//! 1. Adaptive-threshold the image and locate the inner disks as blobs.
//! 2. Order the blob centers row-major; half the smallest neighbor distance
//!    becomes the clustering radius.
//! 3. Extract closed sub-pixel iso-contours from the grayscale image and fit
//!    ellipses to those that are round enough and close to a node.
//! 4. Group ellipses per node, merging fragments of the same boundary.
//! 5. Encode the 4 boundaries as conics and solve the projected center from
//!    the best-conditioned conic pencil.

mod binarize;
mod board;
mod center;
mod cluster;
mod coarse;
mod conic;
mod contour;
mod detector;
mod eigen;
mod ellipse;
mod error;
mod fit;
pub mod synthetic;

pub use binarize::{AdaptiveMeanBinarizer, Binarizer};
pub use board::{BoardSpecError, RingBoardSpec};
pub use center::{
    pencil_pairs, solve_ring_center, CenterSolveError, CenterSolverParams, RingCenter,
};
pub use cluster::{
    cluster_rings, feature_distance, ExcessBoundaryPolicy, RingCluster, RingClusterParams,
};
pub use coarse::{detect_coarse_grid, Blob, BlobGridDetector, CoarseGridDetector, CoarseStrategy};
pub use conic::{conic_to_ellipse, ConicMatrix};
pub use contour::{
    iso_contours, select_ring_candidates, ContourFilterParams, IsoContourExtractor, IsoLevel,
    SubpixelContourExtractor,
};
pub use detector::{GridNode, RingGridDetection, RingGridDetector, RingGridParams};
pub use eigen::{pseudo_eigen, PseudoEigen};
pub use ellipse::{EllipseCandidate, RotatedEllipse};
pub use error::RingGridError;
pub use fit::{fit_conic_direct, DirectEllipseFitter, EllipseFitter};

pub use ringcal_core::{GrayImage, GrayImageView, GridOrderParams, Homography};
