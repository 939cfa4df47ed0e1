use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::coarse::CoarseStrategy;

/// One resolved grid node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    pub row: usize,
    pub col: usize,
    /// Projected ring center.
    pub center: Point2<f32>,
    /// Seed position from coarse detection.
    pub coarse_center: Point2<f32>,
    /// Center solver residual of the winning boundary pair.
    pub score: f64,
    /// `(outer, inner)` boundary indices of the winning pair.
    pub pair: (usize, usize),
}

/// Output of a ring-grid detection run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RingGridDetection {
    /// Row-major node centers, `rows * cols` of them.
    pub points: Vec<Point2<f32>>,
    pub nodes: Vec<GridNode>,
    pub coarse_centers: Vec<Point2<f32>>,
    /// Clustering radius derived from the coarse grid.
    pub distance_feat: f32,
    /// Coarse strategy that found the grid.
    pub strategy: CoarseStrategy,
}
