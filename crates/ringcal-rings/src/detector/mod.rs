//! Ring-grid detection pipeline.
//!
//! Wires binarization, coarse node localization, sub-pixel contours,
//! ellipse fitting, ring clustering and the per-node center solver.

mod params;
mod pipeline;
mod result;

pub use params::RingGridParams;
pub use pipeline::RingGridDetector;
pub use result::{GridNode, RingGridDetection};
