//! High-level facade for the `ringcal-*` workspace.
//!
//! This crate provides:
//! - re-exports of the geometric core and the ring detector
//! - JSON config / report helpers for one-image detection runs
//! - (feature `image`) helpers that run the detector on `image` buffers
//! - a calibration hand-off that collects per-view point correspondences
//!
//! ## Quickstart
//!
//! ```no_run
//! use ringcal::detect;
//! use ringcal::rings::{RingBoardSpec, RingGridParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::ImageReader::open("rings.png")?.decode()?.to_luma8();
//! let board = RingBoardSpec { rows: 3, cols: 4, spacing: 80.0, radii: [10.0, 16.0, 24.0, 30.0] };
//!
//! let detection = detect::detect_ring_grid(&img, board, RingGridParams::default())?;
//! println!("{} centers", detection.points.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `ringcal::core`: images, thresholds, homographies, grid point ordering.
//! - `ringcal::rings`: ring board spec, conic encoding, center solver, detector.
//! - `ringcal::detect` (feature `image`): end-to-end helpers from `image::GrayImage`.
//! - `ringcal::calibration`: per-view correspondences and the solver seam.

pub use ringcal_core as core;
pub use ringcal_rings as rings;

pub use ringcal_core::{init_from_env, init_with_level, LOG_ENV_VAR};
pub use ringcal_rings::{RingBoardSpec, RingGridDetection, RingGridDetector, RingGridParams};

#[cfg(feature = "tracing")]
pub use ringcal_core::init_tracing;

pub mod calibration;
mod io;

pub use io::{RingGridDetectConfig, RingGridDetectReport, RingIoError};

#[cfg(feature = "image")]
pub mod detect;
