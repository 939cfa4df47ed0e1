//! Core types and utilities for concentric ring target detection.
//!
//! This crate is small and purely geometric: image views, thresholding,
//! homographies, planar hull/rectangle helpers and the row-major grid point
//! ordering. It does not know about rings or conics.

pub mod geom;
mod homography;
mod image;
mod logger;
mod point_order;
mod threshold;

pub use homography::{homography_from_4pt, Homography};
pub use image::{FloatImage, GrayImage, GrayImageView};
pub use point_order::{sort_grid_points, GridOrderError, GridOrderParams};
pub use threshold::{adaptive_mean_threshold, otsu_threshold};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, LOG_ENV_VAR};
