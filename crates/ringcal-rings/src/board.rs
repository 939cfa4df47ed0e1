//! Printed ring-grid board description.

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Static ring-grid board specification.
///
/// `rows`/`cols` count ring nodes. `radii` are the four boundary radii of a
/// node from the innermost edge out, in the same unit as `spacing`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RingBoardSpec {
    pub rows: u32,
    pub cols: u32,
    /// Node pitch (center-to-center), both directions.
    pub spacing: f32,
    pub radii: [f32; 4],
}

/// Board specification validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardSpecError {
    #[error("rows and cols must be >= 2")]
    InvalidSize,
    #[error("spacing must be > 0")]
    InvalidSpacing,
    #[error("radii must be positive and strictly increasing")]
    InvalidRadii,
    #[error("outer diameter {diameter} does not fit the node spacing {spacing}")]
    RingsOverlap { diameter: f32, spacing: f32 },
}

impl RingBoardSpec {
    /// Check the board layout for internal consistency.
    pub fn validate(&self) -> Result<(), BoardSpecError> {
        if self.rows < 2 || self.cols < 2 {
            return Err(BoardSpecError::InvalidSize);
        }
        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            return Err(BoardSpecError::InvalidSpacing);
        }
        let ok = self.radii.iter().all(|r| r.is_finite() && *r > 0.0)
            && self.radii.windows(2).all(|w| w[1] > w[0]);
        if !ok {
            return Err(BoardSpecError::InvalidRadii);
        }
        let diameter = 2.0 * self.radii[3];
        if diameter >= self.spacing {
            return Err(BoardSpecError::RingsOverlap {
                diameter,
                spacing: self.spacing,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// `(rows, cols)` as `usize`.
    #[inline]
    pub fn pattern_size(&self) -> (usize, usize) {
        (self.rows as usize, self.cols as usize)
    }

    pub fn radii_f64(&self) -> [f64; 4] {
        self.radii.map(|r| r as f64)
    }

    /// Board-plane center of node `(row, col)`.
    #[inline]
    pub fn node_position(&self, row: u32, col: u32) -> Point2<f32> {
        Point2::new(col as f32 * self.spacing, row as f32 * self.spacing)
    }

    /// Node centers on the `z = 0` board plane, row-major.
    pub fn world_points(&self) -> Vec<Point3<f32>> {
        (0..self.rows)
            .flat_map(|i| {
                (0..self.cols).map(move |j| {
                    let p = self.node_position(i, j);
                    Point3::new(p.x, p.y, 0.0)
                })
            })
            .collect()
    }
}
