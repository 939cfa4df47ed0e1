//! Row-major ordering of an unordered grid point set.
//!
//! The row direction comes from the minimum-area rectangle around the
//! points: its upper-left corner and the adjacent corner lying along +x
//! define the top edge, points are ranked by distance to that edge, cut into
//! rows and each row is sorted by x.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::geom::{min_area_rect, point_line_distance};

/// Errors returned by [`sort_grid_points`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridOrderError {
    #[error("expected {expected} points for the grid, got {got}")]
    PointCountMismatch { expected: usize, got: usize },
    #[error("points do not span a 2D region")]
    Degenerate,
    #[error("grid orientation is ambiguous (row edge at {angle_deg:.1} deg)")]
    AmbiguousOrientation { angle_deg: f64 },
    #[error("row {row} overlaps the next row in distance to the top edge")]
    RowsNotSeparable { row: usize },
}

/// Settings for [`sort_grid_points`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOrderParams {
    /// Reject orderings whose row edge lies within this many degrees of 45°.
    pub ambiguity_deg: f64,
}

impl Default for GridOrderParams {
    fn default() -> Self {
        Self { ambiguity_deg: 5.0 }
    }
}

/// Reorder `points` (one per node of a `rows × cols` grid) into row-major
/// order: top row first, each row left to right.
///
/// Row-major input comes back unchanged.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(points, params), fields(n = points.len()))
)]
pub fn sort_grid_points(
    points: &[Point2<f32>],
    rows: usize,
    cols: usize,
    params: &GridOrderParams,
) -> Result<Vec<Point2<f32>>, GridOrderError> {
    let expected = rows * cols;
    if points.len() != expected || expected == 0 {
        return Err(GridOrderError::PointCountMismatch {
            expected,
            got: points.len(),
        });
    }
    if rows == 1 || cols == 1 {
        return Ok(sort_single_line(points));
    }

    let pts: Vec<Point2<f64>> = points
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect();
    let rect = min_area_rect(&pts).ok_or(GridOrderError::Degenerate)?;

    let left_upper = left_upper_corner(&rect.corners);
    let right_upper = rect
        .adjacent(left_upper)
        .into_iter()
        .max_by(|&a, &b| {
            let da = rect.corners[a] - rect.corners[left_upper];
            let db = rect.corners[b] - rect.corners[left_upper];
            let ca = da.x / da.norm();
            let cb = db.x / db.norm();
            ca.total_cmp(&cb)
                .then(da.norm_squared().total_cmp(&db.norm_squared()))
        })
        .ok_or(GridOrderError::Degenerate)?;

    let a = rect.corners[left_upper];
    let b = rect.corners[right_upper];
    let edge = b - a;
    let angle_deg = edge.y.atan2(edge.x).to_degrees();
    if (angle_deg.abs() - 45.0).abs() < params.ambiguity_deg {
        return Err(GridOrderError::AmbiguousOrientation { angle_deg });
    }

    let mut ranked: Vec<(f64, usize)> = pts
        .iter()
        .enumerate()
        .map(|(i, &p)| (point_line_distance(p, a, b), i))
        .collect();
    ranked.sort_by(|l, r| l.0.total_cmp(&r.0));

    let row_dists: Vec<&[(f64, usize)]> = ranked.chunks(cols).collect();
    for (row, pair) in row_dists.windows(2).enumerate() {
        let spread = |r: &[(f64, usize)]| r[r.len() - 1].0 - r[0].0;
        let gap = pair[1][0].0 - pair[0][cols - 1].0;
        if gap <= spread(pair[0]).max(spread(pair[1])) {
            return Err(GridOrderError::RowsNotSeparable { row });
        }
    }

    let mut out = Vec::with_capacity(expected);
    for row in row_dists {
        let mut idx: Vec<usize> = row.iter().map(|&(_, i)| i).collect();
        idx.sort_by(|&l, &r| points[l].x.total_cmp(&points[r].x));
        out.extend(idx.into_iter().map(|i| points[i]));
    }

    log::debug!(
        "grid order: {}x{} edge angle {:.2} deg",
        rows,
        cols,
        angle_deg
    );
    Ok(out)
}

/// Among the two smallest-x corners, the one with the smaller y.
fn left_upper_corner(corners: &[Point2<f64>; 4]) -> usize {
    let mut idx = [0usize, 1, 2, 3];
    idx.sort_by(|&l, &r| corners[l].x.total_cmp(&corners[r].x));
    let (c0, c1) = (idx[0], idx[1]);
    if corners[c1].y < corners[c0].y {
        c1
    } else {
        c0
    }
}

fn sort_single_line(points: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let (min_x, max_x, min_y, max_y) = points.iter().fold(
        (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY),
        |(a, b, c, d), p| (a.min(p.x), b.max(p.x), c.min(p.y), d.max(p.y)),
    );
    let mut out = points.to_vec();
    if max_x - min_x >= max_y - min_y {
        out.sort_by(|l, r| l.x.total_cmp(&r.x));
    } else {
        out.sort_by(|l, r| l.y.total_cmp(&r.y));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, cols: usize, pitch: f32, angle_deg: f32) -> Vec<Point2<f32>> {
        let (s, c) = angle_deg.to_radians().sin_cos();
        (0..rows)
            .flat_map(|i| {
                (0..cols).map(move |j| {
                    let x = j as f32 * pitch;
                    let y = i as f32 * pitch;
                    Point2::new(c * x - s * y + 100.0, s * x + c * y + 60.0)
                })
            })
            .collect()
    }

    /// Deterministic permutation without pulling in an RNG.
    fn shuffle(points: &[Point2<f32>]) -> Vec<Point2<f32>> {
        let n = points.len();
        (0..n).map(|k| points[(k * 7 + 3) % n]).collect()
    }

    #[test]
    fn recovers_row_major_order_from_shuffled_grid() {
        let g = grid(3, 4, 80.0, 0.0);
        let sorted = sort_grid_points(&shuffle(&g), 3, 4, &GridOrderParams::default()).unwrap();
        assert_eq!(sorted, g);
    }

    #[test]
    fn sorting_is_idempotent_on_row_major_input() {
        let g = grid(3, 4, 80.0, 8.0);
        let once = sort_grid_points(&g, 3, 4, &GridOrderParams::default()).unwrap();
        assert_eq!(once, g);
        let twice = sort_grid_points(&once, 3, 4, &GridOrderParams::default()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn handles_rotation_either_way() {
        for angle in [-20.0f32, -5.0, 12.0, 25.0] {
            let g = grid(4, 5, 50.0, angle);
            let sorted =
                sort_grid_points(&shuffle(&g), 4, 5, &GridOrderParams::default()).unwrap();
            assert_eq!(sorted, g, "angle {angle}");
        }
    }

    #[test]
    fn square_grid_at_45_degrees_is_ambiguous() {
        let g = grid(3, 3, 40.0, 45.0);
        let err = sort_grid_points(&g, 3, 3, &GridOrderParams::default()).unwrap_err();
        assert!(matches!(err, GridOrderError::AmbiguousOrientation { .. }));
    }

    #[test]
    fn wrong_point_count_is_rejected() {
        let g = grid(3, 4, 80.0, 0.0);
        let err = sort_grid_points(&g[..11], 3, 4, &GridOrderParams::default()).unwrap_err();
        assert_eq!(
            err,
            GridOrderError::PointCountMismatch {
                expected: 12,
                got: 11
            }
        );
    }

    #[test]
    fn wrong_pattern_size_is_not_separable() {
        // 3x4 points sliced as 4 rows of 3 mixes grid rows.
        let g = grid(3, 4, 80.0, 0.0);
        let err = sort_grid_points(&g, 4, 3, &GridOrderParams::default()).unwrap_err();
        assert!(matches!(err, GridOrderError::RowsNotSeparable { .. }));
    }
}
