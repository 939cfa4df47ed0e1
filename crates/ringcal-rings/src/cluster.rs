//! Grouping of boundary ellipses into per-node ring clusters.
//!
//! Every coarse node center collects the candidates whose centers lie
//! closer than the feature distance. Inside a node, fragments of the same
//! boundary (similar width) are merged by refitting over their joint points.
//! Merging is a left fold in detection order and only compares against the
//! first matching member, so near-tie tolerance cases depend on that order.

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::conic::ConicMatrix;
use crate::ellipse::EllipseCandidate;
use crate::error::RingGridError;
use crate::fit::EllipseFitter;

/// What to do when more than 4 boundaries survive merging at one node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcessBoundaryPolicy {
    /// Keep the 4 smallest by bounding area.
    #[default]
    TakeSmallest,
    /// Fail the image.
    Reject,
}

/// Ring clustering settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RingClusterParams {
    /// Candidates whose widths differ by less than this (px) are fragments
    /// of the same boundary.
    pub merge_tolerance: f32,
    pub excess_policy: ExcessBoundaryPolicy,
}

impl Default for RingClusterParams {
    fn default() -> Self {
        Self {
            merge_tolerance: 5.0,
            excess_policy: ExcessBoundaryPolicy::TakeSmallest,
        }
    }
}

/// The 4 nested boundaries of one grid node, innermost first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RingCluster {
    /// Index of the node in coarse (row-major) order.
    pub node: usize,
    pub coarse_center: Point2<f32>,
    members: [EllipseCandidate; 4],
}

impl RingCluster {
    #[inline]
    pub fn members(&self) -> &[EllipseCandidate; 4] {
        &self.members
    }

    /// Conic matrices of the boundaries, innermost first.
    pub fn conics(&self) -> [ConicMatrix; 4] {
        self.members
            .each_ref()
            .map(|m| ConicMatrix::from_ellipse(&m.ellipse))
    }
}

/// Half of the smallest nearest-neighbor distance among `centers`.
///
/// `None` for fewer than two centers or coincident centers.
pub fn feature_distance(centers: &[Point2<f32>]) -> Option<f32> {
    if centers.len() < 2 {
        return None;
    }
    let coords = centers.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>();
    let tree: KdTree<f32, 2> = (&coords).into();

    let mut min_d2 = f32::INFINITY;
    for (i, q) in coords.iter().enumerate() {
        for nn in tree.nearest_n::<SquaredEuclidean>(q, 2) {
            if nn.item as usize != i {
                min_d2 = min_d2.min(nn.distance);
            }
        }
    }

    let d = 0.5 * min_d2.sqrt();
    (d.is_finite() && d > 0.0).then_some(d)
}

/// Fold one candidate into the node's members.
fn merge_or_push<F: EllipseFitter + ?Sized>(
    mut members: Vec<EllipseCandidate>,
    candidate: &EllipseCandidate,
    tolerance: f32,
    fitter: &F,
) -> Vec<EllipseCandidate> {
    let twin = members
        .iter()
        .position(|m| (m.ellipse.width - candidate.ellipse.width).abs() < tolerance);

    match twin {
        None => members.push(candidate.clone()),
        Some(k) => {
            let index = members[k].detection_index;
            let mut points = members[k].points.clone();
            points.extend_from_slice(&candidate.points);
            match fitter.fit(&points) {
                Some(ellipse) => members[k] = EllipseCandidate::new(ellipse, points, index),
                None => log::debug!(
                    "refit of candidates {} + {} failed, dropping the fragment",
                    index,
                    candidate.detection_index
                ),
            }
        }
    }
    members
}

/// Group candidates into exactly one 4-boundary cluster per coarse center.
///
/// `coarse_centers` are in row-major node order. Candidates are consumed in
/// ascending `detection_index` order.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip_all,
        fields(candidates = candidates.len(), nodes = coarse_centers.len())
    )
)]
pub fn cluster_rings<F: EllipseFitter + ?Sized>(
    candidates: &[EllipseCandidate],
    coarse_centers: &[Point2<f32>],
    distance_feat: f32,
    params: &RingClusterParams,
    fitter: &F,
) -> Result<Vec<RingCluster>, RingGridError> {
    let mut ordered: Vec<&EllipseCandidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| c.detection_index);

    let groups: Vec<(usize, Vec<EllipseCandidate>)> = coarse_centers
        .iter()
        .enumerate()
        .map(|(node, center)| {
            let members = ordered
                .iter()
                .filter(|c| (c.center() - *center).norm() < distance_feat)
                .fold(Vec::new(), |acc, c| {
                    merge_or_push(acc, c, params.merge_tolerance, fitter)
                });
            (node, members)
        })
        .filter(|(_, members)| !members.is_empty())
        .collect();

    if groups.len() != coarse_centers.len() {
        return Err(RingGridError::ClusterCountMismatch {
            expected: coarse_centers.len(),
            got: groups.len(),
        });
    }

    groups
        .into_iter()
        .map(|(node, mut members)| {
            members.sort_by(|a, b| {
                a.ellipse
                    .bounding_area()
                    .total_cmp(&b.ellipse.bounding_area())
            });
            let found = members.len();
            if found < 4 {
                return Err(RingGridError::InsufficientBoundaries { node, found });
            }
            if found > 4 {
                match params.excess_policy {
                    ExcessBoundaryPolicy::Reject => {
                        return Err(RingGridError::ExcessBoundaries { node, found });
                    }
                    ExcessBoundaryPolicy::TakeSmallest => {
                        log::warn!("node {node}: {found} boundaries, keeping the 4 smallest");
                        members.truncate(4);
                    }
                }
            }
            let members: [EllipseCandidate; 4] = members
                .try_into()
                .map_err(|_| RingGridError::InsufficientBoundaries { node, found })?;
            Ok(RingCluster {
                node,
                coarse_center: coarse_centers[node],
                members,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ellipse::RotatedEllipse;
    use crate::fit::DirectEllipseFitter;
    use approx::assert_relative_eq;

    fn candidate(center: Point2<f32>, radius: f32, index: usize) -> EllipseCandidate {
        let e = RotatedEllipse::circle(center, radius);
        EllipseCandidate::new(e, e.sample_points(48), index)
    }

    /// Arc of a circle between two parameter values.
    fn arc(center: Point2<f32>, radius: f32, t0: f64, t1: f64, index: usize) -> EllipseCandidate {
        let circle = RotatedEllipse::circle(center, radius);
        let points: Vec<Point2<f32>> = (0..24)
            .map(|k| {
                let p = circle.point_at(t0 + (t1 - t0) * k as f64 / 23.0);
                Point2::new(p.x as f32, p.y as f32)
            })
            .collect();
        let ellipse = DirectEllipseFitter::default().fit(&points).expect("arc fit");
        EllipseCandidate::new(ellipse, points, index)
    }

    fn nested(center: Point2<f32>, first_index: usize) -> Vec<EllipseCandidate> {
        [30.0, 10.0, 24.0, 16.0]
            .iter()
            .enumerate()
            .map(|(k, &r)| candidate(center, r, first_index + k))
            .collect()
    }

    #[test]
    fn feature_distance_is_half_min_spacing() {
        let centers = [
            Point2::new(0.0, 0.0),
            Point2::new(80.0, 0.0),
            Point2::new(0.0, 60.0),
            Point2::new(80.0, 60.0),
        ];
        assert_relative_eq!(feature_distance(&centers).unwrap(), 30.0);
        assert!(feature_distance(&centers[..1]).is_none());
    }

    #[test]
    fn four_nested_plus_far_outlier_gives_four_members() {
        let c = Point2::new(100.0, 100.0);
        let mut cands = nested(c, 0);
        cands.push(candidate(Point2::new(400.0, 400.0), 12.0, 4));

        let clusters = cluster_rings(
            &cands,
            &[c],
            40.0,
            &RingClusterParams::default(),
            &DirectEllipseFitter::default(),
        )
        .unwrap();
        assert_eq!(clusters.len(), 1);
        let widths: Vec<f32> = clusters[0]
            .members()
            .iter()
            .map(|m| m.ellipse.width)
            .collect();
        assert_eq!(widths, vec![20.0, 32.0, 48.0, 60.0]);
    }

    #[test]
    fn fragments_of_one_boundary_merge() {
        let c = Point2::new(50.0, 50.0);
        let mut cands = vec![
            candidate(c, 10.0, 0),
            arc(c, 16.0, 0.0, 3.0, 1),
            arc(c, 16.0, 3.2, 6.2, 2),
            candidate(c, 24.0, 3),
            candidate(c, 30.0, 4),
        ];
        cands.swap(1, 4);

        let clusters = cluster_rings(
            &cands,
            &[c],
            40.0,
            &RingClusterParams::default(),
            &DirectEllipseFitter::default(),
        )
        .unwrap();
        let merged = &clusters[0].members()[1];
        assert_eq!(merged.points.len(), 48);
        assert_eq!(merged.detection_index, 1);
        assert_relative_eq!(merged.ellipse.width, 32.0, epsilon = 1e-2);
        // The refit encloses both fragments.
        let q = ConicMatrix::from_ellipse(&merged.ellipse);
        for p in &merged.points {
            assert!(q.evaluate(p.x as f64, p.y as f64).abs() < 1e-3);
        }
    }

    #[test]
    fn merge_target_depends_on_detection_order() {
        let c = Point2::new(0.0, 0.0);
        let a = candidate(c, 10.0, 0); // width 20
        let b = candidate(c, 13.5, 1); // width 27
        let mid = candidate(c, 11.75, 2); // width 23.5, within 5 of both
        let fitter = DirectEllipseFitter::default();

        let abc = [a.clone(), b.clone(), mid.clone()]
            .iter()
            .fold(Vec::new(), |acc, x| merge_or_push(acc, x, 5.0, &fitter));
        let bac = [b, a, mid]
            .iter()
            .fold(Vec::new(), |acc, x| merge_or_push(acc, x, 5.0, &fitter));

        assert_eq!(abc.len(), 2);
        assert_eq!(bac.len(), 2);
        let grown_abc = abc.iter().find(|m| m.detection_index == 0).unwrap();
        let grown_bac = bac.iter().find(|m| m.detection_index == 1).unwrap();
        assert_eq!(grown_abc.points.len(), 96);
        assert_eq!(grown_bac.points.len(), 96);
        assert!(grown_abc.ellipse.width < 23.5);
        assert!(grown_bac.ellipse.width > 23.5);
    }

    #[test]
    fn missing_node_is_a_count_mismatch() {
        let c0 = Point2::new(0.0, 0.0);
        let c1 = Point2::new(100.0, 0.0);
        let err = cluster_rings(
            &nested(c0, 0),
            &[c0, c1],
            50.0,
            &RingClusterParams::default(),
            &DirectEllipseFitter::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RingGridError::ClusterCountMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn three_boundaries_is_insufficient() {
        let c = Point2::new(0.0, 0.0);
        let cands: Vec<_> = nested(c, 0).into_iter().filter(|m| m.ellipse.width < 50.0).collect();
        let err = cluster_rings(
            &cands,
            &[c],
            40.0,
            &RingClusterParams::default(),
            &DirectEllipseFitter::default(),
        )
        .unwrap_err();
        assert_eq!(err, RingGridError::InsufficientBoundaries { node: 0, found: 3 });
    }

    #[test]
    fn excess_boundaries_follow_policy() {
        let c = Point2::new(0.0, 0.0);
        let mut cands = nested(c, 0);
        cands.push(candidate(c, 38.0, 4));
        let fitter = DirectEllipseFitter::default();

        let kept = cluster_rings(&cands, &[c], 45.0, &RingClusterParams::default(), &fitter)
            .unwrap();
        assert_relative_eq!(kept[0].members()[3].ellipse.width, 60.0, epsilon = 1e-4);

        let strict = RingClusterParams {
            excess_policy: ExcessBoundaryPolicy::Reject,
            ..RingClusterParams::default()
        };
        let err = cluster_rings(&cands, &[c], 45.0, &strict, &fitter).unwrap_err();
        assert_eq!(err, RingGridError::ExcessBoundaries { node: 0, found: 5 });
    }
}
