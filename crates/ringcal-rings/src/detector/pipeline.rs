use nalgebra::Point2;
use ringcal_core::{sort_grid_points, GrayImageView};

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{GridNode, RingGridDetection, RingGridParams};
use crate::binarize::{AdaptiveMeanBinarizer, Binarizer};
use crate::board::RingBoardSpec;
use crate::center::solve_ring_center;
use crate::cluster::{cluster_rings, feature_distance};
use crate::coarse::{detect_coarse_grid, BlobGridDetector, CoarseGridDetector};
use crate::contour::{select_ring_candidates, IsoContourExtractor, SubpixelContourExtractor};
use crate::error::RingGridError;
use crate::fit::{DirectEllipseFitter, EllipseFitter};

/// Concentric-ring grid detector.
///
/// Generic over its four image-level collaborators; [`RingGridDetector::new`]
/// uses the built-in ones configured from [`RingGridParams`].
pub struct RingGridDetector<
    B = AdaptiveMeanBinarizer,
    G = BlobGridDetector,
    C = IsoContourExtractor,
    F = DirectEllipseFitter,
> {
    board: RingBoardSpec,
    params: RingGridParams,
    binarizer: B,
    coarse: G,
    contours: C,
    fitter: F,
}

impl RingGridDetector {
    /// Detector with the built-in collaborators.
    pub fn new(board: RingBoardSpec, params: RingGridParams) -> Result<Self, RingGridError> {
        let binarizer = params.binarizer;
        let coarse = params.coarse;
        let contours = params.contour;
        let fitter = params.fitter;
        Self::with_components(board, params, binarizer, coarse, contours, fitter)
    }
}

impl<B, G, C, F> RingGridDetector<B, G, C, F>
where
    B: Binarizer,
    G: CoarseGridDetector,
    C: SubpixelContourExtractor,
    F: EllipseFitter,
{
    /// Detector with caller-supplied collaborators.
    pub fn with_components(
        board: RingBoardSpec,
        params: RingGridParams,
        binarizer: B,
        coarse: G,
        contours: C,
        fitter: F,
    ) -> Result<Self, RingGridError> {
        board.validate()?;
        Ok(Self {
            board,
            params,
            binarizer,
            coarse,
            contours,
            fitter,
        })
    }

    #[inline]
    pub fn board(&self) -> &RingBoardSpec {
        &self.board
    }

    #[inline]
    pub fn params(&self) -> &RingGridParams {
        &self.params
    }

    /// Detect every ring center of the board in a grayscale image.
    ///
    /// Either all `rows * cols` centers come back in row-major order or the
    /// whole image fails.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(w = image.width, h = image.height))
    )]
    pub fn detect(&self, image: &GrayImageView<'_>) -> Result<RingGridDetection, RingGridError> {
        if !image.is_consistent() || image.width == 0 || image.height == 0 {
            return Err(RingGridError::InvalidImage {
                width: image.width,
                height: image.height,
            });
        }
        let (rows, cols) = self.board.pattern_size();

        let binary = self.binarizer.binarize(image);
        let (coarse, strategy) = detect_coarse_grid(
            &self.coarse,
            &binary.view(),
            rows,
            cols,
            &self.params.coarse_strategies,
        )
        .ok_or(RingGridError::CoarseGridNotFound)?;
        let coarse = self.ensure_row_major(coarse, rows, cols)?;
        let distance_feat = feature_distance(&coarse).ok_or(RingGridError::CoarseGridNotFound)?;
        log::debug!(
            "coarse grid {}x{} via {:?}, feature distance {:.2}",
            rows,
            cols,
            strategy,
            distance_feat
        );

        let contours = self.contours.extract(image);
        let total = contours.len();
        let candidates = select_ring_candidates(
            contours,
            &coarse,
            distance_feat,
            &self.params.contour_filter,
            &self.fitter,
        );
        log::debug!("{} of {} contours are ring candidates", candidates.len(), total);

        let clusters = cluster_rings(
            &candidates,
            &coarse,
            distance_feat,
            &self.params.cluster,
            &self.fitter,
        )?;

        let radii = self.board.radii_f64();
        let mut nodes = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            let solved = solve_ring_center(&cluster.conics(), &radii, &self.params.center)
                .map_err(|source| RingGridError::SingularConicPencil {
                    node: cluster.node,
                    source,
                })?;
            nodes.push(GridNode {
                row: cluster.node / cols,
                col: cluster.node % cols,
                center: Point2::new(solved.center.x as f32, solved.center.y as f32),
                coarse_center: cluster.coarse_center,
                score: solved.score,
                pair: solved.pair,
            });
        }

        Ok(RingGridDetection {
            points: nodes.iter().map(|n| n.center).collect(),
            nodes,
            coarse_centers: coarse,
            distance_feat,
            strategy,
        })
    }

    fn ensure_row_major(
        &self,
        coarse: Vec<Point2<f32>>,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Point2<f32>>, RingGridError> {
        let ordered = sort_grid_points(&coarse, rows, cols, &self.params.order)?;
        if ordered != coarse {
            log::warn!("coarse grid was not row-major; reordered");
        }
        Ok(ordered)
    }
}
