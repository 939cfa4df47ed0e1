use ringcal_core::GridOrderParams;
use serde::{Deserialize, Serialize};

use crate::binarize::AdaptiveMeanBinarizer;
use crate::center::CenterSolverParams;
use crate::cluster::RingClusterParams;
use crate::coarse::{BlobGridDetector, CoarseStrategy};
use crate::contour::{ContourFilterParams, IsoContourExtractor};
use crate::fit::DirectEllipseFitter;

/// Configuration for [`RingGridDetector`](super::RingGridDetector).
///
/// The component sections (`binarizer`, `coarse`, `contour`, `fitter`)
/// configure the built-in collaborators used by `RingGridDetector::new`;
/// they are ignored when components are supplied explicitly.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RingGridParams {
    pub binarizer: AdaptiveMeanBinarizer,
    pub coarse: BlobGridDetector,
    /// Coarse strategies in the order they are tried.
    pub coarse_strategies: Vec<CoarseStrategy>,
    pub contour: IsoContourExtractor,
    pub contour_filter: ContourFilterParams,
    pub fitter: DirectEllipseFitter,
    pub cluster: RingClusterParams,
    pub center: CenterSolverParams,
    /// Ordering used to check the coarse grid is row-major.
    pub order: GridOrderParams,
}

impl Default for RingGridParams {
    fn default() -> Self {
        Self {
            binarizer: AdaptiveMeanBinarizer::default(),
            coarse: BlobGridDetector::default(),
            coarse_strategies: vec![CoarseStrategy::Plain, CoarseStrategy::Clustering],
            contour: IsoContourExtractor::default(),
            contour_filter: ContourFilterParams::default(),
            fitter: DirectEllipseFitter::default(),
            cluster: RingClusterParams::default(),
            center: CenterSolverParams::default(),
            order: GridOrderParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let params: RingGridParams = serde_json::from_str(
            r#"{ "binarizer": { "block_size": 31 }, "coarse_strategies": ["clustering"] }"#,
        )
        .unwrap();
        assert_eq!(params.binarizer.block_size, 31);
        assert_eq!(params.binarizer.bias, 0.0);
        assert_eq!(params.coarse_strategies, vec![CoarseStrategy::Clustering]);
        assert_eq!(params.contour_filter.min_points, 20);
        assert!(!params.center.include_innermost);
    }
}
