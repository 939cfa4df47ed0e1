use ringcal_core::GridOrderError;

use crate::board::BoardSpecError;
use crate::center::CenterSolveError;

/// Errors returned by the ring-grid detector. One per image; no partial
/// point sets are produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RingGridError {
    #[error(transparent)]
    Board(#[from] BoardSpecError),
    #[error("image buffer does not match {width}x{height}")]
    InvalidImage { width: usize, height: usize },
    #[error("coarse ring grid not found")]
    CoarseGridNotFound,
    #[error(transparent)]
    GridOrder(#[from] GridOrderError),
    #[error("expected {expected} ring clusters, got {got}")]
    ClusterCountMismatch { expected: usize, got: usize },
    #[error("node {node}: {found} ring boundaries found, need 4")]
    InsufficientBoundaries { node: usize, found: usize },
    #[error("node {node}: {found} ring boundaries survive merging, expected 4")]
    ExcessBoundaries { node: usize, found: usize },
    #[error("node {node}: singular conic pencil ({source})")]
    SingularConicPencil {
        node: usize,
        source: CenterSolveError,
    },
}
