//! Error types.
use fenris_iga_quadrature::Error as QuadratureError;
use thiserror::Error;

/// The kind of work array requested from a [`WorkArrays`](crate::workspace::WorkArrays) pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    Value,
    Vector,
    Matrix,
}

impl std::fmt::Display for WorkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Value => "value",
            Self::Vector => "vector",
            Self::Matrix => "matrix",
        };
        write!(f, "{name}")
    }
}

/// Errors raised while setting up or traversing a discretization.
///
/// Usage and configuration faults indicate programming errors in the caller and are surfaced
/// immediately. Numerical faults carry the element (and point or entry) they occurred at.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum IgaError {
    #[error("{what} requires an active element (the element cursor is not iterating)")]
    NotIterating { what: &'static str },
    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid degree: {0}")]
    InvalidDegree(String),
    #[error("invalid knot vector: {0}")]
    InvalidKnots(String),
    #[error("invalid quadrature rule: {0}")]
    Quadrature(#[from] QuadratureError),
    #[error("derivative order {order} exceeds the supported maximum {max}")]
    InvalidDerivativeOrder { order: usize, max: usize },
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("invalid boundary condition: {0}")]
    InvalidBoundary(String),
    #[error("invalid element range: {0}")]
    InvalidElementRange(String),
    #[error("too many {kind} work arrays requested (capacity {capacity})")]
    WorkArrayExhausted { kind: WorkKind, capacity: usize },
    #[error("degenerate jacobian (determinant {determinant:e}) at point {point} of element {element}")]
    DegenerateJacobian {
        element: usize,
        point: usize,
        determinant: f64,
    },
    #[error("non-finite entry ({row}, {col}) in local contribution of element {element}")]
    NonFiniteEntry { element: usize, row: usize, col: usize },
}
