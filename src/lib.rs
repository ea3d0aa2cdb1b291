//! Element and quadrature-point traversal for tensor-product isogeometric discretizations.
//!
//! A [`Discretization`](discretization::Discretization) describes a structured grid of spline
//! elements in one to three parametric directions. Traversal is driven by a single reusable
//! [`Element`](element::Element): every call to [`Element::advance`](element::Element::advance)
//! rebuilds the local degree-of-freedom mapping, gathers local geometry, recomputes the
//! Dirichlet fixation list and evaluates basis functions and their physical derivatives at the
//! quadrature points. Quadrature points are visited through cheap [`Point`](element::Point)
//! views into the element's storage.
//!
//! The drivers in [`assembly`] and [`reduce`] combine these pieces into complete traversals that
//! assemble global systems or reduce scalar functionals.
use nalgebra::RealField;

pub mod assembly;
pub mod axis;
pub mod basis;
pub mod boundary;
pub mod discretization;
pub mod element;
pub mod error;
pub mod geometry;
pub mod reduce;
pub mod tensor;
pub mod workspace;

pub mod quadrature {
    pub use fenris_iga_quadrature::*;

    /// The rule used along one parametric direction.
    pub type QuadratureRule = fenris_iga_quadrature::RuleKind;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use error::IgaError;

/// Scalar type used throughout the crate.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// The largest supported parametric (and spatial) dimension.
pub const MAX_DIM: usize = 3;

/// The highest basis derivative order evaluated during traversal.
pub const MAX_DERIVATIVE_ORDER: usize = 3;
