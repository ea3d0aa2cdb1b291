//! Assembly of global vectors and matrices from element contributions.
//!
//! [`global`] contains the scatter interface for global containers and sparsity pattern
//! construction; [`local`] contains the traversal drivers that evaluate user kernels at every
//! quadrature point, apply Dirichlet fixations and scatter the result.
pub mod global;
pub mod local;

pub use global::*;
pub use local::*;
