//! The element cursor and its per-element state.
//!
//! An [`Element`] walks the elements of an [`ElementRange`] in order. Each successful
//! [`advance`](Element::advance) rebuilds, in this order, the local-to-global node mapping, the
//! local geometry, the Dirichlet [`Fixation`], the tensor-product quadrature and the basis
//! functions (rational and pushed forward to physical space when geometry is present).
//! All storage is allocated once when the cursor is created and reused for every element.
//!
//! The usual traversal looks like this:
//!
//! ```
//! # use fenris_iga::axis::Axis;
//! # use fenris_iga::discretization::Discretization;
//! # use fenris_iga::element::ElementParts;
//! # fn main() -> Result<(), fenris_iga::IgaError> {
//! let discretization = Discretization::builder()
//!     .with_axis(Axis::uniform(2, 4, 0.0, 1.0)?)
//!     .build()?;
//! let mut element = discretization.elements();
//! let mut length = 0.0;
//! while element.advance()? {
//!     let ElementParts { points, .. } = element.begin_points()?;
//!     for point in points {
//!         length += point.scale();
//!     }
//! }
//! assert!((length - 1.0f64).abs() < 1e-12);
//! # Ok(())
//! # }
//! ```
use crate::basis::{AxisElement, BasisTable};
use crate::discretization::{Discretization, ElementRange};
use crate::geometry::{rationalize, ElementGeometry};
use crate::tensor::{compose_basis, compose_quadrature, derivative_stride};
use crate::workspace::WorkArrays;
use crate::{IgaError, Real, MAX_DERIVATIVE_ORDER, MAX_DIM};
use log::trace;

mod fixation;
mod point;

pub use fixation::Fixation;
pub use point::{Point, PointIter};

/// Calls `f` with the per-axis table slices of element `id`, without allocating.
fn with_axis_elements<T: Real, R>(
    tables: &[BasisTable<T>],
    id: &[usize; MAX_DIM],
    f: impl FnOnce(&[AxisElement<'_, T>]) -> R,
) -> R {
    match tables {
        [a] => f(&[a.element(id[0])]),
        [a, b] => f(&[a.element(id[0]), b.element(id[1])]),
        [a, b, c] => f(&[a.element(id[0]), b.element(id[1]), c.element(id[2])]),
        _ => f(&[]),
    }
}

/// Everything known about the current element.
#[derive(Debug, Clone)]
pub struct ElementState<T> {
    index: Option<usize>,
    id: [usize; MAX_DIM],
    global_index: usize,
    dim: usize,
    nsd: usize,
    dof: usize,
    nen: usize,
    nqp: usize,
    order: usize,
    num_nodes: usize,
    has_geometry: bool,
    rational: bool,
    mapping: Vec<usize>,
    control_points: Vec<T>,
    control_weights: Vec<T>,
    weight: Vec<T>,
    det_jac: Vec<T>,
    point: Vec<T>,
    basis: [Vec<T>; MAX_DERIVATIVE_ORDER + 1],
    geometry: ElementGeometry<T>,
}

impl<T: Real> ElementState<T> {
    fn new(discretization: &Discretization<T>) -> Self {
        let dim = discretization.dim();
        let nsd = discretization.nsd();
        let nen = discretization.nen();
        let nqp = discretization.nqp();
        let has_geometry = discretization.geometry().is_some();
        let rational = discretization.is_rational();
        let basis_len = |m| nqp * nen * derivative_stride(dim, m);
        Self {
            index: None,
            id: [0; MAX_DIM],
            global_index: 0,
            dim,
            nsd,
            dof: discretization.dof(),
            nen,
            nqp,
            order: discretization.derivative_order(),
            num_nodes: discretization.num_nodes(),
            has_geometry,
            rational,
            mapping: vec![0; nen],
            control_points: vec![T::zero(); if has_geometry { nen * nsd } else { 0 }],
            control_weights: vec![T::zero(); if rational { nen } else { 0 }],
            weight: vec![T::zero(); nqp],
            det_jac: vec![T::zero(); nqp],
            point: vec![T::zero(); nqp * dim],
            basis: [basis_len(0), basis_len(1), basis_len(2), basis_len(3)].map(|len| vec![T::zero(); len]),
            geometry: ElementGeometry::identity(dim, nsd, nqp, nen, has_geometry),
        }
    }

    fn build_mapping(&mut self, discretization: &Discretization<T>) {
        discretization.populate_element_nodes(&self.id, &mut self.mapping);
    }

    fn build_geometry(&mut self, discretization: &Discretization<T>) {
        if let Some(x) = discretization.geometry() {
            let nsd = self.nsd;
            for (local, &node) in self.control_points.chunks_exact_mut(nsd).zip(&self.mapping) {
                local.copy_from_slice(&x[node * nsd..(node + 1) * nsd]);
            }
        }
        if let Some(w) = discretization.weights() {
            for (local, &node) in self.control_weights.iter_mut().zip(&self.mapping) {
                *local = w[node];
            }
        }
    }

    fn build_points(&mut self, discretization: &Discretization<T>) -> Result<(), IgaError> {
        // The jacobian always needs first derivatives
        let order = if self.has_geometry { self.order.max(1) } else { self.order };
        let Self {
            id,
            weight,
            det_jac,
            point,
            basis,
            ..
        } = self;
        with_axis_elements(discretization.basis_tables(), id, |axes| {
            compose_quadrature(axes, weight, det_jac, point);
            compose_basis(axes, order, basis);
        });
        if self.rational {
            rationalize(self.dim, self.nqp, self.nen, order, &self.control_weights, &mut self.basis);
        }
        if self.has_geometry {
            self.geometry.compute(
                self.global_index,
                self.dim,
                self.nsd,
                self.nen,
                self.order,
                &self.control_points,
                &self.basis,
                &mut self.det_jac,
            )?;
        }
        Ok(())
    }

    fn require_active(&self, what: &'static str) -> Result<usize, IgaError> {
        self.index.ok_or(IgaError::NotIterating { what })
    }

    /// Position of the element within the traversed range, `None` when not iterating.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Multi-index of the element in the full grid.
    pub fn id(&self) -> [usize; MAX_DIM] {
        self.id
    }

    /// Linear index of the element in the full grid.
    pub fn global_index(&self) -> usize {
        self.global_index
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn nsd(&self) -> usize {
        self.nsd
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    /// Number of local basis functions.
    pub fn nen(&self) -> usize {
        self.nen
    }

    /// Number of quadrature points.
    pub fn nqp(&self) -> usize {
        self.nqp
    }

    /// Length of local value, vector and matrix arrays (`nen * dof`).
    pub fn local_size(&self) -> usize {
        self.nen * self.dof
    }

    pub fn derivative_order(&self) -> usize {
        self.order
    }

    pub fn has_geometry(&self) -> bool {
        self.has_geometry
    }

    pub fn is_rational(&self) -> bool {
        self.rational
    }

    /// Global node of each local basis function.
    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    /// Local control points, `nen x nsd` row-major.
    pub fn control_points(&self) -> Option<&[T]> {
        self.has_geometry.then_some(self.control_points.as_slice())
    }

    pub fn control_weights(&self) -> Option<&[T]> {
        self.rational.then_some(self.control_weights.as_slice())
    }

    /// Copies the entries of a global vector belonging to this element into `local`.
    ///
    /// `global` has `dof` interleaved components per node, `local` has length `nen * dof`.
    pub fn gather_values(&self, global: &[T], local: &mut [T]) -> Result<(), IgaError> {
        self.require_active("gathering values")?;
        let dof = self.dof;
        if global.len() != self.num_nodes * dof {
            return Err(IgaError::LengthMismatch {
                what: "global vector",
                expected: self.num_nodes * dof,
                actual: global.len(),
            });
        }
        if local.len() != self.local_size() {
            return Err(IgaError::LengthMismatch {
                what: "local vector",
                expected: self.local_size(),
                actual: local.len(),
            });
        }
        for (local, &node) in local.chunks_exact_mut(dof).zip(&self.mapping) {
            local.copy_from_slice(&global[node * dof..(node + 1) * dof]);
        }
        Ok(())
    }

    /// The quadrature points of the element.
    pub fn points(&self) -> Result<PointIter<'_, T>, IgaError> {
        self.require_active("iterating quadrature points")?;
        Ok(PointIter::new(self))
    }
}

/// Disjoint borrows of an element cursor, handed out at the start of a point loop.
pub struct ElementParts<'e, T> {
    pub state: &'e ElementState<T>,
    pub points: PointIter<'e, T>,
    pub fixation: &'e mut Fixation<T>,
    pub work: &'e mut WorkArrays<T>,
}

/// A cursor over the elements of a [`Discretization`].
pub struct Element<'a, T> {
    discretization: &'a Discretization<T>,
    range: ElementRange,
    count: usize,
    state: ElementState<T>,
    fixation: Fixation<T>,
    work: WorkArrays<T>,
}

impl<'a, T: Real> Element<'a, T> {
    pub(crate) fn new(discretization: &'a Discretization<T>, range: ElementRange) -> Self {
        let state = ElementState::new(discretization);
        let work = WorkArrays::new(state.local_size(), discretization.work_capacity());
        Self {
            discretization,
            range,
            count: range.len(),
            state,
            fixation: Fixation::default(),
            work,
        }
    }

    /// Moves to the next element and rebuilds all element data.
    ///
    /// Returns `Ok(false)` once the range is exhausted, after which the cursor is reset and the
    /// next call starts over from the first element. A singular geometry map is reported as
    /// [`IgaError::DegenerateJacobian`]; the cursor is then reset as well, so the half-built
    /// element cannot be iterated.
    pub fn advance(&mut self) -> Result<bool, IgaError> {
        self.work.reset_element();
        let next = self.state.index.map_or(0, |i| i + 1);
        if next >= self.count {
            self.state.index = None;
            return Ok(false);
        }
        let discretization = self.discretization;
        let id = self.range.element(next);
        self.state.index = Some(next);
        self.state.id = id;
        self.state.global_index = discretization.element_index(&id);
        self.state.build_mapping(discretization);
        self.state.build_geometry(discretization);
        self.fixation.build(discretization, &self.state);
        if let Err(err) = self.state.build_points(discretization) {
            self.state.index = None;
            return Err(err);
        }
        trace!(
            "Element {next} (grid index {:?}) with {} fixed dofs",
            &id[..self.state.dim],
            self.fixation.len()
        );
        Ok(true)
    }

    pub fn discretization(&self) -> &'a Discretization<T> {
        self.discretization
    }

    /// The range of elements visited by this cursor.
    pub fn range(&self) -> ElementRange {
        self.range
    }

    /// Number of elements visited by this cursor.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn index(&self) -> Option<usize> {
        self.state.index
    }

    pub fn state(&self) -> &ElementState<T> {
        &self.state
    }

    pub fn fixation(&self) -> &Fixation<T> {
        &self.fixation
    }

    pub fn work(&mut self) -> &mut WorkArrays<T> {
        &mut self.work
    }

    pub fn points(&self) -> Result<PointIter<'_, T>, IgaError> {
        self.state.points()
    }

    /// Starts a point loop: releases the value pool and splits the cursor into its parts.
    pub fn begin_points(&mut self) -> Result<ElementParts<'_, T>, IgaError> {
        self.state.require_active("beginning a point loop")?;
        self.work.reset_points();
        Ok(ElementParts {
            state: &self.state,
            points: PointIter::new(&self.state),
            fixation: &mut self.fixation,
            work: &mut self.work,
        })
    }
}
