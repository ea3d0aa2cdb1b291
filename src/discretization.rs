//! Tensor-product spline discretizations and their construction.
use crate::axis::Axis;
use crate::basis::BasisTable;
use crate::boundary::{BoundaryConditions, Side};
use crate::element::Element;
use crate::quadrature::QuadratureRule;
use crate::tensor::decompose;
use crate::workspace::WorkCapacity;
use crate::{IgaError, Real, MAX_DERIVATIVE_ORDER, MAX_DIM};
use fenris_iga_quadrature::Error as QuadratureError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// A box of elements `start[i] .. start[i] + width[i]` in element multi-index space.
///
/// Used to restrict traversal to the portion of the grid owned by one process or worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRange {
    pub start: [usize; MAX_DIM],
    pub width: [usize; MAX_DIM],
}

impl ElementRange {
    /// The range covering all elements of a grid with the given per-axis element counts.
    pub fn full(num_elements: &[usize]) -> Self {
        let mut width = [1; MAX_DIM];
        width[..num_elements.len()].copy_from_slice(num_elements);
        Self {
            start: [0; MAX_DIM],
            width,
        }
    }

    pub fn len(&self) -> usize {
        self.width.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Multi-index of the `index`-th element in the range, direction 0 varying fastest.
    pub fn element(&self, index: usize) -> [usize; MAX_DIM] {
        let mut local = [0; MAX_DIM];
        decompose(index, &self.width, &mut local);
        let mut id = self.start;
        for (id, local) in id.iter_mut().zip(local) {
            *id += local;
        }
        id
    }

    /// Splits the range into at most `parts` non-empty slabs along the slowest direction of
    /// extent greater than one.
    ///
    /// Slabs are as even as possible and appear in traversal order, so concatenating their
    /// traversals visits the elements of `self` in the same order.
    pub fn split(&self, parts: usize) -> Vec<ElementRange> {
        if self.is_empty() {
            return Vec::new();
        }
        let axis = (0..MAX_DIM).rev().find(|&i| self.width[i] > 1).unwrap_or(0);
        let n = self.width[axis];
        let parts = parts.clamp(1, n);
        let (base, extra) = (n / parts, n % parts);
        let mut ranges = Vec::with_capacity(parts);
        let mut start = self.start[axis];
        for k in 0..parts {
            let width = base + usize::from(k < extra);
            let mut range = *self;
            range.start[axis] = start;
            range.width[axis] = width;
            ranges.push(range);
            start += width;
        }
        ranges
    }
}

/// A structured, tensor-product spline discretization.
///
/// Holds the per-axis knot vectors and basis tables, the number of field components per node
/// (`dof`), the optional geometry (control points in `nsd` spatial dimensions) and NURBS weights,
/// Dirichlet boundary values and traversal settings. Nodes are numbered with direction 0
/// varying fastest and degrees of freedom are interleaved: dof `c` of node `A` has global index
/// `A * dof + c`.
///
/// Built through [`DiscretizationBuilder`]; immutable afterwards.
#[derive(Debug, Clone)]
pub struct Discretization<T> {
    axes: Vec<Axis<T>>,
    rules: Vec<QuadratureRule>,
    tables: Vec<BasisTable<T>>,
    dof: usize,
    nsd: usize,
    order: usize,
    geometry: Option<Vec<T>>,
    weights: Option<Vec<T>>,
    boundary: BoundaryConditions<T>,
    capacity: WorkCapacity,
    range: ElementRange,
}

impl<T: Real> Discretization<T> {
    pub fn builder() -> DiscretizationBuilder<T> {
        DiscretizationBuilder::new()
    }

    /// Parametric dimension.
    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    /// Spatial dimension of the geometry (equal to `dim` without geometry).
    pub fn nsd(&self) -> usize {
        self.nsd
    }

    /// Field components per node.
    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn axes(&self) -> &[Axis<T>] {
        &self.axes
    }

    pub fn quadrature_rules(&self) -> &[QuadratureRule] {
        &self.rules
    }

    pub fn basis_tables(&self) -> &[BasisTable<T>] {
        &self.tables
    }

    /// Highest basis derivative order evaluated during traversal.
    pub fn derivative_order(&self) -> usize {
        self.order
    }

    /// Control point coordinates, `num_nodes x nsd` row-major.
    pub fn geometry(&self) -> Option<&[T]> {
        self.geometry.as_deref()
    }

    /// Control point weights of a rational discretization.
    pub fn weights(&self) -> Option<&[T]> {
        self.weights.as_deref()
    }

    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    pub fn boundary_conditions(&self) -> &BoundaryConditions<T> {
        &self.boundary
    }

    pub fn work_capacity(&self) -> WorkCapacity {
        self.capacity
    }

    /// The elements traversed by [`elements`](Self::elements).
    pub fn element_range(&self) -> ElementRange {
        self.range
    }

    /// Number of basis functions per axis, padded with ones.
    pub fn num_basis(&self) -> [usize; MAX_DIM] {
        let mut n = [1; MAX_DIM];
        for (n, table) in n.iter_mut().zip(&self.tables) {
            *n = table.num_basis();
        }
        n
    }

    /// Number of elements per axis, padded with ones.
    pub fn num_elements_per_axis(&self) -> [usize; MAX_DIM] {
        let mut n = [1; MAX_DIM];
        for (n, table) in n.iter_mut().zip(&self.tables) {
            *n = table.num_elements();
        }
        n
    }

    /// Total number of elements in the grid.
    pub fn num_elements(&self) -> usize {
        self.num_elements_per_axis().iter().product()
    }

    pub fn num_nodes(&self) -> usize {
        self.num_basis().iter().product()
    }

    pub fn num_dofs(&self) -> usize {
        self.num_nodes() * self.dof
    }

    /// Basis functions per element.
    pub fn nen(&self) -> usize {
        self.tables.iter().map(BasisTable::nen).product()
    }

    /// Quadrature points per element.
    pub fn nqp(&self) -> usize {
        self.tables.iter().map(BasisTable::nqp).product()
    }

    /// Linear index of the element with the given multi-index in the full grid.
    pub fn element_index(&self, id: &[usize; MAX_DIM]) -> usize {
        let n = self.num_elements_per_axis();
        id[0] + n[0] * (id[1] + n[1] * id[2])
    }

    /// Writes the global node of every local basis function of element `id` into `mapping`.
    ///
    /// Local functions are ordered with direction 0 varying fastest.
    pub fn populate_element_nodes(&self, id: &[usize; MAX_DIM], mapping: &mut [usize]) {
        let nnp = self.num_basis();
        let mut nen = [1; MAX_DIM];
        for (n, table) in nen.iter_mut().zip(&self.tables) {
            *n = table.nen();
        }
        let mut local = [0; MAX_DIM];
        for (a, node) in mapping.iter_mut().enumerate() {
            decompose(a, &nen, &mut local);
            let mut global = [0; MAX_DIM];
            for (i, table) in self.tables.iter().enumerate() {
                global[i] = table.basis_index(id[i], local[i]);
            }
            *node = global[0] + nnp[0] * (global[1] + nnp[1] * global[2]);
        }
    }

    /// A cursor over the elements of [`element_range`](Self::element_range).
    pub fn elements(&self) -> Element<'_, T> {
        Element::new(self, self.range)
    }

    /// A cursor over the elements of an arbitrary sub-range of the grid.
    pub fn elements_in(&self, range: ElementRange) -> Result<Element<'_, T>, IgaError> {
        self.check_range(&range)?;
        Ok(Element::new(self, range))
    }

    fn check_range(&self, range: &ElementRange) -> Result<(), IgaError> {
        let n = self.num_elements_per_axis();
        for i in 0..MAX_DIM {
            match range.start[i].checked_add(range.width[i]) {
                Some(end) if end <= n[i] => {}
                end => {
                    return Err(IgaError::InvalidElementRange(format!(
                        "range starting at {} with width {} (end {end:?}) along axis {i} exceeds {} elements",
                        range.start[i], range.width[i], n[i]
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`Discretization`].
///
/// Axes are added in parametric order. Unless overridden, every axis uses Gauss quadrature with
/// `degree + 1` points, one field component per node, first derivatives, no geometry and the full
/// element range.
#[derive(Debug, Clone)]
pub struct DiscretizationBuilder<T> {
    axes: Vec<Axis<T>>,
    rules: Vec<Option<QuadratureRule>>,
    dof: usize,
    nsd: Option<usize>,
    order: usize,
    geometry: Option<Vec<T>>,
    weights: Option<Vec<T>>,
    boundary: BoundaryConditions<T>,
    capacity: WorkCapacity,
    range: Option<ElementRange>,
    orphan_rule: bool,
}

impl<T: Real> Default for DiscretizationBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> DiscretizationBuilder<T> {
    pub fn new() -> Self {
        Self {
            axes: Vec::new(),
            rules: Vec::new(),
            dof: 1,
            nsd: None,
            order: 1,
            geometry: None,
            weights: None,
            boundary: BoundaryConditions::default(),
            capacity: WorkCapacity::default(),
            range: None,
            orphan_rule: false,
        }
    }

    pub fn with_axis(mut self, axis: Axis<T>) -> Self {
        self.axes.push(axis);
        self.rules.push(None);
        self
    }

    /// Overrides the quadrature rule of the most recently added axis.
    ///
    /// Calling this before any axis was added makes [`build`](Self::build) fail.
    pub fn with_quadrature(mut self, rule: QuadratureRule) -> Self {
        match self.rules.last_mut() {
            Some(last) => *last = Some(rule),
            None => self.orphan_rule = true,
        }
        self
    }

    /// Overrides the quadrature rule of every axis added so far.
    pub fn with_uniform_quadrature(mut self, rule: QuadratureRule) -> Self {
        for r in &mut self.rules {
            *r = Some(rule.clone());
        }
        self
    }

    pub fn with_dof(mut self, dof: usize) -> Self {
        self.dof = dof;
        self
    }

    pub fn with_spatial_dim(mut self, nsd: usize) -> Self {
        self.nsd = Some(nsd);
        self
    }

    pub fn with_derivative_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Control point coordinates, `num_nodes x nsd` row-major.
    pub fn with_geometry(mut self, coordinates: Vec<T>) -> Self {
        self.geometry = Some(coordinates);
        self
    }

    /// Control point weights, making the discretization rational.
    pub fn with_weights(mut self, weights: Vec<T>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_boundary_conditions(mut self, boundary: BoundaryConditions<T>) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_work_capacity(mut self, capacity: WorkCapacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Restricts traversal to a sub-range of the elements, e.g. the part owned by this process.
    pub fn with_element_range(mut self, range: ElementRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn build(self) -> Result<Discretization<T>, IgaError> {
        let dim = self.axes.len();
        if dim == 0 || dim > MAX_DIM {
            return Err(IgaError::InvalidDimension(format!(
                "parametric dimension must be between 1 and {MAX_DIM}, got {dim}"
            )));
        }
        let nsd = self.nsd.unwrap_or(dim);
        if nsd < dim || nsd > MAX_DIM {
            return Err(IgaError::InvalidDimension(format!(
                "spatial dimension {nsd} must be between the parametric dimension {dim} and {MAX_DIM}"
            )));
        }
        if self.nsd.is_some() && nsd != dim && self.geometry.is_none() {
            return Err(IgaError::InvalidGeometry(format!(
                "spatial dimension {nsd} differs from parametric dimension {dim}, but no geometry was given"
            )));
        }
        if self.dof == 0 {
            return Err(IgaError::InvalidDimension(
                "at least one degree of freedom per node is required".to_string(),
            ));
        }
        if self.orphan_rule {
            return Err(IgaError::Quadrature(QuadratureError::InvalidRule(
                "a quadrature rule was given before any axis".to_string(),
            )));
        }
        if self.order > MAX_DERIVATIVE_ORDER {
            return Err(IgaError::InvalidDerivativeOrder {
                order: self.order,
                max: MAX_DERIVATIVE_ORDER,
            });
        }

        let rules: Vec<QuadratureRule> = self
            .axes
            .iter()
            .zip(self.rules)
            .map(|(axis, rule)| rule.unwrap_or(QuadratureRule::Gauss(axis.degree() + 1)))
            .collect();
        let tables = self
            .axes
            .iter()
            .zip(&rules)
            .map(|(axis, rule)| BasisTable::build(axis, rule, MAX_DERIVATIVE_ORDER))
            .collect::<Result<Vec<_>, _>>()?;

        let num_nodes: usize = tables.iter().map(BasisTable::num_basis).product();
        if let Some(x) = &self.geometry {
            // The jacobian of a piecewise constant map vanishes
            if let Some(i) = self.axes.iter().position(|axis| axis.degree() == 0) {
                return Err(IgaError::InvalidDegree(format!(
                    "axis {i} has degree 0, which cannot carry a geometry map"
                )));
            }
            if x.len() != num_nodes * nsd {
                return Err(IgaError::LengthMismatch {
                    what: "geometry",
                    expected: num_nodes * nsd,
                    actual: x.len(),
                });
            }
            if x.iter().any(|x| !x.is_finite()) {
                return Err(IgaError::InvalidGeometry("non-finite control point coordinate".to_string()));
            }
        }
        if let Some(w) = &self.weights {
            if w.len() != num_nodes {
                return Err(IgaError::LengthMismatch {
                    what: "weights",
                    expected: num_nodes,
                    actual: w.len(),
                });
            }
            if let Some(w) = w.iter().find(|w| !w.is_finite() || **w <= T::zero()) {
                return Err(IgaError::InvalidGeometry(format!("weights must be positive, got {w}")));
            }
        }
        self.boundary.validate(dim, self.dof)?;
        for (i, axis) in self.axes.iter().enumerate() {
            let constrained = [Side::Lower, Side::Upper]
                .into_iter()
                .any(|side| !self.boundary.values(i, side).is_empty());
            if axis.is_periodic() && constrained {
                warn!("Ignoring boundary values on periodic axis {i}");
            }
        }

        let num_elements: Vec<usize> = tables.iter().map(BasisTable::num_elements).collect();
        let full = ElementRange::full(&num_elements);
        let discretization = Discretization {
            axes: self.axes,
            rules,
            tables,
            dof: self.dof,
            nsd,
            order: self.order,
            geometry: self.geometry,
            weights: self.weights,
            boundary: self.boundary,
            capacity: self.capacity,
            range: full,
        };
        let range = match self.range {
            Some(range) => {
                discretization.check_range(&range)?;
                range
            }
            None => full,
        };

        if nsd != dim {
            warn!(
                "Parametric dimension {dim} is smaller than spatial dimension {nsd}: \
                 physical derivatives are limited to first-order surface gradients"
            );
        }
        debug!(
            "Built discretization: dim = {dim}, nsd = {nsd}, dof = {}, elements = {:?}, nodes = {num_nodes}, \
             nen = {}, nqp = {}, rational = {}",
            discretization.dof,
            num_elements,
            discretization.nen(),
            discretization.nqp(),
            discretization.is_rational()
        );
        Ok(Discretization { range, ..discretization })
    }
}
