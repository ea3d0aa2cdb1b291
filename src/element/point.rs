use crate::element::ElementState;
use crate::tensor::derivative_stride;
use crate::{IgaError, Real};
use nalgebra::base::storage::{Storage, StorageMut};
use nalgebra::{Dyn, Matrix};

/// A quadrature point of the current element.
///
/// Points are cheap views into the element's storage; they are produced by [`PointIter`] and
/// stay valid until the cursor advances.
#[derive(Debug, Clone, Copy)]
pub struct Point<'e, T> {
    state: &'e ElementState<T>,
    index: usize,
    mapped: bool,
}

impl<'e, T: Real> Point<'e, T> {
    /// Index of the point within its element.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Position of the owning element within the traversed range.
    pub fn element_index(&self) -> usize {
        self.state.index().unwrap_or_default()
    }

    pub fn element(&self) -> &'e ElementState<T> {
        self.state
    }

    pub fn dim(&self) -> usize {
        self.state.dim
    }

    pub fn nsd(&self) -> usize {
        self.state.nsd
    }

    pub fn dof(&self) -> usize {
        self.state.dof
    }

    pub fn nen(&self) -> usize {
        self.state.nen
    }

    /// Reference quadrature weight.
    pub fn weight(&self) -> T {
        self.state.weight[self.index]
    }

    /// Measure of the map from the reference cell to physical space (or parametric space when
    /// there is no geometry).
    pub fn det_jac(&self) -> T {
        self.state.det_jac[self.index]
    }

    /// Integration weight `weight * det_jac`.
    pub fn scale(&self) -> T {
        self.weight() * self.det_jac()
    }

    /// Parametric coordinates of the point.
    pub fn coordinates(&self) -> &'e [T] {
        let dim = self.state.dim;
        &self.state.point[self.index * dim..(self.index + 1) * dim]
    }

    /// Physical coordinates `x = sum_a N_a X_a` of the point, written to `x` (length `nsd`).
    pub fn position(&self, x: &mut [T]) -> Result<(), IgaError> {
        let Some(control_points) = self.state.control_points() else {
            return Err(IgaError::InvalidGeometry("the discretization has no geometry".to_string()));
        };
        let nsd = self.state.nsd;
        if x.len() != nsd {
            return Err(IgaError::LengthMismatch {
                what: "position",
                expected: nsd,
                actual: x.len(),
            });
        }
        x.fill(T::zero());
        for (&n, xa) in self.basis(0).iter().zip(control_points.chunks_exact(nsd)) {
            for (x, &xa) in x.iter_mut().zip(xa) {
                *x += n * xa;
            }
        }
        Ok(())
    }

    /// Parametric basis derivatives of order `order`, `nen x dim^order` row-major.
    ///
    /// Only orders up to the discretization's
    /// [`derivative_order`](crate::discretization::Discretization::derivative_order) are
    /// evaluated (first derivatives are always available with a geometry).
    ///
    /// # Panics
    ///
    /// Panics if `order` exceeds [`MAX_DERIVATIVE_ORDER`](crate::MAX_DERIVATIVE_ORDER). Debug builds
    /// also panic for orders that were not evaluated.
    pub fn basis(&self, order: usize) -> &'e [T] {
        self.check_order(order);
        let stride = self.state.nen * derivative_stride(self.state.dim, order);
        &self.state.basis[order][self.index * stride..(self.index + 1) * stride]
    }

    /// Physical basis derivatives of order `order`, `nen x dim^order` row-major.
    ///
    /// Without geometry, or when the parametric dimension is smaller than the spatial dimension,
    /// these are the parametric derivatives.
    ///
    /// # Panics
    ///
    /// Same as for [`basis`](Self::basis).
    pub fn shape(&self, order: usize) -> &'e [T] {
        self.check_order(order);
        if self.mapped {
            let stride = self.state.nen * derivative_stride(self.state.dim, order);
            &self.state.geometry.shape[order][self.index * stride..(self.index + 1) * stride]
        } else {
            self.basis(order)
        }
    }

    /// Physical gradients of the basis functions, `nen x nsd` row-major.
    ///
    /// For a manifold of lower dimension than the ambient space these are the tangential
    /// (surface) gradients obtained through the pseudo-inverse of the jacobian.
    pub fn gradients(&self) -> &'e [T] {
        let state = self.state;
        if state.has_geometry && state.dim < state.nsd {
            let stride = state.nen * state.nsd;
            &state.geometry.surface_gradients[self.index * stride..(self.index + 1) * stride]
        } else {
            self.shape(1)
        }
    }

    /// Jacobian `dx_c / dxi_i` of the geometry map, `nsd x dim` row-major.
    pub fn jacobian(&self) -> &'e [T] {
        let stride = self.state.nsd * self.state.dim;
        &self.state.geometry.jacobian[self.index * stride..(self.index + 1) * stride]
    }

    /// Inverse (pseudo-inverse for manifolds) of the jacobian, `dim x nsd` row-major.
    pub fn inverse_jacobian(&self) -> &'e [T] {
        let stride = self.state.nsd * self.state.dim;
        &self.state.geometry.inverse[self.index * stride..(self.index + 1) * stride]
    }

    fn check_order(&self, order: usize) {
        let evaluated = self.state.order.max(usize::from(self.state.has_geometry));
        debug_assert!(
            order <= evaluated,
            "derivatives of order {order} requested, but only orders up to {evaluated} are evaluated"
        );
    }

    /// Determinant of the geometry map (square root of the Gram determinant for manifolds).
    pub fn det_x(&self) -> T {
        self.state.geometry.det_x[self.index]
    }

    /// Interpolates the physical derivatives of order `order` of a local field.
    ///
    /// `u` holds `nen x dof` local values and `out` receives `dof x dim^order` entries.
    ///
    /// # Panics
    ///
    /// Panics if the lengths of `u` or `out` do not match.
    pub fn interpolate(&self, order: usize, u: &[T], out: &mut [T]) {
        interpolate(self.state, self.shape(order), order, u, out);
    }

    /// Like [`interpolate`](Self::interpolate), but with parametric derivatives.
    pub fn interpolate_parametric(&self, order: usize, u: &[T], out: &mut [T]) {
        interpolate(self.state, self.basis(order), order, u, out);
    }

    /// Accumulates `dst += scale * src`, with `scale` the integration weight of the point.
    pub fn add_scaled(&self, src: &[T], dst: &mut [T]) {
        assert_eq!(src.len(), dst.len());
        let s = self.scale();
        for (d, &v) in dst.iter_mut().zip(src) {
            *d += s * v;
        }
    }

    /// Matrix variant of [`add_scaled`](Self::add_scaled).
    pub fn add_scaled_matrix<S1, S2>(&self, src: &Matrix<T, Dyn, Dyn, S1>, dst: &mut Matrix<T, Dyn, Dyn, S2>)
    where
        S1: Storage<T, Dyn, Dyn>,
        S2: StorageMut<T, Dyn, Dyn>,
    {
        assert_eq!(src.shape(), dst.shape());
        let s = self.scale();
        for (d, &v) in dst.iter_mut().zip(src.iter()) {
            *d += s * v;
        }
    }
}

fn interpolate<T: Real>(state: &ElementState<T>, n: &[T], order: usize, u: &[T], out: &mut [T]) {
    let dof = state.dof;
    let stride = derivative_stride(state.dim, order);
    assert_eq!(u.len(), state.nen * dof, "local values must have length nen * dof");
    assert_eq!(out.len(), dof * stride, "output must have length dof * dim^order");
    out.fill(T::zero());
    for (ua, na) in u.chunks_exact(dof).zip(n.chunks_exact(stride)) {
        for (c, &uac) in ua.iter().enumerate() {
            for (o, &nat) in out[c * stride..(c + 1) * stride].iter_mut().zip(na) {
                *o += uac * nat;
            }
        }
    }
}

/// Iterates over the quadrature points of an element.
///
/// Once exhausted the iterator resets, so that a subsequent call to `next` starts again from the
/// first point.
#[derive(Debug, Clone)]
pub struct PointIter<'e, T> {
    state: &'e ElementState<T>,
    index: Option<usize>,
    mapped: bool,
}

impl<'e, T: Real> PointIter<'e, T> {
    pub(crate) fn new(state: &'e ElementState<T>) -> Self {
        Self {
            state,
            index: None,
            mapped: false,
        }
    }

    /// Index of the point most recently returned, `None` before the first and after the last.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn num_points(&self) -> usize {
        self.state.nqp
    }
}

impl<'e, T: Real> Iterator for PointIter<'e, T> {
    type Item = Point<'e, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match self.index {
            None => {
                // Physical derivatives only exist for mapped elements of full dimension
                self.mapped = self.state.has_geometry && self.state.dim == self.state.nsd;
                0
            }
            Some(i) => i + 1,
        };
        if next >= self.state.nqp {
            self.index = None;
            return None;
        }
        self.index = Some(next);
        Some(Point {
            state: self.state,
            index: next,
            mapped: self.mapped,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.state.nqp - self.index.map_or(0, |i| i + 1);
        (remaining, Some(remaining))
    }
}
