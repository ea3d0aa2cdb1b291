use crate::boundary::Side;
use crate::discretization::Discretization;
use crate::element::ElementState;
use crate::tensor::decompose;
use crate::{Real, MAX_DIM};
use itertools::izip;
use nalgebra::base::storage::StorageMut;
use nalgebra::{Dyn, Matrix};

/// Local degrees of freedom of the current element with prescribed Dirichlet values.
///
/// Rebuilt by every [`Element::advance`](crate::element::Element::advance). Each local index
/// appears at most once; when several boundary sides constrain the same degree of freedom (at
/// corners) the value of the axis processed last wins, axes being processed in increasing
/// order. A basis function that is both the first and the last of its axis (degree 0 with a
/// single element) is constrained by the lower side only.
#[derive(Debug, Clone)]
pub struct Fixation<T> {
    indices: Vec<usize>,
    values: Vec<T>,
    saved: Vec<T>,
}

impl<T> Default for Fixation<T> {
    fn default() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
            saved: Vec::new(),
        }
    }
}

impl<T: Real> Fixation<T> {
    pub(crate) fn build(&mut self, discretization: &Discretization<T>, state: &ElementState<T>) {
        self.indices.clear();
        self.values.clear();
        self.saved.clear();

        let boundary = discretization.boundary_conditions();
        if boundary.is_empty() {
            return;
        }
        let tables = discretization.basis_tables();
        let id = state.id();
        // Boundary basis function per axis and side, if this element touches that side
        let mut sides: [[Option<usize>; 2]; MAX_DIM] = [[None; 2]; MAX_DIM];
        for (i, table) in tables.iter().enumerate() {
            if table.is_periodic() {
                continue;
            }
            if id[i] == 0 {
                sides[i][Side::Lower.index()] = Some(0);
            }
            if id[i] + 1 == table.num_elements() {
                sides[i][Side::Upper.index()] = Some(table.num_basis() - 1);
            }
        }
        if sides.iter().flatten().all(Option::is_none) {
            return;
        }

        let mut nen = [1; MAX_DIM];
        for (n, table) in nen.iter_mut().zip(tables) {
            *n = table.nen();
        }
        let dof = state.dof();
        let mut local = [0; MAX_DIM];
        for a in 0..state.nen() {
            decompose(a, &nen, &mut local);
            for (i, table) in tables.iter().enumerate() {
                let global = table.basis_index(id[i], local[i]);
                // A function on both ends of an axis only takes the lower side's values
                let side = if sides[i][Side::Lower.index()] == Some(global) {
                    Side::Lower
                } else if sides[i][Side::Upper.index()] == Some(global) {
                    Side::Upper
                } else {
                    continue;
                };
                for v in boundary.values(i, side) {
                    self.add(a * dof + v.field, v.value);
                }
            }
        }
    }

    fn add(&mut self, index: usize, value: T) {
        match self.indices.iter().position(|&i| i == index) {
            Some(pos) => self.values[pos] = value,
            None => {
                self.indices.push(index);
                self.values.push(value);
                self.saved.push(T::zero());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Fixed local degrees of freedom (`a * dof + c`).
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Prescribed values, parallel to [`indices`](Self::indices).
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Local values found by the last [`fix_values`](Self::fix_values), before they were overwritten.
    pub fn saved_values(&self) -> &[T] {
        &self.saved
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Overwrites fixed entries of the local values `u` with their prescribed values,
    /// remembering the previous entries.
    pub fn fix_values(&mut self, u: &mut [T]) {
        for (&k, &v, saved) in izip!(&self.indices, &self.values, &mut self.saved) {
            *saved = u[k];
            u[k] = v;
        }
    }

    /// Imposes the fixed values on a local linear system `K u = F`.
    ///
    /// The known values are moved to the right-hand side, after which fixed rows and columns are
    /// replaced by those of the identity and the right-hand side holds the prescribed value.
    pub fn fix_system<S>(&self, k: &mut Matrix<T, Dyn, Dyn, S>, f: &mut [T])
    where
        S: StorageMut<T, Dyn, Dyn>,
    {
        for (&idx, &v) in izip!(&self.indices, &self.values) {
            for (fi, &kij) in f.iter_mut().zip(k.column(idx).iter()) {
                *fi -= kij * v;
            }
            k.row_mut(idx).fill(T::zero());
            k.column_mut(idx).fill(T::zero());
            k[(idx, idx)] = T::one();
            f[idx] = v;
        }
    }

    /// Replaces fixed residual entries by the difference between the current and the prescribed
    /// value, as recorded by [`fix_values`](Self::fix_values).
    pub fn fix_function(&self, f: &mut [T]) {
        for (&idx, &v, &saved) in izip!(&self.indices, &self.values, &self.saved) {
            f[idx] = saved - v;
        }
    }

    /// Replaces fixed rows and columns of a local jacobian by those of the identity.
    pub fn fix_jacobian<S>(&self, j: &mut Matrix<T, Dyn, Dyn, S>)
    where
        S: StorageMut<T, Dyn, Dyn>,
    {
        for &idx in &self.indices {
            j.row_mut(idx).fill(T::zero());
            j.column_mut(idx).fill(T::zero());
            j[(idx, idx)] = T::one();
        }
    }
}
