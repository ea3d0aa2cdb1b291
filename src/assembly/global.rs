use crate::discretization::Discretization;
use crate::element::ElementState;
use crate::{IgaError, Real};
use eyre::eyre;
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, Dyn, Matrix, Scalar};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::collections::BTreeSet;

/// A global vector that element contributions can be added to.
pub trait GlobalVector<T> {
    /// Adds `values` (`indices.len() x block_size`, row-major) to the entries
    /// `indices[a] * block_size + c`.
    fn add_blocked(&mut self, indices: &[usize], block_size: usize, values: &[T]) -> eyre::Result<()>;
}

/// A global matrix that element contributions can be added to.
pub trait GlobalMatrix<T: Scalar> {
    /// Adds the dense block `values` to the rows `rows[a] * block_size + c` and columns
    /// `cols[b] * block_size + d`.
    fn add_blocked<S>(
        &mut self,
        rows: &[usize],
        cols: &[usize],
        block_size: usize,
        values: &Matrix<T, Dyn, Dyn, S>,
    ) -> eyre::Result<()>
    where
        S: Storage<T, Dyn, Dyn>;
}

fn check_block(num_indices: usize, block_size: usize, len: usize, what: &'static str) -> Result<(), IgaError> {
    if num_indices * block_size != len {
        return Err(IgaError::LengthMismatch {
            what,
            expected: num_indices * block_size,
            actual: len,
        });
    }
    Ok(())
}

fn check_matrix_block<T: Scalar, S: Storage<T, Dyn, Dyn>>(
    rows: &[usize],
    cols: &[usize],
    block_size: usize,
    values: &Matrix<T, Dyn, Dyn, S>,
) -> Result<(), IgaError> {
    check_block(rows.len(), block_size, values.nrows(), "local matrix rows")?;
    check_block(cols.len(), block_size, values.ncols(), "local matrix columns")
}

/// Iterates over `(local, global)` pairs of blocked indices.
fn blocked<'a>(indices: &'a [usize], block_size: usize) -> impl Iterator<Item = (usize, usize)> + 'a {
    indices
        .iter()
        .enumerate()
        .flat_map(move |(a, &node)| (0..block_size).map(move |c| (a * block_size + c, node * block_size + c)))
}

impl<T: Real> GlobalVector<T> for [T] {
    fn add_blocked(&mut self, indices: &[usize], block_size: usize, values: &[T]) -> eyre::Result<()> {
        check_block(indices.len(), block_size, values.len(), "local vector")?;
        let n = self.len();
        for (local, global) in blocked(indices, block_size) {
            let entry = self
                .get_mut(global)
                .ok_or_else(|| eyre!("index {global} out of bounds for global vector of length {n}"))?;
            *entry += values[local];
        }
        Ok(())
    }
}

impl<T: Real> GlobalVector<T> for DVector<T> {
    fn add_blocked(&mut self, indices: &[usize], block_size: usize, values: &[T]) -> eyre::Result<()> {
        self.as_mut_slice().add_blocked(indices, block_size, values)
    }
}

impl<T: Real> GlobalMatrix<T> for DMatrix<T> {
    fn add_blocked<S>(&mut self, rows: &[usize], cols: &[usize], block_size: usize, values: &Matrix<T, Dyn, Dyn, S>) -> eyre::Result<()>
    where
        S: Storage<T, Dyn, Dyn>,
    {
        check_matrix_block(rows, cols, block_size, values)?;
        let (nrows, ncols) = self.shape();
        for (i, global_i) in blocked(rows, block_size) {
            for (j, global_j) in blocked(cols, block_size) {
                let entry = self
                    .get_mut((global_i, global_j))
                    .ok_or_else(|| eyre!("entry ({global_i}, {global_j}) out of bounds for {nrows}x{ncols} matrix"))?;
                *entry += values[(i, j)];
            }
        }
        Ok(())
    }
}

impl<T: Real> GlobalMatrix<T> for CooMatrix<T> {
    fn add_blocked<S>(&mut self, rows: &[usize], cols: &[usize], block_size: usize, values: &Matrix<T, Dyn, Dyn, S>) -> eyre::Result<()>
    where
        S: Storage<T, Dyn, Dyn>,
    {
        check_matrix_block(rows, cols, block_size, values)?;
        let (nrows, ncols) = (self.nrows(), self.ncols());
        for (i, global_i) in blocked(rows, block_size) {
            for (j, global_j) in blocked(cols, block_size) {
                if global_i >= nrows || global_j >= ncols {
                    return Err(eyre!("entry ({global_i}, {global_j}) out of bounds for {nrows}x{ncols} matrix"));
                }
                self.push(global_i, global_j, values[(i, j)]);
            }
        }
        Ok(())
    }
}

impl<T: Real> GlobalMatrix<T> for CsrMatrix<T> {
    fn add_blocked<S>(&mut self, rows: &[usize], cols: &[usize], block_size: usize, values: &Matrix<T, Dyn, Dyn, S>) -> eyre::Result<()>
    where
        S: Storage<T, Dyn, Dyn>,
    {
        check_matrix_block(rows, cols, block_size, values)?;
        let nrows = self.nrows();
        for (i, global_i) in blocked(rows, block_size) {
            if global_i >= nrows {
                return Err(eyre!("row {global_i} out of bounds for matrix with {nrows} rows"));
            }
            let mut row = self.row_mut(global_i);
            let (col_indices, row_values) = row.cols_and_values_mut();
            for (j, global_j) in blocked(cols, block_size) {
                let idx = col_indices
                    .binary_search(&global_j)
                    .map_err(|_| eyre!("entry ({global_i}, {global_j}) is not in the sparsity pattern"))?;
                row_values[idx] += values[(i, j)];
            }
        }
        Ok(())
    }
}

impl<T: Real> ElementState<T> {
    /// Scatters a local vector (`nen x dof`) into a global vector.
    pub fn assemble_vector<V>(&self, local: &[T], global: &mut V) -> eyre::Result<()>
    where
        V: GlobalVector<T> + ?Sized,
    {
        global.add_blocked(self.mapping(), self.dof(), local)
    }

    /// Scatters a local matrix (`nen dof x nen dof`) into a global matrix.
    pub fn assemble_matrix<M, S>(&self, local: &Matrix<T, Dyn, Dyn, S>, global: &mut M) -> eyre::Result<()>
    where
        M: GlobalMatrix<T> + ?Sized,
        S: Storage<T, Dyn, Dyn>,
    {
        global.add_blocked(self.mapping(), self.mapping(), self.dof(), local)
    }
}

/// Computes the sparsity pattern of the global matrix of a discretization.
///
/// Two degrees of freedom couple if their basis functions share an element. All elements of
/// the grid are considered, regardless of the discretization's element range.
pub fn assemble_pattern<T: Real>(discretization: &Discretization<T>) -> eyre::Result<SparsityPattern> {
    // Collecting into a BTreeSet stores every entry exactly once and yields them sorted
    let dof = discretization.dof();
    let range = crate::discretization::ElementRange::full(&discretization.num_elements_per_axis());
    let mut matrix_entries = BTreeSet::new();
    let mut element_nodes = vec![0; discretization.nen()];
    for e in 0..range.len() {
        discretization.populate_element_nodes(&range.element(e), &mut element_nodes);
        for (_, global_i) in blocked(&element_nodes, dof) {
            for (_, global_j) in blocked(&element_nodes, dof) {
                matrix_entries.insert((global_i, global_j));
            }
        }
    }

    let num_rows = discretization.num_dofs();
    let mut offsets = Vec::with_capacity(num_rows + 1);
    let mut column_indices = Vec::with_capacity(matrix_entries.len());
    offsets.push(0);
    for (i, j) in matrix_entries {
        // Loop to handle rows without entries
        while i + 1 > offsets.len() {
            offsets.push(column_indices.len());
        }
        column_indices.push(j);
    }
    while offsets.len() < num_rows + 1 {
        offsets.push(column_indices.len());
    }

    SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
        .map_err(|err| eyre!("invalid sparsity pattern: {err}"))
}

/// A zero CSR matrix with the sparsity pattern of the discretization.
pub fn create_csr_matrix<T: Real>(discretization: &Discretization<T>) -> eyre::Result<CsrMatrix<T>> {
    let pattern = assemble_pattern(discretization)?;
    let values = vec![T::zero(); pattern.nnz()];
    CsrMatrix::try_from_pattern_and_values(pattern, values).map_err(|err| eyre!("invalid CSR matrix: {err}"))
}

/// Checks that every entry of a local vector is finite.
pub fn check_finite_vector<T: Real>(element: usize, values: &[T]) -> Result<(), IgaError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(row) => Err(IgaError::NonFiniteEntry { element, row, col: 0 }),
        None => Ok(()),
    }
}

/// Checks that every entry of a local matrix is finite.
pub fn check_finite_matrix<T: Real, S: Storage<T, Dyn, Dyn>>(
    element: usize,
    values: &Matrix<T, Dyn, Dyn, S>,
) -> Result<(), IgaError> {
    for j in 0..values.ncols() {
        for i in 0..values.nrows() {
            if !values[(i, j)].is_finite() {
                return Err(IgaError::NonFiniteEntry { element, row: i, col: j });
            }
        }
    }
    Ok(())
}
