//! Bounded pools of scratch arrays handed out during element traversal.
//!
//! Kernels frequently need small temporary arrays sized to the element: local solution values,
//! local vectors and local matrices. The pools in [`WorkArrays`] hand these out from storage owned
//! by the element cursor, so that steady-state traversal does not allocate. Each pool has a fixed
//! capacity (a number of arrays) and a cursor that is reset at well-defined points:
//! the value pool when a point loop begins, the vector and matrix pools whenever the cursor
//! advances to a new element. Requesting more arrays than the capacity allows between two resets
//! is reported as [`IgaError::WorkArrayExhausted`].
use crate::error::WorkKind;
use crate::{IgaError, Real};
use nalgebra::DMatrixViewMut;
use serde::{Deserialize, Serialize};

/// Number of arrays each pool can hand out between two resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCapacity {
    pub values: usize,
    pub vectors: usize,
    pub matrices: usize,
}

impl Default for WorkCapacity {
    fn default() -> Self {
        Self {
            values: 4,
            vectors: 4,
            matrices: 4,
        }
    }
}

/// A pool of equally sized, zero-initialized slices.
///
/// Backing storage grows lazily the first time a slot is requested and is reused afterwards.
#[derive(Debug, Clone)]
pub struct WorkPool<T> {
    kind: WorkKind,
    slot_len: usize,
    capacity: usize,
    cursor: usize,
    storage: Vec<T>,
}

impl<T: Real> WorkPool<T> {
    pub(crate) fn new(kind: WorkKind, slot_len: usize, capacity: usize) -> Self {
        Self {
            kind,
            slot_len,
            capacity,
            cursor: 0,
            storage: Vec::new(),
        }
    }

    /// Hands out `N` fresh zero-filled slices at once.
    pub fn take<const N: usize>(&mut self) -> Result<[&mut [T]; N], IgaError> {
        let end = self.cursor + N;
        if end > self.capacity {
            return Err(IgaError::WorkArrayExhausted {
                kind: self.kind,
                capacity: self.capacity,
            });
        }
        let needed = end * self.slot_len;
        if self.storage.len() < needed {
            self.storage.resize(needed, T::zero());
        }
        let block = &mut self.storage[self.cursor * self.slot_len..needed];
        block.fill(T::zero());
        self.cursor = end;
        // Zero-length slots only occur for empty elements, where chunking yields nothing
        let mut chunks = block.chunks_exact_mut(self.slot_len.max(1));
        Ok(std::array::from_fn(|_| chunks.next().unwrap_or_default()))
    }

    pub fn take_one(&mut self) -> Result<&mut [T], IgaError> {
        let [slice] = self.take::<1>()?;
        Ok(slice)
    }

    /// Length of every slice handed out by this pool.
    pub fn slot_len(&self) -> usize {
        self.slot_len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slices handed out since the last reset.
    pub fn in_use(&self) -> usize {
        self.cursor
    }

    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// A pool of zero-filled `nrows x ncols` matrix views.
#[derive(Debug, Clone)]
pub struct MatrixPool<T> {
    pool: WorkPool<T>,
    nrows: usize,
    ncols: usize,
}

impl<T: Real> MatrixPool<T> {
    pub(crate) fn new(nrows: usize, ncols: usize, capacity: usize) -> Self {
        Self {
            pool: WorkPool::new(WorkKind::Matrix, nrows * ncols, capacity),
            nrows,
            ncols,
        }
    }

    pub fn take<const N: usize>(&mut self) -> Result<[DMatrixViewMut<'_, T>; N], IgaError> {
        let (nrows, ncols) = (self.nrows, self.ncols);
        let slices = self.pool.take::<N>()?;
        Ok(slices.map(|slice| DMatrixViewMut::from_slice(slice, nrows, ncols)))
    }

    pub fn take_one(&mut self) -> Result<DMatrixViewMut<'_, T>, IgaError> {
        let [matrix] = self.take::<1>()?;
        Ok(matrix)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn in_use(&self) -> usize {
        self.pool.in_use()
    }

    pub(crate) fn reset(&mut self) {
        self.pool.reset();
    }
}

/// The scratch pools owned by an element cursor.
///
/// Values and vectors have length `nen * dof`, matrices are `nen * dof` square. The pools are
/// separate fields so that arrays from different pools can be held at the same time.
#[derive(Debug, Clone)]
pub struct WorkArrays<T> {
    pub values: WorkPool<T>,
    pub vectors: WorkPool<T>,
    pub matrices: MatrixPool<T>,
}

impl<T: Real> WorkArrays<T> {
    pub(crate) fn new(local_size: usize, capacity: WorkCapacity) -> Self {
        Self {
            values: WorkPool::new(WorkKind::Value, local_size, capacity.values),
            vectors: WorkPool::new(WorkKind::Vector, local_size, capacity.vectors),
            matrices: MatrixPool::new(local_size, local_size, capacity.matrices),
        }
    }

    /// Returns vector and matrix slots to the pool; called when the cursor changes element.
    pub(crate) fn reset_element(&mut self) {
        self.vectors.reset();
        self.matrices.reset();
    }

    /// Returns value slots to the pool; called when a point loop begins.
    pub(crate) fn reset_points(&mut self) {
        self.values.reset();
    }
}
