//! Reduction of scalar functionals over a discretization.
//!
//! A functional is evaluated at every quadrature point into `n` scalar slots; the weighted sum
//! over all local elements is then combined across processes with a [`Communicator`]. The
//! combination is performed once per reduction, after the local traversal is complete.
use crate::discretization::{Discretization, ElementRange};
use crate::element::{ElementParts, Point};
use crate::{IgaError, Real};
use eyre::eyre;
use log::debug;
use rayon::prelude::*;

/// Combines partial results held by cooperating processes.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Sums `local` element-wise over all processes, writing the result to `global` on every
    /// process.
    fn all_reduce_sum<T: Real>(&self, local: &[T], global: &mut [T]) -> eyre::Result<()>;
}

/// A communicator for a single process.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum<T: Real>(&self, local: &[T], global: &mut [T]) -> eyre::Result<()> {
        if local.len() != global.len() {
            return Err(eyre!(
                "reduction buffers differ in length ({} and {})",
                local.len(),
                global.len()
            ));
        }
        global.copy_from_slice(local);
        Ok(())
    }
}

/// Sums a functional over the elements of `range` without communication.
fn accumulate<T, F>(
    discretization: &Discretization<T>,
    range: ElementRange,
    u: &[T],
    n: usize,
    fixed: bool,
    mut functional: F,
) -> eyre::Result<Vec<T>>
where
    T: Real,
    F: FnMut(&Point<'_, T>, &[T], &mut [T]) -> eyre::Result<()>,
{
    let mut sum = vec![T::zero(); n];
    let mut point_values = vec![T::zero(); n];
    let mut element = discretization.elements_in(range)?;
    while element.advance()? {
        let ElementParts {
            state,
            points,
            fixation,
            work,
        } = element.begin_points()?;
        let ue = work.values.take_one()?;
        state.gather_values(u, ue)?;
        if fixed {
            fixation.fix_values(ue);
        }
        for point in points {
            point_values.fill(T::zero());
            functional(&point, ue, &mut point_values)?;
            point.add_scaled(&point_values, &mut sum);
        }
    }
    Ok(sum)
}

fn check_input<T: Real>(discretization: &Discretization<T>, u: &[T]) -> Result<(), IgaError> {
    if u.len() != discretization.num_dofs() {
        return Err(IgaError::LengthMismatch {
            what: "solution vector",
            expected: discretization.num_dofs(),
            actual: u.len(),
        });
    }
    Ok(())
}

fn reduce_globally<T: Real, C: Communicator>(comm: &C, local: Vec<T>) -> eyre::Result<Vec<T>> {
    let mut global = vec![T::zero(); local.len()];
    comm.all_reduce_sum(&local, &mut global)?;
    Ok(global)
}

/// Integrates an `n`-component functional of the field `u` over the domain.
///
/// The functional receives each quadrature point, the element-local values of `u` and `n`
/// zeroed output slots. Returns the sum over all processes of `comm`.
pub fn compute_scalar<T, F, C>(
    discretization: &Discretization<T>,
    u: &[T],
    n: usize,
    comm: &C,
    functional: F,
) -> eyre::Result<Vec<T>>
where
    T: Real,
    F: FnMut(&Point<'_, T>, &[T], &mut [T]) -> eyre::Result<()>,
    C: Communicator,
{
    check_input(discretization, u)?;
    debug!("Reducing {n} scalars on rank {} of {}", comm.rank(), comm.size());
    let local = accumulate(discretization, discretization.element_range(), u, n, false, functional)?;
    reduce_globally(comm, local)
}

/// Like [`compute_scalar`], but with Dirichlet values imposed on the local values of `u`.
pub fn compute_scalar_fixed<T, F, C>(
    discretization: &Discretization<T>,
    u: &[T],
    n: usize,
    comm: &C,
    functional: F,
) -> eyre::Result<Vec<T>>
where
    T: Real,
    F: FnMut(&Point<'_, T>, &[T], &mut [T]) -> eyre::Result<()>,
    C: Communicator,
{
    check_input(discretization, u)?;
    let local = accumulate(discretization, discretization.element_range(), u, n, true, functional)?;
    reduce_globally(comm, local)
}

/// Multi-threaded [`compute_scalar`].
///
/// The local element range is split into `parts` slabs that are traversed in parallel, each
/// with its own element cursor. Partial sums are combined in slab order, so the result does not
/// depend on thread scheduling.
pub fn par_compute_scalar<T, F, C>(
    discretization: &Discretization<T>,
    u: &[T],
    n: usize,
    parts: usize,
    comm: &C,
    functional: F,
) -> eyre::Result<Vec<T>>
where
    T: Real,
    F: Fn(&Point<'_, T>, &[T], &mut [T]) -> eyre::Result<()> + Sync,
    C: Communicator,
{
    check_input(discretization, u)?;
    let ranges = discretization.element_range().split(parts);
    debug!("Reducing {n} scalars over {} slabs", ranges.len());
    let partial_sums = ranges
        .into_par_iter()
        .map(|range| accumulate(discretization, range, u, n, false, &functional))
        .collect::<eyre::Result<Vec<_>>>()?;
    let mut local = vec![T::zero(); n];
    for partial in partial_sums {
        for (l, p) in local.iter_mut().zip(partial) {
            *l += p;
        }
    }
    reduce_globally(comm, local)
}
