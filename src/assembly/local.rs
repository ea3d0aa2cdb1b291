use crate::assembly::global::{check_finite_matrix, check_finite_vector, GlobalMatrix, GlobalVector};
use crate::discretization::Discretization;
use crate::element::{ElementParts, Point};
use crate::{IgaError, Real};
use log::debug;
use nalgebra::DMatrixViewMut;

fn check_global_len(discretization: &Discretization<impl Real>, len: usize, what: &'static str) -> Result<(), IgaError> {
    let expected = discretization.num_dofs();
    if len != expected {
        return Err(IgaError::LengthMismatch {
            what,
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Assembles a linear system `K u = F` over the elements of the discretization's range.
///
/// For every quadrature point the kernel receives zeroed point-local buffers `kp`
/// (`nen dof x nen dof`) and `fp` (`nen dof`) to fill; they are accumulated into the element
/// contributions with the point's integration weight. Element contributions have the Dirichlet
/// fixation applied and are then scattered into `matrix` and `vector`.
pub fn form_system<T, K, M, V>(
    discretization: &Discretization<T>,
    matrix: &mut M,
    vector: &mut V,
    mut kernel: K,
) -> eyre::Result<()>
where
    T: Real,
    M: GlobalMatrix<T> + ?Sized,
    V: GlobalVector<T> + ?Sized,
    K: FnMut(&Point<'_, T>, &mut DMatrixViewMut<'_, T>, &mut [T]) -> eyre::Result<()>,
{
    debug!("Assembling linear system over {} elements", discretization.element_range().len());
    let mut element = discretization.elements();
    while element.advance()? {
        let ElementParts {
            state,
            points,
            fixation,
            work,
        } = element.begin_points()?;
        let [mut ke, mut kp] = work.matrices.take::<2>()?;
        let [fe, fp] = work.vectors.take::<2>()?;
        for point in points {
            kp.fill(T::zero());
            fp.fill(T::zero());
            kernel(&point, &mut kp, fp)?;
            point.add_scaled_matrix(&kp, &mut ke);
            point.add_scaled(fp, fe);
        }
        fixation.fix_system(&mut ke, fe);
        check_finite_matrix(state.global_index(), &ke)?;
        check_finite_vector(state.global_index(), fe)?;
        state.assemble_matrix(&ke, matrix)?;
        state.assemble_vector(fe, vector)?;
    }
    Ok(())
}

/// Assembles the residual `F(u)` of a nonlinear problem.
///
/// The kernel receives the local values of `u` (with Dirichlet values imposed) and a zeroed
/// point-local residual `fp` (`nen dof`). Fixed entries of the element residual are replaced by
/// the difference between the current and prescribed values.
pub fn form_function<T, K, V>(
    discretization: &Discretization<T>,
    u: &[T],
    vector: &mut V,
    mut kernel: K,
) -> eyre::Result<()>
where
    T: Real,
    V: GlobalVector<T> + ?Sized,
    K: FnMut(&Point<'_, T>, &[T], &mut [T]) -> eyre::Result<()>,
{
    check_global_len(discretization, u.len(), "solution vector")?;
    let mut element = discretization.elements();
    while element.advance()? {
        let ElementParts {
            state,
            points,
            fixation,
            work,
        } = element.begin_points()?;
        let ue = work.values.take_one()?;
        state.gather_values(u, ue)?;
        fixation.fix_values(ue);
        let [fe, fp] = work.vectors.take::<2>()?;
        for point in points {
            fp.fill(T::zero());
            kernel(&point, ue, fp)?;
            point.add_scaled(fp, fe);
        }
        fixation.fix_function(fe);
        check_finite_vector(state.global_index(), fe)?;
        state.assemble_vector(fe, vector)?;
    }
    Ok(())
}

/// Assembles the jacobian `dF/du` of a nonlinear problem.
///
/// The kernel receives the local values of `u` (with Dirichlet values imposed) and a zeroed
/// point-local matrix `jp`. Fixed rows and columns of the element jacobian are replaced by those
/// of the identity.
pub fn form_jacobian<T, K, M>(
    discretization: &Discretization<T>,
    u: &[T],
    matrix: &mut M,
    mut kernel: K,
) -> eyre::Result<()>
where
    T: Real,
    M: GlobalMatrix<T> + ?Sized,
    K: FnMut(&Point<'_, T>, &[T], &mut DMatrixViewMut<'_, T>) -> eyre::Result<()>,
{
    check_global_len(discretization, u.len(), "solution vector")?;
    let mut element = discretization.elements();
    while element.advance()? {
        let ElementParts {
            state,
            points,
            fixation,
            work,
        } = element.begin_points()?;
        let ue = work.values.take_one()?;
        state.gather_values(u, ue)?;
        fixation.fix_values(ue);
        let [mut je, mut jp] = work.matrices.take::<2>()?;
        for point in points {
            jp.fill(T::zero());
            kernel(&point, ue, &mut jp)?;
            point.add_scaled_matrix(&jp, &mut je);
        }
        fixation.fix_jacobian(&mut je);
        check_finite_matrix(state.global_index(), &je)?;
        state.assemble_matrix(&je, matrix)?;
    }
    Ok(())
}
