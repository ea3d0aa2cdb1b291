//! Tensor-product composition of per-axis quadrature and basis tables.
//!
//! Multi-indices are linearized with direction 0 varying fastest. Derivative tensors of order `m`
//! are stored densely with `dim^m` entries per basis function, the first derivative index being
//! the slowest, so that entry `[i][j]` of a second derivative lives at `i * dim + j`.
use crate::basis::AxisElement;
use crate::{Real, MAX_DERIVATIVE_ORDER, MAX_DIM};

/// Splits a linear index into per-direction indices with direction 0 varying fastest.
#[inline]
pub fn decompose(mut index: usize, extents: &[usize], out: &mut [usize]) {
    for (o, &n) in out.iter_mut().zip(extents) {
        *o = index % n;
        index /= n;
    }
}

/// Number of entries per basis function in a derivative tensor of the given order.
#[inline]
pub fn derivative_stride(dim: usize, order: usize) -> usize {
    dim.pow(order as u32)
}

/// Composes the tensor-product quadrature of one element.
///
/// Writes the reference weight, the parametric-to-reference scaling (product of per-axis span
/// scales) and the parametric coordinates of every point. `weight` and `det_jac` have length
/// `nqp`, `point` has length `nqp * dim`.
pub fn compose_quadrature<T: Real>(axes: &[AxisElement<'_, T>], weight: &mut [T], det_jac: &mut [T], point: &mut [T]) {
    let dim = axes.len();
    let mut extents = [1; MAX_DIM];
    for (e, axis) in extents.iter_mut().zip(axes) {
        *e = axis.nqp;
    }
    let scale = axes.iter().fold(T::one(), |s, axis| s * axis.scale);
    let mut q_multi = [0; MAX_DIM];
    for q in 0..weight.len() {
        decompose(q, &extents[..dim], &mut q_multi[..dim]);
        let mut w = T::one();
        for (i, axis) in axes.iter().enumerate() {
            w *= axis.weights[q_multi[i]];
            point[q * dim + i] = axis.points[q_multi[i]];
        }
        weight[q] = w;
        det_jac[q] = scale;
    }
}

/// Composes tensor-product basis values and parametric derivatives up to `order`.
///
/// `basis[m]` receives the order-`m` tensors laid out as `[q][a][dim^m]`; orders above `order`
/// are left untouched.
pub fn compose_basis<T: Real>(axes: &[AxisElement<'_, T>], order: usize, basis: &mut [Vec<T>; MAX_DERIVATIVE_ORDER + 1]) {
    let dim = axes.len();
    let mut qp_extents = [1; MAX_DIM];
    let mut en_extents = [1; MAX_DIM];
    for (i, axis) in axes.iter().enumerate() {
        qp_extents[i] = axis.nqp;
        en_extents[i] = axis.nen;
    }
    let nqp: usize = qp_extents[..dim].iter().product();
    let nen: usize = en_extents[..dim].iter().product();

    let mut q_multi = [0; MAX_DIM];
    let mut a_multi = [0; MAX_DIM];
    let mut derivative_index = [0; MAX_DERIVATIVE_ORDER];
    for q in 0..nqp {
        decompose(q, &qp_extents[..dim], &mut q_multi[..dim]);
        for a in 0..nen {
            decompose(a, &en_extents[..dim], &mut a_multi[..dim]);
            let value = |counts: &[usize; MAX_DIM]| {
                axes.iter()
                    .enumerate()
                    .fold(T::one(), |v, (i, axis)| v * axis.value(q_multi[i], a_multi[i], counts[i]))
            };
            let qa = q * nen + a;
            for (m, tensor) in basis.iter_mut().enumerate().take(order + 1) {
                let stride = derivative_stride(dim, m);
                for t in 0..stride {
                    // Count how often each direction is differentiated
                    let mut counts = [0; MAX_DIM];
                    let mut rest = t;
                    for d in derivative_index[..m].iter_mut() {
                        *d = rest % dim;
                        rest /= dim;
                        counts[*d] += 1;
                    }
                    tensor[qa * stride + t] = value(&counts);
                }
            }
        }
    }
}
