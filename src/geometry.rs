//! Rational weighting and push-forward of basis derivatives to physical space.
use crate::tensor::derivative_stride;
use crate::{IgaError, Real, MAX_DERIVATIVE_ORDER, MAX_DIM};
use nalgebra::Matrix3;
use numeric_literals::replace_float_literals;

type Tensor2<T> = [[T; MAX_DIM]; MAX_DIM];
type Tensor3<T> = [[[T; MAX_DIM]; MAX_DIM]; MAX_DIM];
type Tensor4<T> = [[[[T; MAX_DIM]; MAX_DIM]; MAX_DIM]; MAX_DIM];

/// Converts polynomial basis tensors into rational (NURBS) ones, in place.
///
/// With `W = sum_a w_a N_a` the rational functions are `R_a = w_a N_a / W`; their derivatives up
/// to `order` follow from repeated application of the quotient rule. `weights` holds the
/// element-local control point weights (length `nen`), `basis[m]` the order-`m` tensors of all
/// `nqp` points.
#[allow(clippy::needless_range_loop)]
pub fn rationalize<T: Real>(
    dim: usize,
    nqp: usize,
    nen: usize,
    order: usize,
    weights: &[T],
    basis: &mut [Vec<T>; MAX_DERIVATIVE_ORDER + 1],
) {
    let zero = T::zero();
    let s1 = derivative_stride(dim, 1);
    let s2 = derivative_stride(dim, 2);
    let s3 = derivative_stride(dim, 3);
    let [b0, b1, b2, b3] = basis;
    for q in 0..nqp {
        let mut w0 = zero;
        let mut w1 = [zero; MAX_DIM];
        let mut w2: Tensor2<T> = [[zero; MAX_DIM]; MAX_DIM];
        let mut w3: Tensor3<T> = [[[zero; MAX_DIM]; MAX_DIM]; MAX_DIM];
        for a in 0..nen {
            let qa = q * nen + a;
            let wa = weights[a];
            w0 += wa * b0[qa];
            if order >= 1 {
                for i in 0..dim {
                    w1[i] += wa * b1[qa * s1 + i];
                }
            }
            if order >= 2 {
                for i in 0..dim {
                    for j in 0..dim {
                        w2[i][j] += wa * b2[qa * s2 + i * dim + j];
                    }
                }
            }
            if order >= 3 {
                for i in 0..dim {
                    for j in 0..dim {
                        for k in 0..dim {
                            w3[i][j][k] += wa * b3[qa * s3 + (i * dim + j) * dim + k];
                        }
                    }
                }
            }
        }
        let inv_w = w0.recip();

        for a in 0..nen {
            let qa = q * nen + a;
            let wa = weights[a];
            let r0 = wa * b0[qa] * inv_w;
            b0[qa] = r0;
            if order < 1 {
                continue;
            }
            let mut r1 = [zero; MAX_DIM];
            for i in 0..dim {
                r1[i] = (wa * b1[qa * s1 + i] - r0 * w1[i]) * inv_w;
                b1[qa * s1 + i] = r1[i];
            }
            if order < 2 {
                continue;
            }
            let mut r2: Tensor2<T> = [[zero; MAX_DIM]; MAX_DIM];
            for i in 0..dim {
                for j in 0..dim {
                    let idx = qa * s2 + i * dim + j;
                    r2[i][j] = (wa * b2[idx] - r0 * w2[i][j] - r1[i] * w1[j] - r1[j] * w1[i]) * inv_w;
                    b2[idx] = r2[i][j];
                }
            }
            if order < 3 {
                continue;
            }
            for i in 0..dim {
                for j in 0..dim {
                    for k in 0..dim {
                        let idx = qa * s3 + (i * dim + j) * dim + k;
                        let value = wa * b3[idx]
                            - r0 * w3[i][j][k]
                            - r1[i] * w2[j][k]
                            - r1[j] * w2[i][k]
                            - r1[k] * w2[i][j]
                            - r2[i][j] * w1[k]
                            - r2[i][k] * w1[j]
                            - r2[j][k] * w1[i];
                        b3[idx] = value * inv_w;
                    }
                }
            }
        }
    }
}

/// Determinant and inverse of the leading `n x n` block of `m`.
fn invert_leading<T: Real>(m: &Matrix3<T>, n: usize) -> (T, Option<Matrix3<T>>) {
    match n {
        1 => {
            let det = m[(0, 0)];
            let inverse = (det != T::zero()).then(|| {
                let mut inv = Matrix3::zeros();
                inv[(0, 0)] = det.recip();
                inv
            });
            (det, inverse)
        }
        2 => {
            let block = m.fixed_view::<2, 2>(0, 0).clone_owned();
            let inverse = block.try_inverse().map(|block_inv| {
                let mut inv = Matrix3::zeros();
                inv.fixed_view_mut::<2, 2>(0, 0).copy_from(&block_inv);
                inv
            });
            (block.determinant(), inverse)
        }
        _ => (m.determinant(), m.try_inverse()),
    }
}

/// Geometric quantities of one element at each of its quadrature points.
///
/// Layouts per point `q`: the jacobian `dx_c / dxi_i` is stored row-major as `nsd x dim`, its
/// (pseudo-)inverse `dxi_i / dx_c` as `dim x nsd`. Physical basis derivatives in `shape` are only
/// computed when the parametric and spatial dimensions agree; otherwise the first-order surface
/// gradients (`nen x nsd` per point) are provided instead.
#[derive(Debug, Clone)]
pub struct ElementGeometry<T> {
    pub(crate) jacobian: Vec<T>,
    pub(crate) inverse: Vec<T>,
    pub(crate) det_x: Vec<T>,
    pub(crate) shape: [Vec<T>; MAX_DERIVATIVE_ORDER + 1],
    pub(crate) surface_gradients: Vec<T>,
}

impl<T: Real> ElementGeometry<T> {
    /// Storage for `nqp` points, initialized to the identity map.
    ///
    /// Physical derivative storage is only allocated when `mapped` is set.
    pub(crate) fn identity(dim: usize, nsd: usize, nqp: usize, nen: usize, mapped: bool) -> Self {
        let mut jacobian = vec![T::zero(); nqp * nsd * dim];
        let mut inverse = vec![T::zero(); nqp * dim * nsd];
        for q in 0..nqp {
            for i in 0..dim.min(nsd) {
                jacobian[q * nsd * dim + i * dim + i] = T::one();
                inverse[q * dim * nsd + i * nsd + i] = T::one();
            }
        }
        let shape_len = |m| if mapped && dim == nsd { nqp * nen * derivative_stride(dim, m) } else { 0 };
        Self {
            jacobian,
            inverse,
            det_x: vec![T::one(); nqp],
            shape: [shape_len(0), shape_len(1), shape_len(2), shape_len(3)].map(|len| vec![T::zero(); len]),
            surface_gradients: vec![T::zero(); if mapped && dim < nsd { nqp * nen * nsd } else { 0 }],
        }
    }

    /// Maps the parametric derivatives in `basis` through the geometry with local control points
    /// `x` (`nen x nsd`, row-major) and scales `det_jac` by the measure of the map.
    ///
    /// Returns [`IgaError::DegenerateJacobian`] if the map is singular (or non-finite) at a point.
    #[allow(clippy::too_many_arguments, clippy::needless_range_loop)]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub(crate) fn compute(
        &mut self,
        element: usize,
        dim: usize,
        nsd: usize,
        nen: usize,
        order: usize,
        x: &[T],
        basis: &[Vec<T>; MAX_DERIVATIVE_ORDER + 1],
        det_jac: &mut [T],
    ) -> Result<(), IgaError> {
        let s1 = derivative_stride(dim, 1);
        let s2 = derivative_stride(dim, 2);
        let s3 = derivative_stride(dim, 3);
        let zero = 0.0;
        for (q, det_jac_q) in det_jac.iter_mut().enumerate() {
            let mut j = Matrix3::<T>::zeros();
            for a in 0..nen {
                let qa = q * nen + a;
                for c in 0..nsd {
                    let xa = x[a * nsd + c];
                    for i in 0..dim {
                        j[(c, i)] += xa * basis[1][qa * s1 + i];
                    }
                }
            }

            let (det, inverse) = if dim == nsd {
                invert_leading(&j, dim)
            } else {
                // Gram determinant and pseudo-inverse (J^T J)^-1 J^T for embedded manifolds
                let gram = j.transpose() * j;
                let (gram_det, gram_inverse) = invert_leading(&gram, dim);
                let pseudo_inverse = gram_inverse.map(|g| g * j.transpose());
                (gram_det, pseudo_inverse)
            };
            let measure = if dim == nsd { dim } else { 2 * dim };
            let scale = j.norm().powi(measure as i32);
            let inverse = match inverse {
                Some(inverse) if det.is_finite() && det.abs() > 1e-12 * scale => inverse,
                _ => {
                    return Err(IgaError::DegenerateJacobian {
                        element,
                        point: q,
                        determinant: det.to_subset().unwrap_or(f64::NAN),
                    })
                }
            };
            let det_x = if dim == nsd { det } else { det.sqrt() };
            self.det_x[q] = det_x;
            *det_jac_q *= det_x.abs();

            for c in 0..nsd {
                for i in 0..dim {
                    self.jacobian[q * nsd * dim + c * dim + i] = j[(c, i)];
                    self.inverse[q * dim * nsd + i * nsd + c] = inverse[(i, c)];
                }
            }

            if dim != nsd {
                for a in 0..nen {
                    let qa = q * nen + a;
                    for c in 0..nsd {
                        let mut g = zero;
                        for i in 0..dim {
                            g += basis[1][qa * s1 + i] * inverse[(i, c)];
                        }
                        self.surface_gradients[qa * nsd + c] = g;
                    }
                }
                continue;
            }

            let d = dim;
            let mut h: Tensor3<T> = [[[zero; MAX_DIM]; MAX_DIM]; MAX_DIM];
            let mut t: Tensor4<T> = [[[[zero; MAX_DIM]; MAX_DIM]; MAX_DIM]; MAX_DIM];
            if order >= 2 {
                for a in 0..nen {
                    let qa = q * nen + a;
                    for c in 0..d {
                        let xa = x[a * nsd + c];
                        for i in 0..d {
                            for k in 0..d {
                                h[c][i][k] += xa * basis[2][qa * s2 + i * d + k];
                                if order >= 3 {
                                    for l in 0..d {
                                        t[c][i][k][l] += xa * basis[3][qa * s3 + (i * d + k) * d + l];
                                    }
                                }
                            }
                        }
                    }
                }
            }

            for a in 0..nen {
                let qa = q * nen + a;
                self.shape[0][qa] = basis[0][qa];

                let mut d1 = [zero; MAX_DIM];
                for c in 0..d {
                    for i in 0..d {
                        d1[c] += basis[1][qa * s1 + i] * inverse[(i, c)];
                    }
                    self.shape[1][qa * s1 + c] = d1[c];
                }
                if order < 2 {
                    continue;
                }

                // N_ij = D_cd J_ci J_dj + D_c H_cij
                let mut rhs2: Tensor2<T> = [[zero; MAX_DIM]; MAX_DIM];
                for i in 0..d {
                    for k in 0..d {
                        let mut v = basis[2][qa * s2 + i * d + k];
                        for e in 0..d {
                            v -= d1[e] * h[e][i][k];
                        }
                        rhs2[i][k] = v;
                    }
                }
                let mut d2: Tensor2<T> = [[zero; MAX_DIM]; MAX_DIM];
                for c in 0..d {
                    for e in 0..d {
                        let mut v = zero;
                        for i in 0..d {
                            for k in 0..d {
                                v += rhs2[i][k] * inverse[(i, c)] * inverse[(k, e)];
                            }
                        }
                        d2[c][e] = v;
                        self.shape[2][qa * s2 + c * d + e] = v;
                    }
                }
                if order < 3 {
                    continue;
                }

                // N_ijk = D_cde J_ci J_dj J_ek + D_cd (H_cik J_dj + J_ci H_djk + J_dk H_cij) + D_c T_cijk
                let mut rhs3: Tensor3<T> = [[[zero; MAX_DIM]; MAX_DIM]; MAX_DIM];
                for i in 0..d {
                    for k in 0..d {
                        for l in 0..d {
                            let mut v = basis[3][qa * s3 + (i * d + k) * d + l];
                            for c in 0..d {
                                v -= d1[c] * t[c][i][k][l];
                                for e in 0..d {
                                    v -= d2[c][e]
                                        * (h[c][i][l] * j[(e, k)] + j[(c, i)] * h[e][k][l] + j[(e, l)] * h[c][i][k]);
                                }
                            }
                            rhs3[i][k][l] = v;
                        }
                    }
                }
                for c in 0..d {
                    for e in 0..d {
                        for f in 0..d {
                            let mut v = zero;
                            for i in 0..d {
                                for k in 0..d {
                                    for l in 0..d {
                                        v += rhs3[i][k][l] * inverse[(i, c)] * inverse[(k, e)] * inverse[(l, f)];
                                    }
                                }
                            }
                            self.shape[3][qa * s3 + (c * d + e) * d + f] = v;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Signed determinant of the geometry map at each point (square root of the Gram
    /// determinant when the parametric dimension is smaller than the spatial one).
    pub fn det_x(&self) -> &[T] {
        &self.det_x
    }
}
