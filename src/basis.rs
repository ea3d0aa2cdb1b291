//! Per-axis quadrature and B-spline basis tables.
use crate::axis::Axis;
use crate::quadrature::QuadratureRule;
use crate::{IgaError, Real, MAX_DERIVATIVE_ORDER};
use nalgebra::convert;
use numeric_literals::replace_float_literals;

/// Number of derivative slots stored per basis function (orders `0..=3`).
pub const DERIVATIVE_SLOTS: usize = MAX_DERIVATIVE_ORDER + 1;

/// Evaluates the `degree + 1` B-splines that are non-zero on knot span `span` at `u`, together
/// with their derivatives up to `order`.
///
/// The output is laid out as `output[a * DERIVATIVE_SLOTS + k]`, the `k`-th derivative of the
/// `a`-th non-zero function (global index `span - degree + a`). Derivatives of order higher than
/// the degree are zero.
///
/// # Panics
///
/// Panics if `output` does not have length `(degree + 1) * DERIVATIVE_SLOTS`, if `order` exceeds
/// [`MAX_DERIVATIVE_ORDER`] or if `span` is not a valid span of `knots`.
#[allow(clippy::needless_range_loop)]
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn evaluate_basis_derivatives<T: Real>(
    knots: &[T],
    degree: usize,
    span: usize,
    u: T,
    order: usize,
    output: &mut [T],
) {
    let p = degree;
    assert_eq!(output.len(), (p + 1) * DERIVATIVE_SLOTS);
    assert!(order <= MAX_DERIVATIVE_ORDER);
    assert!(span >= p && span + p < knots.len());
    output.fill(0.0);

    // Triangular table of basis values (upper part) and knot differences (lower part),
    // following Piegl & Tiller, "The NURBS Book", algorithm A2.3
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;
    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ndu[r][j - 1] / ndu[j][r];
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }
    for j in 0..=p {
        output[j * DERIVATIVE_SLOTS] = ndu[j][p];
    }

    let n = order.min(p);
    let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
    for r in 0..=p {
        let (mut s1, mut s2) = (0, 1);
        a[0][0] = 1.0;
        for k in 1..=n {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;
            if rk >= 0 {
                let rk = rk as usize;
                a[s2][0] = a[s1][0] / ndu[pk + 1][rk];
                d = a[s2][0] * ndu[rk][pk];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r <= pk + 1 { k - 1 } else { p - r };
            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][idx];
                d += a[s2][j] * ndu[idx][pk];
            }
            if r <= pk {
                a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                d += a[s2][k] * ndu[r][pk];
            }
            output[r * DERIVATIVE_SLOTS + k] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = T::from_usize(p).unwrap_or_else(T::zero);
    for k in 1..=n {
        for j in 0..=p {
            output[j * DERIVATIVE_SLOTS + k] *= factor;
        }
        factor *= T::from_usize(p - k).unwrap_or_else(T::zero);
    }
}

/// Quadrature points and basis function values for every element along one axis.
///
/// Built once when the discretization is set up and read-only afterwards.
#[derive(Debug, Clone)]
pub struct BasisTable<T> {
    degree: usize,
    periodic: bool,
    num_basis: usize,
    nel: usize,
    nqp: usize,
    nen: usize,
    offsets: Vec<usize>,
    weights: Vec<T>,
    points: Vec<T>,
    scales: Vec<T>,
    values: Vec<T>,
}

/// The slice of a [`BasisTable`] belonging to a single element.
#[derive(Debug, Clone, Copy)]
pub struct AxisElement<'a, T> {
    pub nqp: usize,
    pub nen: usize,
    /// Reference quadrature weights, length `nqp`.
    pub weights: &'a [T],
    /// Quadrature points in knot coordinates, length `nqp`.
    pub points: &'a [T],
    /// Ratio between the element's knot span length and the reference interval length.
    pub scale: T,
    /// Basis values laid out as `values[(q * nen + a) * DERIVATIVE_SLOTS + k]`.
    pub values: &'a [T],
}

impl<'a, T: Real> AxisElement<'a, T> {
    /// The `k`-th derivative of local function `a` at point `q`.
    pub fn value(&self, q: usize, a: usize, k: usize) -> T {
        self.values[(q * self.nen + a) * DERIVATIVE_SLOTS + k]
    }
}

impl<T: Real> BasisTable<T> {
    /// Tabulates the basis on every element of `axis` with the given rule.
    ///
    /// Derivatives are evaluated up to order `order` (at most [`MAX_DERIVATIVE_ORDER`]);
    /// higher orders are stored as zeros.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn build(axis: &Axis<T>, rule: &QuadratureRule, order: usize) -> Result<Self, IgaError> {
        axis.validate()?;
        if order > MAX_DERIVATIVE_ORDER {
            return Err(IgaError::InvalidDerivativeOrder {
                order,
                max: MAX_DERIVATIVE_ORDER,
            });
        }
        let (ref_weights, ref_points) = rule.rule()?;
        let weights: Vec<T> = ref_weights.into_iter().map(convert).collect();
        let ref_points: Vec<T> = ref_points.into_iter().map(convert).collect();

        let p = axis.degree();
        let knots = axis.knots();
        let spans = axis.element_spans();
        let nel = spans.len();
        let nqp = weights.len();
        let nen = p + 1;

        let mut points = Vec::with_capacity(nel * nqp);
        let mut scales = Vec::with_capacity(nel);
        let mut values = vec![0.0; nel * nqp * nen * DERIVATIVE_SLOTS];
        let function_block = nen * DERIVATIVE_SLOTS;
        for (e, &span) in spans.iter().enumerate() {
            let (a, b) = (knots[span], knots[span + 1]);
            let scale = (b - a) / 2.0;
            scales.push(scale);
            for (q, &xi) in ref_points.iter().enumerate() {
                let u = (a + b) / 2.0 + scale * xi;
                points.push(u);
                let start = (e * nqp + q) * function_block;
                evaluate_basis_derivatives(knots, p, span, u, order, &mut values[start..start + function_block]);
            }
        }

        Ok(Self {
            degree: p,
            periodic: axis.is_periodic(),
            num_basis: axis.num_basis(),
            nel,
            nqp,
            nen,
            offsets: spans.iter().map(|span| span - p).collect(),
            weights,
            points,
            scales,
            values,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Number of distinct basis functions along the axis.
    pub fn num_basis(&self) -> usize {
        self.num_basis
    }

    pub fn num_elements(&self) -> usize {
        self.nel
    }

    /// Number of quadrature points per element.
    pub fn nqp(&self) -> usize {
        self.nqp
    }

    /// Number of non-zero basis functions per element.
    pub fn nen(&self) -> usize {
        self.nen
    }

    /// Index of the first non-zero basis function on each element, before periodic wrapping.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    /// Global basis index of local function `a` on element `e`, wrapped for periodic axes.
    pub fn basis_index(&self, e: usize, a: usize) -> usize {
        let index = self.offsets[e] + a;
        if self.periodic {
            index % self.num_basis
        } else {
            index
        }
    }

    pub fn element(&self, e: usize) -> AxisElement<'_, T> {
        let block = self.nqp * self.nen * DERIVATIVE_SLOTS;
        AxisElement {
            nqp: self.nqp,
            nen: self.nen,
            weights: &self.weights,
            points: &self.points[e * self.nqp..(e + 1) * self.nqp],
            scale: self.scales[e],
            values: &self.values[e * block..(e + 1) * block],
        }
    }
}
