//! Gauss-type rules for the reference interval `[-1, 1]`.

use crate::{Error, Rule};
use std::f64::consts::PI;

const NEWTON_TOLERANCE: f64 = 1e-15;
const NEWTON_MAX_ITERATIONS: usize = 100;

/// Legendre polynomial `P_n` and its first derivative at a point.
#[derive(Debug, Clone, Copy)]
struct Legendre {
    n: usize,
    x: f64,
    value: f64,
    previous: f64,
}

impl Legendre {
    fn at(n: usize, x: f64) -> Self {
        // (m + 1) P_{m+1} = (2m + 1) x P_m - m P_{m-1}
        let mut value = 1.0;
        let mut previous = 0.0;
        for m in 0..n {
            let m = m as f64;
            let next = ((2.0 * m + 1.0) * x * value - m * previous) / (m + 1.0);
            previous = value;
            value = next;
        }
        Self { n, x, value, previous }
    }

    /// `P_n'(x)`, only valid for `|x| < 1`.
    fn derivative(&self) -> f64 {
        let n = self.n as f64;
        n * (self.x * self.value - self.previous) / (self.x * self.x - 1.0)
    }

    /// `P_n''(x)` from the Legendre differential equation, only valid for `|x| < 1`.
    fn second_derivative(&self) -> f64 {
        let n = self.n as f64;
        let x = self.x;
        (2.0 * x * self.derivative() - n * (n + 1.0) * self.value) / (1.0 - x * x)
    }
}

/// Runs Newton's method on `f` from the initial guess `x`.
fn newton(mut x: f64, f: impl Fn(f64) -> (f64, f64)) -> f64 {
    for _ in 0..NEWTON_MAX_ITERATIONS {
        let (value, derivative) = f(x);
        let dx = -value / derivative;
        x += dx;
        if dx.abs() <= NEWTON_TOLERANCE {
            break;
        }
    }
    x
}

/// Completes a rule from its non-positive half using the symmetry about the origin.
fn mirror(n: usize, mut weights: Vec<f64>, mut points: Vec<f64>) -> Rule {
    let half = weights.len();
    for i in half..n {
        let mirror_idx = n - i - 1;
        points.push(-points[mirror_idx]);
        weights.push(weights[mirror_idx]);
    }
    if n % 2 == 1 {
        // The middle point must be exactly zero
        points[n / 2] = 0.0;
    }
    (weights, points)
}

/// Gauss-Legendre rule with `num_points` points.
///
/// A rule with `n` points integrates polynomials of degree up to `2 n - 1` exactly.
/// Points are returned in increasing order.
pub fn gauss(num_points: usize) -> Result<Rule, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::EmptyRule);
    }

    let m = (n + 1) / 2;
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for i in 0..m {
        let guess = -(PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let x = newton(guess, |x| {
            let p = Legendre::at(n, x);
            (p.value, p.derivative())
        });
        let dp = Legendre::at(n, x).derivative();
        points.push(x);
        weights.push(2.0 / ((1.0 - x * x) * dp * dp));
    }

    Ok(mirror(n, weights, points))
}

/// Gauss-Legendre-Lobatto rule with `num_points` points, including both endpoints.
///
/// A rule with `n` points integrates polynomials of degree up to `2 n - 3` exactly.
/// Points are returned in increasing order.
pub fn gauss_lobatto(num_points: usize) -> Result<Rule, Error> {
    let n = num_points;
    if n < 2 {
        return Err(Error::TooFewPoints {
            requested: n,
            minimum: 2,
        });
    }

    // Interior points are the roots of P'_{n-1}
    let degree = n - 1;
    let endpoint_weight = 2.0 / (n as f64 * degree as f64);
    let m = (n + 1) / 2;
    let mut points = vec![-1.0];
    let mut weights = vec![endpoint_weight];
    for i in 1..m {
        let guess = -(PI * i as f64 / degree as f64).cos();
        let x = newton(guess, |x| {
            let p = Legendre::at(degree, x);
            (p.derivative(), p.second_derivative())
        });
        let p = Legendre::at(degree, x).value;
        points.push(x);
        weights.push(endpoint_weight / (p * p));
    }

    Ok(mirror(n, weights, points))
}
