//! Knot vectors along a single parametric direction.
use crate::{IgaError, Real};
use serde::{Deserialize, Serialize};

/// A spline discretization along one parametric direction.
///
/// The axis is described by its polynomial degree `p`, a non-decreasing knot vector and a
/// periodicity flag. Elements are the non-empty knot spans inside the active range
/// `[knots[p], knots[len - p - 1]]`. On each element exactly `p + 1` basis functions are non-zero;
/// the first of them is the element's *offset*.
///
/// For a periodic axis the last `p` basis functions coincide with the first `p`, so the number
/// of distinct basis functions is `len - 2 p - 1` and basis indices wrap around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis<T> {
    degree: usize,
    knots: Vec<T>,
    #[serde(default)]
    periodic: bool,
}

impl<T: Real> Axis<T> {
    pub fn new(degree: usize, knots: Vec<T>, periodic: bool) -> Result<Self, IgaError> {
        let axis = Self {
            degree,
            knots,
            periodic,
        };
        axis.validate()?;
        Ok(axis)
    }

    /// Open, maximally smooth knot vector on `[lower, upper]` with `num_elements` equal spans.
    pub fn uniform(degree: usize, num_elements: usize, lower: T, upper: T) -> Result<Self, IgaError> {
        if num_elements == 0 {
            return Err(IgaError::InvalidKnots("at least one element is required".to_string()));
        }
        let h = (upper - lower) / T::from_usize(num_elements).unwrap_or_else(T::one);
        let mut knots = Vec::with_capacity(num_elements + 2 * degree + 1);
        knots.extend(std::iter::repeat(lower).take(degree));
        knots.extend((0..=num_elements).map(|i| lower + h * T::from_usize(i).unwrap_or_else(T::zero)));
        // Avoid round-off in the last knot
        if let Some(last) = knots.last_mut() {
            *last = upper;
        }
        knots.extend(std::iter::repeat(upper).take(degree));
        Self::new(degree, knots, false)
    }

    /// Periodic, maximally smooth knot vector on `[lower, upper]` with `num_elements` equal spans.
    pub fn periodic_uniform(degree: usize, num_elements: usize, lower: T, upper: T) -> Result<Self, IgaError> {
        if num_elements == 0 {
            return Err(IgaError::InvalidKnots("at least one element is required".to_string()));
        }
        let n = T::from_usize(num_elements).unwrap_or_else(T::one);
        let h = (upper - lower) / n;
        let p = degree as isize;
        let knots = (-p..=(num_elements as isize + p))
            .map(|i| lower + h * T::from_isize(i).unwrap_or_else(T::zero))
            .collect();
        Self::new(degree, knots, true)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[T] {
        &self.knots
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// The number of distinct basis functions along this axis.
    pub fn num_basis(&self) -> usize {
        let n = self.knots.len() - self.degree - 1;
        if self.periodic {
            n - self.degree
        } else {
            n
        }
    }

    /// Knot span index `i` (with `knots[i] < knots[i + 1]`) of every element, in increasing order.
    pub fn element_spans(&self) -> Vec<usize> {
        let p = self.degree;
        let last = self.knots.len() - p - 1;
        (p..last)
            .filter(|&i| self.knots[i] < self.knots[i + 1])
            .collect()
    }

    pub fn num_elements(&self) -> usize {
        self.element_spans().len()
    }

    /// The parametric interval covered by the elements.
    pub fn domain(&self) -> (T, T) {
        let p = self.degree;
        (self.knots[p], self.knots[self.knots.len() - p - 1])
    }

    /// Checks the invariants of the knot vector.
    ///
    /// Axes built through [`Axis::new`] are always valid; deserialized axes are checked when the
    /// discretization is built.
    pub fn validate(&self) -> Result<(), IgaError> {
        let p = self.degree;
        let len = self.knots.len();
        if len < 2 * p + 2 {
            return Err(IgaError::InvalidKnots(format!(
                "degree {p} needs at least {} knots, got {len}",
                2 * p + 2
            )));
        }
        if let Some(k) = self.knots.iter().find(|k| !k.is_finite()) {
            return Err(IgaError::InvalidKnots(format!("non-finite knot {k}")));
        }
        if self.knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(IgaError::InvalidKnots("knots must be non-decreasing".to_string()));
        }
        let mut multiplicity = 1;
        for w in self.knots.windows(2) {
            multiplicity = if w[0] == w[1] { multiplicity + 1 } else { 1 };
            if multiplicity > p + 1 {
                return Err(IgaError::InvalidKnots(format!(
                    "knot {} repeated more than degree + 1 = {} times",
                    w[0],
                    p + 1
                )));
            }
        }
        let (lower, upper) = self.domain();
        if lower >= upper {
            return Err(IgaError::InvalidKnots("the active knot range is empty".to_string()));
        }
        if self.periodic {
            if p == 0 {
                return Err(IgaError::InvalidDegree("a periodic axis needs degree at least 1".to_string()));
            }
            let num_basis = len - 2 * p - 1;
            if num_basis < p + 1 {
                return Err(IgaError::InvalidKnots(format!(
                    "a periodic axis of degree {p} needs at least {} distinct basis functions, got {num_basis}",
                    p + 1
                )));
            }
        }
        Ok(())
    }
}
