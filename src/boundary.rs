//! Dirichlet boundary values on the sides of the parametric domain.
use crate::{IgaError, Real, MAX_DIM};
use serde::{Deserialize, Serialize};

/// One of the two sides of the parametric domain along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Lower,
    Upper,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Lower => 0,
            Side::Upper => 1,
        }
    }
}

/// A prescribed value for one field component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryValue<T> {
    pub field: usize,
    pub value: T,
}

/// Dirichlet values per `(axis, side)` pair.
///
/// Values apply to the degrees of freedom of the single basis function that is non-zero on the
/// boundary of an open knot vector. Periodic axes have no boundary and any values attached to
/// them are ignored during traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConditions<T> {
    sides: [[Vec<BoundaryValue<T>>; 2]; MAX_DIM],
}

impl<T> Default for BoundaryConditions<T> {
    fn default() -> Self {
        Self {
            sides: Default::default(),
        }
    }
}

impl<T: Real> BoundaryConditions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prescribes `value` for component `field` on the given side.
    ///
    /// Setting the same field on the same side again replaces the previous value.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= MAX_DIM`.
    pub fn set_value(&mut self, axis: usize, side: Side, field: usize, value: T) -> &mut Self {
        let values = &mut self.sides[axis][side.index()];
        match values.iter_mut().find(|v| v.field == field) {
            Some(existing) => existing.value = value,
            None => values.push(BoundaryValue { field, value }),
        }
        self
    }

    /// Builder-style variant of [`set_value`](Self::set_value).
    pub fn with_value(mut self, axis: usize, side: Side, field: usize, value: T) -> Self {
        self.set_value(axis, side, field, value);
        self
    }

    /// Values prescribed on the given side, in insertion order.
    pub fn values(&self, axis: usize, side: Side) -> &[BoundaryValue<T>] {
        self.sides
            .get(axis)
            .map(|sides| sides[side.index()].as_slice())
            .unwrap_or(&[])
    }

    pub fn clear(&mut self, axis: usize, side: Side) {
        if let Some(sides) = self.sides.get_mut(axis) {
            sides[side.index()].clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sides.iter().flatten().all(Vec::is_empty)
    }

    /// Checks that every value refers to an existing axis and field.
    pub fn validate(&self, dim: usize, dof: usize) -> Result<(), IgaError> {
        for (axis, sides) in self.sides.iter().enumerate() {
            for (side, values) in sides.iter().enumerate() {
                if !values.is_empty() && axis >= dim {
                    return Err(IgaError::InvalidBoundary(format!(
                        "values on side {side} of axis {axis}, but the domain has dimension {dim}"
                    )));
                }
                if let Some(v) = values.iter().find(|v| v.field >= dof) {
                    return Err(IgaError::InvalidBoundary(format!(
                        "field {} out of range for {dof} degrees of freedom per node",
                        v.field
                    )));
                }
                if let Some(v) = values.iter().find(|v| !v.value.is_finite()) {
                    return Err(IgaError::InvalidBoundary(format!("non-finite value {}", v.value)));
                }
            }
        }
        Ok(())
    }
}
