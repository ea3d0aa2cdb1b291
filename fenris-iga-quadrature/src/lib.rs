//! Univariate quadrature rules on the reference interval `[-1, 1]`.
//!
//! Tensor-product discretizations only ever need one-dimensional rules: the rules for
//! quadrilateral and hexahedral cells are formed as direct products of the rules provided here,
//! one per parametric direction. All rules are computed in `f64` and converted by the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A rule with zero points was requested.
    EmptyRule,
    /// The requested rule needs more points than were asked for.
    TooFewPoints { requested: usize, minimum: usize },
    /// A user-supplied rule is malformed.
    InvalidRule(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRule => write!(f, "A quadrature rule must have at least one point"),
            Self::TooFewPoints { requested, minimum } => {
                write!(
                    f,
                    "Requested a rule with {requested} points, but at least {minimum} are required"
                )
            }
            Self::InvalidRule(msg) => write!(f, "Invalid quadrature rule: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// A one-dimensional rule, stored as `(weights, points)` on `[-1, 1]`.
pub type Rule = (Vec<f64>, Vec<f64>);

/// Describes which one-dimensional rule to use along a parametric direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleKind {
    /// Gauss-Legendre with the given number of points.
    Gauss(usize),
    /// Gauss-Legendre-Lobatto with the given number of points (at least 2).
    GaussLobatto(usize),
    /// A user-supplied rule on `[-1, 1]`.
    Custom { weights: Vec<f64>, points: Vec<f64> },
}

impl RuleKind {
    /// The number of points in the rule.
    pub fn num_points(&self) -> usize {
        match self {
            Self::Gauss(n) | Self::GaussLobatto(n) => *n,
            Self::Custom { weights, .. } => weights.len(),
        }
    }

    /// Computes (or validates, for custom rules) the weights and points of the rule.
    pub fn rule(&self) -> Result<Rule, Error> {
        match self {
            Self::Gauss(n) => univariate::gauss(*n),
            Self::GaussLobatto(n) => univariate::gauss_lobatto(*n),
            Self::Custom { weights, points } => {
                if weights.is_empty() {
                    return Err(Error::EmptyRule);
                }
                if weights.len() != points.len() {
                    return Err(Error::InvalidRule(format!(
                        "{} weights but {} points",
                        weights.len(),
                        points.len()
                    )));
                }
                if let Some(x) = points.iter().find(|x| !(-1.0..=1.0).contains(*x)) {
                    return Err(Error::InvalidRule(format!("point {x} lies outside [-1, 1]")));
                }
                if weights.iter().any(|w| !w.is_finite()) {
                    return Err(Error::InvalidRule("non-finite weight".to_string()));
                }
                Ok((weights.clone(), points.clone()))
            }
        }
    }
}

/// Approximates the integral of `f` over `[-1, 1]` with the given rule.
pub fn integrate(rule: &Rule, f: impl Fn(f64) -> f64) -> f64 {
    let (weights, points) = rule;
    weights.iter().zip(points).map(|(w, &x)| w * f(x)).sum()
}
