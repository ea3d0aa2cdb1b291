use fenris_iga_quadrature::univariate::{gauss, gauss_lobatto};
use fenris_iga_quadrature::{integrate, Error, RuleKind};

use matrixcompare::assert_scalar_eq;

fn monomial_integral(alpha: i32) -> f64 {
    (1.0 - (-1.0f64).powi(alpha + 1)) / (alpha as f64 + 1.0)
}

#[test]
fn gauss_rules_satisfy_expected_accuracy() {
    for n in 1..=40 {
        let expected_polynomial_degree = 2 * n - 1;
        let rule = gauss(n).unwrap();
        assert_eq!(rule.0.len(), n);

        assert!(rule.0.iter().all(|&w| w > 0.0));
        assert!(rule.1.windows(2).all(|x| x[0] < x[1]), "points must be increasing");

        for alpha in 0..=expected_polynomial_degree as i32 {
            let estimated_integral = integrate(&rule, |x| x.powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral(alpha), comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn gauss_lobatto_rules_satisfy_expected_accuracy() {
    assert_eq!(gauss_lobatto(0), Err(Error::TooFewPoints { requested: 0, minimum: 2 }));
    assert_eq!(gauss_lobatto(1), Err(Error::TooFewPoints { requested: 1, minimum: 2 }));

    for n in 2..=24 {
        let expected_polynomial_degree = 2 * n - 3;
        let rule = gauss_lobatto(n).unwrap();

        assert_eq!(rule.1.first().unwrap(), &-1.0);
        assert_eq!(rule.1.last().unwrap(), &1.0);
        assert!(rule.0.iter().all(|&w| w > 0.0));

        for alpha in 0..=expected_polynomial_degree as i32 {
            let estimated_integral = integrate(&rule, |x| x.powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral(alpha), comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn empty_gauss_rule_is_an_error() {
    assert_eq!(gauss(0), Err(Error::EmptyRule));
}

#[test]
fn custom_rules_are_validated() {
    let midpoint = RuleKind::Custom {
        weights: vec![2.0],
        points: vec![0.0],
    };
    assert_eq!(midpoint.num_points(), 1);
    assert_eq!(midpoint.rule().unwrap(), (vec![2.0], vec![0.0]));

    let mismatched = RuleKind::Custom {
        weights: vec![1.0, 1.0],
        points: vec![0.0],
    };
    assert!(matches!(mismatched.rule(), Err(Error::InvalidRule(_))));

    let outside = RuleKind::Custom {
        weights: vec![2.0],
        points: vec![1.5],
    };
    assert!(matches!(outside.rule(), Err(Error::InvalidRule(_))));

    let empty = RuleKind::Custom {
        weights: vec![],
        points: vec![],
    };
    assert_eq!(empty.rule(), Err(Error::EmptyRule));
}
