use crate::geometry_from_map;
use fenris_iga::axis::Axis;
use fenris_iga::discretization::Discretization;
use fenris_iga::quadrature::QuadratureRule;
use matrixcompare::assert_scalar_eq;
use proptest::collection::vec;
use proptest::prelude::*;
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

fn axis(p: usize, nel: usize) -> Axis<f64> {
    Axis::uniform(p, nel, 0.0, 1.0).unwrap()
}

#[test]
fn affine_map_pushes_derivatives_forward_with_constant_inverse() {
    // x = A xi
    let a = [[2.0, 0.5], [0.25, 3.0]];
    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
    let a_inv = [[a[1][1] / det, -a[0][1] / det], [-a[1][0] / det, a[0][0] / det]];

    let axes = [axis(2, 2), axis(3, 1)];
    let geometry = geometry_from_map(&axes, 2, |xi| {
        vec![a[0][0] * xi[0] + a[0][1] * xi[1], a[1][0] * xi[0] + a[1][1] * xi[1]]
    });
    let disc = Discretization::builder()
        .with_axis(axes[0].clone())
        .with_axis(axes[1].clone())
        .with_geometry(geometry)
        .with_derivative_order(2)
        .build()
        .unwrap();

    let mut element = disc.elements();
    while element.advance().unwrap() {
        for point in element.points().unwrap() {
            assert_scalar_eq!(point.det_x(), det, comp = abs, tol = 1e-12);
            for (c, row) in point.jacobian().chunks_exact(2).enumerate() {
                for (i, &value) in row.iter().enumerate() {
                    assert_scalar_eq!(value, a[c][i], comp = abs, tol = 1e-12);
                }
            }
            for (i, row) in point.inverse_jacobian().chunks_exact(2).enumerate() {
                for (c, &value) in row.iter().enumerate() {
                    assert_scalar_eq!(value, a_inv[i][c], comp = abs, tol = 1e-12);
                }
            }

            let (n1, d1) = (point.basis(1), point.shape(1));
            let (n2, d2) = (point.basis(2), point.shape(2));
            for b in 0..point.nen() {
                for c in 0..2 {
                    let expected: f64 = (0..2).map(|i| n1[b * 2 + i] * a_inv[i][c]).sum();
                    assert_scalar_eq!(d1[b * 2 + c], expected, comp = abs, tol = 1e-10);
                    for e in 0..2 {
                        let mut expected = 0.0;
                        for i in 0..2 {
                            for k in 0..2 {
                                expected += n2[b * 4 + i * 2 + k] * a_inv[i][c] * a_inv[k][e];
                            }
                        }
                        assert_scalar_eq!(d2[b * 4 + c * 2 + e], expected, comp = abs, tol = 1e-9);
                    }
                }
            }
        }
    }
}

#[test]
fn identity_map_has_unit_jacobian() {
    let axes = [axis(2, 2), axis(1, 3), axis(3, 1)];
    let disc = Discretization::builder()
        .with_axis(axes[0].clone())
        .with_axis(axes[1].clone())
        .with_axis(axes[2].clone())
        .with_geometry(geometry_from_map(&axes, 3, |xi| xi.to_vec()))
        .build()
        .unwrap();
    let mut element = disc.elements();
    while element.advance().unwrap() {
        for point in element.points().unwrap() {
            assert_scalar_eq!(point.det_x(), 1.0, comp = abs, tol = 1e-12);
            // Product of the per-axis half element widths
            assert_scalar_eq!(point.det_jac(), 0.25 * (1.0 / 6.0) * 0.5, comp = abs, tol = 1e-14);
            for (entry, (j, j_inv)) in point.jacobian().iter().zip(point.inverse_jacobian()).enumerate() {
                let expected = if entry % 4 == 0 { 1.0 } else { 0.0 };
                assert_scalar_eq!(*j, expected, comp = abs, tol = 1e-12);
                assert_scalar_eq!(*j_inv, expected, comp = abs, tol = 1e-12);
            }
            let mut x = [0.0; 3];
            point.position(&mut x).unwrap();
            for (x, xi) in x.iter().zip(point.coordinates()) {
                assert_scalar_eq!(*x, *xi, comp = abs, tol = 1e-12);
            }
        }
    }
}

#[test]
fn quarter_circle_arc_is_represented_exactly() {
    let disc = Discretization::builder()
        .with_axis(axis(2, 1))
        .with_quadrature(QuadratureRule::Gauss(10))
        .with_spatial_dim(2)
        .with_geometry(vec![1.0, 0.0, 1.0, 1.0, 0.0, 1.0])
        .with_weights(vec![1.0, FRAC_1_SQRT_2, 1.0])
        .build()
        .unwrap();
    assert!(disc.is_rational());

    let control_points = [[1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    let mut length = 0.0;
    let mut element = disc.elements();
    while element.advance().unwrap() {
        for point in element.points().unwrap() {
            length += point.scale();
            let mut x = [0.0; 2];
            point.position(&mut x).unwrap();
            assert_scalar_eq!(x[0].hypot(x[1]), 1.0, comp = abs, tol = 1e-12);
            assert!(point.det_x() > 0.0);

            // Parametric derivatives are the only ones available on a curve
            assert_eq!(point.shape(1), point.basis(1));

            // sum_a X_a (x) grad R_a is the tangential projector I - n n^T
            let gradients = point.gradients();
            for c in 0..2 {
                for e in 0..2 {
                    let projector: f64 = (0..3)
                        .map(|b| control_points[b][c] * gradients[b * 2 + e])
                        .sum();
                    let expected = if c == e { 1.0 } else { 0.0 } - x[c] * x[e];
                    assert_scalar_eq!(projector, expected, comp = abs, tol = 1e-10);
                }
            }
        }
    }
    assert_scalar_eq!(length, FRAC_PI_2, comp = abs, tol = 1e-8);
}

#[test]
fn embedded_plane_uses_the_gram_determinant() {
    let axes = [axis(1, 2), axis(2, 2)];
    let geometry = geometry_from_map(&axes, 3, |xi| vec![xi[0], xi[1], 0.5 * xi[0] + 0.25 * xi[1]]);
    let disc = Discretization::builder()
        .with_axis(axes[0].clone())
        .with_axis(axes[1].clone())
        .with_spatial_dim(3)
        .with_geometry(geometry)
        .build()
        .unwrap();

    let factor = 1.3125f64.sqrt();
    let mut area = 0.0;
    let mut element = disc.elements();
    while element.advance().unwrap() {
        for point in element.points().unwrap() {
            area += point.scale();
            assert_scalar_eq!(point.det_x(), factor, comp = abs, tol = 1e-12);
            assert_eq!(point.jacobian().len(), 6);
            assert_eq!(point.gradients().len(), point.nen() * 3);
        }
    }
    assert_scalar_eq!(area, factor, comp = abs, tol = 1e-12);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn physical_derivatives_reproduce_the_identity(
        dim in 1usize..=3,
        degree in 1usize..=3,
        nel in 1usize..=2,
        offsets in vec(-1.0..1.0f64, 96),
        weights in vec(0.9..1.1f64, 64),
    ) {
        let axes: Vec<_> = (0..dim).map(|i| axis(degree + i % 2, nel)).collect();
        let mut offsets = offsets.into_iter().cycle();
        let geometry: Vec<f64> = geometry_from_map(&axes, dim, |xi| xi.to_vec())
            .into_iter()
            .map(|x| x + 0.005 * offsets.next().unwrap_or_default())
            .collect();
        let num_nodes: usize = axes.iter().map(Axis::num_basis).product();

        let mut builder = Discretization::builder()
            .with_derivative_order(3)
            .with_geometry(geometry)
            .with_weights(weights.iter().cycle().take(num_nodes).copied().collect());
        for a in &axes {
            builder = builder.with_axis(a.clone());
        }
        let disc = builder.build().unwrap();

        let mut element = disc.elements();
        while element.advance().unwrap() {
            let control_points = element.state().control_points().unwrap().to_vec();
            for point in element.points().unwrap() {
                let nen = point.nen();
                // sum_a X_a (x) D^m R_a is the identity for m = 1 and vanishes for m > 1
                for order in 1..=3 {
                    let d = point.shape(order);
                    let stride = dim.pow(order as u32);
                    let magnitude = d.iter().fold(1.0f64, |m, v| m.max(v.abs()));
                    for c in 0..dim {
                        for t in 0..stride {
                            let sum: f64 = (0..nen).map(|a| control_points[a * dim + c] * d[a * stride + t]).sum();
                            let expected = if order == 1 && t == c { 1.0 } else { 0.0 };
                            prop_assert!(
                                (sum - expected).abs() <= 1e-9 * magnitude * nen as f64,
                                "order {} component {} entry {}: {}", order, c, t, sum
                            );
                        }
                    }
                }
            }
        }
    }
}
