use crate::geometry_from_map;
use fenris_iga::axis::Axis;
use fenris_iga::boundary::{BoundaryConditions, Side};
use fenris_iga::discretization::{Discretization, ElementRange};
use fenris_iga::element::ElementParts;
use fenris_iga::error::WorkKind;
use fenris_iga::workspace::WorkCapacity;
use fenris_iga::IgaError;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::DMatrix;
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn axis(p: usize, nel: usize) -> Axis<f64> {
    Axis::uniform(p, nel, 0.0, 1.0).unwrap()
}

#[test]
fn elements_and_points_are_visited_in_order() {
    let disc = Discretization::builder()
        .with_axis(axis(1, 3))
        .with_axis(axis(2, 2))
        .build()
        .unwrap();
    let mut element = disc.elements();
    assert_eq!(element.index(), None);
    assert_eq!(element.count(), 6);

    let mut visited = Vec::new();
    let mut ids = Vec::new();
    while element.advance().unwrap() {
        ids.push(element.state().id());
        for point in element.points().unwrap() {
            visited.push((point.element_index(), point.index()));
        }
    }
    let expected: Vec<_> = (0..6).flat_map(|e| (0..6).map(move |q| (e, q))).collect();
    assert_eq!(visited, expected);
    assert_eq!(ids[1], [1, 0, 0]);
    assert_eq!(ids[3], [0, 1, 0]);

    // Exhausted cursors report no element and start over on the next advance
    assert_eq!(element.index(), None);
    assert!(element.advance().unwrap());
    assert_eq!(element.index(), Some(0));
}

#[test]
fn point_iterator_resets_after_exhaustion() {
    let disc = Discretization::builder().with_axis(axis(2, 2)).build().unwrap();
    let mut element = disc.elements();
    assert!(element.advance().unwrap());
    let mut points = element.points().unwrap();
    assert_eq!(points.num_points(), 3);
    assert_eq!(points.index(), None);
    assert_eq!(points.by_ref().count(), 3);
    assert_eq!(points.index(), None);
    assert_eq!(points.next().map(|p| p.index()), Some(0));
}

#[test]
fn accessing_points_requires_an_active_element() {
    let disc = Discretization::builder().with_axis(axis(1, 2)).build().unwrap();
    let mut element = disc.elements();
    assert!(matches!(element.points(), Err(IgaError::NotIterating { .. })));
    assert!(matches!(element.begin_points(), Err(IgaError::NotIterating { .. })));
    let mut local = [0.0; 2];
    assert!(matches!(
        element.state().gather_values(&[0.0; 3], &mut local),
        Err(IgaError::NotIterating { .. })
    ));
}

#[test]
fn element_range_restricts_traversal() {
    let range = ElementRange {
        start: [1, 1, 0],
        width: [2, 1, 1],
    };
    let disc = Discretization::builder()
        .with_axis(axis(1, 4))
        .with_axis(axis(1, 3))
        .with_element_range(range)
        .build()
        .unwrap();
    let mut element = disc.elements();
    let mut ids = Vec::new();
    while element.advance().unwrap() {
        ids.push((element.index().unwrap(), element.state().global_index()));
    }
    assert_eq!(ids, vec![(0, 5), (1, 6)]);
}

#[test]
fn gather_values_collects_interleaved_components() {
    let disc = Discretization::builder()
        .with_axis(axis(1, 3))
        .with_dof(2)
        .build()
        .unwrap();
    let global: Vec<f64> = (0..8).map(f64::from).collect();
    let mut element = disc.elements();
    element.advance().unwrap();
    element.advance().unwrap();
    let mut local = [0.0; 4];
    element.state().gather_values(&global, &mut local).unwrap();
    assert_eq!(local, [2.0, 3.0, 4.0, 5.0]);

    assert_eq!(
        element.state().gather_values(&global[..6], &mut local).unwrap_err(),
        IgaError::LengthMismatch {
            what: "global vector",
            expected: 8,
            actual: 6
        }
    );
}

#[test]
fn work_arrays_are_recycled_per_element_and_point_loop() {
    let capacity = WorkCapacity {
        values: 2,
        vectors: 1,
        matrices: 1,
    };
    let disc = Discretization::builder()
        .with_axis(axis(2, 2))
        .with_dof(3)
        .with_work_capacity(capacity)
        .build()
        .unwrap();
    let mut element = disc.elements();
    while element.advance().unwrap() {
        {
            let ElementParts { work, .. } = element.begin_points().unwrap();
            let [u, v] = work.values.take::<2>().unwrap();
            assert_eq!(u.len(), 9);
            assert_eq!(v.len(), 9);
            assert_eq!(
                work.values.take_one().unwrap_err(),
                IgaError::WorkArrayExhausted {
                    kind: WorkKind::Value,
                    capacity: 2
                }
            );
            let k = work.matrices.take_one().unwrap();
            assert_eq!(k.shape(), (9, 9));
            work.vectors.take_one().unwrap().fill(1.0);
        }
        // A new point loop releases the values but not vectors or matrices
        let ElementParts { work, .. } = element.begin_points().unwrap();
        assert!(work.values.take::<2>().is_ok());
        assert!(matches!(
            work.vectors.take_one(),
            Err(IgaError::WorkArrayExhausted {
                kind: WorkKind::Vector,
                ..
            })
        ));
        assert!(work.matrices.take_one().is_err());
    }
}

#[test]
fn parametric_volume_is_sum_of_point_weights() {
    let disc = Discretization::builder()
        .with_axis(Axis::uniform(2, 3, -1.0, 2.0).unwrap())
        .with_axis(Axis::uniform(1, 2, 0.0, 0.5).unwrap())
        .with_axis(Axis::periodic_uniform(3, 5, 1.0, 3.0).unwrap())
        .build()
        .unwrap();
    let mut volume = 0.0;
    let mut element = disc.elements();
    while element.advance().unwrap() {
        for point in element.points().unwrap() {
            volume += point.scale();
        }
    }
    assert_scalar_eq!(volume, 3.0 * 0.5 * 2.0, comp = abs, tol = 1e-12);
}

#[test]
fn mapped_volume_of_affine_geometry() {
    let axes = [axis(2, 3), axis(3, 2)];
    let geometry = geometry_from_map(&axes, 2, |xi| vec![2.0 * xi[0] + 0.5 * xi[1], 0.25 * xi[0] + 3.0 * xi[1]]);
    let disc = Discretization::builder()
        .with_axis(axes[0].clone())
        .with_axis(axes[1].clone())
        .with_geometry(geometry)
        .build()
        .unwrap();
    let mut area = 0.0;
    let mut element = disc.elements();
    while element.advance().unwrap() {
        for point in element.points().unwrap() {
            area += point.scale();
            assert_scalar_eq!(point.det_x(), 6.0 - 0.125, comp = abs, tol = 1e-12);
        }
    }
    assert_scalar_eq!(area, 5.875, comp = abs, tol = 1e-12);
}

#[test]
fn every_node_is_reached_and_mappings_are_in_bounds() {
    let disc = Discretization::builder()
        .with_axis(axis(2, 3))
        .with_axis(Axis::periodic_uniform(1, 4, 0.0, 1.0).unwrap())
        .with_dof(2)
        .build()
        .unwrap();
    let mut reached = BTreeSet::new();
    let mut element = disc.elements();
    while element.advance().unwrap() {
        let mapping = element.state().mapping();
        assert_eq!(mapping.len(), 6);
        for &node in mapping {
            assert!(node < disc.num_nodes());
            reached.insert(node);
        }
    }
    assert_eq!(reached.len(), disc.num_nodes());
}

#[test]
fn fixation_marks_boundary_functions() {
    let bc = BoundaryConditions::new()
        .with_value(0, Side::Lower, 0, 1.0)
        .with_value(1, Side::Upper, 1, 2.0);
    let disc = Discretization::builder()
        .with_axis(axis(2, 2))
        .with_axis(axis(2, 2))
        .with_dof(2)
        .with_boundary_conditions(bc)
        .build()
        .unwrap();
    let mut element = disc.elements();
    let mut fixations = Vec::new();
    while element.advance().unwrap() {
        fixations.push(element.fixation().iter().collect::<Vec<_>>());
    }
    assert_eq!(fixations[0], vec![(0, 1.0), (6, 1.0), (12, 1.0)]);
    assert!(fixations[1].is_empty());
    assert_eq!(fixations[2], vec![(0, 1.0), (6, 1.0), (12, 1.0), (13, 2.0), (15, 2.0), (17, 2.0)]);
    assert_eq!(fixations[3], vec![(13, 2.0), (15, 2.0), (17, 2.0)]);
}

#[test]
fn fixation_at_corners_is_deduplicated() {
    let bc = BoundaryConditions::new()
        .with_value(0, Side::Lower, 0, 1.0)
        .with_value(1, Side::Lower, 0, 5.0);
    let disc = Discretization::builder()
        .with_axis(axis(1, 2))
        .with_axis(axis(1, 2))
        .with_boundary_conditions(bc)
        .build()
        .unwrap();
    let mut element = disc.elements();
    element.advance().unwrap();
    let fixation = element.fixation();
    assert_eq!(fixation.len(), 3);
    assert_eq!(fixation.indices(), &[0, 1, 2]);
    assert_eq!(fixation.values(), &[5.0, 5.0, 1.0]);
}

#[test]
fn single_constant_function_takes_the_lower_boundary_value() {
    let bc = BoundaryConditions::new()
        .with_value(0, Side::Lower, 0, 1.0)
        .with_value(0, Side::Upper, 0, 2.0)
        .with_value(0, Side::Upper, 1, 3.0);
    let disc = Discretization::builder()
        .with_axis(Axis::uniform(0, 1, 0.0, 1.0).unwrap())
        .with_dof(2)
        .with_boundary_conditions(bc)
        .build()
        .unwrap();
    let mut element = disc.elements();
    element.advance().unwrap();
    assert_eq!(element.fixation().iter().collect::<Vec<_>>(), vec![(0, 1.0)]);
}

#[test]
fn periodic_axes_have_no_fixation() {
    let bc = BoundaryConditions::new().with_value(0, Side::Lower, 0, 1.0);
    let disc = Discretization::builder()
        .with_axis(Axis::periodic_uniform(1, 3, 0.0, 1.0).unwrap())
        .with_boundary_conditions(bc)
        .build()
        .unwrap();
    let mut element = disc.elements();
    while element.advance().unwrap() {
        assert!(element.fixation().is_empty());
    }
}

#[test]
fn fixation_operations_on_local_arrays() {
    let bc = BoundaryConditions::new().with_value(0, Side::Lower, 0, 2.0);
    let disc = Discretization::builder()
        .with_axis(axis(1, 3))
        .with_boundary_conditions(bc)
        .build()
        .unwrap();
    let mut element = disc.elements();
    element.advance().unwrap();
    let ElementParts { fixation, .. } = element.begin_points().unwrap();

    let mut u = [7.0, 8.0];
    fixation.fix_values(&mut u);
    assert_eq!(u, [2.0, 8.0]);
    assert_eq!(fixation.saved_values(), &[7.0]);

    let mut k = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
    let mut f = [1.0, 1.0];
    fixation.fix_system(&mut k, &mut f);
    assert_matrix_eq!(k, DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 3.0]));
    assert_eq!(f, [2.0, -1.0]);

    let mut residual = [9.0, 9.0];
    fixation.fix_function(&mut residual);
    assert_eq!(residual, [5.0, 9.0]);

    let mut jacobian = DMatrix::repeat(2, 2, 4.0);
    fixation.fix_jacobian(&mut jacobian);
    assert_matrix_eq!(jacobian, DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 4.0]));
}

#[test]
fn interpolation_reproduces_linear_fields() {
    let axes = [axis(2, 3), axis(1, 2)];
    let u = geometry_from_map(&axes, 2, |xi| vec![1.0 + 2.0 * xi[0], 3.0 * xi[0] - xi[1]]);
    let disc = Discretization::builder()
        .with_axis(axes[0].clone())
        .with_axis(axes[1].clone())
        .with_dof(2)
        .build()
        .unwrap();
    let mut element = disc.elements();
    while element.advance().unwrap() {
        let ElementParts { state, points, work, .. } = element.begin_points().unwrap();
        let ue = work.values.take_one().unwrap();
        state.gather_values(&u, ue).unwrap();
        for point in points {
            let xi = point.coordinates();
            let mut value = [0.0; 2];
            point.interpolate(0, ue, &mut value);
            assert_scalar_eq!(value[0], 1.0 + 2.0 * xi[0], comp = abs, tol = 1e-12);
            assert_scalar_eq!(value[1], 3.0 * xi[0] - xi[1], comp = abs, tol = 1e-12);

            let mut gradient = [0.0; 4];
            point.interpolate(1, ue, &mut gradient);
            let expected = [2.0, 0.0, 3.0, -1.0];
            for (g, e) in gradient.iter().zip(&expected) {
                assert_scalar_eq!(*g, *e, comp = abs, tol = 1e-12);
            }
        }
    }
}

#[test]
fn collapsed_geometry_is_reported_as_degenerate() {
    let disc = Discretization::builder()
        .with_axis(axis(1, 2))
        .with_axis(axis(1, 2))
        .with_geometry(vec![0.0; 18])
        .build()
        .unwrap();
    let mut element = disc.elements();
    assert!(matches!(
        element.advance(),
        Err(IgaError::DegenerateJacobian { element: 0, point: 0, .. })
    ));

    // The failed element is not left half-built
    assert_eq!(element.index(), None);
    assert!(matches!(element.points(), Err(IgaError::NotIterating { .. })));
    assert!(matches!(element.begin_points(), Err(IgaError::NotIterating { .. })));
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "only orders up to 1")]
fn unevaluated_derivative_orders_are_not_readable() {
    let disc = Discretization::builder().with_axis(axis(2, 2)).build().unwrap();
    let mut element = disc.elements();
    element.advance().unwrap();
    for point in element.points().unwrap() {
        let _ = point.shape(2);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn basis_is_a_partition_of_unity(
        dim in 1usize..=3,
        degree in 0usize..=3,
        nel in 1usize..=3,
        weights in vec(0.5..2.0f64, 64),
        rational in any::<bool>(),
    ) {
        let axes: Vec<_> = (0..dim).map(|i| axis(degree + i % 2, nel)).collect();
        let mut builder = Discretization::builder().with_derivative_order(3);
        for a in &axes {
            builder = builder.with_axis(a.clone());
        }
        let num_nodes: usize = axes.iter().map(Axis::num_basis).product();
        if rational {
            builder = builder.with_weights(weights.iter().cycle().take(num_nodes).copied().collect());
        }
        let disc = builder.build().unwrap();
        let mut element = disc.elements();
        while element.advance().unwrap() {
            for point in element.points().unwrap() {
                let nen = point.nen();
                for order in 0..=3 {
                    let n = point.basis(order);
                    let stride = dim.pow(order as u32);
                    prop_assert_eq!(n.len(), nen * stride);
                    let magnitude = n.iter().fold(1.0f64, |m, v| m.max(v.abs()));
                    for t in 0..stride {
                        let sum: f64 = (0..nen).map(|a| n[a * stride + t]).sum();
                        let expected = if order == 0 { 1.0 } else { 0.0 };
                        prop_assert!((sum - expected).abs() <= 1e-10 * magnitude, "order {} entry {}: {}", order, t, sum);
                    }
                }
            }
        }
    }

    #[test]
    fn fixation_is_a_set_and_elimination_isolates_fixed_entries(
        dim in 1usize..=3,
        degree in 1usize..=2,
        nel in 1usize..=3,
        dof in 1usize..=3,
        entries in vec((0usize..3, any::<bool>(), 0usize..3, -5.0..5.0f64), 0..8),
    ) {
        let mut bc = BoundaryConditions::new();
        for (axis, upper, field, value) in entries {
            let side = if upper { Side::Upper } else { Side::Lower };
            bc.set_value(axis % dim, side, field % dof, value);
        }
        let mut builder = Discretization::builder().with_dof(dof).with_boundary_conditions(bc);
        for _ in 0..dim {
            builder = builder.with_axis(axis(degree, nel));
        }
        let disc = builder.build().unwrap();
        let mut element = disc.elements();
        while element.advance().unwrap() {
            let n = element.state().local_size();
            let ElementParts { fixation, .. } = element.begin_points().unwrap();
            let unique: BTreeSet<_> = fixation.indices().iter().collect();
            prop_assert_eq!(unique.len(), fixation.len());

            let original: Vec<f64> = (0..n).map(|i| (i as f64 + 0.5).sin()).collect();
            let mut u = original.clone();
            fixation.fix_values(&mut u);
            for (i, (&ui, &oi)) in u.iter().zip(&original).enumerate() {
                match fixation.indices().iter().position(|&k| k == i) {
                    Some(r) => prop_assert_eq!(ui, fixation.values()[r]),
                    None => prop_assert_eq!(ui, oi),
                }
            }

            let mut k = DMatrix::from_fn(n, n, |i, j| 1.0 + ((i * n + j) as f64).cos());
            let mut f = original.clone();
            fixation.fix_system(&mut k, &mut f);
            for (idx, value) in fixation.iter() {
                prop_assert_eq!(f[idx], value);
                for j in 0..n {
                    let expected = if j == idx { 1.0 } else { 0.0 };
                    prop_assert_eq!(k[(idx, j)], expected);
                    prop_assert_eq!(k[(j, idx)], expected);
                }
            }
        }
    }
}
