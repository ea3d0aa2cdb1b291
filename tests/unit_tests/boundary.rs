use fenris_iga::boundary::{BoundaryConditions, BoundaryValue, Side};
use fenris_iga::IgaError;

#[test]
fn setting_a_field_twice_replaces_its_value() {
    let mut bc = BoundaryConditions::new();
    bc.set_value(0, Side::Lower, 1, 2.0)
        .set_value(0, Side::Lower, 0, 3.0)
        .set_value(0, Side::Lower, 1, 5.0);
    assert_eq!(
        bc.values(0, Side::Lower),
        &[
            BoundaryValue { field: 1, value: 5.0 },
            BoundaryValue { field: 0, value: 3.0 }
        ]
    );
    assert!(bc.values(0, Side::Upper).is_empty());
    assert!(bc.values(7, Side::Upper).is_empty());
    assert!(!bc.is_empty());

    bc.clear(0, Side::Lower);
    assert!(bc.is_empty());
}

#[test]
fn validation_checks_axes_and_fields() {
    let bc = BoundaryConditions::new().with_value(2, Side::Upper, 0, 1.0);
    assert!(bc.validate(3, 1).is_ok());
    assert!(matches!(bc.validate(2, 1), Err(IgaError::InvalidBoundary(_))));

    let bc = BoundaryConditions::new().with_value(0, Side::Lower, 3, 1.0);
    assert!(bc.validate(1, 4).is_ok());
    assert!(matches!(bc.validate(1, 3), Err(IgaError::InvalidBoundary(_))));

    let bc = BoundaryConditions::new().with_value(0, Side::Lower, 0, f64::INFINITY);
    assert!(matches!(bc.validate(1, 1), Err(IgaError::InvalidBoundary(_))));
}

#[test]
fn boundary_conditions_survive_serialization() {
    let bc = BoundaryConditions::new()
        .with_value(0, Side::Lower, 0, 1.5)
        .with_value(1, Side::Upper, 1, -2.0);
    let json = serde_json::to_string(&bc).unwrap();
    let restored: BoundaryConditions<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, bc);
}
