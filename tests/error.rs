//! Tests for error module

use tracktotrip::error::{OptionExt, TripError};

#[test]
fn test_error_display() {
    let err = TripError::insufficient_points("similarity", 1, 2);
    assert!(err.to_string().contains("similarity"));
    assert!(err.to_string().contains("1 points"));
    assert!(err.to_string().contains("at least 2"));
}

#[test]
fn test_non_monotonic_display() {
    let err = TripError::NonMonotonicTime { index: 7 };
    assert!(err.to_string().contains("index 7"));
}

#[test]
fn test_option_ext_insufficient_points() {
    let none: Option<i32> = None;
    let result = none.ok_or_insufficient_points("test", 0, 2);
    assert!(matches!(
        result,
        Err(TripError::InsufficientPoints {
            point_count: 0,
            minimum_required: 2,
            ..
        })
    ));
}

#[test]
fn test_option_ext_numerical() {
    let none: Option<f64> = None;
    assert!(matches!(
        none.ok_or_numerical("inverse"),
        Err(TripError::NumericalInstability { .. })
    ));
    assert_eq!(Some(1.5).ok_or_numerical("inverse"), Ok(1.5));
}
