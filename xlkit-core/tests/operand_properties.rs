//! Property tests for marshalling values in and out of operands.

use proptest::prelude::*;
use xlkit_core::{ConstCellMatrixRef, ErrorCode, Operand, Ownership, XlKitError};

// ============================================================================
// Strategies
// ============================================================================

fn error_code() -> impl Strategy<Value = ErrorCode> {
    prop::sample::select(ErrorCode::ALL.to_vec())
}

/// One operand of every kind that is not a matrix
fn non_matrix() -> impl Strategy<Value = Operand> {
    prop_oneof![
        any::<f64>().prop_map(Operand::number),
        any::<i16>().prop_map(Operand::integer),
        any::<bool>().prop_map(Operand::boolean),
        ".{0,20}".prop_map(|s| Operand::string(&s)),
        error_code().prop_map(Operand::error),
        Just(Operand::missing()),
        Just(Operand::nil()),
    ]
}

// ============================================================================
// Round trips
// ============================================================================

proptest! {
    #[test]
    fn numbers_round_trip(x in any::<f64>().prop_filter("comparable", |x| !x.is_nan())) {
        let mut op = Operand::missing();
        op.set(x).unwrap();
        prop_assert_eq!(op.get::<f64>().unwrap(), x);
    }

    #[test]
    fn integers_round_trip(w in any::<i16>()) {
        let mut op = Operand::missing();
        op.set(w).unwrap();
        prop_assert_eq!(op.get::<i16>().unwrap(), w);
        prop_assert_eq!(op.get::<i32>().unwrap(), w as i32);
    }

    #[test]
    fn bools_and_errors_round_trip(b in any::<bool>(), code in error_code()) {
        let mut op = Operand::missing();
        op.set(b).unwrap();
        prop_assert_eq!(op.get::<bool>().unwrap(), b);
        op.set(code).unwrap();
        prop_assert_eq!(op.get::<ErrorCode>().unwrap(), code);
    }

    #[test]
    fn strings_round_trip_or_truncate(s in ".{0,300}") {
        let op = Operand::string(&s);
        let back = op.get::<String>().unwrap();
        if s.len() <= 255 {
            prop_assert_eq!(&back, &s);
        } else {
            prop_assert!(back.len() <= 255);
            prop_assert!(back.len() > 251);
            prop_assert!(s.starts_with(&back));
            prop_assert_eq!(Operand::string(&s).get::<String>().unwrap(), back);
        }
        prop_assert_eq!(op.ownership(), Ownership::Library);
    }

    #[test]
    fn number_text_parses_back(x in any::<f64>().prop_filter("finite", |x| x.is_finite())) {
        let text = Operand::number(x).get::<String>().unwrap();
        prop_assert_eq!(text.parse::<f64>().unwrap(), x);
    }

    #[test]
    fn non_empty_strings_are_true(s in ".{1,40}") {
        prop_assert!(Operand::string(&s).get::<bool>().unwrap());
    }

    #[test]
    fn numbers_are_true_unless_zero(x in any::<f64>().prop_filter("comparable", |x| !x.is_nan())) {
        prop_assert_eq!(Operand::number(x).get::<bool>().unwrap(), x != 0.0);
    }

    #[test]
    fn matrix_views_need_a_matrix(op in non_matrix()) {
        let is_mismatch = matches!(op.as_matrix(), Err(XlKitError::TypeMismatch { .. }));
        prop_assert!(is_mismatch);
        let is_mismatch = matches!(op.get::<ConstCellMatrixRef>(), Err(XlKitError::TypeMismatch { .. }));
        prop_assert!(is_mismatch);
    }

    #[test]
    fn matrices_have_the_requested_shape(rows in 0usize..12, cols in 0usize..12, fill in non_matrix()) {
        let mut op = Operand::missing();
        op.set_matrix(rows, cols, Some(&fill)).unwrap();
        let m = op.as_matrix().unwrap();
        prop_assert_eq!((m.rows(), m.cols()), (rows, cols));
        prop_assert_eq!(m.len(), rows * cols);
        for cell in m.iter() {
            prop_assert_eq!(cell.kind(), fill.kind());
            prop_assert_eq!(cell.to_string(), fill.to_string());
        }
    }
}

#[test]
fn default_fill_is_missing() {
    let mut op = Operand::missing();
    op.set_matrix(2, 2, None).unwrap();
    let m = op.as_matrix().unwrap();
    for i in 0..2 {
        for j in 0..2 {
            assert!(m[(i, j)].is_missing());
        }
    }
}
