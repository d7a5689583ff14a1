//! Dense matrix container operations from spec.md §4.3.

use gua::matrix::MatrixData;
use gua::value::Value;

#[test]
fn filled_constructor_uniform_value() {
    let m = MatrixData::filled(smallvec::smallvec![2, 3], Value::Integer(5)).unwrap();
    assert_eq!(m.len(), 6);
    for r in 0..2 {
        for c in 0..3 {
            match m.get(&[r, c]).unwrap() {
                Value::Integer(5) => {}
                other => panic!("expected every cell to be 5, got {other:?}"),
            }
        }
    }
}

#[test]
fn from_rows_enumerates_row_major() {
    let m = MatrixData::from_rows(2, 2, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(4)]).unwrap();
    match m.get(&[0, 1]).unwrap() {
        Value::Integer(2) => {}
        other => panic!("expected row 0 col 1 to be 2, got {other:?}"),
    }
    match m.get(&[1, 0]).unwrap() {
        Value::Integer(3) => {}
        other => panic!("expected row 1 col 0 to be 3, got {other:?}"),
    }
}

#[test]
fn ident_times_matrix_is_matrix() {
    let a = MatrixData::from_rows(2, 2, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(4)]).unwrap();
    let id = MatrixData::ident(2).unwrap();
    let product = a.matmul(&id).unwrap();
    assert!(product.is_approx_equal(&a, 1e-9));
}

#[test]
fn inverse_round_trips_to_identity() {
    let a = MatrixData::from_rows(2, 2, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(4)]).unwrap();
    let inv = a.inv().unwrap();
    let product = a.matmul(&inv).unwrap();
    let id = MatrixData::ident(2).unwrap();
    assert!(product.is_approx_equal(&id, 1e-9));
}

#[test]
fn singular_matrix_inverse_fails() {
    let a = MatrixData::from_rows(2, 2, vec![Value::Integer(1), Value::Integer(2), Value::Integer(2), Value::Integer(4)]).unwrap();
    let err = a.inv().unwrap_err();
    assert_eq!(err.status, gua::status::Status::Singular);
}

#[test]
fn addition_commutes() {
    let a = MatrixData::from_rows(2, 2, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(4)]).unwrap();
    let b = MatrixData::from_rows(2, 2, vec![Value::Integer(5), Value::Integer(6), Value::Integer(7), Value::Integer(8)]).unwrap();
    let ab = a.add(&b).unwrap();
    let ba = b.add(&a).unwrap();
    assert!(ab.is_equal(&ba));
}

#[test]
fn nested_container_cell_is_rejected() {
    let nested = Value::Array(std::rc::Rc::new(std::cell::RefCell::new(gua::array::ArrayData::new())));
    let err = MatrixData::filled(smallvec::smallvec![1, 1], nested).unwrap_err();
    assert_eq!(err.status, gua::status::Status::IllegalAssignment);
}
