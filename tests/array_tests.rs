//! Associative-array container operations from spec.md §4.3.

use gua::array::ArrayData;
use gua::value::Value;

#[test]
fn set_appends_new_key_and_overwrites_existing() {
    let mut a = ArrayData::new();
    a.set(Value::string(b"x".to_vec()), Value::Integer(1)).unwrap();
    a.set(Value::string(b"y".to_vec()), Value::Integer(2)).unwrap();
    assert_eq!(a.len(), 2);

    a.set(Value::string(b"x".to_vec()), Value::Integer(99)).unwrap();
    assert_eq!(a.len(), 2, "overwriting an existing key must not append");
    match a.get(&Value::string(b"x".to_vec())) {
        Value::Integer(99) => {}
        other => panic!("expected overwritten value 99, got {other:?}"),
    }
}

#[test]
fn unset_removes_exactly_one_element() {
    let mut a = ArrayData::new();
    a.set(Value::Integer(0), Value::Integer(10)).unwrap();
    a.set(Value::Integer(1), Value::Integer(20)).unwrap();
    assert!(a.unset(&Value::Integer(0)));
    assert_eq!(a.len(), 1);
    assert!(a.get(&Value::Integer(0)).is_unknown());
}

#[test]
fn keys_returns_sequential_array_of_original_keys() {
    let mut a = ArrayData::new();
    a.set(Value::string(b"x".to_vec()), Value::Integer(1)).unwrap();
    a.set(Value::string(b"y".to_vec()), Value::Integer(2)).unwrap();

    let ks = a.keys();
    assert_eq!(ks.len(), a.len());
    match ks.get(&Value::Integer(0)) {
        Value::String(s) => assert_eq!(&s[..], b"x"),
        other => panic!("expected key 'x' at position 0, got {other:?}"),
    }
}

#[test]
fn nested_containers_are_rejected_as_element_values() {
    let mut a = ArrayData::new();
    let nested = ArrayData::new();
    let err = a
        .set(Value::Integer(0), Value::Array(std::rc::Rc::new(std::cell::RefCell::new(nested))))
        .unwrap_err();
    assert_eq!(err.status, gua::status::Status::IllegalAssignment);
}

#[test]
fn is_equal_is_order_sensitive() {
    let mut a = ArrayData::new();
    a.set(Value::Integer(0), Value::Integer(1)).unwrap();
    a.set(Value::Integer(1), Value::Integer(2)).unwrap();

    let mut b = ArrayData::new();
    b.set(Value::Integer(0), Value::Integer(2)).unwrap();
    b.set(Value::Integer(1), Value::Integer(1)).unwrap();

    assert!(!a.is_equal(&b), "same elements in a different order must not be equal");

    let mut c = ArrayData::new();
    c.set(Value::Integer(0), Value::Integer(1)).unwrap();
    c.set(Value::Integer(1), Value::Integer(2)).unwrap();
    assert!(a.is_equal(&c));
}

#[test]
fn to_string_literal_renders_values_only() {
    let mut a = ArrayData::new();
    a.set(Value::string(b"key".to_vec()), Value::Integer(7)).unwrap();
    assert_eq!(a.to_string_literal(), "{7}");
}
