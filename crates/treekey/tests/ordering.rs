//! Integration tests for key ordering and segment framing.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use treekey::{EdgeValue, Key, KeyError, KeySegment, KeyValue, Null, AFTER, BEFORE};

fn key_of(values: &[&dyn KeySegmentRef]) -> Key {
    let mut key = Key::new();
    for value in values {
        value.append_ref(&mut key);
    }
    key
}

/// Object-safe adapter so tests can build keys from mixed value lists.
trait KeySegmentRef {
    fn append_ref(&self, key: &mut Key);
}

impl<T: KeySegment> KeySegmentRef for T {
    fn append_ref(&self, key: &mut Key) {
        key.append(self).expect("append should succeed");
    }
}

fn assert_ascending(keys: &[Key]) {
    for pair in keys.windows(2) {
        assert!(pair[0] < pair[1], "{} should sort before {}", pair[0], pair[1]);
    }
}

#[test]
fn second_segment_breaks_ties() {
    let mut a = Key::new();
    a.clear().append(1i32).unwrap().append(2i32).unwrap();
    let mut b = Key::new();
    b.clear().append(1i32).unwrap().append(3i32).unwrap();
    assert!(a < b);
}

#[test]
fn signed_integers_in_numeric_order() {
    assert_ascending(&[key_of(&[&-5i32]), key_of(&[&5i32]), key_of(&[&500_000i32])]);
}

#[test]
fn shorter_string_sorts_first() {
    assert!(key_of(&[&"AB"]) < key_of(&[&"ABC"]));
}

#[test]
fn multi_segment_order() {
    assert_ascending(&[
        key_of(&[&1i32, &1i32]),
        key_of(&[&1i32, &2i32]),
        key_of(&[&2i32, &1i32]),
        key_of(&[&2i32, &1i32, &0i32]),
    ]);
}

#[test]
fn decimals_with_trailing_zeros() {
    let with_zeros = BigDecimal::from_str("99.00").unwrap();
    let plain = BigDecimal::from_str("99").unwrap();
    let hundred = BigDecimal::from_str("100").unwrap();

    let mut key = key_of(&[&with_zeros, &plain]);
    key.reset();
    let first = key.decode_big_decimal().unwrap();
    let second = key.decode_big_decimal().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_bigint_and_exponent(), (BigInt::from(9900), 2));
    assert_eq!(second.as_bigint_and_exponent(), (BigInt::from(99), 0));

    assert!(key_of(&[&with_zeros]) < key_of(&[&hundred]));
    assert!(key_of(&[&plain]) < key_of(&[&hundred]));
}

#[test]
fn append_after_edge_is_structural() {
    let mut key = key_of(&[&"k", &AFTER]);
    let bytes = key.encoded_bytes().to_vec();
    let err = key.append(1i32).unwrap_err();
    assert!(matches!(err, KeyError::Structural(_)));
    assert_eq!(key.encoded_bytes(), bytes.as_slice());
}

#[test]
fn integer_boundaries_in_order() {
    let mut keys = Vec::new();
    let boundaries = [
        i64::MIN,
        i64::from(i32::MIN) - 1,
        -129,
        -128,
        -1,
        0,
        1,
        127,
        128,
        i64::from(i32::MAX) + 1,
        i64::MAX,
    ];
    for v in boundaries {
        keys.push(key_of(&[&v]));
    }
    assert_ascending(&keys);

    let mut keys = Vec::new();
    for v in [i16::MIN, -1, 0, 1, i16::MAX] {
        keys.push(key_of(&[&v]));
    }
    assert_ascending(&keys);
}

#[test]
fn doubles_in_order() {
    let values = [
        f64::NEG_INFINITY,
        f64::MIN,
        -1.0,
        -f64::MIN_POSITIVE,
        -0.0,
        0.0,
        5e-324,
        1.0,
        f64::MAX,
        f64::INFINITY,
    ];
    let keys: Vec<Key> = values.iter().map(|v| key_of(&[v])).collect();
    assert_ascending(&keys);
}

#[test]
fn strings_and_bytes_with_control_characters() {
    assert_ascending(&[
        key_of(&[&""]),
        key_of(&[&"\u{0}"]),
        key_of(&[&"\u{0}\u{0}"]),
        key_of(&[&"\u{1}"]),
        key_of(&[&"\u{2}"]),
        key_of(&[&"a"]),
        key_of(&[&"\u{7FF}"]),
        key_of(&[&"\u{FFFF}"]),
        key_of(&[&"\u{10000}"]),
    ]);
    assert_ascending(&[
        key_of(&[&vec![0u8]]),
        key_of(&[&vec![0u8, 0]]),
        key_of(&[&vec![1u8]]),
        key_of(&[&vec![1u8, 0]]),
        key_of(&[&vec![2u8]]),
    ]);
}

#[test]
fn type_rank_order() {
    assert_ascending(&[
        key_of(&[&BEFORE]),
        key_of(&[&Null]),
        key_of(&[&false]),
        key_of(&[&true]),
        key_of(&[&i8::MAX]),
        key_of(&[&i16::MIN]),
        key_of(&[&'\u{10FFFF}']),
        key_of(&[&i32::MIN]),
        key_of(&[&i64::MIN]),
        key_of(&[&f32::INFINITY]),
        key_of(&[&f64::NEG_INFINITY]),
        key_of(&[&BigInt::from(1)]),
        key_of(&[&BigDecimal::from(-1)]),
        key_of(&[&vec![0xFFu8]]),
        key_of(&[&""]),
        key_of(&[&AFTER]),
    ]);
}

#[test]
fn decode_in_append_order() {
    let values = vec![
        KeyValue::from("tenant"),
        KeyValue::from(7i64),
        KeyValue::Null,
        KeyValue::from(vec![0u8, 1, 2]),
        KeyValue::from(2.5f64),
        KeyValue::Edge(EdgeValue::After),
    ];
    let mut key = Key::new();
    for value in &values {
        key.append(value).unwrap();
    }
    assert_eq!(key.depth(), values.len());
    key.reset();
    for expected in &values {
        assert_eq!(&key.decode_any().unwrap(), expected);
    }
}

#[test]
fn cut_then_reappend_reproduces_bytes() {
    let mut key = key_of(&[&"a", &1i32, &"b", &2i64]);
    let original = key.encoded_bytes().to_vec();
    key.cut_n(2).unwrap();
    assert_eq!(key.depth(), 2);
    key.append("b").unwrap().append(2i64).unwrap();
    assert_eq!(key.encoded_bytes(), original.as_slice());
}

#[test]
fn depth_counts_terminated_segments() {
    let mut key = Key::new();
    for i in 0..6i32 {
        key.append(i).unwrap();
    }
    key.cut().unwrap();
    key.set_depth(-2).unwrap();
    key.append("x").unwrap();
    let terminators = key.encoded_bytes().iter().filter(|b| **b == 0).count();
    assert_eq!(key.depth(), terminators);
    assert_eq!(key.depth(), 4);
}
