//! Integration tests for cursor movement, traversal helpers and snapshots.

use std::collections::BTreeMap;

use treekey::{max_storable_key_size, EdgeValue, Key, KeyConfig, KeyError, KeyState, SegmentType};

fn path(parts: &[&str]) -> Key {
    let mut key = Key::new();
    for part in parts {
        key.append(*part).unwrap();
    }
    key
}

#[test]
fn walk_segments_forward_and_back() {
    let key = path(&["a", "bb", "ccc"]);
    let mut starts = vec![0];
    while let Some(next) = key.next_element_index(*starts.last().unwrap()) {
        starts.push(next);
    }
    assert_eq!(starts, vec![0, 3, 7, 12]);

    let mut back = vec![key.encoded_size()];
    while let Some(previous) = key.previous_element_index(*back.last().unwrap()) {
        back.push(previous);
    }
    back.reverse();
    assert_eq!(back, starts);
}

#[test]
fn index_to_then_decode() {
    let mut key = path(&["root", "child", "leaf"]);
    key.index_to(1).unwrap();
    assert_eq!(key.decode_type().unwrap(), SegmentType::String);
    assert_eq!(key.decode_string().unwrap(), "child");
    key.index_to(-1).unwrap();
    assert_eq!(key.decode_string().unwrap(), "leaf");
    assert!(matches!(key.decode_string(), Err(KeyError::MissingSegment { .. })));
    assert!(matches!(key.index_to(-4), Err(KeyError::Structural(_))));
}

#[test]
fn range_bounds_from_edges() {
    let mut tree = BTreeMap::new();
    for (user, item) in [("ann", 1i32), ("bob", 1), ("bob", 2), ("bob", 3), ("cat", 1)] {
        let mut key = Key::new();
        key.append(user).unwrap().append(item).unwrap();
        tree.insert(KeyState::new(&key), item);
    }

    let mut low = path(&["bob"]);
    low.append(EdgeValue::Before).unwrap();
    let mut high = low.clone();
    high.to(EdgeValue::After).unwrap();

    let items: Vec<i32> = tree
        .range(KeyState::new(&low)..KeyState::new(&high))
        .map(|(_, item)| *item)
        .collect();
    assert_eq!(items, vec![1, 2, 3]);
}

#[test]
fn nudges_position_between_neighbours() {
    let parent = path(&["p"]);
    let mut child = parent.clone();
    child.append(0i32).unwrap();

    let mut down = parent.clone();
    down.nudge_down();
    assert!(down < parent);

    let mut up = parent.clone();
    up.nudge_up();
    assert!(up > child);

    let mut up2 = parent.clone();
    up2.nudge_up2();
    assert!(parent < up2 && up2 < child);
}

#[test]
fn generation_tracks_mutation() {
    let mut key = Key::new();
    let g0 = key.generation();
    key.append(1i32).unwrap();
    let g1 = key.generation();
    assert!(g1 > g0);
    key.reset();
    key.decode_i32().unwrap();
    assert_eq!(key.generation(), g1);
    key.with_encoded_bytes_mut(|bytes| bytes[1] = 0x82);
    assert!(key.generation() > g1);
    key.reset();
    assert_eq!(key.decode_i32().unwrap(), 2);
}

#[test]
fn configured_size_limit() {
    assert!(matches!(Key::with_config(KeyConfig::with_max_size(0)), Err(KeyError::Config(_))));
    let mut key = Key::with_config(KeyConfig::with_max_size(16)).unwrap();
    key.append("0123456789").unwrap();
    assert_eq!(key.encoded_size(), 12);
    assert!(matches!(key.append("abcd"), Err(KeyError::Capacity { maximum: 16, .. })));
    key.append("ab").unwrap();
    assert_eq!(key.encoded_size(), 16);
}

#[test]
fn storable_keys() {
    let key = path(&["x"]);
    assert!(key.validate_for_store(16_384).is_ok());
    assert_eq!(max_storable_key_size(64), 16);
    let long = path(&["0123456789abcdef"]);
    assert!(matches!(long.validate_for_store(64), Err(KeyError::InvalidKey(_))));
}

#[test]
fn snapshots_restore_into_keys() {
    let key = path(&["a", "b"]);
    let state = KeyState::from(&key);
    let mut other = Key::new();
    state.copy_to(&mut other).unwrap();
    assert_eq!(other, key);
    assert_eq!(other.depth(), 2);
    assert_eq!(state.hash_code(), key.hash_code());

    let mut small = Key::with_config(KeyConfig::with_max_size(4)).unwrap();
    assert!(matches!(state.copy_to(&mut small), Err(KeyError::Capacity { .. })));
}
