//! Registry tests

use crate::runtime::scheduler::registry::{handle_for_test, Registry, SlotHandle};
use proptest::prelude::*;
use std::collections::HashMap;

#[test]
fn test_add_get_remove() {
    let mut registry = Registry::new();
    let a = registry.add("a");
    let b = registry.add("b");
    assert_ne!(a, b);
    assert_eq!(registry.get(a), Some(&"a"));
    assert_eq!(registry.get(b), Some(&"b"));
    assert_eq!(registry.len(), 2);

    assert_eq!(registry.remove_at(a), Some("a"));
    assert!(!registry.contains(a));
    assert_eq!(registry.remove_at(a), None);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unallocated_handle_is_rejected() {
    let mut registry: Registry<u8> = Registry::new();
    let never = handle_for_test(7);
    assert_eq!(registry.get(never), None);
    assert!(registry.get_mut(never).is_none());
    assert_eq!(registry.remove_at(never), None);
    assert!(registry.is_empty());
}

#[test]
fn test_freed_slot_is_reused_first() {
    let mut registry = Registry::new();
    let handles: Vec<SlotHandle> = (0..4).map(|i| registry.add(i)).collect();
    registry.remove_at(handles[1]);
    registry.remove_at(handles[3]);

    // Most recently freed first.
    assert_eq!(registry.add(10), handles[3]);
    assert_eq!(registry.add(11), handles[1]);
    assert_eq!(registry.slot_count(), 4);
}

#[test]
fn test_remove_then_add_returns_same_handle() {
    let mut registry = Registry::new();
    let h = registry.add(1u8);
    registry.remove_at(h);
    assert_eq!(registry.add(2u8), h);
    assert_eq!(registry.get(h), Some(&2));
}

#[test]
fn test_capacity_doubles() {
    let mut registry = Registry::new();
    for i in 0..16 {
        registry.add(i);
    }
    assert_eq!(registry.slot_count(), 16);
    assert!(registry.capacity() >= 16);
    registry.add(16);
    assert!(registry.capacity() >= 32);
}

#[test]
fn test_drain_with_visits_every_live_entry() {
    let mut registry = Registry::new();
    let a = registry.add("a");
    registry.add("b");
    registry.add("c");
    registry.remove_at(a);

    let mut seen = Vec::new();
    registry.drain_with(|_, v| seen.push(v));
    seen.sort_unstable();
    assert_eq!(seen, vec!["b", "c"]);
    assert!(registry.is_empty());
    assert_eq!(registry.slot_count(), 0);
}

#[test]
fn test_clear_invalidates_handles() {
    let mut registry = Registry::new();
    let a = registry.add(1);
    registry.clear();

    assert!(registry.get(a).is_none());
    assert_eq!(registry.add(2), a);
}

#[derive(Debug, Clone)]
enum Op {
    Add(u32),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u32>().prop_map(Op::Add),
        any::<usize>().prop_map(Op::Remove),
    ]
}

proptest! {
    /// Slot count never exceeds the peak number of live entries.
    #[test]
    fn prop_memory_bounded_by_peak_live(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let mut registry = Registry::new();
        let mut model: HashMap<SlotHandle, u32> = HashMap::new();
        let mut live: Vec<SlotHandle> = Vec::new();
        let mut peak = 0usize;

        for op in ops {
            match op {
                Op::Add(value) => {
                    let handle = registry.add(value);
                    prop_assert!(!model.contains_key(&handle));
                    model.insert(handle, value);
                    live.push(handle);
                }
                Op::Remove(pick) if !live.is_empty() => {
                    let handle = live.swap_remove(pick % live.len());
                    prop_assert_eq!(registry.remove_at(handle), model.remove(&handle));
                }
                Op::Remove(_) => {}
            }
            peak = peak.max(live.len());
            prop_assert_eq!(registry.len(), live.len());
            prop_assert!(registry.slot_count() <= peak);
        }

        for (handle, value) in &model {
            prop_assert_eq!(registry.get(*handle), Some(value));
        }
    }
}
