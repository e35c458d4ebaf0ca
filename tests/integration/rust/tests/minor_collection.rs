//! Minor Collection Integration Tests
//!
//! Drives complete minor collections and checks that the object graph
//! survives promotion intact.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use core_types::{CellPtr, Value};
use integration_tests::{allocate_object6, small_context, OBJECT6_SIZE};
use memory_manager::{
    AllocKind, CollectionPhase, GcContext, GcReason, ObjectClass, RootSet, Shape, SweepState,
};

fn object_at(value: &Value) -> CellPtr {
    value.as_object().expect("root holds an object")
}

/// Test: 10 objects in one 4 KB chunk, 3 of them rooted
#[test]
fn test_scenario_three_of_ten_survive() {
    let mut cx = small_context();
    let mut roots = RootSet::new();

    for i in 0..10 {
        let obj = allocate_object6(&mut cx);
        cx.define_property(obj, "id", Value::Smi(i)).unwrap();
        cx.define_property(obj, "half", Value::Double(i as f64 / 2.0)).unwrap();
        if i % 4 == 0 {
            roots.push(Value::Object(obj));
        }
    }
    assert_eq!(roots.len(), 3);
    assert_eq!(cx.nursery().position(), 10 * OBJECT6_SIZE);

    let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();

    assert_eq!(report.objects_promoted, 3);
    assert_eq!(cx.tenured().len(), 3);
    assert_eq!(cx.nursery().position(), 0);
    assert!((report.promotion_rate - 0.3).abs() < 1e-9);
    assert_eq!(report.active_chunks_before, 1);
    assert_eq!(report.active_chunks_after, 1);

    for (root, id) in roots.stack.iter().zip([0, 4, 8]) {
        let moved = object_at(root);
        assert!(!moved.is_nursery());
        assert_eq!(cx.get_property(moved, "id").unwrap(), Some(Value::Smi(id)));
        assert_eq!(
            cx.get_property(moved, "half").unwrap(),
            Some(Value::Double(id as f64 / 2.0))
        );
    }
}

/// Test: slots, inline elements and out-of-line elements keep their contents
#[test]
fn test_content_preservation_across_payload_layouts() {
    let mut cx = small_context();

    let wide = cx
        .allocate_object(ObjectClass::Plain, AllocKind::Object2, Shape::empty())
        .unwrap();
    for i in 0..10 {
        cx.define_property(wide, &format!("p{}", i), Value::Smi(i * 10))
            .unwrap();
    }

    let inline = cx.allocate_array(4).unwrap();
    for i in 0..4 {
        cx.set_element(inline, i, Value::Smi(i as i32 + 100)).unwrap();
    }

    let grown = cx.allocate_array(2).unwrap();
    for i in 0..12 {
        cx.set_element(grown, i, Value::Boolean(i % 2 == 0)).unwrap();
    }

    let bytes = cx.allocate_typed_array(40).unwrap();
    cx.set_element(bytes, 4, Value::Double(2.25)).unwrap();

    let mut roots = vec![
        Value::Object(wide),
        Value::Object(inline),
        Value::Object(grown),
        Value::Object(bytes),
    ];
    let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();
    assert_eq!(report.objects_promoted, 4);

    let wide = object_at(&roots[0]);
    for i in 0..10 {
        assert_eq!(
            cx.get_property(wide, &format!("p{}", i)).unwrap(),
            Some(Value::Smi(i * 10))
        );
    }

    let inline = object_at(&roots[1]);
    for i in 0..4 {
        assert_eq!(cx.get_element(inline, i).unwrap(), Value::Smi(i as i32 + 100));
    }

    let grown = object_at(&roots[2]);
    for i in 0..12 {
        assert_eq!(cx.get_element(grown, i).unwrap(), Value::Boolean(i % 2 == 0));
    }

    let bytes = object_at(&roots[3]);
    assert_eq!(cx.get_element(bytes, 4).unwrap(), Value::Double(2.25));
    assert_eq!(cx.get_element(bytes, 0).unwrap(), Value::Smi(0));

    cx.verify_no_nursery_pointers().unwrap();
}

/// Test: a graph hanging off one root leaves no nursery pointers behind
#[test]
fn test_no_dangling_nursery_pointers() {
    let mut cx = small_context();

    let root = cx.allocate_array(0).unwrap();
    for i in 0..20 {
        let node = allocate_object6(&mut cx);
        let leaf = allocate_object6(&mut cx);
        cx.define_property(node, "leaf", Value::Object(leaf)).unwrap();
        cx.define_property(leaf, "n", Value::Smi(i)).unwrap();
        cx.set_element(root, i as u32, Value::Object(node)).unwrap();
    }

    let mut roots = vec![Value::Object(root)];
    let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();
    assert_eq!(report.objects_promoted, 41);

    assert!(!roots[0].is_nursery_object());
    cx.verify_no_nursery_pointers().unwrap();

    let root = object_at(&roots[0]);
    for i in 0..20 {
        let node = object_at(&cx.get_element(root, i).unwrap());
        let leaf = object_at(&cx.get_property(node, "leaf").unwrap().unwrap());
        assert_eq!(cx.get_property(leaf, "n").unwrap(), Some(Value::Smi(i as i32)));
    }
}

/// Test: a cycle inside the nursery is promoted exactly once per object
#[test]
fn test_cycle_promoted_once() {
    let mut cx = small_context();

    let a = allocate_object6(&mut cx);
    let b = allocate_object6(&mut cx);
    let c = allocate_object6(&mut cx);
    cx.define_property(a, "next", Value::Object(b)).unwrap();
    cx.define_property(b, "next", Value::Object(c)).unwrap();
    cx.define_property(c, "next", Value::Object(a)).unwrap();
    cx.define_property(a, "self", Value::Object(a)).unwrap();

    let mut roots = vec![Value::Object(a), Value::Object(c)];
    let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();

    assert_eq!(report.objects_promoted, 3);
    assert_eq!(cx.tenured().len(), 3);

    let a = object_at(&roots[0]);
    let b = object_at(&cx.get_property(a, "next").unwrap().unwrap());
    let c = object_at(&cx.get_property(b, "next").unwrap().unwrap());
    assert_eq!(c, object_at(&roots[1]));
    assert_eq!(cx.get_property(c, "next").unwrap(), Some(Value::Object(a)));
    assert_eq!(cx.get_property(a, "self").unwrap(), Some(Value::Object(a)));
}

/// Test: collecting an empty nursery does nothing
#[test]
fn test_empty_collection_is_idempotent() {
    let mut cx = small_context();
    let obj = allocate_object6(&mut cx);
    let mut roots = vec![Value::Object(obj)];

    cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();
    let chunks = cx.nursery().active_chunks();
    let stats = cx.stats().clone();
    let tenured = cx.tenured().len();

    for _ in 0..3 {
        assert_eq!(cx.collect(&mut roots, GcReason::Explicit).unwrap(), None);
    }
    assert_eq!(cx.nursery().active_chunks(), chunks);
    assert_eq!(cx.stats(), &stats);
    assert_eq!(cx.tenured().len(), tenured);
}

/// Test: objects allocated after a collection can reference promoted ones
#[test]
fn test_repeated_collections_keep_graph() {
    let mut cx = small_context();
    let first = allocate_object6(&mut cx);
    cx.define_property(first, "gen", Value::Smi(1)).unwrap();
    let mut roots = vec![Value::Object(first)];
    cx.collect(&mut roots, GcReason::Explicit).unwrap();

    let second = allocate_object6(&mut cx);
    cx.define_property(second, "prev", roots[0].clone()).unwrap();
    roots.push(Value::Object(second));
    cx.collect(&mut roots, GcReason::Explicit).unwrap();

    let second = object_at(&roots[1]);
    assert_eq!(cx.get_property(second, "prev").unwrap(), Some(roots[0].clone()));
    assert_eq!(cx.stats().minor_collections, 2);
    assert_eq!(cx.stats().objects_promoted, 2);
    cx.verify_no_nursery_pointers().unwrap();
}

/// Test: the collector works against a tenured heap chosen by the embedding
#[test]
fn test_custom_tenured_heap() {
    let config = integration_tests::small_config();
    let tenured = memory_manager::TenuredHeap::with_capacity(Some(8));
    let mut cx = GcContext::with_tenured(config, tenured).unwrap();

    let obj = allocate_object6(&mut cx);
    let mut roots = vec![Value::Object(obj)];
    cx.collect(&mut roots, GcReason::Shutdown).unwrap().unwrap();
    assert_eq!(cx.tenured().len(), 1);
}

/// Test: a pending background sweep is joined before rooting
#[test]
fn test_background_sweep_joined_before_collection() {
    let mut cx = small_context();
    let swept = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&swept);
    cx.start_background_sweep(move || {
        thread::sleep(Duration::from_millis(20));
        flag.store(true, Ordering::SeqCst);
    });

    let obj = allocate_object6(&mut cx);
    let mut roots = vec![Value::Object(obj)];
    cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();

    assert!(swept.load(Ordering::SeqCst));
    assert_eq!(cx.background_sweep().state(), SweepState::Idle);
    assert_eq!(cx.phase(), CollectionPhase::Idle);
}
