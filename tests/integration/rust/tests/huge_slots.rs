//! Huge Payload Integration Tests
//!
//! Payloads too large for the nursery live in the general heap and are
//! tracked by the huge registry while their owner is young.

use core_types::{BufferPtr, HeapAddr, Value};
use integration_tests::{allocate_object6, small_context};
use memory_manager::{AllocKind, GcReason, ObjectClass, Shape};

fn heap_elements(cx: &memory_manager::GcContext, value: &Value) -> HeapAddr {
    let object = cx.object(value.as_object().unwrap()).unwrap();
    object.elements.as_heap().expect("elements live in the general heap")
}

/// Test: a surviving huge element buffer keeps its address and leaves the
/// registry
#[test]
fn test_huge_elements_survive_in_place() {
    let mut cx = small_context();
    let array = cx.allocate_array(64).unwrap();
    for i in 0..64 {
        cx.set_element(array, i, Value::Smi(i as i32 * 3)).unwrap();
    }

    let mut roots = vec![Value::Object(array)];
    let before = heap_elements(&cx, &roots[0]);
    assert!(cx.huge_slots().contains(before));

    let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();
    assert_eq!(report.objects_promoted, 1);

    assert_eq!(heap_elements(&cx, &roots[0]), before);
    assert!(cx.huge_slots().is_empty());
    assert!(cx.malloc_heap().contains(before));

    let array = roots[0].as_object().unwrap();
    for i in 0..64 {
        assert_eq!(cx.get_element(array, i).unwrap(), Value::Smi(i as i32 * 3));
    }
}

/// Test: dynamic slots that outgrow the nursery limit are kept in place
#[test]
fn test_huge_dynamic_slots_survive_in_place() {
    let mut cx = small_context();
    let obj = cx
        .allocate_object(ObjectClass::Plain, AllocKind::Object0, Shape::empty())
        .unwrap();
    for i in 0..20 {
        cx.define_property(obj, &format!("f{}", i), Value::Smi(i))
            .unwrap();
    }

    let slots = cx.object(obj).unwrap().slots;
    let addr = slots.as_heap().expect("grown past the nursery slot limit");
    assert_eq!(cx.huge_slots().len(), 1);

    let mut roots = vec![Value::Object(obj)];
    cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();

    let moved = roots[0].as_object().unwrap();
    assert_eq!(cx.object(moved).unwrap().slots, BufferPtr::Heap(addr));
    assert!(cx.huge_slots().is_empty());
    for i in 0..20 {
        assert_eq!(
            cx.get_property(moved, &format!("f{}", i)).unwrap(),
            Some(Value::Smi(i))
        );
    }
}

/// Test: a huge buffer whose owner dies is freed by the sweep
#[test]
fn test_dead_huge_buffer_freed() {
    let mut cx = small_context();
    let dead = cx.allocate_array(64).unwrap();
    let addr = heap_elements(&cx, &Value::Object(dead));
    let survivor = allocate_object6(&mut cx);

    let mut roots = vec![Value::Object(survivor)];
    cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();

    assert!(!cx.malloc_heap().contains(addr));
    assert!(cx.huge_slots().is_empty());
}

/// Test: reallocating a huge buffer keeps the registry pointing at the
/// live address
#[test]
fn test_reallocated_huge_buffer_tracked() {
    let mut cx = small_context();
    let array = cx.allocate_array(32).unwrap();
    cx.set_element(array, 200, Value::Boolean(true)).unwrap();

    let addr = heap_elements(&cx, &Value::Object(array));
    assert!(cx.huge_slots().contains(addr));
    assert_eq!(cx.huge_slots().len(), 1);

    let mut roots = vec![Value::Object(array)];
    cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();

    let array = roots[0].as_object().unwrap();
    assert_eq!(cx.get_element(array, 200).unwrap(), Value::Boolean(true));
    assert_eq!(cx.get_element(array, 5).unwrap(), Value::Undefined);
    assert!(cx.huge_slots().is_empty());
}

/// Test: slots handed over at allocation are tracked like huge payloads
#[test]
fn test_initial_slots_tracked_until_promotion() {
    let mut cx = small_context();
    let shape = Shape::empty().add_property("a").add_property("b");
    let obj = cx
        .allocate_object_with_slots(
            AllocKind::Object0,
            shape,
            vec![Value::Smi(1), Value::Smi(2)],
        )
        .unwrap();
    assert_eq!(cx.huge_slots().len(), 1);

    let mut roots = vec![Value::Object(obj)];
    cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();

    let moved = roots[0].as_object().unwrap();
    assert_eq!(cx.get_property(moved, "a").unwrap(), Some(Value::Smi(1)));
    assert_eq!(cx.get_property(moved, "b").unwrap(), Some(Value::Smi(2)));
    assert!(cx.huge_slots().is_empty());
}
