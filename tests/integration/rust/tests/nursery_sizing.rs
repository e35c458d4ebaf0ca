//! Nursery Sizing Integration Tests
//!
//! Verifies the grow/shrink policy driven by the promotion rate and the
//! tenured ceiling that turns the nursery off.

use core_types::Value;
use integration_tests::{allocate_object6, small_config, small_context};
use memory_manager::{GcContext, GcReason, GROW_THRESHOLD, SHRINK_THRESHOLD};

/// Allocates `total` objects and roots the first `rooted` of them.
fn allocate_batch(cx: &mut GcContext, total: usize, rooted: usize) -> Vec<Value> {
    let mut roots = Vec::with_capacity(rooted);
    for i in 0..total {
        let obj = allocate_object6(cx);
        if i < rooted {
            roots.push(Value::Object(obj));
        }
    }
    roots
}

#[test]
fn test_thresholds() {
    assert_eq!(GROW_THRESHOLD, 0.5);
    assert_eq!(SHRINK_THRESHOLD, 0.1);
}

/// Test: a high promotion rate doubles the active chunks, a low one gives
/// one back
#[test]
fn test_grow_then_shrink() {
    let mut cx = small_context();
    assert_eq!(cx.nursery().active_chunks(), 1);

    let mut roots = allocate_batch(&mut cx, 10, 6);
    let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();
    assert!((report.promotion_rate - 0.6).abs() < 1e-9);
    assert_eq!(report.active_chunks_before, 1);
    assert_eq!(report.active_chunks_after, 2);
    assert_eq!(cx.nursery().active_chunks(), 2);
    assert_eq!(cx.stats().times_grown, 1);

    let mut roots = allocate_batch(&mut cx, 20, 1);
    let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();
    assert!((report.promotion_rate - 0.05).abs() < 1e-9);
    assert_eq!(report.active_chunks_after, 1);
    assert_eq!(cx.nursery().active_chunks(), 1);
    assert_eq!(cx.stats().times_shrunk, 1);
}

/// Test: a rate between the thresholds leaves the nursery alone
#[test]
fn test_moderate_rate_keeps_size() {
    let mut cx = small_context();
    let mut roots = allocate_batch(&mut cx, 10, 3);

    let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();

    assert_eq!(report.active_chunks_before, report.active_chunks_after);
    assert_eq!(cx.stats().times_grown, 0);
    assert_eq!(cx.stats().times_shrunk, 0);
}

/// Test: growth stops at the number of reserved chunks
#[test]
fn test_growth_capped_at_reserved_chunks() {
    let mut cx = small_context();
    for _ in 0..4 {
        let mut roots = allocate_batch(&mut cx, 4, 4);
        cx.collect(&mut roots, GcReason::Explicit).unwrap();
    }
    assert_eq!(cx.nursery().active_chunks(), cx.nursery().num_chunks());
}

/// Test: an active chunk that fills up spills allocation into the next one
#[test]
fn test_allocation_spans_active_chunks() {
    let mut cx = small_context();
    let mut roots = allocate_batch(&mut cx, 10, 10);
    cx.collect(&mut roots, GcReason::Explicit).unwrap();
    assert_eq!(cx.nursery().active_chunks(), 2);

    // 64 objects fill chunk 0 exactly; the next one lands in chunk 1.
    let mut roots = allocate_batch(&mut cx, 65, 0);
    assert_eq!(cx.nursery().current_chunk(), 1);
    assert_eq!(cx.nursery().position(), 64);

    let report = cx.collect(&mut roots, GcReason::OutOfNursery).unwrap().unwrap();
    assert_eq!(report.reason, GcReason::OutOfNursery);
    assert_eq!(report.objects_promoted, 0);
    assert_eq!(cx.nursery().current_chunk(), 0);
    assert_eq!(cx.nursery().position(), 0);
}

/// Test: exceeding the tenured ceiling disables the nursery until it is
/// re-enabled
#[test]
fn test_tenured_ceiling_disables_nursery() {
    integration_tests::init_logging();
    let config = small_config().with_max_tenured_bytes(100);
    let mut cx = GcContext::new(config).unwrap();

    let mut roots = allocate_batch(&mut cx, 2, 2);
    let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();
    assert!(report.nursery_disabled);
    assert!(!cx.nursery().is_enabled());

    let direct = allocate_object6(&mut cx);
    assert!(!direct.is_nursery());
    roots.push(Value::Object(direct));
    assert_eq!(cx.collect(&mut roots, GcReason::Explicit).unwrap(), None);

    cx.enable_nursery();
    let young = allocate_object6(&mut cx);
    assert!(young.is_nursery());
}

/// Test: disabling the nursery first evicts everything still in it
#[test]
fn test_disable_nursery_evicts_survivors() {
    let mut cx = small_context();
    let obj = allocate_object6(&mut cx);
    cx.define_property(obj, "k", Value::Smi(7)).unwrap();
    let mut roots = vec![Value::Object(obj)];

    cx.disable_nursery(&mut roots).unwrap();

    assert!(!cx.nursery().is_enabled());
    let moved = roots[0].as_object().unwrap();
    assert!(!moved.is_nursery());
    assert_eq!(cx.get_property(moved, "k").unwrap(), Some(Value::Smi(7)));
    assert_eq!(cx.stats().minor_collections, 1);
}
