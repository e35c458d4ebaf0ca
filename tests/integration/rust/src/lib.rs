//! Integration test suite for the nursery collector
//!
//! This crate provides scenario tests that drive the memory manager through
//! complete minor collections across component boundaries.

use core_types::CellPtr;
use memory_manager::{AllocKind, GcContext, NurseryConfig, ObjectClass, Shape};

/// Re-export components for test convenience
pub mod components {
    pub use core_types;
    pub use memory_manager;
}

/// Size of a cell with six fixed slots.
pub const OBJECT6_SIZE: usize = 64;

/// Routes collector logging to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A nursery of 4 KB chunks, one of them active, with room to grow to four.
pub fn small_config() -> NurseryConfig {
    NurseryConfig::default()
        .with_chunk_size(4096)
        .with_max_chunks(4)
        .with_max_nursery_slots(16)
}

/// Creates a context over [`small_config`].
pub fn small_context() -> GcContext {
    init_logging();
    GcContext::new(small_config()).expect("valid test configuration")
}

/// Allocates a plain 64-byte object.
pub fn allocate_object6(cx: &mut GcContext) -> CellPtr {
    cx.allocate_object(ObjectClass::Plain, AllocKind::Object6, Shape::empty())
        .expect("allocation succeeds")
}
