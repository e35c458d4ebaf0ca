//! Memory Manager - Generational nursery and minor garbage collector
//!
//! This component provides:
//! - A chunked nursery with bump-pointer allocation and grow/shrink policy
//! - Inline payload allocation with a huge-payload registry
//! - Promotion of surviving objects into the tenured heap
//! - The minor collection driver with store buffer and overflow fallback
//! - A post-write barrier recording tenured-to-nursery edges
//!
//! # Example
//!
//! ```
//! use core_types::Value;
//! use memory_manager::{AllocKind, GcContext, GcReason, NurseryConfig, ObjectClass, Shape};
//!
//! let mut cx = GcContext::new(NurseryConfig::default().with_chunk_size(4096)).unwrap();
//! let obj = cx
//!     .allocate_object(ObjectClass::Plain, AllocKind::Object4, Shape::empty())
//!     .unwrap();
//! cx.define_property(obj, "x", Value::Smi(1)).unwrap();
//!
//! let mut roots = vec![Value::Object(obj)];
//! let report = cx.collect(&mut roots, GcReason::Explicit).unwrap().unwrap();
//! assert_eq!(report.objects_promoted, 1);
//!
//! let moved = roots[0].as_object().unwrap();
//! assert_eq!(cx.get_property(moved, "x").unwrap(), Some(Value::Smi(1)));
//! ```

pub mod background;
pub mod config;
pub mod context;
pub mod fallback;
pub mod malloc_heap;
pub mod minor_gc;
pub mod nursery;
pub mod object;
pub mod promoter;
pub mod shape;
pub mod slots;
pub mod store_buffer;
pub mod tenured;
pub mod tracer;

// Re-export main types
pub use background::{BackgroundSweep, SweepState};
pub use config::{NurseryConfig, GROW_THRESHOLD, MIN_CHUNK_SIZE, SHRINK_THRESHOLD};
pub use context::GcContext;
pub use fallback::FallbackBitmap;
pub use malloc_heap::MallocHeap;
pub use minor_gc::{CollectionPhase, GcReason, MinorGcReport, NurseryStats};
pub use nursery::{Nursery, NurseryCell, RelocationOverlay};
pub use object::{AllocKind, ElementsHeader, JsObject, ObjectClass, ELEMENTS_HEADER_SLOTS};
pub use promoter::MinorCollectionSession;
pub use shape::{PropertyDescriptor, Shape};
pub use slots::HugeSlotsRegistry;
pub use store_buffer::StoreBuffer;
pub use tenured::{TenuredAllocator, TenuredHeap};
pub use tracer::{ObjectTracer, RootEnumerator, RootSet, Tracer};
