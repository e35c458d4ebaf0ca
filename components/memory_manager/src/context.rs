//! The collector context.
//!
//! [`GcContext`] owns every piece of state the nursery subsystem touches: the
//! nursery itself, the tenured allocator, the general heap, the huge slots
//! registry, the store buffer and the fallback bitmap. Every entry point takes
//! the context explicitly; there is no ambient collector state.
//!
//! The mutator-facing half lives here (object allocation, property and
//! element access, the post-write barrier). Payload allocation lives in
//! `slots`, promotion in `promoter` and the collection driver in `minor_gc`.

use std::sync::Arc;

use core_types::{BufferPtr, CellPtr, GcError, GcResult, TenuredAddr, Value, ValueSlot};

use crate::background::BackgroundSweep;
use crate::config::NurseryConfig;
use crate::fallback::FallbackBitmap;
use crate::malloc_heap::MallocHeap;
use crate::minor_gc::{CollectionPhase, GcReason, MinorGcReport, NurseryStats};
use crate::nursery::{Nursery, NurseryCell};
use crate::object::{AllocKind, JsObject, ObjectClass};
use crate::shape::Shape;
use crate::slots::HugeSlotsRegistry;
use crate::store_buffer::StoreBuffer;
use crate::tenured::{TenuredAllocator, TenuredHeap};
use crate::tracer::{ObjectTracer, RootEnumerator, Tracer};

/// Owner of the nursery and its collaborators.
///
/// `A` is the tenured heap the collector promotes into.
pub struct GcContext<A: TenuredAllocator = TenuredHeap> {
    pub(crate) config: NurseryConfig,
    pub(crate) nursery: Nursery,
    pub(crate) tenured: A,
    pub(crate) malloc: MallocHeap,
    pub(crate) huge_slots: HugeSlotsRegistry,
    pub(crate) store_buffer: StoreBuffer,
    pub(crate) fallback: FallbackBitmap,
    pub(crate) tracer: Box<dyn Tracer>,
    pub(crate) background_sweep: BackgroundSweep,
    pub(crate) stats: NurseryStats,
    pub(crate) phase: CollectionPhase,
    /// Set when an allocation missed the enabled nursery since the last
    /// collection.
    pub(crate) nursery_exhausted: bool,
}

impl GcContext<TenuredHeap> {
    /// Creates a context with the default arena-backed tenured heap.
    ///
    /// # Arguments
    /// * `config` - Nursery configuration; validated before anything is reserved
    ///
    /// # Returns
    /// The context, or the error that prevented reserving the nursery
    pub fn new(config: NurseryConfig) -> GcResult<Self> {
        let tenured = TenuredHeap::with_capacity(config.tenured_capacity);
        Self::with_tenured(config, tenured)
    }
}

impl<A: TenuredAllocator> GcContext<A> {
    /// Creates a context promoting into a caller-supplied tenured heap.
    pub fn with_tenured(config: NurseryConfig, tenured: A) -> GcResult<Self> {
        let nursery = Nursery::init(&config)?;
        Ok(GcContext {
            fallback: FallbackBitmap::new(config.max_chunks, config.chunk_size),
            store_buffer: StoreBuffer::new(config.store_buffer_capacity),
            malloc: MallocHeap::with_limit(config.malloc_limit),
            huge_slots: HugeSlotsRegistry::new(),
            tracer: Box::new(ObjectTracer),
            background_sweep: BackgroundSweep::new(),
            stats: NurseryStats::default(),
            phase: CollectionPhase::Idle,
            nursery_exhausted: false,
            nursery,
            tenured,
            config,
        })
    }

    /// Replaces the object tracer.
    pub fn with_tracer(mut self, tracer: Box<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Configuration this context was created with.
    pub fn config(&self) -> &NurseryConfig {
        &self.config
    }

    /// The nursery space.
    pub fn nursery(&self) -> &Nursery {
        &self.nursery
    }

    /// The tenured heap.
    pub fn tenured(&self) -> &A {
        &self.tenured
    }

    /// The general heap holding out-of-line payloads.
    pub fn malloc_heap(&self) -> &MallocHeap {
        &self.malloc
    }

    /// Payload buffers owned by nursery objects but allocated outside it.
    pub fn huge_slots(&self) -> &HugeSlotsRegistry {
        &self.huge_slots
    }

    /// The tenured-to-nursery edge log.
    pub fn store_buffer(&self) -> &StoreBuffer {
        &self.store_buffer
    }

    /// Cumulative collection statistics.
    pub fn stats(&self) -> &NurseryStats {
        &self.stats
    }

    /// Phase of the collection state machine.
    pub fn phase(&self) -> CollectionPhase {
        self.phase
    }

    /// Hands sweep work of a major collection to the background thread.
    ///
    /// The next minor collection joins it before rooting.
    pub fn start_background_sweep<F>(&mut self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.background_sweep.start(job);
    }

    /// The background sweep handle.
    pub fn background_sweep(&self) -> &BackgroundSweep {
        &self.background_sweep
    }

    /// Re-enables nursery allocation with a single active chunk.
    pub fn enable_nursery(&mut self) {
        self.nursery.enable();
    }

    /// Empties the nursery with a final collection and disables it.
    ///
    /// Subsequent allocations go straight to the tenured heap.
    pub fn disable_nursery(&mut self, roots: &mut dyn RootEnumerator) -> GcResult<()> {
        self.collect(roots, GcReason::Explicit)?;
        self.nursery.disable();
        log::debug!("nursery disabled");
        Ok(())
    }

    /// Evicts the nursery for the last time, disables it and joins any
    /// background sweep.
    pub fn shutdown(&mut self, roots: &mut dyn RootEnumerator) -> GcResult<Option<MinorGcReport>> {
        let report = self.collect(roots, GcReason::Shutdown)?;
        self.nursery.disable();
        self.background_sweep.wait();
        log::debug!("nursery shut down");
        Ok(report)
    }

    /// Reason the embedding should collect for, if the mutator has run into
    /// a condition only a minor collection clears.
    ///
    /// # Returns
    /// `FullStoreBuffer` once the store buffer has overflowed, else
    /// `OutOfNursery` once an allocation missed the enabled nursery, else
    /// `None`
    pub fn pending_collection(&self) -> Option<GcReason> {
        if self.store_buffer.has_overflowed() {
            Some(GcReason::FullStoreBuffer)
        } else if self.nursery_exhausted && self.nursery.is_enabled() {
            Some(GcReason::OutOfNursery)
        } else {
            None
        }
    }

    // ---------------------------------------------------------------------
    // Object allocation
    // ---------------------------------------------------------------------

    /// Allocates an object of `kind`.
    ///
    /// The object is bump-allocated in the nursery when possible. When the
    /// nursery is exhausted or disabled it is allocated directly in the
    /// tenured heap. Dynamic slots for properties beyond the fixed capacity
    /// are allocated to match `shape`.
    ///
    /// # Arguments
    /// * `class` - Object class
    /// * `kind` - Size class of the cell
    /// * `shape` - Initial property layout
    ///
    /// # Returns
    /// Pointer to the new object
    pub fn allocate_object(
        &mut self,
        class: ObjectClass,
        kind: AllocKind,
        shape: Arc<Shape>,
    ) -> GcResult<CellPtr> {
        let object = JsObject::new(class, kind, shape);
        let dynamic = object.num_dynamic_slots();
        let ptr = self.place_object(object)?;

        if dynamic > 0 {
            let slots = self.allocate_slots(ptr, dynamic)?;
            let object = self.object_mut(ptr)?;
            object.slots = slots;
            object.slot_capacity = dynamic as u32;
        }
        Ok(ptr)
    }

    /// Allocates a plain object whose dynamic slots are supplied by the
    /// caller as an already allocated general-heap buffer.
    ///
    /// The buffer becomes owned by the object. If the object lands in the
    /// nursery the buffer is registered as huge so it is freed if the object
    /// dies young.
    pub fn allocate_object_with_slots(
        &mut self,
        kind: AllocKind,
        shape: Arc<Shape>,
        slots: Vec<Value>,
    ) -> GcResult<CellPtr> {
        let object = JsObject::new(ObjectClass::Plain, kind, shape);
        if slots.len() < object.num_dynamic_slots() {
            return Err(GcError::TypeError(format!(
                "{} dynamic slots supplied, shape needs {}",
                slots.len(),
                object.num_dynamic_slots()
            )));
        }
        let capacity = slots.len() as u32;
        let ptr = self.place_object(object)?;
        let buffer = BufferPtr::Heap(self.malloc.allocate_from(slots)?);

        let object = self.object_mut(ptr)?;
        object.slots = buffer;
        object.slot_capacity = capacity;
        self.notify_initial_slots(ptr, buffer);
        Ok(ptr)
    }

    /// Allocates an array able to hold `capacity` elements.
    ///
    /// Small arrays keep their elements inline in the cell's fixed slots;
    /// larger ones get an out-of-line element buffer.
    pub fn allocate_array(&mut self, capacity: usize) -> GcResult<CellPtr> {
        let kind = AllocKind::for_array(capacity);
        let inline = JsObject::fixed_capacity(ObjectClass::Array, kind);
        let ptr = self.place_object(JsObject::new(ObjectClass::Array, kind, Shape::empty()))?;

        if kind != AllocKind::Object0 && inline >= capacity {
            let object = self.object_mut(ptr)?;
            object.elements = BufferPtr::Fixed(ptr);
            object.elements_header.capacity = inline as u32;
        } else {
            let elements = self.allocate_elements(ptr, capacity)?;
            let object = self.object_mut(ptr)?;
            object.elements = elements;
            object.elements_header.capacity = capacity as u32;
        }
        Ok(ptr)
    }

    /// Allocates a zero-filled typed array of `byte_length` bytes.
    ///
    /// The backing store is one word per slot. It is kept inline when it fits
    /// the largest size class.
    pub fn allocate_typed_array(&mut self, byte_length: usize) -> GcResult<CellPtr> {
        let class = ObjectClass::TypedArray { byte_length };
        let words = byte_length.div_ceil(core_types::SLOT_SIZE);

        let (kind, inline) = match AllocKind::for_slots(words) {
            Some(kind) => (kind, true),
            None => (AllocKind::Object0, false),
        };
        let mut object = JsObject::new(class, kind, Shape::empty());
        object.elements_header = crate::object::ElementsHeader {
            capacity: words as u32,
            initialized_length: words as u32,
        };
        if inline {
            object.fixed_slots[..words].fill(Value::Smi(0));
        }
        let ptr = self.place_object(object)?;

        let elements = if inline {
            BufferPtr::Fixed(ptr)
        } else {
            let elements = self.allocate_elements(ptr, words)?;
            self.buffer_mut(elements)?.fill(Value::Smi(0));
            elements
        };
        self.object_mut(ptr)?.elements = elements;
        Ok(ptr)
    }

    /// Stores `object` in a fresh cell, nursery first.
    fn place_object(&mut self, object: JsObject) -> GcResult<CellPtr> {
        let kind = object.kind;
        if let Some(addr) = self.nursery.allocate(kind.thing_size()) {
            self.nursery.replace_cell(addr, NurseryCell::Object(object))?;
            return Ok(CellPtr::Nursery(addr));
        }

        if self.nursery.is_enabled() {
            self.nursery_exhausted = true;
        }
        let addr = self.tenured.allocate(kind).ok_or(GcError::OutOfMemory {
            bytes: kind.thing_size(),
        })?;
        self.tenured.initialize(addr, object)?;
        log::trace!("nursery full, allocated {:?} directly at {}", kind, addr);
        Ok(CellPtr::Tenured(addr))
    }

    // ---------------------------------------------------------------------
    // Cell and slot access
    // ---------------------------------------------------------------------

    /// Returns the object at `ptr`.
    pub fn object(&self, ptr: CellPtr) -> GcResult<&JsObject> {
        match ptr {
            CellPtr::Nursery(addr) => self.nursery.object(addr),
            CellPtr::Tenured(addr) => self.tenured.object(addr),
        }
    }

    pub(crate) fn object_mut(&mut self, ptr: CellPtr) -> GcResult<&mut JsObject> {
        match ptr {
            CellPtr::Nursery(addr) => self.nursery.object_mut(addr),
            CellPtr::Tenured(addr) => self.tenured.object_mut(addr),
        }
    }

    /// Returns the tenured address a promoted nursery cell was moved to.
    ///
    /// Forwarding records only exist until the end of the collection that
    /// installed them.
    pub fn forwarded_address(&self, ptr: CellPtr) -> Option<TenuredAddr> {
        match ptr {
            CellPtr::Nursery(addr) => self.nursery.forwarded(addr),
            CellPtr::Tenured(_) => None,
        }
    }

    /// Returns the values of a payload buffer.
    pub fn buffer(&self, buffer: BufferPtr) -> GcResult<&Vec<Value>> {
        match buffer {
            BufferPtr::Empty => Err(GcError::TypeError("empty payload buffer".to_string())),
            BufferPtr::Nursery(addr) => self.nursery.buffer(addr),
            BufferPtr::Heap(addr) => self.malloc.get(addr),
            BufferPtr::Fixed(cell) => Ok(&self.object(cell)?.fixed_slots),
        }
    }

    pub(crate) fn buffer_mut(&mut self, buffer: BufferPtr) -> GcResult<&mut Vec<Value>> {
        match buffer {
            BufferPtr::Empty => Err(GcError::TypeError("empty payload buffer".to_string())),
            BufferPtr::Nursery(addr) => self.nursery.buffer_mut(addr),
            BufferPtr::Heap(addr) => self.malloc.get_mut(addr),
            BufferPtr::Fixed(cell) => Ok(&mut self.object_mut(cell)?.fixed_slots),
        }
    }

    fn out_of_range(index: u32) -> GcError {
        GcError::TypeError(format!("slot index {} out of range", index))
    }

    /// Reads the value stored at `slot`.
    pub fn read_slot(&self, slot: ValueSlot) -> GcResult<Value> {
        let (values, index) = match slot {
            ValueSlot::Fixed { cell, index } => (&self.object(cell)?.fixed_slots, index),
            ValueSlot::Buffer { buffer, index } => (self.buffer(buffer)?, index),
        };
        values
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Self::out_of_range(index))
    }

    /// Stores `value` at `slot` without a write barrier.
    pub(crate) fn store_slot(&mut self, slot: ValueSlot, value: Value) -> GcResult<()> {
        let (values, index) = match slot {
            ValueSlot::Fixed { cell, index } => (&mut self.object_mut(cell)?.fixed_slots, index),
            ValueSlot::Buffer { buffer, index } => (self.buffer_mut(buffer)?, index),
        };
        let entry = values
            .get_mut(index as usize)
            .ok_or_else(|| Self::out_of_range(index))?;
        *entry = value;
        Ok(())
    }

    /// Stores `value` at `slot` and runs the post-write barrier.
    ///
    /// If the slot belongs to a tenured object and `value` points into the
    /// nursery, the slot is recorded in the store buffer so the next minor
    /// collection treats it as a root.
    pub fn write_value(&mut self, slot: ValueSlot, value: Value) -> GcResult<()> {
        let young = value.is_nursery_object();
        self.store_slot(slot, value)?;
        if young && self.is_tenured_location(slot) {
            self.store_buffer.put(slot);
        }
        Ok(())
    }

    /// Returns true if `slot` lives in memory owned by a tenured object.
    ///
    /// General-heap buffers registered as huge belong to nursery objects.
    pub(crate) fn is_tenured_location(&self, slot: ValueSlot) -> bool {
        match slot {
            ValueSlot::Fixed { cell, .. } => !cell.is_nursery(),
            ValueSlot::Buffer { buffer, .. } => match buffer {
                BufferPtr::Empty | BufferPtr::Nursery(_) => false,
                BufferPtr::Heap(addr) => !self.huge_slots.contains(addr),
                BufferPtr::Fixed(cell) => !cell.is_nursery(),
            },
        }
    }

    // ---------------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------------

    /// Location of property slot `slot` of the object at `ptr`.
    ///
    /// Slots below the fixed capacity live inline; the rest live in the
    /// dynamic slot buffer.
    pub fn slot_location(&self, ptr: CellPtr, slot: u32) -> GcResult<ValueSlot> {
        let object = self.object(ptr)?;
        if slot >= object.shape.slot_span() {
            return Err(Self::out_of_range(slot));
        }
        let fixed = object.num_fixed_slots() as u32;
        if slot < fixed {
            Ok(ValueSlot::Fixed {
                cell: ptr,
                index: slot,
            })
        } else {
            Ok(ValueSlot::Buffer {
                buffer: object.slots,
                index: slot - fixed,
            })
        }
    }

    /// Reads property slot `slot`.
    pub fn get_slot(&self, ptr: CellPtr, slot: u32) -> GcResult<Value> {
        self.read_slot(self.slot_location(ptr, slot)?)
    }

    /// Writes property slot `slot` through the write barrier.
    pub fn set_slot(&mut self, ptr: CellPtr, slot: u32, value: Value) -> GcResult<()> {
        let location = self.slot_location(ptr, slot)?;
        self.write_value(location, value)
    }

    /// Adds (or overwrites) the named property `name` and stores `value`.
    ///
    /// Adding a property beyond the fixed capacity grows the dynamic slot
    /// buffer, doubling its capacity.
    ///
    /// # Returns
    /// The slot index of the property
    pub fn define_property(&mut self, ptr: CellPtr, name: &str, value: Value) -> GcResult<u32> {
        let object = self.object(ptr)?;
        if object.class != ObjectClass::Plain {
            return Err(GcError::TypeError(format!(
                "cannot define property '{}' on {:?}",
                name, object.class
            )));
        }

        if let Some(slot) = object.shape.lookup_property(name) {
            self.set_slot(ptr, slot, value)?;
            return Ok(slot);
        }

        let shape = object.shape.add_property(name);
        let fixed = object.num_fixed_slots();
        let needed = (shape.slot_span() as usize).saturating_sub(fixed);
        let capacity = object.slot_capacity as usize;
        let old_slots = object.slots;

        if needed > capacity {
            let new_capacity = needed.max(capacity * 2);
            let slots = self.reallocate_slots(ptr, old_slots, capacity, new_capacity)?;
            let object = self.object_mut(ptr)?;
            object.slots = slots;
            object.slot_capacity = new_capacity as u32;
        }

        let slot = shape.slot_span() - 1;
        self.object_mut(ptr)?.shape = shape;
        self.set_slot(ptr, slot, value)?;
        Ok(slot)
    }

    /// Reads the named property, or `None` if the shape has no such property.
    pub fn get_property(&self, ptr: CellPtr, name: &str) -> GcResult<Option<Value>> {
        match self.object(ptr)?.shape.lookup_property(name) {
            Some(slot) => self.get_slot(ptr, slot).map(Some),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Elements
    // ---------------------------------------------------------------------

    fn element_location(object: &JsObject, ptr: CellPtr, index: u32) -> ValueSlot {
        if object.has_fixed_elements() {
            ValueSlot::Fixed { cell: ptr, index }
        } else {
            ValueSlot::Buffer {
                buffer: object.elements,
                index,
            }
        }
    }

    /// Reads element `index`.
    ///
    /// Array holes past the initialized length read as `undefined`.
    pub fn get_element(&self, ptr: CellPtr, index: u32) -> GcResult<Value> {
        let object = self.object(ptr)?;
        match object.class {
            ObjectClass::Plain => Err(GcError::TypeError(format!("{} has no elements", ptr))),
            ObjectClass::Array if index >= object.elements_header.initialized_length => {
                Ok(Value::Undefined)
            }
            ObjectClass::TypedArray { .. } if index >= object.elements_header.capacity => {
                Err(Self::out_of_range(index))
            }
            _ => self.read_slot(Self::element_location(object, ptr, index)),
        }
    }

    /// Writes element `index` through the write barrier.
    ///
    /// Arrays grow their element storage as needed. Typed arrays have a fixed
    /// length and only hold numbers.
    pub fn set_element(&mut self, ptr: CellPtr, index: u32, value: Value) -> GcResult<()> {
        let object = self.object(ptr)?;
        match object.class {
            ObjectClass::Plain => {
                return Err(GcError::TypeError(format!("{} has no elements", ptr)));
            }
            ObjectClass::TypedArray { .. } => {
                if value.is_object() {
                    return Err(GcError::TypeError(
                        "typed arrays cannot hold object references".to_string(),
                    ));
                }
                if index >= object.elements_header.capacity {
                    return Err(Self::out_of_range(index));
                }
            }
            ObjectClass::Array => {
                // The length must stay representable as a u32.
                if index == u32::MAX {
                    return Err(Self::out_of_range(index));
                }
                let capacity = object.elements_header.capacity as usize;
                if index as usize >= capacity {
                    let old = object.elements;
                    let new_capacity = (index as usize + 1)
                        .max(capacity * 2)
                        .min(u32::MAX as usize);
                    let elements = self.reallocate_elements(ptr, old, capacity, new_capacity)?;
                    let object = self.object_mut(ptr)?;
                    object.elements = elements;
                    object.elements_header.capacity = new_capacity as u32;
                }
            }
        }

        let location = Self::element_location(self.object(ptr)?, ptr, index);
        self.write_value(location, value)?;

        let header = &mut self.object_mut(ptr)?.elements_header;
        header.initialized_length = header.initialized_length.max(index.saturating_add(1));
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Verification
    // ---------------------------------------------------------------------

    /// Slots of `cell` that may hold references, as reported by the tracer.
    pub(crate) fn child_slots(&self, cell: CellPtr) -> GcResult<Vec<ValueSlot>> {
        let object = self.object(cell)?;
        let mut slots = Vec::new();
        self.tracer
            .trace_children(object, cell, &mut |slot| slots.push(slot));
        Ok(slots)
    }

    /// Checks that no tenured object refers into the nursery.
    ///
    /// This holds right after a collection, before the mutator creates new
    /// tenured-to-nursery edges.
    ///
    /// # Returns
    /// `GcError::DanglingCell` naming the first nursery pointer found
    pub fn verify_no_nursery_pointers(&self) -> GcResult<()> {
        for addr in self.tenured.cells() {
            let cell = CellPtr::Tenured(addr);
            let object = self.tenured.object(addr)?;
            for buffer in [object.slots, object.elements] {
                if let BufferPtr::Nursery(inner) = buffer {
                    return Err(GcError::DanglingCell(CellPtr::Nursery(inner)));
                }
            }
            for slot in self.child_slots(cell)? {
                if let Some(target) = self.read_slot(slot)?.as_nursery() {
                    return Err(GcError::DanglingCell(CellPtr::Nursery(target)));
                }
            }
        }
        Ok(())
    }
}
