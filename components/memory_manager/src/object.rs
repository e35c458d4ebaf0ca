//! Object representation for nursery and tenured cells.
//!
//! Every cell holds a [`JsObject`]: a header (class, alloc kind, shape), a
//! fixed number of inline slots decided by its [`AllocKind`], and pointers to
//! out-of-line dynamic slots and elements.

use std::sync::Arc;

use core_types::{BufferPtr, Value, CELL_HEADER_SIZE, SLOT_SIZE};

use crate::shape::Shape;

/// Slots reserved at the front of an array cell for the elements header.
pub const ELEMENTS_HEADER_SLOTS: usize = 2;

/// Size class of a cell, named after its fixed slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllocKind {
    /// No fixed slots
    Object0,
    /// Two fixed slots
    Object2,
    /// Four fixed slots
    Object4,
    /// Six fixed slots
    Object6,
    /// Eight fixed slots
    Object8,
    /// Twelve fixed slots
    Object12,
    /// Sixteen fixed slots
    Object16,
}

impl AllocKind {
    /// All kinds, smallest first.
    pub const ALL: [AllocKind; 7] = [
        AllocKind::Object0,
        AllocKind::Object2,
        AllocKind::Object4,
        AllocKind::Object6,
        AllocKind::Object8,
        AllocKind::Object12,
        AllocKind::Object16,
    ];

    /// Number of fixed slots carried by cells of this kind.
    pub fn fixed_slots(self) -> usize {
        match self {
            AllocKind::Object0 => 0,
            AllocKind::Object2 => 2,
            AllocKind::Object4 => 4,
            AllocKind::Object6 => 6,
            AllocKind::Object8 => 8,
            AllocKind::Object12 => 12,
            AllocKind::Object16 => 16,
        }
    }

    /// Size in bytes of a cell of this kind.
    pub fn thing_size(self) -> usize {
        CELL_HEADER_SIZE + self.fixed_slots() * SLOT_SIZE
    }

    /// Smallest kind with at least `slots` fixed slots.
    pub fn for_slots(slots: usize) -> Option<AllocKind> {
        Self::ALL.into_iter().find(|kind| kind.fixed_slots() >= slots)
    }

    /// Kind for an array whose elements should be stored inline.
    ///
    /// Arrays too large for any inline capacity get `Object0`; their elements
    /// must live out of line.
    pub fn for_array(elements: usize) -> AllocKind {
        Self::for_slots(elements + ELEMENTS_HEADER_SLOTS).unwrap_or(AllocKind::Object0)
    }
}

/// Class of an object, deciding how its elements are accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    /// Ordinary object with named properties
    Plain,
    /// Array whose elements are values
    Array,
    /// Typed array whose backing store is measured in bytes
    TypedArray {
        /// Length of the backing store in bytes
        byte_length: usize,
    },
}

/// Bookkeeping stored in front of an element buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementsHeader {
    /// Number of elements the storage can hold
    pub capacity: u32,
    /// Number of elements written so far
    pub initialized_length: u32,
}

/// An object as stored in a nursery or tenured cell.
#[derive(Debug, Clone)]
pub struct JsObject {
    /// Object class
    pub class: ObjectClass,
    /// Size class the cell was allocated with
    pub kind: AllocKind,
    /// Property layout
    pub shape: Arc<Shape>,
    /// Inline slots (inline elements for arrays and typed arrays)
    pub fixed_slots: Vec<Value>,
    /// Out-of-line dynamic slots
    pub slots: BufferPtr,
    /// Capacity of the dynamic slot buffer
    pub slot_capacity: u32,
    /// Out-of-line or inline element storage
    pub elements: BufferPtr,
    /// Elements bookkeeping
    pub elements_header: ElementsHeader,
}

impl JsObject {
    /// Creates an object with empty payloads.
    pub fn new(class: ObjectClass, kind: AllocKind, shape: Arc<Shape>) -> Self {
        JsObject {
            class,
            kind,
            shape,
            fixed_slots: vec![Value::Undefined; Self::fixed_capacity(class, kind)],
            slots: BufferPtr::Empty,
            slot_capacity: 0,
            elements: BufferPtr::Empty,
            elements_header: ElementsHeader::default(),
        }
    }

    /// Number of usable fixed slots for an object of `class` in a `kind` cell.
    ///
    /// Arrays give up [`ELEMENTS_HEADER_SLOTS`] of their slots to the
    /// elements header.
    pub fn fixed_capacity(class: ObjectClass, kind: AllocKind) -> usize {
        match class {
            ObjectClass::Array => kind.fixed_slots().saturating_sub(ELEMENTS_HEADER_SLOTS),
            _ => kind.fixed_slots(),
        }
    }

    /// Returns true for arrays.
    pub fn is_array(&self) -> bool {
        self.class == ObjectClass::Array
    }

    /// Returns true for typed arrays.
    pub fn is_typed_array(&self) -> bool {
        matches!(self.class, ObjectClass::TypedArray { .. })
    }

    /// Number of inline slots.
    pub fn num_fixed_slots(&self) -> usize {
        self.fixed_slots.len()
    }

    /// Number of dynamic slots holding live property values.
    pub fn num_dynamic_slots(&self) -> usize {
        if self.is_array() || self.is_typed_array() {
            return 0;
        }
        (self.shape.slot_span() as usize).saturating_sub(self.num_fixed_slots())
    }

    /// Returns true if the elements live in this object's own fixed slots.
    pub fn has_fixed_elements(&self) -> bool {
        matches!(self.elements, BufferPtr::Fixed(_))
    }

    /// Number of element entries that make up the backing store.
    ///
    /// Arrays count their full capacity; typed arrays count their byte length
    /// rounded up to whole slots.
    pub fn element_slots(&self) -> usize {
        match self.class {
            ObjectClass::Plain => 0,
            ObjectClass::Array => self.elements_header.capacity as usize,
            ObjectClass::TypedArray { byte_length } => byte_length.div_ceil(SLOT_SIZE),
        }
    }
}
