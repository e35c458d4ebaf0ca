//! Shapes describing object property layout.
//!
//! A shape is an immutable list of property descriptors. Every lineage starts
//! at one process-wide empty shape, and each shape caches the children derived
//! from it, so objects that add the same properties in the same order end up
//! with the same `Arc<Shape>`. A property's slot index decides where its value
//! lives: fixed slots first, then dynamic slots.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

/// A property descriptor for a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    /// Name of the property
    pub name: String,
    /// Slot index holding the property's value
    pub slot: u32,
}

/// Property layout shared by objects of the same construction history.
///
/// # Example
///
/// ```
/// use memory_manager::Shape;
///
/// let empty = Shape::empty();
/// let with_x = empty.add_property("x");
/// let with_xy = with_x.add_property("y");
///
/// assert_eq!(with_xy.lookup_property("x"), Some(0));
/// assert_eq!(with_xy.lookup_property("y"), Some(1));
/// assert_eq!(with_xy.slot_span(), 2);
/// ```
#[derive(Debug)]
pub struct Shape {
    /// Last property added, `None` for the empty shape
    property: Option<PropertyDescriptor>,
    /// Shape this one was derived from
    parent: Option<Arc<Shape>>,
    /// Number of slots used by all properties in the lineage
    slot_span: u32,
    /// Children derived from this shape, by added property name
    ///
    /// Weak so that a child kept alive only by this table can be dropped.
    transitions: Mutex<HashMap<String, Weak<Shape>>>,
}

impl Shape {
    /// Returns the shared empty shape every lineage starts from.
    pub fn empty() -> Arc<Shape> {
        static EMPTY: OnceLock<Arc<Shape>> = OnceLock::new();
        Arc::clone(EMPTY.get_or_init(|| {
            Arc::new(Shape {
                property: None,
                parent: None,
                slot_span: 0,
                transitions: Mutex::new(HashMap::new()),
            })
        }))
    }

    /// Adds a property, returning the derived shape.
    ///
    /// Adding a property that already exists returns a clone of `self`.
    /// Otherwise the cached transition is reused while some object still
    /// holds it.
    pub fn add_property(self: &Arc<Self>, name: &str) -> Arc<Shape> {
        if self.lookup_property(name).is_some() {
            return Arc::clone(self);
        }

        let mut transitions = self
            .transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = transitions.get(name).and_then(Weak::upgrade) {
            return existing;
        }

        let child = Arc::new(Shape {
            property: Some(PropertyDescriptor {
                name: name.to_string(),
                slot: self.slot_span,
            }),
            parent: Some(Arc::clone(self)),
            slot_span: self.slot_span + 1,
            transitions: Mutex::new(HashMap::new()),
        });
        transitions.insert(name.to_string(), Arc::downgrade(&child));
        child
    }

    /// Looks up a property by name and returns its slot index.
    pub fn lookup_property(&self, name: &str) -> Option<u32> {
        let mut shape = Some(self);
        while let Some(current) = shape {
            if let Some(prop) = &current.property {
                if prop.name == name {
                    return Some(prop.slot);
                }
            }
            shape = current.parent.as_deref();
        }
        None
    }

    /// Number of slots occupied by properties of this shape.
    pub fn slot_span(&self) -> u32 {
        self.slot_span
    }

    /// Returns the property descriptors, oldest first.
    pub fn properties(&self) -> Vec<PropertyDescriptor> {
        let mut props = Vec::with_capacity(self.slot_span as usize);
        let mut shape = Some(self);
        while let Some(current) = shape {
            if let Some(prop) = &current.property {
                props.push(prop.clone());
            }
            shape = current.parent.as_deref();
        }
        props.reverse();
        props
    }
}
