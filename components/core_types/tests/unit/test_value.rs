//! Unit tests for the Value enum

use core_types::{CellPtr, NurseryAddr, TenuredAddr, Value};

#[cfg(test)]
mod value_creation_tests {
    use super::*;

    #[test]
    fn test_value_primitives_are_not_objects() {
        for value in [
            Value::Undefined,
            Value::Null,
            Value::Boolean(true),
            Value::Smi(-3),
            Value::Double(0.5),
        ] {
            assert!(!value.is_object());
            assert_eq!(value.as_object(), None);
        }
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(7), Value::Smi(7));
        assert_eq!(Value::from(2.5), Value::Double(2.5));
        assert_eq!(Value::from(false), Value::Boolean(false));

        let ptr = CellPtr::Tenured(TenuredAddr(1));
        assert_eq!(Value::from(ptr), Value::Object(ptr));
    }
}

#[cfg(test)]
mod value_generation_tests {
    use super::*;

    #[test]
    fn test_nursery_object_is_detected() {
        let addr = NurseryAddr::new(3, 0x40);
        let young = Value::Object(CellPtr::Nursery(addr));
        assert!(young.is_nursery_object());
        assert_eq!(young.as_nursery(), Some(addr));
    }

    #[test]
    fn test_tenured_object_is_not_nursery() {
        let old = Value::Object(CellPtr::Tenured(TenuredAddr(9)));
        assert!(old.is_object());
        assert!(!old.is_nursery_object());
        assert_eq!(old.as_nursery(), None);
    }

    #[test]
    fn test_debug_shows_address() {
        let young = Value::Object(CellPtr::Nursery(NurseryAddr::new(0, 0x10)));
        assert_eq!(format!("{:?}", young), "Object(nursery[0:0x10])");
        assert_eq!(format!("{:?}", Value::Smi(4)), "Smi(4)");
    }
}
