//! Unit tests for GcError

use core_types::{CellPtr, GcError, GcResult, HeapAddr, NurseryAddr, TenuredAddr};

#[cfg(test)]
mod error_display_tests {
    use super::*;

    #[test]
    fn test_address_errors_name_the_address() {
        let addr = NurseryAddr::new(1, 0x80);
        assert_eq!(
            GcError::InvalidNurseryAddress(addr).to_string(),
            "no cell at nursery[1:0x80]"
        );
        assert_eq!(
            GcError::Forwarded(addr).to_string(),
            "cell nursery[1:0x80] has been forwarded to the tenured heap"
        );
        assert_eq!(
            GcError::DanglingBuffer(HeapAddr(0x1000)).to_string(),
            "dangling buffer heap@0x1000"
        );
        assert_eq!(
            GcError::DanglingCell(CellPtr::Tenured(TenuredAddr(4))).to_string(),
            "dangling cell pointer tenured#4"
        );
    }

    #[test]
    fn test_out_of_memory_reports_size() {
        let err = GcError::OutOfMemory { bytes: 64 };
        assert_eq!(err.to_string(), "out of memory allocating 64 bytes");
    }
}

#[cfg(test)]
mod error_propagation_tests {
    use super::*;

    fn lookup(found: bool) -> GcResult<u32> {
        if found {
            Ok(1)
        } else {
            Err(GcError::NurseryDisabled)
        }
    }

    fn chained(found: bool) -> GcResult<u32> {
        let value = lookup(found)?;
        Ok(value + 1)
    }

    #[test]
    fn test_question_mark_propagates() {
        assert_eq!(chained(true), Ok(2));
        assert_eq!(chained(false), Err(GcError::NurseryDisabled));
    }

    #[test]
    fn test_errors_are_std_errors() {
        let err: Box<dyn std::error::Error> = Box::new(GcError::CollectionInProgress);
        assert_eq!(err.to_string(), "a collection is already in progress");
    }
}
