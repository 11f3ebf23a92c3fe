use openxr::sys;
use std::ffi::c_void;

/// The header every chainable OpenXR struct starts with.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct NextChainStructBase {
    pub ty: sys::StructureType,
    pub next: *const NextChainStructBase,
}

/// Walks the `next` pointer chain of an input struct.
pub struct NextChain {
    current: *const NextChainStructBase,
}

impl NextChain {
    /// # Safety
    ///
    /// `next` must be null or point to a valid chain of OpenXR structs that
    /// outlives the iterator.
    pub unsafe fn new(next: *const c_void) -> Self {
        Self {
            current: next.cast(),
        }
    }
}

impl Iterator for NextChain {
    type Item = *const NextChainStructBase;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_null() {
            return None;
        }
        let base = self.current;
        self.current = unsafe { (*base).next };
        Some(base)
    }
}
