//! Opaque handle bookkeeping.
//!
//! Every object the application can name lives in a [`HandleTable`] inside the
//! process-wide [`Registry`]. A raw handle packs the table's kind tag in the
//! top 8 bits, a 24 bit generation counter below it and `slot index + 1` in
//! the lower 32 bits. Zero is never a live handle, a destroyed handle stays
//! invalid after its slot is reused, and a handle of one kind never resolves
//! in another kind's table.

use std::fmt;
use std::sync::Arc;

use openxr::sys;
use parking_lot::RwLock;

use crate::error::XrError;
use crate::instance::Instance;
use crate::session::Session;
use crate::space::Space;
use crate::swapchain::Swapchain;
use crate::types::Result;

struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

const GENERATION_MASK: u32 = (1 << 24) - 1;

pub struct HandleTable<T> {
    tag: u8,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> HandleTable<T> {
    /// A table whose handles carry `tag`, which must be non-zero and unique
    /// among the tables of a registry.
    pub fn new(tag: u8) -> Self {
        Self {
            tag,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: Arc<T>) -> u64 {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 1,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        pack(self.tag, slot.generation, index)
    }

    fn slot_index(&self, raw: u64) -> Option<(u32, usize)> {
        let (tag, generation, index) = unpack(raw)?;
        (tag == self.tag).then_some((generation, index as usize))
    }

    pub fn get(&self, raw: u64) -> Option<&Arc<T>> {
        let (generation, index) = self.slot_index(raw)?;
        let slot = self.slots.get(index)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn remove(&mut self, raw: u64) -> Option<Arc<T>> {
        let (generation, index) = self.slot_index(raw)?;
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = (slot.generation.wrapping_add(1) & GENERATION_MASK).max(1);
        self.free.push(index as u32);
        Some(value)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

fn pack(tag: u8, generation: u32, index: u32) -> u64 {
    (u64::from(tag) << 56)
        | (u64::from(generation & GENERATION_MASK) << 32)
        | (u64::from(index) + 1)
}

fn unpack(raw: u64) -> Option<(u8, u32, u32)> {
    let low = (raw & 0xffff_ffff) as u32;
    let index = low.checked_sub(1)?;
    let high = (raw >> 32) as u32;
    Some(((high >> 24) as u8, high & GENERATION_MASK, index))
}

/// Maps a `sys` handle type to the runtime object it names.
pub trait XrHandle: Copy + fmt::Debug {
    type Object: Send + Sync + 'static;
    /// Used in "invalid handle" diagnostics.
    const KIND: &'static str;

    fn table(registry: &Registry) -> &RwLock<HandleTable<Self::Object>>;
    fn from_raw(raw: u64) -> Self;
    fn into_raw(self) -> u64;
}

macro_rules! impl_xr_handle {
    ($handle:ty => $object:ty, $field:ident, $kind:literal) => {
        impl XrHandle for $handle {
            type Object = $object;
            const KIND: &'static str = $kind;

            fn table(registry: &Registry) -> &RwLock<HandleTable<Self::Object>> {
                &registry.$field
            }

            fn from_raw(raw: u64) -> Self {
                <$handle>::from_raw(raw)
            }

            fn into_raw(self) -> u64 {
                <$handle>::into_raw(self)
            }
        }
    };
}

impl_xr_handle!(sys::Instance => Instance, instances, "instance");
impl_xr_handle!(sys::Session => Session, sessions, "session");
impl_xr_handle!(sys::Swapchain => Swapchain, swapchains, "swapchain");
impl_xr_handle!(sys::Space => Space, spaces, "space");

/// Every live object, keyed by handle.
pub struct Registry {
    instances: RwLock<HandleTable<Instance>>,
    sessions: RwLock<HandleTable<Session>>,
    swapchains: RwLock<HandleTable<Swapchain>>,
    spaces: RwLock<HandleTable<Space>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            instances: RwLock::new(HandleTable::new(1)),
            sessions: RwLock::new(HandleTable::new(2)),
            swapchains: RwLock::new(HandleTable::new(3)),
            spaces: RwLock::new(HandleTable::new(4)),
        }
    }
}

impl Registry {
    pub fn get<H: XrHandle>(&self, handle: H) -> Result<Arc<H::Object>> {
        H::table(self)
            .read()
            .get(handle.into_raw())
            .cloned()
            .ok_or(XrError::HandleInvalid(H::KIND))
    }

    pub fn insert<H: XrHandle>(&self, object: H::Object) -> H {
        H::from_raw(H::table(self).write().insert(Arc::new(object)))
    }

    pub fn remove<H: XrHandle>(&self, handle: H) -> Result<Arc<H::Object>> {
        H::table(self)
            .write()
            .remove(handle.into_raw())
            .ok_or(XrError::HandleInvalid(H::KIND))
    }

    #[cfg(test)]
    pub fn count<H: XrHandle>(&self) -> usize {
        H::table(self).read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_never_null() {
        let mut table = HandleTable::new(1);
        let raw = table.insert(Arc::new("a"));
        assert_ne!(raw, 0);
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(raw).map(|v| **v), Some("a"));
    }

    #[test]
    fn stale_handles_stay_invalid_after_reuse() {
        let mut table = HandleTable::new(1);
        let first = table.insert(Arc::new(1));
        assert_eq!(table.remove(first).map(|v| *v), Some(1));
        assert!(table.remove(first).is_none());

        let second = table.insert(Arc::new(2));
        assert_ne!(first, second);
        assert!(table.get(first).is_none());
        assert_eq!(table.get(second).map(|v| **v), Some(2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unknown_slots_are_rejected() {
        let mut table: HandleTable<u8> = HandleTable::new(1);
        assert!(table.get(pack(1, 1, 40)).is_none());
        assert!(table.remove(u64::MAX).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn handles_only_resolve_in_their_own_table() {
        let mut left = HandleTable::new(1);
        let mut right = HandleTable::new(2);
        let a = left.insert(Arc::new('a'));
        let b = right.insert(Arc::new('b'));
        assert_ne!(a, b);
        assert_eq!(a & 0xffff_ffff, b & 0xffff_ffff);
        assert!(left.get(b).is_none());
        assert!(right.get(a).is_none());
        assert!(right.remove(a).is_none());
        assert_eq!(left.get(a).map(|v| **v), Some('a'));
    }

    #[test]
    fn generations_wrap_without_touching_the_tag() {
        let mut table = HandleTable::new(0xff);
        table.slots.push(Slot {
            generation: GENERATION_MASK,
            value: None,
        });
        table.free.push(0);
        let old = table.insert(Arc::new(1));
        table.remove(old).unwrap();
        let new = table.insert(Arc::new(2));
        assert_eq!(new >> 56, 0xff);
        assert_eq!(unpack(new).map(|(_, generation, _)| generation), Some(1));
        assert!(table.get(old).is_none());
    }

    #[test]
    fn registry_reports_handle_kind() {
        let registry = Registry::default();
        let err = registry.get(sys::Session::NULL).unwrap_err();
        assert_eq!(err.to_string(), "Invalid session handle");
        assert_eq!(err.code(), sys::Result::ERROR_HANDLE_INVALID);
        assert_eq!(registry.count::<sys::Space>(), 0);
    }
}
