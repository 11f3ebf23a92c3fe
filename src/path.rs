use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::Arc;

use openxr::sys;
use parking_lot::RwLock;

use crate::error::XrError;
use crate::types::Result;

#[derive(Default)]
struct Atoms {
    strings: Vec<Arc<CStr>>,
    ids: HashMap<Arc<CStr>, u32>,
}

/// Interned path strings of one instance.
///
/// Atoms are dense and zero-based; the `XrPath` handed to the application is
/// the atom plus one so that `XR_NULL_PATH` is never issued. Atoms are never
/// recycled while the instance lives.
#[derive(Default)]
pub struct PathTable {
    atoms: RwLock<Atoms>,
}

impl PathTable {
    pub fn string_to_path(&self, path: &CStr) -> sys::Path {
        if let Some(&atom) = self.atoms.read().ids.get(path) {
            return to_path(atom);
        }
        let mut atoms = self.atoms.write();
        // Another thread may have interned it between the two locks.
        if let Some(&atom) = atoms.ids.get(path) {
            return to_path(atom);
        }
        let atom = atoms.strings.len() as u32;
        let interned: Arc<CStr> = Arc::from(CString::from(path));
        atoms.strings.push(interned.clone());
        atoms.ids.insert(interned, atom);
        to_path(atom)
    }

    pub fn path_to_string(&self, path: sys::Path) -> Result<Arc<CStr>> {
        let raw = path.into_raw();
        let atom = raw
            .checked_sub(1)
            .and_then(|atom| usize::try_from(atom).ok())
            .ok_or(XrError::PathInvalid(raw))?;
        self.atoms
            .read()
            .strings
            .get(atom)
            .cloned()
            .ok_or(XrError::PathInvalid(raw))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.atoms.read().strings.len()
    }
}

fn to_path(atom: u32) -> sys::Path {
    sys::Path::from_raw(u64::from(atom) + 1)
}
