//! Fixed-list repository: eternal handles for a closed name table.

use super::{Handle, HandleType};

/// The server-side contact lists every connection exposes.
pub const CONTACT_LIST_NAMES: [&str; 4] = ["subscribe", "publish", "stored", "deny"];

/// Repository whose handles come from a fixed name table given at
/// construction. Handles are 1-based positions in the table and live as long
/// as the repository; there is no refcounting to get wrong.
pub struct FixedRepo {
    handle_type: HandleType,
    names: Vec<Box<str>>,
}

impl FixedRepo {
    pub fn new(handle_type: HandleType, names: &[&str]) -> Self {
        Self {
            handle_type,
            names: names.iter().map(|&n| Box::from(n)).collect(),
        }
    }

    /// The standard contact-list repository.
    pub fn contact_lists() -> Self {
        Self::new(HandleType::List, &CONTACT_LIST_NAMES)
    }

    #[inline(always)]
    pub fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline(always)]
    pub fn is_valid(&self, h: Handle) -> bool {
        (h.get() as usize) <= self.names.len()
    }

    pub fn lookup(&self, name: &str) -> Option<Handle> {
        let pos = self.names.iter().position(|n| &**n == name)?;
        Handle::from_raw(pos as u32 + 1)
    }

    pub fn inspect(&self, h: Handle) -> Option<&str> {
        self.names.get(h.get() as usize - 1).map(|n| &**n)
    }

    /// Every (handle, name) pair in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &str)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| Handle::from_raw(i as u32 + 1).map(|h| (h, &**n)))
    }
}
