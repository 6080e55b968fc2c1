//! Dynamic handle repository. Interns strings, recycles values, tracks holders.
//!
//! One repository per handle category, owned by the connection object and
//! passed by reference to every consumer. Single-threaded by construction;
//! all mutation happens on the loop thread that drives bus and network I/O.

use std::any::Any;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

#[cfg(debug_assertions)]
use core::panic::Location;

use crate::intset::IntSet;
use crate::metrics::HandleMetrics;

use super::set::HandleSet;
use super::{validate_holder_name, Handle, HandleType, HolderError, RawHandle};

/// Per-handle state: canonical string, direct refcount, annotations.
struct Entry {
    text: Rc<str>,
    refcount: u32,
    qdata: Vec<(u32, Box<dyn Any>)>,
    #[cfg(debug_assertions)]
    ref_sites: Vec<&'static Location<'static>>,
}

impl Entry {
    fn new(text: Rc<str>) -> Self {
        Self {
            text,
            refcount: 0,
            qdata: Vec::new(),
            #[cfg(debug_assertions)]
            ref_sites: Vec::new(),
        }
    }
}

/// Authority for one handle category.
///
/// Entries live while their refcount is ≥ 1 (holder pins are refs taken
/// through the holder's internal set) or, transiently, between `request` and
/// the first reference. Freed values go back to a min-heap unless the freed
/// handle was the most recent allocation, in which case the high-water mark
/// is undone instead.
pub struct DynamicRepo {
    handle_type: HandleType,
    /// Dense slab indexed by handle value. Slot 0 is permanently empty.
    entries: Vec<Option<Entry>>,
    index: HashMap<Rc<str>, Handle>,
    free: BinaryHeap<Reverse<u32>>,
    /// Smallest value never yet allocated.
    next_fresh: u32,
    holders: HashMap<String, HandleSet>,
    metrics: HandleMetrics,
}

impl DynamicRepo {
    pub fn new(handle_type: HandleType) -> Self {
        Self {
            handle_type,
            entries: vec![None],
            index: HashMap::new(),
            free: BinaryHeap::new(),
            next_fresh: 1,
            holders: HashMap::new(),
            metrics: HandleMetrics::new(),
        }
    }

    #[inline(always)]
    pub fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    #[inline(always)]
    pub fn metrics(&self) -> &HandleMetrics {
        &self.metrics
    }

    /// Number of live entries.
    #[inline(always)]
    pub fn live_handles(&self) -> usize {
        self.index.len()
    }

    #[inline(always)]
    fn entry(&self, h: Handle) -> Option<&Entry> {
        self.entries.get(h.get() as usize).and_then(|s| s.as_ref())
    }

    #[inline(always)]
    fn entry_mut(&mut self, h: Handle) -> Option<&mut Entry> {
        self.entries
            .get_mut(h.get() as usize)
            .and_then(|s| s.as_mut())
    }

    /// True iff `h` has a live entry. Never panics.
    #[inline(always)]
    pub fn is_valid(&self, h: Handle) -> bool {
        self.entry(h).is_some()
    }

    /// Bulk validity pre-check. Zero elements pass iff `allow_zero`.
    pub fn are_valid(&self, handles: &[RawHandle], allow_zero: bool) -> bool {
        handles.iter().all(|&raw| match Handle::from_raw(raw) {
            Some(h) => self.is_valid(h),
            None => allow_zero,
        })
    }

    /// Take a direct reference on `h`.
    ///
    /// `h` must be valid; callers validate first. Violation is a fatal
    /// programming error, not a recoverable condition.
    #[track_caller]
    pub fn ref_handle(&mut self, h: Handle) {
        #[cfg(debug_assertions)]
        let site = Location::caller();
        let kind = self.handle_type;
        let entry = self
            .entry_mut(h)
            .unwrap_or_else(|| panic!("ref of invalid {} handle {h}", kind.as_str()));
        entry.refcount += 1;
        #[cfg(debug_assertions)]
        entry.ref_sites.push(site);
    }

    /// Drop a direct reference on `h`. The last reference destroys the entry
    /// and recycles the value.
    #[track_caller]
    pub fn unref_handle(&mut self, h: Handle) {
        let kind = self.handle_type;
        let entry = self
            .entry_mut(h)
            .unwrap_or_else(|| panic!("unref of invalid {} handle {h}", kind.as_str()));
        assert!(
            entry.refcount > 0,
            "unref of {} handle {h} with no outstanding references",
            kind.as_str()
        );
        entry.refcount -= 1;
        #[cfg(debug_assertions)]
        entry.ref_sites.pop();
        if entry.refcount == 0 {
            self.destroy(h);
        }
    }

    /// Bulk [`Self::ref_handle`]; zero elements are skipped.
    #[track_caller]
    pub fn ref_batch(&mut self, handles: &[RawHandle]) {
        for &raw in handles {
            if let Some(h) = Handle::from_raw(raw) {
                self.ref_handle(h);
            }
        }
    }

    /// Bulk [`Self::unref_handle`]; zero elements are skipped.
    #[track_caller]
    pub fn unref_batch(&mut self, handles: &[RawHandle]) {
        for &raw in handles {
            if let Some(h) = Handle::from_raw(raw) {
                self.unref_handle(h);
            }
        }
    }

    fn destroy(&mut self, h: Handle) {
        let Some(entry) = self.entries[h.get() as usize].take() else {
            return;
        };
        self.index.remove(&*entry.text);
        // Dropping the entry fires the annotation destructors.
        drop(entry);

        let value = h.get();
        let unwound = value + 1 == self.next_fresh;
        if unwound {
            self.next_fresh -= 1;
        } else {
            self.free.push(Reverse(value));
        }
        self.metrics.record_reclaimed(unwound);
    }

    fn allocate_value(&mut self) -> (u32, bool) {
        if let Some(Reverse(value)) = self.free.pop() {
            (value, true)
        } else {
            let value = self.next_fresh;
            self.next_fresh += 1;
            (value, false)
        }
    }

    fn intern(&mut self, name: &str) -> Handle {
        let (value, reused) = self.allocate_value();
        if value as usize >= self.entries.len() {
            self.entries.resize_with(value as usize + 1, || None);
        }
        let handle = Handle::from_raw(value).expect("allocation yielded the reserved value 0");
        let text: Rc<str> = Rc::from(name);
        self.entries[value as usize] = Some(Entry::new(Rc::clone(&text)));
        self.index.insert(text, handle);
        self.metrics.record_interned(reused);
        handle
    }

    /// The handle interning `name`, if any; else, with `may_create`, a fresh
    /// refcount-0 entry on the smallest free value. No implicit reference
    /// either way.
    pub fn request(&mut self, name: &str, may_create: bool) -> Option<Handle> {
        if let Some(&h) = self.index.get(name) {
            return Some(h);
        }
        if !may_create {
            return None;
        }
        Some(self.intern(name))
    }

    /// Intern `name` (creating if needed) and take one reference.
    #[track_caller]
    pub fn ensure(&mut self, name: &str) -> Handle {
        let h = match self.index.get(name) {
            Some(&h) => h,
            None => self.intern(name),
        };
        self.ref_handle(h);
        h
    }

    /// The handle interning `name`, if any. Never creates, never refs.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<Handle> {
        self.index.get(name).copied()
    }

    /// The interned identifier. The borrow is valid while the caller's
    /// reference to `h` is.
    #[inline]
    pub fn inspect(&self, h: Handle) -> Option<&str> {
        self.entry(h).map(|e| &*e.text)
    }

    /// Attach an annotation under `key`. A previous value under the same key
    /// is dropped. `h` must be valid.
    pub fn set_qdata(&mut self, h: Handle, key: u32, value: Box<dyn Any>) {
        let kind = self.handle_type;
        let entry = self
            .entry_mut(h)
            .unwrap_or_else(|| panic!("qdata on invalid {} handle {h}", kind.as_str()));
        match entry.qdata.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => entry.qdata.push((key, value)),
        }
    }

    /// The annotation under `key`, if any. `h` must be valid.
    pub fn get_qdata(&self, h: Handle, key: u32) -> Option<&dyn Any> {
        let kind = self.handle_type;
        let entry = self
            .entry(h)
            .unwrap_or_else(|| panic!("qdata on invalid {} handle {h}", kind.as_str()));
        entry
            .qdata
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| &**v)
    }

    /// Detach and return the annotation under `key` without dropping it.
    /// `h` must be valid.
    pub fn remove_qdata(&mut self, h: Handle, key: u32) -> Option<Box<dyn Any>> {
        let kind = self.handle_type;
        let entry = self
            .entry_mut(h)
            .unwrap_or_else(|| panic!("qdata on invalid {} handle {h}", kind.as_str()));
        let i = entry.qdata.iter().position(|(k, _)| *k == key)?;
        Some(entry.qdata.swap_remove(i).1)
    }

    /// Pin `h` on behalf of the remote client `holder`. Idempotent. The
    /// holder's set is created lazily on first hold.
    pub fn client_hold(&mut self, holder: &str, h: Handle) -> Result<(), HolderError> {
        validate_holder_name(holder)?;
        if !self.is_valid(h) {
            return Err(HolderError::InvalidHandle);
        }
        self.hold_one(holder, h);
        Ok(())
    }

    /// Unpin `h` on behalf of `holder`. Errors are local to this
    /// holder/handle pair and touch nothing else.
    pub fn client_release(&mut self, holder: &str, h: Handle) -> Result<(), HolderError> {
        validate_holder_name(holder)?;
        self.release_one(holder, h)
    }

    /// Pin every nonzero element for `holder`, all or nothing: on failure,
    /// every element already applied is released again before returning.
    pub fn hold_batch(&mut self, holder: &str, handles: &[RawHandle]) -> Result<(), HolderError> {
        validate_holder_name(holder)?;
        let mut applied: Vec<Handle> = Vec::new();
        for &raw in handles {
            if raw == 0 {
                continue;
            }
            let valid = Handle::from_raw(raw).filter(|&h| self.is_valid(h));
            let h = match valid {
                Some(h) => h,
                None => {
                    for &done in applied.iter().rev() {
                        let _ = self.release_one(holder, done);
                    }
                    return Err(HolderError::InvalidHandle);
                }
            };
            if self.hold_one(holder, h) {
                applied.push(h);
            }
        }
        Ok(())
    }

    /// Unpin every nonzero element for `holder`, all or nothing. The whole
    /// batch is validated before anything is applied, so a rejected batch
    /// has no effect.
    pub fn release_batch(&mut self, holder: &str, handles: &[RawHandle]) -> Result<(), HolderError> {
        validate_holder_name(holder)?;
        let held = match self.holders.get(holder) {
            Some(set) => set,
            None => return Err(HolderError::UnknownHolder),
        };
        let mut pending = IntSet::new();
        for &raw in handles {
            let h = match Handle::from_raw(raw) {
                Some(h) => h,
                None => continue,
            };
            if !held.contains(h) || pending.contains(raw) {
                return Err(HolderError::NotHeld);
            }
            pending.add(raw);
        }
        for raw in pending.to_vec() {
            if let Some(h) = Handle::from_raw(raw) {
                self.release_one(holder, h)?;
            }
        }
        Ok(())
    }

    /// Destroy `holder`'s set, releasing everything it held. Returns the
    /// released members, or `None` if the holder was unknown. This is the
    /// entry point for peer-disappearance cleanup.
    pub fn release_all(&mut self, holder: &str) -> Option<IntSet> {
        let mut set = self.holders.remove(holder)?;
        let released = set.intset().clone();
        set.clear(self);
        self.metrics.record_releases(u64::from(released.len()));
        self.metrics.record_holder_dropped();
        Some(released)
    }

    /// `holder`'s current holdings, if it exists.
    #[inline]
    pub fn held_by(&self, holder: &str) -> Option<&HandleSet> {
        self.holders.get(holder)
    }

    /// Pin `h` for `holder`; true iff it was newly added. `h` must be valid.
    fn hold_one(&mut self, holder: &str, h: Handle) -> bool {
        let mut set = match self.holders.remove(holder) {
            Some(set) => set,
            None => HandleSet::new(self),
        };
        let added = !set.contains(h);
        if added {
            set.add(self, h);
            self.metrics.record_hold();
        }
        self.holders.insert(holder.to_owned(), set);
        added
    }

    fn release_one(&mut self, holder: &str, h: Handle) -> Result<(), HolderError> {
        let mut set = match self.holders.remove(holder) {
            Some(set) => set,
            None => return Err(HolderError::UnknownHolder),
        };
        if !set.remove(self, h) {
            self.holders.insert(holder.to_owned(), set);
            return Err(HolderError::NotHeld);
        }
        self.metrics.record_release();
        // A holder exists iff it holds at least one handle.
        if !set.is_empty() {
            self.holders.insert(holder.to_owned(), set);
        }
        Ok(())
    }

    /// Call sites of the outstanding references on `h`. Debug builds only;
    /// the release allocation path carries none of this.
    #[cfg(debug_assertions)]
    pub fn ref_sites(&self, h: Handle) -> Option<&[&'static Location<'static>]> {
        self.entry(h).map(|e| e.ref_sites.as_slice())
    }
}
