//! Handle set: set membership bound to repository reference counting.

use crate::intset::IntSet;

use super::repo::DynamicRepo;
use super::{Handle, HandleType, RawHandle};

/// A set of handles from one repository and one category. Every member is
/// backed by one direct repository reference taken on add and dropped on
/// remove; a set must be drained (`clear`) before it is discarded.
///
/// The repository is passed explicitly to every mutating operation:
/// ownership stays with the connection object, and the borrow checker rules
/// out aliased mutation.
pub struct HandleSet {
    bits: IntSet,
    handle_type: HandleType,
}

impl HandleSet {
    /// Empty set bound to `repo`'s category.
    pub fn new(repo: &DynamicRepo) -> Self {
        Self {
            bits: IntSet::new(),
            handle_type: repo.handle_type(),
        }
    }

    #[inline(always)]
    pub fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    /// Add `h`, taking a repository reference. No-op if already a member.
    /// The reference is taken before membership is recorded, so a bad handle
    /// never corrupts the set.
    pub fn add(&mut self, repo: &mut DynamicRepo, h: Handle) {
        debug_assert_eq!(self.handle_type, repo.handle_type());
        if self.bits.contains(h.get()) {
            return;
        }
        repo.ref_handle(h);
        self.bits.add(h.get());
    }

    /// Remove `h`, releasing its reference. True iff it was a member;
    /// otherwise no side effects.
    pub fn remove(&mut self, repo: &mut DynamicRepo, h: Handle) -> bool {
        debug_assert_eq!(self.handle_type, repo.handle_type());
        if !self.bits.contains(h.get()) {
            return false;
        }
        self.bits.remove(h.get());
        repo.unref_handle(h);
        true
    }

    /// Add every member of `others` not already present. Returns the
    /// effective delta actually applied (exactly the members that were
    /// referenced), so the same handle appearing across several structural
    /// sets is never double counted.
    pub fn update(&mut self, repo: &mut DynamicRepo, others: &IntSet) -> IntSet {
        debug_assert_eq!(self.handle_type, repo.handle_type());
        let mut delta = IntSet::new();
        for raw in others.iter() {
            let h = match Handle::from_raw(raw) {
                Some(h) => h,
                None => continue,
            };
            if self.bits.contains(raw) {
                continue;
            }
            repo.ref_handle(h);
            self.bits.add(raw);
            delta.add(raw);
        }
        delta
    }

    /// Remove every member of `others` that is present. Returns the
    /// effective delta actually applied, exactly the members dereferenced.
    pub fn difference_update(&mut self, repo: &mut DynamicRepo, others: &IntSet) -> IntSet {
        debug_assert_eq!(self.handle_type, repo.handle_type());
        let mut delta = IntSet::new();
        for raw in others.iter() {
            if !self.bits.contains(raw) {
                continue;
            }
            let h = match Handle::from_raw(raw) {
                Some(h) => h,
                None => continue,
            };
            self.bits.remove(raw);
            repo.unref_handle(h);
            delta.add(raw);
        }
        delta
    }

    /// Release every remaining member's reference and empty the set.
    pub fn clear(&mut self, repo: &mut DynamicRepo) {
        debug_assert_eq!(self.handle_type, repo.handle_type());
        for raw in self.bits.to_vec() {
            if let Some(h) = Handle::from_raw(raw) {
                repo.unref_handle(h);
            }
        }
        self.bits.clear();
    }

    #[inline(always)]
    pub fn contains(&self, h: Handle) -> bool {
        self.bits.contains(h.get())
    }

    #[inline(always)]
    pub fn len(&self) -> u32 {
        self.bits.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Handle> + '_ {
        self.bits.iter().filter_map(Handle::from_raw)
    }

    pub fn to_vec(&self) -> Vec<RawHandle> {
        self.bits.to_vec()
    }

    /// The underlying bit-set.
    #[inline(always)]
    pub fn intset(&self) -> &IntSet {
        &self.bits
    }
}
