//! Lifecycle tests for the dynamic handle repository: interning, value
//! recycling, holder cleanup, bulk atomicity, and the ref/unref contract.

#![cfg(feature = "std")]

use std::cell::Cell;
use std::rc::Rc;

use mantle::{DynamicRepo, FixedRepo, Handle, HandleSet, HandleType, HolderError, IntSet};

fn contact_repo() -> DynamicRepo {
    DynamicRepo::new(HandleType::Contact)
}

// ============================================================================
// Interning
// ============================================================================

#[test]
fn test_interning_is_stable_while_referenced() {
    let mut repo = contact_repo();
    let h = repo.ensure("foo@example.com");
    assert_eq!(repo.request("foo@example.com", true), Some(h));
    assert_eq!(repo.ensure("foo@example.com"), h);
    assert_eq!(repo.lookup("foo@example.com"), Some(h));

    repo.unref_handle(h);
    repo.unref_handle(h);
    assert_eq!(repo.lookup("foo@example.com"), None);

    // After reclamation the value may differ, the string may not.
    let h2 = repo.ensure("foo@example.com");
    assert_eq!(repo.inspect(h2), Some("foo@example.com"));
}

#[test]
fn test_independent_subsystems_share_one_handle() {
    let mut repo = contact_repo();
    let roster = repo.ensure("alice@example.com");
    let presence = repo.ensure("alice@example.com");
    assert_eq!(roster, presence);
    repo.unref_handle(roster);
    assert!(repo.is_valid(presence));
    repo.unref_handle(presence);
    assert!(!repo.is_valid(presence));
}

// ============================================================================
// Value recycling
// ============================================================================

#[test]
fn test_free_of_top_handle_undoes_allocation() {
    let mut repo = contact_repo();
    let handles: Vec<Handle> = (1..=5)
        .map(|i| repo.ensure(&format!("contact{i}@example.com")))
        .collect();
    assert_eq!(handles[4].get(), 5);

    repo.unref_handle(handles[4]);
    let again = repo.ensure("fresh@example.com");
    assert_eq!(again.get(), 5);
}

#[test]
fn test_free_list_reuses_smallest_value() {
    let mut repo = contact_repo();
    let handles: Vec<Handle> = (1..=5)
        .map(|i| repo.ensure(&format!("contact{i}@example.com")))
        .collect();

    repo.unref_handle(handles[2]);
    let again = repo.ensure("fresh@example.com");
    assert_eq!(again.get(), 3);

    // Next allocation falls back to the high-water mark.
    let next = repo.ensure("another@example.com");
    assert_eq!(next.get(), 6);
}

#[test]
fn test_allocate_validate_release_churn_stays_compact() {
    let mut repo = contact_repo();
    let anchor = repo.ensure("anchor@example.com");
    for i in 0..100 {
        let h = repo.ensure(&format!("transient{i}@example.com"));
        assert_eq!(h.get(), 2);
        repo.unref_handle(h);
    }
    assert_eq!(repo.live_handles(), 1);
    assert!(repo.is_valid(anchor));

    let snap = repo.metrics().snapshot();
    assert_eq!(snap.unwound, 100);
    assert_eq!(snap.reused, 0);
}

// ============================================================================
// Holder lifecycle
// ============================================================================

#[test]
fn test_vanished_holder_releases_exactly_one_ref_each() {
    let mut repo = contact_repo();
    let kept = repo.ensure("kept@example.com");
    let dropped = repo.request("dropped@example.com", true).unwrap();

    repo.client_hold(":1.7", kept).unwrap();
    repo.client_hold(":1.7", dropped).unwrap();
    assert_eq!(repo.held_by(":1.7").unwrap().len(), 2);

    let released = repo.release_all(":1.7").unwrap();
    assert!(released.contains(kept.get()));
    assert!(released.contains(dropped.get()));

    // Our direct reference outlives the holder; the pin-only entry dies.
    assert!(repo.is_valid(kept));
    assert!(!repo.is_valid(dropped));

    assert!(repo.held_by(":1.7").is_none());
    assert_eq!(
        repo.client_release(":1.7", kept),
        Err(HolderError::UnknownHolder)
    );
    repo.unref_handle(kept);
}

#[test]
fn test_hold_is_idempotent() {
    let mut repo = contact_repo();
    let h = repo.request("a@example.com", true).unwrap();
    repo.client_hold(":1.7", h).unwrap();
    repo.client_hold(":1.7", h).unwrap();
    assert_eq!(repo.held_by(":1.7").unwrap().len(), 1);

    // A single release drops the only pin.
    repo.client_release(":1.7", h).unwrap();
    assert!(!repo.is_valid(h));
    assert!(repo.held_by(":1.7").is_none());
}

#[test]
fn test_holder_errors_are_recoverable_and_local() {
    let mut repo = contact_repo();
    let h = repo.ensure("a@example.com");

    assert_eq!(repo.client_hold("", h), Err(HolderError::EmptyName));
    assert_eq!(
        repo.client_hold("bad\0name", h),
        Err(HolderError::MalformedName)
    );
    assert_eq!(
        repo.client_release(":1.9", h),
        Err(HolderError::UnknownHolder)
    );

    repo.client_hold(":1.9", h).unwrap();
    let other = repo.ensure("b@example.com");
    assert_eq!(repo.client_release(":1.9", other), Err(HolderError::NotHeld));

    // Nothing else was touched.
    assert!(repo.is_valid(h));
    assert!(repo.is_valid(other));
    assert_eq!(repo.held_by(":1.9").unwrap().len(), 1);
}

// ============================================================================
// Bulk operations
// ============================================================================

#[test]
fn test_hold_batch_is_all_or_nothing() {
    let mut repo = contact_repo();
    let h1 = repo.ensure("one@example.com");
    let h2 = repo.ensure("two@example.com");
    let h4 = repo.ensure("four@example.com");
    let h5 = repo.ensure("five@example.com");

    let batch = [h1.get(), h2.get(), 999, h4.get(), h5.get()];
    assert_eq!(
        repo.hold_batch(":1.7", &batch),
        Err(HolderError::InvalidHandle)
    );

    // The first two are not held afterward; the holder never came to exist.
    assert!(repo.held_by(":1.7").is_none());
    for h in [h1, h2, h4, h5] {
        assert!(repo.is_valid(h));
    }
}

#[test]
fn test_hold_batch_rollback_preserves_prior_holdings() {
    let mut repo = contact_repo();
    let old = repo.request("old@example.com", true).unwrap();
    repo.client_hold(":1.7", old).unwrap();

    let fresh = repo.ensure("fresh@example.com");
    assert_eq!(
        repo.hold_batch(":1.7", &[fresh.get(), 999]),
        Err(HolderError::InvalidHandle)
    );

    // Rollback removed only the batch's own delta.
    let held = repo.held_by(":1.7").unwrap();
    assert!(held.contains(old));
    assert!(!held.contains(fresh));
    assert!(repo.is_valid(old));
}

#[test]
fn test_hold_batch_skips_zero_elements() {
    let mut repo = contact_repo();
    let h = repo.request("a@example.com", true).unwrap();
    repo.hold_batch(":1.7", &[0, h.get(), 0]).unwrap();
    assert_eq!(repo.held_by(":1.7").unwrap().len(), 1);
}

#[test]
fn test_release_batch_is_all_or_nothing() {
    let mut repo = contact_repo();
    let h1 = repo.request("one@example.com", true).unwrap();
    let h2 = repo.request("two@example.com", true).unwrap();
    let stray = repo.ensure("stray@example.com");
    repo.hold_batch(":1.7", &[h1.get(), h2.get()]).unwrap();

    assert_eq!(
        repo.release_batch(":1.7", &[h1.get(), stray.get()]),
        Err(HolderError::NotHeld)
    );
    assert_eq!(repo.held_by(":1.7").unwrap().len(), 2);

    // A duplicate element is one release too many, so the batch fails whole.
    assert_eq!(
        repo.release_batch(":1.7", &[h1.get(), h1.get()]),
        Err(HolderError::NotHeld)
    );
    assert_eq!(repo.held_by(":1.7").unwrap().len(), 2);

    repo.release_batch(":1.7", &[h1.get(), h2.get()]).unwrap();
    assert!(repo.held_by(":1.7").is_none());
    assert!(!repo.is_valid(h1));
    assert!(!repo.is_valid(h2));
}

#[test]
fn test_ref_batch_and_are_valid() {
    let mut repo = contact_repo();
    let h1 = repo.request("one@example.com", true).unwrap();
    let h2 = repo.request("two@example.com", true).unwrap();
    let raw = [h1.get(), 0, h2.get()];

    assert!(repo.are_valid(&raw, true));
    assert!(!repo.are_valid(&raw, false));

    repo.ref_batch(&raw);
    repo.unref_batch(&raw);
    assert!(!repo.is_valid(h1));
    assert!(!repo.is_valid(h2));
}

// ============================================================================
// Structural sets sharing one repository
// ============================================================================

#[test]
fn test_handle_survives_while_any_structural_set_holds_it() {
    let mut repo = DynamicRepo::new(HandleType::Room);
    let h = repo.request("muc@conference.example.com", true).unwrap();

    let mut members = HandleSet::new(&repo);
    let mut local_pending = HandleSet::new(&repo);

    let mut incoming = IntSet::new();
    incoming.add(h.get());

    assert_eq!(local_pending.update(&mut repo, &incoming).len(), 1);
    assert_eq!(members.update(&mut repo, &incoming).len(), 1);

    // Approving membership moves the handle between sets without losing it.
    assert_eq!(local_pending.difference_update(&mut repo, &incoming).len(), 1);
    assert!(repo.is_valid(h));

    members.clear(&mut repo);
    assert!(!repo.is_valid(h));
}

// ============================================================================
// Annotations
// ============================================================================

struct DropProbe(Rc<Cell<u32>>);

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_qdata_dropped_on_overwrite_and_destruction() {
    let drops = Rc::new(Cell::new(0));
    let mut repo = contact_repo();
    let h = repo.ensure("a@example.com");

    repo.set_qdata(h, 7, Box::new(DropProbe(Rc::clone(&drops))));
    repo.set_qdata(h, 7, Box::new(DropProbe(Rc::clone(&drops))));
    assert_eq!(drops.get(), 1);

    repo.unref_handle(h);
    assert_eq!(drops.get(), 2);
}

#[test]
fn test_removed_qdata_is_not_dropped_by_the_repo() {
    let drops = Rc::new(Cell::new(0));
    let mut repo = contact_repo();
    let h = repo.ensure("a@example.com");

    repo.set_qdata(h, 7, Box::new(DropProbe(Rc::clone(&drops))));
    let stolen = repo.remove_qdata(h, 7).unwrap();
    assert_eq!(drops.get(), 0);
    drop(stolen);
    assert_eq!(drops.get(), 1);

    repo.unref_handle(h);
    assert_eq!(drops.get(), 1);
}

// ============================================================================
// Categories and the end-to-end scenario
// ============================================================================

#[test]
fn test_same_value_in_different_categories_is_unrelated() {
    let lists = FixedRepo::contact_lists();
    let mut contacts = contact_repo();

    let c = contacts.ensure("subscribe");
    let l = lists.lookup("subscribe").unwrap();
    assert_eq!(c.get(), 1);
    assert_eq!(l.get(), 1);

    contacts.unref_handle(c);
    assert!(!contacts.is_valid(c));
    assert!(lists.is_valid(l));
}

#[test]
fn test_contact_scenario() {
    let mut repo = contact_repo();
    let h1 = repo.request("alice@example.com", true).unwrap();
    assert!(repo.is_valid(h1));

    repo.ref_handle(h1);
    assert_eq!(repo.inspect(h1), Some("alice@example.com"));
    repo.unref_handle(h1);
    assert!(!repo.is_valid(h1));
}

#[test]
#[should_panic(expected = "unref of invalid contact handle")]
fn test_unref_beyond_refcount_is_a_contract_violation() {
    let mut repo = contact_repo();
    let h1 = repo.request("alice@example.com", true).unwrap();
    repo.ref_handle(h1);
    repo.unref_handle(h1);
    repo.unref_handle(h1);
}

#[test]
#[should_panic(expected = "ref of invalid contact handle")]
fn test_ref_of_stale_handle_is_a_contract_violation() {
    let mut repo = contact_repo();
    let h = repo.ensure("alice@example.com");
    repo.unref_handle(h);
    repo.ref_handle(h);
}
