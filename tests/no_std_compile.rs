//! Compile-time test to ensure the bit-set layer works without std.
//!
//! This test file is compiled with `--no-default-features --features alloc`
//! to verify that the set primitive doesn't accidentally pull in std paths.

#![cfg(all(feature = "alloc", not(feature = "std")))]

extern crate alloc;

use alloc::vec::Vec;

use mantle::intset::IntSet;

#[test]
fn test_no_std_set_algebra() {
    let a = IntSet::from_slice(&[1, 2, 3]);
    let b = IntSet::from_slice(&[2, 3, 4]);

    let expected: Vec<u32> = [2u32, 3].to_vec();
    assert_eq!(a.intersection(&b).to_vec(), expected);
    assert_eq!(a.union(&b).len(), 4);
    assert_eq!(a.difference(&b).to_vec(), [1u32].to_vec());
}

#[test]
fn test_no_std_iteration() {
    let mut set = IntSet::new();
    set.add(100);
    set.add(7);
    let mut iter = set.iter();
    assert_eq!(iter.next(), Some(7));
    assert_eq!(iter.next(), Some(100));
    assert_eq!(iter.next(), None);
}
