#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
pub mod intset;

pub mod metrics;

#[cfg(feature = "std")]
pub mod handles;

#[cfg(feature = "networking")]
pub mod bus;

/// Prelude for convenient imports of primary API types.
#[cfg(feature = "std")]
pub mod prelude {
    pub use crate::handles::{
        DynamicRepo, FixedRepo, Handle, HandleSet, HandleType, HolderError, RawHandle,
        CONTACT_LIST_NAMES,
    };
    pub use crate::intset::IntSet;
    pub use crate::metrics::{HandleMetrics, MetricsSnapshot};
}

// Re-export primary types at crate root for convenience.
#[cfg(feature = "alloc")]
pub use intset::IntSet;

#[cfg(feature = "std")]
pub use handles::{DynamicRepo, FixedRepo, Handle, HandleSet, HandleType, HolderError, RawHandle};

pub use metrics::{HandleMetrics, MetricsSnapshot};
