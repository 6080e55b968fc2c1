//! Handles: small dense integers naming contacts, rooms, groups and lists.
//!
//! A handle is meaningless outside its originating repository and category.
//! The interned string, not the integer, is the durable identity; values are
//! never stable across sessions.

mod fixed;
mod repo;
mod set;

pub use fixed::{FixedRepo, CONTACT_LIST_NAMES};
pub use repo::DynamicRepo;
pub use set::HandleSet;

use core::fmt;
use core::num::NonZeroU32;

/// Wire-level handle value. 0 means "no handle" and is skipped by bulk ops.
pub type RawHandle = u32;

/// Upper bound on holder (bus name) length.
pub const MAX_HOLDER_NAME: usize = 255;

/// An opaque positive integer naming one entity within one category of one
/// repository. The reserved invalid value 0 is unrepresentable; use
/// `Option<Handle>` where "no handle" is a possible answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(NonZeroU32);

impl Handle {
    /// Lift a wire value. `None` for the reserved value 0.
    #[inline(always)]
    pub const fn from_raw(raw: RawHandle) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// The wire value.
    #[inline(always)]
    pub const fn get(self) -> RawHandle {
        self.0.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

/// Handle category. Handles from different categories are never comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandleType {
    /// A contact (bare JID).
    Contact = 1,
    /// A multi-user chat room.
    Room = 2,
    /// A user-defined roster group.
    Group = 3,
    /// A server-side contact list.
    List = 4,
}

impl HandleType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Contact),
            2 => Some(Self::Room),
            3 => Some(Self::Group),
            4 => Some(Self::List),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Room => "room",
            Self::Group => "group",
            Self::List => "list",
        }
    }
}

/// Why a holder-facing operation was rejected. Holder identity comes from an
/// untrusted remote peer, so these are recoverable, never assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HolderError {
    /// Holder name is empty.
    EmptyName = 1,
    /// Holder name is over-long or contains control characters.
    MalformedName = 2,
    /// No such holder.
    UnknownHolder = 3,
    /// The holder never held this handle.
    NotHeld = 4,
    /// The handle has no live entry.
    InvalidHandle = 5,
}

impl HolderError {
    #[inline(always)]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyName => "holder name is empty",
            Self::MalformedName => "holder name is malformed",
            Self::UnknownHolder => "no such holder",
            Self::NotHeld => "handle not held by this holder",
            Self::InvalidHandle => "handle is not valid",
        }
    }
}

/// Check a holder name coming off the bus.
pub fn validate_holder_name(name: &str) -> Result<(), HolderError> {
    if name.is_empty() {
        return Err(HolderError::EmptyName);
    }
    if name.len() > MAX_HOLDER_NAME || name.chars().any(|c| c.is_control()) {
        return Err(HolderError::MalformedName);
    }
    Ok(())
}
