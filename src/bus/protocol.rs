//! Wire frames for client presence registration.
//! Format: [Magic:4][Version:1][Kind:1][NameLen:2][CRC32:4][Name]

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::handles::MAX_HOLDER_NAME;

/// Magic bytes identifying the presence protocol ("MNTL").
pub const PRESENCE_MAGIC: [u8; 4] = [0x4D, 0x4E, 0x54, 0x4C];

/// Current protocol version.
pub const PRESENCE_VERSION: u8 = 1;

/// Frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Client registers its bus name. First frame on every connection.
    Hello = 1,
    /// Keepalive. Empty name.
    Ping = 2,
    /// Clean departure. Empty name.
    Bye = 3,
}

impl FrameKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Hello),
            2 => Some(Self::Ping),
            3 => Some(Self::Bye),
            _ => None,
        }
    }
}

/// Wire header for all frames.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct FrameHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub kind: u8,
    pub name_len: u16,
    pub crc32: u32,
}

const _: () = {
    assert!(core::mem::size_of::<FrameHeader>() == 12);
};

impl FrameHeader {
    pub const SIZE: usize = 12;

    pub fn new(kind: FrameKind, name_len: u16, crc32: u32) -> Self {
        Self {
            magic: PRESENCE_MAGIC,
            version: PRESENCE_VERSION,
            kind: kind as u8,
            name_len,
            crc32,
        }
    }

    pub fn validate(&self) -> Result<FrameKind, PresenceError> {
        if self.magic != PRESENCE_MAGIC {
            return Err(PresenceError::InvalidMagic);
        }
        if self.version != PRESENCE_VERSION {
            return Err(PresenceError::UnsupportedVersion);
        }
        if self.name_len() as usize > MAX_HOLDER_NAME {
            return Err(PresenceError::NameTooLong);
        }
        FrameKind::from_u8(self.kind).ok_or(PresenceError::InvalidFrameKind)
    }

    #[inline(always)]
    pub fn name_len(&self) -> u16 {
        self.name_len
    }

    #[inline(always)]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf.copy_from_slice(self.as_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Option<Self> {
        Self::read_from_bytes(buf).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceError {
    InvalidMagic,
    UnsupportedVersion,
    InvalidFrameKind,
    NameTooLong,
    CrcMismatch,
    BadName,
}

/// Serialize one frame with header and checksum.
pub fn encode_frame(kind: FrameKind, name: &str) -> Vec<u8> {
    let payload = name.as_bytes();
    let crc = crc32fast::hash(payload);
    let header = FrameHeader::new(kind, payload.len() as u16, crc);
    let mut buf = Vec::with_capacity(FrameHeader::SIZE + payload.len());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Check and decode a frame's name payload against its header.
pub fn decode_name<'a>(header: &FrameHeader, payload: &'a [u8]) -> Result<&'a str, PresenceError> {
    if crc32fast::hash(payload) != header.crc32() {
        return Err(PresenceError::CrcMismatch);
    }
    core::str::from_utf8(payload).map_err(|_| PresenceError::BadName)
}
