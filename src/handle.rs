//! Lump handles
//!
//! Bit layout of a [`LumpHandle`]:
//!
//! ```text
//!  31            16 15             0
//! +----------------+----------------+
//! | archive index  |   lump index   |
//! +----------------+----------------+
//! ```
//!
//! Both halves are plain indices: the archive's position in the search path
//! stack and the lump's position in that archive's directory. A handle stays
//! valid until the archive it names is unmounted.

use crate::error::{FsysError, Result};
use std::fmt;

/// Highest archive index a handle can carry
pub const MAX_ARCHIVES: usize = 1 << 16;

/// Highest lump count per archive a handle can carry
pub const MAX_LUMPS: usize = 1 << 16;

const LUMP_BITS: u32 = 16;
const LUMP_MASK: u32 = (1 << LUMP_BITS) - 1;

/// Opaque, copyable identifier of one lump in the mounted set
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LumpHandle(u32);

impl LumpHandle {
    /// Pack an archive index and a lump index
    pub fn new(archive: usize, lump: usize) -> Result<Self> {
        if archive >= MAX_ARCHIVES || lump >= MAX_LUMPS {
            return Err(FsysError::InvalidHandle(
                ((archive as u32) << LUMP_BITS) | (lump as u32 & LUMP_MASK),
            ));
        }
        Ok(Self::encode(archive as u16, lump as u16))
    }

    pub const fn encode(archive: u16, lump: u16) -> Self {
        LumpHandle(((archive as u32) << LUMP_BITS) | lump as u32)
    }

    pub const fn decode(self) -> (u16, u16) {
        ((self.0 >> LUMP_BITS) as u16, (self.0 & LUMP_MASK) as u16)
    }

    pub const fn archive(self) -> usize {
        self.decode().0 as usize
    }

    pub const fn lump(self) -> usize {
        self.decode().1 as usize
    }

    /// Raw integer form
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn from_raw(raw: u32) -> Self {
        LumpHandle(raw)
    }
}

impl fmt::Debug for LumpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LumpHandle({}:{})", self.archive(), self.lump())
    }
}

impl fmt::Display for LumpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
