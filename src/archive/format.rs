use crate::config::FsysConfig;
use crate::error::{FsysError, Result};
use std::fmt;
use std::io::Read;

/// Container formats lumpfs can mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// IWAD/PWAD flat directory
    Wad,
    /// ZIP/PK3 (stored, DEFLATE, LZMA)
    Zip,
    /// Quake-style PACK, SiN-style SPAK
    Pak,
    /// Doom 2D: Forever DFWAD
    DfWad,
    /// Disk directory mounted as an archive
    Directory,
}

impl ArchiveFormat {
    /// Flat-directory formats resolve ZIP-only namespaces from Global
    pub fn is_flat_directory(self) -> bool {
        matches!(self, ArchiveFormat::Wad)
    }

    /// Formats whose lumps are addressed by path
    pub fn is_path_addressed(self) -> bool {
        matches!(
            self,
            ArchiveFormat::Zip | ArchiveFormat::Pak | ArchiveFormat::DfWad | ArchiveFormat::Directory
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveFormat::Wad => "wad",
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Pak => "pak",
            ArchiveFormat::DfWad => "dfwad",
            ArchiveFormat::Directory => "dir",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a format parser needs besides the stream itself
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Display name, used in log lines and errors
    pub name: &'a str,
    pub config: &'a FsysConfig,
    /// Move `vocNNNN` lumps of flat-directory archives into the voices namespace
    pub fix_voices: bool,
}

impl<'a> ParseContext<'a> {
    pub fn new(name: &'a str, config: &'a FsysConfig) -> Self {
        Self {
            name,
            config,
            fix_voices: false,
        }
    }

    /// Fail with [`FsysError::TooManyLumps`] above the configured bound
    pub fn check_lump_count(&self, count: usize) -> Result<()> {
        if count > self.config.max_lumps_per_archive {
            return Err(FsysError::TooManyLumps {
                archive: self.name.to_string(),
                count,
            });
        }
        Ok(())
    }

    pub fn invalid(&self, what: impl fmt::Display) -> FsysError {
        FsysError::InvalidFormat(format!("{}: {}", self.name, what))
    }
}

pub(crate) fn read_u8<R: Read + ?Sized>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u16<R: Read + ?Sized>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i32<R: Read + ?Sized>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Little-endian field access into an in-memory record
pub(crate) fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Decode a NUL-padded fixed-width name field
pub(crate) fn fixed_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
