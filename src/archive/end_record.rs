use crate::archive::format::{le_u16, le_u32};
use crate::error::{FsysError, Result};
use std::io::{Read, Seek, SeekFrom};

/// "PK\x05\x06" signature of the End of Central Directory record
pub const END_RECORD_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// Fixed part of the End of Central Directory record
pub const END_RECORD_SIZE: usize = 22;

/// How far back from the end of the stream the record is searched for
/// (record plus the longest possible comment, with some slack)
pub const END_RECORD_SEARCH_SPAN: u64 = 65578;

/// Streams shorter than this are never ZIP archives
pub const MIN_ZIP_SIZE: u64 = 16;

/// End of Central Directory record
///
/// Sits near the end of the archive, followed only by an optional comment,
/// and tells readers where the central directory starts.
///
/// Structure (22 bytes fixed):
/// - Signature: "PK\x05\x06" (4 bytes)
/// - Disk Number: uint16 (2 bytes)
/// - Disk With Central Directory: uint16 (2 bytes)
/// - Entries On This Disk: uint16 (2 bytes)
/// - Total Entries: uint16 (2 bytes)
/// - Central Directory Size: uint32 (4 bytes)
/// - Central Directory Offset: uint32 (4 bytes)
/// - Comment Length: uint16 (2 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRecord {
    /// Absolute position of the record in the stream
    pub position: u64,
    pub entry_count: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub comment_length: u16,
}

impl EndRecord {
    /// Scan backwards from the end of the stream for the record signature
    ///
    /// Returns `Ok(None)` when no signature is found; that only means the
    /// stream is not a ZIP archive.
    pub fn locate<R: Read + Seek + ?Sized>(reader: &mut R, len: u64) -> Result<Option<u64>> {
        if len < MIN_ZIP_SIZE || len < END_RECORD_SIZE as u64 {
            return Ok(None);
        }

        let span = len.min(END_RECORD_SEARCH_SPAN);
        let start = len - span;
        let mut tail = vec![0u8; span as usize];
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(&mut tail)?;

        let last = tail.len() - END_RECORD_SIZE;
        let found = (0..=last)
            .rev()
            .find(|&i| tail[i..i + 4] == END_RECORD_SIGNATURE);
        Ok(found.map(|i| start + i as u64))
    }

    /// Read the record at `position`
    pub fn read_at<R: Read + Seek + ?Sized>(reader: &mut R, position: u64) -> Result<Self> {
        let mut raw = [0u8; END_RECORD_SIZE];
        reader.seek(SeekFrom::Start(position))?;
        reader.read_exact(&mut raw)?;

        if raw[..4] != END_RECORD_SIGNATURE {
            return Err(FsysError::InvalidFormat(
                "Invalid end record signature".to_string(),
            ));
        }

        let disk = le_u16(&raw, 4);
        let disk_with_directory = le_u16(&raw, 6);
        let entries_on_disk = le_u16(&raw, 8);
        let entry_count = le_u16(&raw, 10);
        if disk != 0 || disk_with_directory != 0 || entries_on_disk != entry_count {
            return Err(FsysError::InvalidFormat(
                "Multi-volume ZIP archives are not supported".to_string(),
            ));
        }

        let record = Self {
            position,
            entry_count,
            central_directory_size: le_u32(&raw, 12),
            central_directory_offset: le_u32(&raw, 16),
            comment_length: le_u16(&raw, 20),
        };

        if record.directory_end() > position {
            return Err(FsysError::InvalidFormat(format!(
                "Central directory ({} + {}) overlaps end record at {}",
                record.central_directory_offset, record.central_directory_size, position
            )));
        }
        Ok(record)
    }

    fn directory_end(&self) -> u64 {
        self.central_directory_offset as u64 + self.central_directory_size as u64
    }

    /// Length of any prefix (e.g. a self-extractor stub) before the ZIP data
    pub fn bytes_before_archive(&self) -> u64 {
        self.position - self.directory_end()
    }

    /// Absolute position of the first central directory entry
    pub fn central_directory_start(&self) -> u64 {
        self.central_directory_offset as u64 + self.bytes_before_archive()
    }
}
