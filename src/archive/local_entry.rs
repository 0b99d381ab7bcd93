use crate::archive::format::{le_u16, le_u32};
use crate::error::{FsysError, Result};
use crate::stream::SharedSource;
use std::io::Read;

/// "PK\x03\x04" signature of a local file header
pub const LOCAL_ENTRY_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// "PK\x01\x02" signature of a central directory entry
pub const CENTRAL_ENTRY_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];

/// Fixed part of a local file header
pub const LOCAL_ENTRY_SIZE: usize = 30;

/// Fixed part of a central directory entry
pub const CENTRAL_ENTRY_SIZE: usize = 46;

/// Local File Header
///
/// Precedes each entry's data. Only the variable-length tail matters to
/// readers: the data starts right after the name and extra field, whose
/// lengths can differ from the central directory's copy.
///
/// Structure (30 bytes fixed):
/// - Signature: "PK\x03\x04" (4 bytes)
/// - Version Needed, Flags, Method, Time, Date: 10 bytes
/// - CRC32, Compressed Size, Uncompressed Size: 12 bytes
/// - Name Length: uint16 (2 bytes)
/// - Extra Length: uint16 (2 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEntryHeader {
    pub name_length: u16,
    pub extra_length: u16,
}

impl LocalEntryHeader {
    pub fn parse(raw: &[u8; LOCAL_ENTRY_SIZE]) -> Result<Self> {
        if raw[..4] != LOCAL_ENTRY_SIGNATURE {
            return Err(FsysError::InvalidFormat(
                "Invalid local file header signature".to_string(),
            ));
        }
        Ok(Self {
            name_length: le_u16(raw, 26),
            extra_length: le_u16(raw, 28),
        })
    }

    /// Resolve where the data of the entry whose header sits at `offset` begins
    pub fn data_offset(source: &SharedSource, offset: u64) -> Result<u64> {
        let mut raw = [0u8; LOCAL_ENTRY_SIZE];
        source.read_exact_at(offset, &mut raw)?;
        let header = Self::parse(&raw)?;
        Ok(offset + LOCAL_ENTRY_SIZE as u64 + header.name_length as u64 + header.extra_length as u64)
    }
}

/// Central Directory entry
///
/// Structure (46 bytes fixed, then name, extra field and comment):
/// - Signature: "PK\x01\x02" (4 bytes)
/// - Version Made By, Version Needed: 4 bytes
/// - Flags: uint16, Method: uint16 (4 bytes)
/// - Time, Date: 4 bytes
/// - CRC32, Compressed Size, Uncompressed Size: uint32 each (12 bytes)
/// - Name, Extra, Comment Lengths: uint16 each (6 bytes)
/// - Disk Start, Internal Attributes: 4 bytes
/// - External Attributes: uint32 (4 bytes)
/// - Local Header Offset: uint32 (4 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralEntry {
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
    /// Raw name bytes as stored
    pub name: Vec<u8>,
}

impl CentralEntry {
    /// Read one entry, leaving the reader after its comment
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; CENTRAL_ENTRY_SIZE];
        reader.read_exact(&mut raw)?;
        if raw[..4] != CENTRAL_ENTRY_SIGNATURE {
            return Err(FsysError::InvalidFormat(
                "Invalid central directory entry signature".to_string(),
            ));
        }

        let name_length = le_u16(&raw, 28) as usize;
        let extra_length = le_u16(&raw, 30) as usize;
        let comment_length = le_u16(&raw, 32) as usize;

        let mut name = vec![0u8; name_length];
        reader.read_exact(&mut name)?;
        let mut skip = vec![0u8; extra_length + comment_length];
        reader.read_exact(&mut skip)?;

        Ok(Self {
            flags: le_u16(&raw, 8),
            method: le_u16(&raw, 10),
            crc32: le_u32(&raw, 16),
            compressed_size: le_u32(&raw, 20),
            uncompressed_size: le_u32(&raw, 24),
            local_header_offset: le_u32(&raw, 42),
            name,
        })
    }

    pub fn is_directory(&self) -> bool {
        self.name.last() == Some(&b'/') || self.name.last() == Some(&b'\\')
    }

    /// Bit 0 of the general purpose flags
    pub fn is_encrypted(&self) -> bool {
        self.flags & 1 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_central_entry_parse() {
        let mut raw = vec![0u8; CENTRAL_ENTRY_SIZE];
        raw[..4].copy_from_slice(&CENTRAL_ENTRY_SIGNATURE);
        raw[10..12].copy_from_slice(&8u16.to_le_bytes());
        raw[16..20].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        raw[20..24].copy_from_slice(&10u32.to_le_bytes());
        raw[24..28].copy_from_slice(&20u32.to_le_bytes());
        raw[28..30].copy_from_slice(&5u16.to_le_bytes());
        raw[30..32].copy_from_slice(&2u16.to_le_bytes());
        raw[32..34].copy_from_slice(&3u16.to_le_bytes());
        raw[42..46].copy_from_slice(&77u32.to_le_bytes());
        raw.extend_from_slice(b"a.txt");
        raw.extend_from_slice(b"xxyyy");
        raw.push(0xEE);

        let mut cursor = Cursor::new(raw);
        let entry = CentralEntry::read_from(&mut cursor).unwrap();
        assert_eq!(entry.method, 8);
        assert_eq!(entry.crc32, 0xDEADBEEF);
        assert_eq!(entry.compressed_size, 10);
        assert_eq!(entry.uncompressed_size, 20);
        assert_eq!(entry.local_header_offset, 77);
        assert_eq!(entry.name, b"a.txt");
        assert!(!entry.is_directory());

        // Reader stops right after the comment
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![0xEE]);
    }

    #[test]
    fn test_local_header_data_offset() {
        let mut raw = vec![0u8; 8];
        let mut header = [0u8; LOCAL_ENTRY_SIZE];
        header[..4].copy_from_slice(&LOCAL_ENTRY_SIGNATURE);
        header[26..28].copy_from_slice(&4u16.to_le_bytes());
        header[28..30].copy_from_slice(&6u16.to_le_bytes());
        raw.extend_from_slice(&header);
        raw.extend_from_slice(&[0u8; 10]);

        let source = SharedSource::from_bytes(raw);
        assert_eq!(LocalEntryHeader::data_offset(&source, 8).unwrap(), 8 + 30 + 4 + 6);
        assert!(LocalEntryHeader::data_offset(&source, 0).is_err());
    }
}
