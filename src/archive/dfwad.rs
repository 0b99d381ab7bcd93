//! Doom 2D: Forever DFWAD archives
//!
//! `DFWAD` signature, version byte, 16-bit record count, then 24-byte
//! records: 16-byte name, offset, packed size. A record with zero offset
//! and zero size opens a section; later entries live under that section
//! until the next one. Entry data is zlib-compressed.

use crate::archive::directory::{
    normalize_file_name, normalize_lump_name, DataLocation, LumpRecord, Storage,
};
use crate::archive::format::{fixed_name, le_u32, read_u16, read_u8, ParseContext};
use crate::error::Result;
use crate::namespace::Namespace;
use flate2::read::ZlibDecoder;
use std::io::{self, Read, Seek, SeekFrom};
use tracing::warn;

pub const DFWAD_MAGIC: [u8; 5] = *b"DFWAD";

pub const DFWAD_VERSION: u8 = 1;

const RECORD_SIZE: usize = 24;
const RECORD_NAME_LEN: usize = 16;

/// Inflate an entry once to learn its decoded size
fn unpacked_size<R: Read + Seek + ?Sized>(reader: &mut R, offset: u64, packed: u64) -> io::Result<u64> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut decoder = ZlibDecoder::new((&mut *reader).take(packed));
    io::copy(&mut decoder, &mut io::sink())
}

/// Parse a DFWAD directory
pub fn parse<R: Read + Seek + ?Sized>(
    reader: &mut R,
    len: u64,
    ctx: &ParseContext<'_>,
) -> Result<Vec<LumpRecord>> {
    reader.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 5];
    reader.read_exact(&mut magic)?;
    if magic != DFWAD_MAGIC {
        return Err(ctx.invalid("not a DFWAD file"));
    }
    let version = read_u8(reader)?;
    if version != DFWAD_VERSION {
        return Err(ctx.invalid(format!("unsupported DFWAD version {}", version)));
    }
    let count = read_u16(reader)? as usize;
    ctx.check_lump_count(count)?;

    let mut table = vec![0u8; count * RECORD_SIZE];
    reader.read_exact(&mut table)?;

    let mut section = String::new();
    let mut records = Vec::with_capacity(count);
    for raw in table.chunks_exact(RECORD_SIZE) {
        let name = fixed_name(&raw[..RECORD_NAME_LEN]);
        let offset = le_u32(raw, RECORD_NAME_LEN) as u64;
        let packed = le_u32(raw, RECORD_NAME_LEN + 4) as u64;

        if offset == 0 && packed == 0 {
            section = normalize_file_name(&name);
            continue;
        }
        if offset + packed > len {
            return Err(ctx.invalid(format!("{} lies outside the file", name)));
        }

        let leaf = normalize_file_name(&name);
        let file_name = if section.is_empty() {
            leaf.clone()
        } else {
            format!("{}/{}", section, leaf)
        };

        let (storage, size) = match unpacked_size(reader, offset, packed) {
            Ok(size) => (Storage::Zlib, size),
            Err(err) => {
                warn!(archive = ctx.name, file = %file_name, error = %err, "entry is not zlib data, reading it raw");
                (Storage::Stored, packed)
            }
        };

        records.push(LumpRecord {
            name: normalize_lump_name(&leaf),
            file_name,
            namespace: Namespace::Global,
            size,
            packed_size: packed,
            storage,
            location: DataLocation::Offset(offset),
            crc32: None,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsysConfig;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn record(name: &str, offset: u32, size: u32) -> Vec<u8> {
        let mut raw = vec![0u8; RECORD_SIZE];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        raw[16..20].copy_from_slice(&offset.to_le_bytes());
        raw[20..24].copy_from_slice(&size.to_le_bytes());
        raw
    }

    #[test]
    fn test_sections_and_sizes() {
        let body = zlib(&[7u8; 300]);
        let header_len = 8 + 3 * RECORD_SIZE;
        let mut data = Vec::new();
        data.extend_from_slice(b"DFWAD");
        data.push(1);
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend(record("TEXTURES", 0, 0));
        data.extend(record("BRICK", header_len as u32, body.len() as u32));
        data.extend(record("ROCK", header_len as u32, body.len() as u32));
        data.extend_from_slice(&body);

        let len = data.len() as u64;
        let config = FsysConfig::quiet();
        let ctx = ParseContext::new("map.wad", &config);
        let records = parse(&mut Cursor::new(data), len, &ctx).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_name, "textures/brick");
        assert_eq!(records[0].name.as_deref(), Some("brick"));
        assert_eq!(records[0].storage, Storage::Zlib);
        assert_eq!(records[0].size, 300);
        assert_eq!(records[1].file_name, "textures/rock");
    }

    #[test]
    fn test_bad_version() {
        let mut data = b"DFWAD".to_vec();
        data.push(9);
        data.extend_from_slice(&0u16.to_le_bytes());
        let len = data.len() as u64;
        let config = FsysConfig::quiet();
        let ctx = ParseContext::new("x.dfwad", &config);
        assert!(parse(&mut Cursor::new(data), len, &ctx).is_err());
    }
}
