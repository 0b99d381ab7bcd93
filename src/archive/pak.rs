//! Quake-style PAK archives
//!
//! `PACK` header (directory offset, directory length) followed by a flat
//! table of 64-byte records: 56-byte name, offset, size. The SiN variant
//! (`SPAK`) widens the name field to 120 bytes. Everything is global.

use crate::archive::directory::{
    file_base_name, normalize_file_name, normalize_lump_name, LumpRecord,
};
use crate::archive::format::{fixed_name, le_u32, read_u32, ParseContext};
use crate::error::Result;
use crate::namespace::has_ignored_extension;
use std::io::{Read, Seek, SeekFrom};

pub const PACK_MAGIC: [u8; 4] = *b"PACK";
pub const SPAK_MAGIC: [u8; 4] = *b"SPAK";

/// Name field width for `PACK` / `SPAK`
const PACK_NAME_LEN: usize = 56;
const SPAK_NAME_LEN: usize = 120;

/// Parse a PAK directory into global lumps
pub fn parse<R: Read + Seek + ?Sized>(
    reader: &mut R,
    len: u64,
    ctx: &ParseContext<'_>,
) -> Result<Vec<LumpRecord>> {
    reader.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    let name_len = match magic {
        PACK_MAGIC => PACK_NAME_LEN,
        SPAK_MAGIC => SPAK_NAME_LEN,
        _ => return Err(ctx.invalid("not a PAK file")),
    };
    let entry_size = name_len + 8;

    let directory_offset = read_u32(reader)? as u64;
    let directory_length = read_u32(reader)? as u64;
    if directory_length % entry_size as u64 != 0 {
        return Err(ctx.invalid(format!("directory length {} is not a multiple of {}", directory_length, entry_size)));
    }
    if directory_offset + directory_length > len {
        return Err(ctx.invalid("directory runs past end of file"));
    }
    let count = (directory_length / entry_size as u64) as usize;
    ctx.check_lump_count(count)?;

    let mut table = vec![0u8; directory_length as usize];
    reader.seek(SeekFrom::Start(directory_offset))?;
    reader.read_exact(&mut table)?;

    let mut records = Vec::with_capacity(count);
    for raw in table.chunks_exact(entry_size) {
        let file_name = normalize_file_name(&fixed_name(&raw[..name_len]));
        let offset = le_u32(raw, name_len) as u64;
        let size = le_u32(raw, name_len + 4) as u64;
        if file_name.is_empty() {
            continue;
        }
        if offset + size > len {
            return Err(ctx.invalid(format!("{} lies outside the file", file_name)));
        }

        let mut record = LumpRecord::stored(file_name, offset, size);
        if !has_ignored_extension(&record.file_name) {
            record.name = normalize_lump_name(file_base_name(&record.file_name));
        }
        records.push(record);
    }

    Ok(records)
}
