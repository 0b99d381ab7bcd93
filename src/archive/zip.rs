//! ZIP / PK3 archives
//!
//! The central directory is found through the end record; entries are
//! named and namespaced by path. Local headers are resolved lazily when a
//! lump is opened.

use crate::archive::directory::{
    assign_path_names, normalize_file_name, DataLocation, LumpRecord, Storage,
};
use crate::archive::end_record::EndRecord;
use crate::archive::format::ParseContext;
use crate::archive::local_entry::CentralEntry;
use crate::error::Result;
use crate::namespace::Namespace;
use std::io::{BufReader, Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// Top-level folders that are never stripped as a packaging prefix
const EXTRA_RESOURCE_DIRS: &[&str] = &["models/", "filter/"];

/// The single top-level folder every entry shares, if it may be stripped
fn common_prefix(names: &[String]) -> Option<String> {
    let first = names.first()?;
    let slash = first.find('/')?;
    if slash == 0 {
        return None;
    }
    let prefix = &first[..=slash];
    if Namespace::is_resource_dir(prefix) || EXTRA_RESOURCE_DIRS.contains(&prefix) {
        return None;
    }
    names
        .iter()
        .all(|name| name.starts_with(prefix))
        .then(|| prefix.to_string())
}

/// Parse a ZIP central directory
///
/// `Ok(None)` means no end record was found: the stream is not a ZIP.
pub fn parse<R: Read + Seek + ?Sized>(
    reader: &mut R,
    len: u64,
    ctx: &ParseContext<'_>,
) -> Result<Option<Vec<LumpRecord>>> {
    let Some(position) = EndRecord::locate(reader, len)? else {
        return Ok(None);
    };
    let end = EndRecord::read_at(reader, position)?;
    ctx.check_lump_count(end.entry_count as usize)?;
    let bytes_before = end.bytes_before_archive();
    debug!(
        archive = ctx.name,
        entries = end.entry_count,
        bytes_before,
        "reading zip central directory"
    );

    reader.seek(SeekFrom::Start(end.central_directory_start()))?;
    let mut directory = BufReader::new(reader);

    let mut entries = Vec::with_capacity(end.entry_count as usize);
    for _ in 0..end.entry_count {
        let entry = CentralEntry::read_from(&mut directory)?;
        if entry.is_directory() {
            continue;
        }
        let file_name = normalize_file_name(&String::from_utf8_lossy(&entry.name));
        if file_name.is_empty() {
            continue;
        }
        if entry.is_encrypted() {
            warn!(archive = ctx.name, file = %file_name, "skipping encrypted zip entry");
            continue;
        }
        entries.push((file_name, entry));
    }

    // Plain .zip files are often packed with one enclosing folder
    let is_pk3 = ctx.name.to_lowercase().ends_with(".pk3");
    if !is_pk3 {
        let names: Vec<String> = entries.iter().map(|(name, _)| name.clone()).collect();
        if let Some(prefix) = common_prefix(&names) {
            debug!(archive = ctx.name, prefix = %prefix, "stripping common folder");
            for (name, _) in entries.iter_mut() {
                *name = name[prefix.len()..].to_string();
            }
        }
    }

    let mut records = Vec::with_capacity(entries.len());
    for (file_name, entry) in entries {
        if file_name.is_empty() {
            continue;
        }
        let storage = match Storage::from_zip_method(entry.method) {
            Ok(storage) => storage,
            Err(err) => {
                warn!(archive = ctx.name, file = %file_name, error = %err, "skipping zip entry");
                continue;
            }
        };
        let header_offset = entry.local_header_offset as u64 + bytes_before;
        if header_offset >= len {
            return Err(ctx.invalid(format!("local header of {} lies outside the file", file_name)));
        }
        records.push(LumpRecord {
            name: None,
            file_name,
            namespace: Namespace::ZipSpecial,
            size: entry.uncompressed_size as u64,
            packed_size: entry.compressed_size as u64,
            storage,
            location: DataLocation::ZipLocalHeader(header_offset),
            crc32: Some(entry.crc32),
        });
    }

    assign_path_names(&mut records, ctx.config);
    Ok(Some(records))
}
