//! Per-archive lump directory
//!
//! A [`LumpDirectory`] is built once from the records a format parser
//! produced and never reordered afterwards, so record indices double as the
//! low half of a [`crate::LumpHandle`].

use crate::config::FsysConfig;
use crate::error::{FsysError, Result};
use crate::namespace::{has_ignored_extension, Namespace};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

/// Maximum length of a short lump name
pub const LUMP_NAME_LEN: usize = 8;

/// Files that ZIP-like archives never expose as lumps
const RESERVED_FILES: &[&str] = &["default.cfg", "startup.vs"];

/// Lumps whose duplication inside one archive is always reported
const WATCHED_LUMPS: &[&str] = &["decorate", "sndinfo", "dehacked"];

/// How an entry's bytes are encoded in the backing stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Stored,
    /// Raw DEFLATE (ZIP method 8)
    Deflate,
    /// ZIP method 14
    Lzma,
    /// zlib-wrapped DEFLATE (DFWAD)
    Zlib,
}

impl Storage {
    /// Map a ZIP compression method number
    pub fn from_zip_method(method: u16) -> Result<Self> {
        match method {
            0 => Ok(Storage::Stored),
            8 => Ok(Storage::Deflate),
            14 => Ok(Storage::Lzma),
            other => Err(FsysError::InvalidCompression(other)),
        }
    }
}

/// Where an entry's bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLocation {
    /// Absolute offset of the data in the archive stream
    Offset(u64),
    /// Offset of a ZIP local file header; the data follows it
    ZipLocalHeader(u64),
    /// A file on disk
    Disk(PathBuf),
}

/// One directory entry
#[derive(Debug, Clone)]
pub struct LumpRecord {
    /// Short lump name; `None` for markers, hidden lumps and non-lump files
    pub name: Option<String>,
    /// Path-like file name; empty when the entry is not addressable by path
    pub file_name: String,
    pub namespace: Namespace,
    /// Decoded size in bytes
    pub size: u64,
    /// Size of the encoded data in the backing stream
    pub packed_size: u64,
    pub storage: Storage,
    pub location: DataLocation,
    pub crc32: Option<u32>,
}

impl LumpRecord {
    /// An uncompressed entry at a fixed offset
    pub fn stored(file_name: String, offset: u64, size: u64) -> Self {
        Self {
            name: None,
            file_name,
            namespace: Namespace::Global,
            size,
            packed_size: size,
            storage: Storage::Stored,
            location: DataLocation::Offset(offset),
            crc32: None,
        }
    }

    /// Hide the entry from every name and namespace query
    pub fn hide(&mut self) {
        self.name = None;
        self.namespace = Namespace::Global;
    }
}

/// Lowercase a short lump name and cut it to [`LUMP_NAME_LEN`] bytes
pub fn normalize_lump_name(name: &str) -> Option<String> {
    let mut out = String::with_capacity(LUMP_NAME_LEN);
    for ch in name.chars() {
        if out.len() + ch.len_utf8() > LUMP_NAME_LEN {
            break;
        }
        out.extend(ch.to_lowercase());
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Lowercase a path, use `/` separators and drop leading `./`, `../` and `/`
pub fn normalize_file_name(name: &str) -> String {
    let mut path = name.replace('\\', "/").to_lowercase();
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix("../") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest.to_string();
        } else {
            break;
        }
    }
    path
}

/// Base name without directories or extension
pub fn file_base_name(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rfind('.') {
        Some(0) | None => file,
        Some(dot) => &file[..dot],
    }
}

/// Assign names and namespaces to path-addressed entries (ZIP, disk dirs)
pub fn assign_path_names(records: &mut [LumpRecord], config: &FsysConfig) {
    for record in records.iter_mut() {
        record.name = None;
        if record.file_name.is_empty() || RESERVED_FILES.contains(&record.file_name.as_str()) {
            record.namespace = Namespace::ZipSpecial;
            continue;
        }

        let namespace = match Namespace::from_zip_path(&record.file_name) {
            Some(ns) => ns,
            None if config.zip_root_is_global && !record.file_name.contains('/') => {
                Namespace::Global
            }
            None => Namespace::ZipSpecial,
        };
        record.namespace = namespace;

        if has_ignored_extension(&record.file_name)
            || (config.skip_sounds && namespace == Namespace::Sounds)
            || (config.skip_sprites && namespace == Namespace::Sprites)
        {
            continue;
        }

        let mut base = file_base_name(&record.file_name).to_string();
        if namespace == Namespace::Sprites {
            base = base.replace('^', "\\");
        }
        let name = normalize_lump_name(&base);
        if config.skip_dehacked && name.as_deref() == Some("dehacked") {
            continue;
        }
        record.name = name;
    }
}

/// Indexed, immutable list of lump records
#[derive(Debug, Default)]
pub struct LumpDirectory {
    records: Vec<LumpRecord>,
    /// lump name -> record indices in ascending order
    lumps: HashMap<String, Vec<usize>>,
    /// file name -> last record carrying it
    files: HashMap<String, usize>,
}

impl LumpDirectory {
    /// Index `records`; duplicates are reported against `archive_name`
    pub fn build(
        records: Vec<LumpRecord>,
        archive_name: &str,
        path_addressed: bool,
        warn_duplicates: bool,
    ) -> Self {
        let mut lumps: HashMap<String, Vec<usize>> = HashMap::new();
        let mut files: HashMap<String, usize> = HashMap::new();

        for (index, record) in records.iter().enumerate() {
            if let Some(name) = &record.name {
                let chain = lumps.entry(name.clone()).or_default();
                if warn_duplicates && !chain.is_empty() && WATCHED_LUMPS.contains(&name.as_str()) {
                    warn!(archive = archive_name, lump = %name, "duplicate lump in archive");
                }
                chain.push(index);
            }
            if !record.file_name.is_empty() {
                if files.insert(record.file_name.clone(), index).is_some() {
                    if warn_duplicates && path_addressed {
                        warn!(archive = archive_name, file = %record.file_name, "duplicate file in archive");
                    }
                }
            }
        }

        Self {
            records,
            lumps,
            files,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LumpRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[LumpRecord] {
        &self.records
    }

    fn chain(&self, name: &str) -> impl DoubleEndedIterator<Item = usize> + '_ {
        let key = normalize_lump_name(name);
        key.and_then(|key| self.lumps.get(&key))
            .into_iter()
            .flat_map(|chain| chain.iter().copied())
    }

    fn accepts(&self, index: usize, ns: Namespace) -> bool {
        let record = &self.records[index];
        ns.accepts(record.namespace, record.name.as_deref())
    }

    /// Earliest record named `name` in `ns`
    pub fn find_first(&self, name: &str, ns: Namespace) -> Option<usize> {
        self.chain(name).find(|&i| self.accepts(i, ns))
    }

    /// Latest record named `name` in `ns`
    pub fn find_last(&self, name: &str, ns: Namespace) -> Option<usize> {
        self.chain(name).rev().find(|&i| self.accepts(i, ns))
    }

    /// Latest record named `name` in `ns` whose index is `<= limit`
    pub fn find_at_or_before(&self, name: &str, ns: Namespace, limit: usize) -> Option<usize> {
        self.chain(name)
            .rev()
            .find(|&i| i <= limit && self.accepts(i, ns))
    }

    /// Last record with this file name
    pub fn find_file(&self, file_name: &str) -> Option<usize> {
        let key = normalize_file_name(file_name);
        if key.is_empty() {
            return None;
        }
        self.files.get(&key).copied()
    }

    /// First record at or after `from` that a query for `ns` would accept
    pub fn next_lump(&self, from: usize, ns: Namespace) -> Option<usize> {
        (from..self.records.len()).find(|&i| self.accepts(i, ns))
    }
}
