//! Archive containers and the mounted-archive type
//!
//! Each supported container has a parser module producing [`LumpRecord`]s;
//! [`registry`] decides which parser handles a stream, and [`Archive`] wraps
//! the result as one entry of the search path stack.

pub mod dfwad;
pub mod dir;
pub mod directory;
mod end_record;
pub mod format;
pub(crate) mod local_entry;
pub mod pak;
pub mod registry;
pub mod wad;
pub mod zip;

pub use directory::{DataLocation, LumpDirectory, LumpRecord, Storage};
pub use end_record::{EndRecord, END_RECORD_SIGNATURE, END_RECORD_SIZE};
pub use format::{ArchiveFormat, ParseContext};
pub use local_entry::{LocalEntryHeader, LOCAL_ENTRY_SIGNATURE};
pub use registry::{FormatOpener, FormatRegistry, OpenFn, ParsedArchive};

use crate::config::FsysConfig;
use crate::error::{FsysError, Result};
use crate::lump_reader::LumpReader;
use crate::namespace::Namespace;
use crate::stream::SharedSource;
use std::io::Read;
use std::path::Path;

/// Size of the smallest compiled ACS object worth checking
const MIN_ACS_OBJECT_SIZE: u64 = 12;

/// Role flags of a mounted archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveFlags {
    /// Authoritative game data (IWAD header)
    pub iwad: bool,
    /// Mounted between `start_user_wads` and `end_user_wads`
    pub user: bool,
    /// Lives in the auxiliary region
    pub auxiliary: bool,
}

/// One mounted container: a search path
pub struct Archive {
    name: String,
    format: ArchiveFormat,
    flags: ArchiveFlags,
    mount_index: u32,
    /// `None` for disk directories, whose entries open their own files
    source: Option<SharedSource>,
    directory: LumpDirectory,
}

impl Archive {
    /// Probe `source` with `registry` and index whatever it holds
    pub fn open(
        name: &str,
        source: SharedSource,
        registry: &FormatRegistry,
        ctx: &ParseContext<'_>,
    ) -> Result<Self> {
        let parsed = registry.probe(&source, ctx)?;
        Ok(Self::from_parsed(name, parsed, Some(source), ctx.config))
    }

    /// Force the WAD parser on `source`
    pub fn open_wad(name: &str, source: SharedSource, ctx: &ParseContext<'_>) -> Result<Self> {
        let (header, records) = {
            let mut guard = source.lock();
            wad::parse(&mut **guard, source.len(), ctx)?
        };
        let parsed = ParsedArchive {
            format: ArchiveFormat::Wad,
            iwad: header.iwad,
            records,
        };
        Ok(Self::from_parsed(name, parsed, Some(source), ctx.config))
    }

    /// Scan a disk directory
    pub fn open_dir(path: &Path, ctx: &ParseContext<'_>) -> Result<Self> {
        let records = dir::scan(path, ctx)?;
        let parsed = ParsedArchive::new(ArchiveFormat::Directory, records);
        Ok(Self::from_parsed(ctx.name, parsed, None, ctx.config))
    }

    pub fn from_parsed(
        name: &str,
        parsed: ParsedArchive,
        source: Option<SharedSource>,
        config: &FsysConfig,
    ) -> Self {
        let directory = LumpDirectory::build(
            parsed.records,
            name,
            parsed.format.is_path_addressed(),
            config.warn_duplicates,
        );
        Self {
            name: name.to_string(),
            format: parsed.format,
            flags: ArchiveFlags {
                iwad: parsed.iwad,
                ..ArchiveFlags::default()
            },
            mount_index: 0,
            source,
            directory,
        }
    }

    /// Display name (path or `parent:child`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn flags(&self) -> ArchiveFlags {
        self.flags
    }

    pub(crate) fn set_flags(&mut self, flags: ArchiveFlags) {
        self.flags = flags;
    }

    /// Monotonic mount counter value assigned when the archive was mounted
    pub fn mount_index(&self) -> u32 {
        self.mount_index
    }

    pub(crate) fn set_mount_index(&mut self, index: u32) {
        self.mount_index = index;
    }

    pub fn is_wad(&self) -> bool {
        self.format == ArchiveFormat::Wad
    }

    pub fn len(&self) -> usize {
        self.directory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<&LumpRecord> {
        self.directory.get(index)
    }

    pub fn records(&self) -> &[LumpRecord] {
        self.directory.records()
    }

    /// Flat-directory archives only know the legacy namespaces
    fn lookup_namespace(&self, ns: Namespace) -> Namespace {
        if self.format.is_flat_directory() {
            ns.for_flat_directory()
        } else {
            ns
        }
    }

    pub fn find_first(&self, name: &str, ns: Namespace) -> Option<usize> {
        self.directory.find_first(name, self.lookup_namespace(ns))
    }

    pub fn find_last(&self, name: &str, ns: Namespace) -> Option<usize> {
        self.directory.find_last(name, self.lookup_namespace(ns))
    }

    pub fn find_at_or_before(&self, name: &str, ns: Namespace, limit: usize) -> Option<usize> {
        self.directory
            .find_at_or_before(name, self.lookup_namespace(ns), limit)
    }

    pub fn find_file(&self, file_name: &str) -> Option<usize> {
        self.directory.find_file(file_name)
    }

    pub fn next_lump(&self, from: usize, ns: Namespace) -> Option<usize> {
        self.directory.next_lump(from, self.lookup_namespace(ns))
    }

    /// Open a reader over lump `index`
    pub fn open_lump(&self, index: usize, config: &FsysConfig) -> Result<LumpReader> {
        let record = self
            .directory
            .get(index)
            .ok_or_else(|| FsysError::LumpNotFound(format!("{}:#{}", self.name, index)))?;
        LumpReader::open(
            format!("{}:{}", self.name, record.file_name),
            self.source.as_ref(),
            record,
            config.backward_seeks_before_caching,
        )
    }

    /// Decode lump `index` into memory
    pub fn read_lump(&self, index: usize, config: &FsysConfig) -> Result<Vec<u8>> {
        self.open_lump(index, config)?.read_all()
    }

    /// Root-level nested archives: `.wad` files, plus `.pk3` when allowed
    pub fn nested_archives(&self, allow_pk3: bool) -> Vec<usize> {
        if self.format.is_flat_directory() {
            return Vec::new();
        }
        self.records()
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.file_name.contains('/'))
            .filter(|(_, r)| r.file_name.ends_with(".wad") || (allow_pk3 && r.file_name.ends_with(".pk3")))
            .map(|(i, _)| i)
            .collect()
    }

    /// Compiled ACS library named like `name` (base name, `.o` optional)
    ///
    /// An exact base-name match wins; otherwise the candidate with the
    /// shortest base name at least as long as the query.
    pub fn find_acs_object(&self, name: &str, config: &FsysConfig) -> Option<usize> {
        let wanted = name.rsplit(['/', '\\']).next().unwrap_or(name).to_lowercase();
        let wanted = wanted.strip_suffix(".o").unwrap_or(&wanted).to_string();
        let short = directory::normalize_lump_name(&wanted)?;

        let mut rough: Option<(usize, usize)> = None;
        for (index, record) in self.records().iter().enumerate() {
            if record.namespace != Namespace::AcsLibrary
                || record.name.as_deref() != Some(short.as_str())
                || record.size < MIN_ACS_OBJECT_SIZE
            {
                continue;
            }
            let base = directory::file_base_name(&record.file_name);
            if base == wanted {
                if self.has_acs_signature(index, config) {
                    return Some(index);
                }
                continue;
            }
            let better = match rough {
                None => true,
                Some((_, best_len)) => base.len() >= wanted.len() && best_len > base.len(),
            };
            if better && self.has_acs_signature(index, config) {
                rough = Some((index, base.len()));
            }
        }
        rough.map(|(index, _)| index)
    }

    fn has_acs_signature(&self, index: usize, config: &FsysConfig) -> bool {
        let mut sign = [0u8; 4];
        let read = self
            .open_lump(index, config)
            .and_then(|mut reader| reader.read_exact(&mut sign).map_err(FsysError::from_io));
        read.is_ok() && &sign[..3] == b"ACS" && matches!(sign[3], 0 | b'E' | b'e')
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("flags", &self.flags)
            .field("mount_index", &self.mount_index)
            .field("lumps", &self.directory.len())
            .finish()
    }
}
