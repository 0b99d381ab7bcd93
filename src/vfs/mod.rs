//! Search path stack
//!
//! [`FileSystem`] owns every mounted [`Archive`] in mount order. Archives
//! mounted after [`FileSystem::start_auxiliary`] form the auxiliary region,
//! a contiguous suffix that ordinary queries skip unless auxiliary search is
//! enabled:
//!
//! ```text
//!  0        1        2           aux_index     len
//! +--------+--------+--------+  +--------+--------+
//! | doom2  | mod    | mod:   |  | aux    | aux:   |
//! | .wad   | .pk3   | m.wad  |  | .pk3   | x.wad  |
//! +--------+--------+--------+  +--------+--------+
//! |<--- ordinary queries --->|  |<-- auxiliary -->|
//! ```
//!
//! Lookups live in `lookup`, iterators in `iter` and lump access in `read`.

mod iter;
mod lookup;
mod read;

pub use iter::{FileNameIter, FileNamespaceIter, NamespaceIter};

use crate::archive::{Archive, ArchiveFlags, FormatRegistry, ParseContext};
use crate::config::FsysConfig;
use crate::error::{FsysError, Result};
use crate::handle::{LumpHandle, MAX_ARCHIVES, MAX_LUMPS};
use crate::stream::{ByteSource, SharedSource};
use std::path::Path;
use tracing::{debug, info, warn};

/// Nested archives smaller than this cannot hold a directory
const MIN_NESTED_SIZE: u64 = 16;

/// Format hint for [`FileSystem::add_auxiliary_stream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxFileType {
    /// Known to be an IWAD/PWAD; skip probing
    Wad,
    /// Probe, then mount nested WADs and PK3s
    Zip,
    /// Probe, no nested archives
    Archive,
}

/// The mounted set of archives
pub struct FileSystem {
    config: FsysConfig,
    registry: FormatRegistry,
    archives: Vec<Archive>,
    /// First archive of the auxiliary region
    aux_index: Option<usize>,
    aux_search: bool,
    user_wads: bool,
    mount_counter: u32,
}

impl FileSystem {
    /// Empty filesystem using the built-in formats
    pub fn new(config: FsysConfig) -> Self {
        Self::with_registry(config, FormatRegistry::global().clone())
    }

    pub fn with_registry(config: FsysConfig, registry: FormatRegistry) -> Self {
        Self {
            aux_search: config.aux_search,
            config,
            registry,
            archives: Vec::new(),
            aux_index: None,
            user_wads: false,
            mount_counter: 0,
        }
    }

    pub fn config(&self) -> &FsysConfig {
        &self.config
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Every mounted archive, auxiliary ones included
    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }

    pub fn archive(&self, file: usize) -> Option<&Archive> {
        self.archives.get(file)
    }

    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }

    /// Number of archives visible to ordinary queries
    pub fn search_count(&self) -> usize {
        match self.aux_index {
            Some(aux) if !self.aux_search => aux,
            _ => self.archives.len(),
        }
    }

    /// Index of the first auxiliary archive, if the region is open
    pub fn first_aux_archive(&self) -> Option<usize> {
        self.aux_index
    }

    pub fn aux_search(&self) -> bool {
        self.aux_search
    }

    /// Let ordinary queries see the auxiliary region
    pub fn set_aux_search(&mut self, enabled: bool) {
        self.aux_search = enabled;
    }

    /// Index the next mounted archive will get
    pub fn next_mount_file_id(&self) -> usize {
        self.archives.len()
    }

    /// Tag archives mounted from now on as user-added
    pub fn start_user_wads(&mut self) {
        self.user_wads = true;
    }

    pub fn end_user_wads(&mut self) {
        self.user_wads = false;
    }

    fn push(&mut self, mut archive: Archive) -> Result<usize> {
        let index = self.archives.len();
        if index >= MAX_ARCHIVES {
            return Err(FsysError::InvalidHandle((index as u32) << 16));
        }
        if archive.len() > MAX_LUMPS {
            return Err(FsysError::TooManyLumps {
                archive: archive.name().to_string(),
                count: archive.len(),
            });
        }

        archive.set_flags(ArchiveFlags {
            user: self.user_wads,
            auxiliary: self.aux_index.is_some(),
            ..archive.flags()
        });
        archive.set_mount_index(self.mount_counter);
        self.mount_counter += 1;

        if self.config.report_added_paks {
            info!(
                archive = archive.name(),
                format = %archive.format(),
                lumps = archive.len(),
                "adding archive"
            );
        }
        self.archives.push(archive);
        Ok(index)
    }

    fn open_source(path: &Path) -> Result<SharedSource> {
        SharedSource::open_file(path).map_err(|err| match err {
            FsysError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                FsysError::FileNotFound(path.display().to_string())
            }
            other => other,
        })
    }

    /// Mount a disk file, detecting its format
    ///
    /// Non-WAD archives also get their root-level WADs and PK3s mounted
    /// right after them.
    pub fn add_disk_file<P: AsRef<Path>>(&mut self, path: P, fix_voices: bool) -> Result<usize> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let source = Self::open_source(path)?;

        let mut ctx = ParseContext::new(&name, &self.config);
        ctx.fix_voices = fix_voices;
        let archive = Archive::open(&name, source, &self.registry, &ctx)?;

        let is_wad = archive.is_wad();
        let index = self.push(archive)?;
        if !is_wad {
            self.mount_nested(index, true);
        }
        Ok(index)
    }

    /// [`Self::add_disk_file`] that reports failure instead of returning it
    pub fn add_disk_file_optional<P: AsRef<Path>>(&mut self, path: P, fix_voices: bool) -> bool {
        let path = path.as_ref();
        match self.add_disk_file(path, fix_voices) {
            Ok(_) => true,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "optional file not added");
                false
            }
        }
    }

    /// Mount a disk directory as a path-addressed archive
    pub fn mount_disk_dir<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let ctx = ParseContext::new(&name, &self.config);
        let archive = Archive::open_dir(path, &ctx)?;
        let index = self.push(archive)?;
        self.mount_nested(index, true);
        Ok(index)
    }

    /// Decode entry `lump` of archive `parent` and parse it as an archive
    fn load_nested(&self, parent: usize, lump: usize, require_wad_magic: bool) -> Option<Archive> {
        let archive = &self.archives[parent];
        let record = archive.record(lump)?;
        let name = format!("{}:{}", archive.name(), record.file_name);

        if record.size > self.config.max_nested_archive_size {
            warn!(archive = %name, size = record.size, "nested archive too large, skipped");
            return None;
        }
        if record.size < MIN_NESTED_SIZE {
            return None;
        }

        let data = match archive.read_lump(lump, &self.config) {
            Ok(data) => data,
            Err(err) => {
                warn!(archive = %name, error = %err, "cannot read nested archive");
                return None;
            }
        };
        if require_wad_magic && !(data.starts_with(b"PWAD") || data.starts_with(b"IWAD")) {
            return None;
        }

        let ctx = ParseContext::new(&name, &self.config);
        match Archive::open(&name, SharedSource::from_bytes(data), &self.registry, &ctx) {
            Ok(nested) => Some(nested),
            Err(err) => {
                warn!(archive = %name, error = %err, "nested archive rejected");
                None
            }
        }
    }

    fn push_nested(&mut self, archive: Archive) -> Option<usize> {
        let name = archive.name().to_string();
        match self.push(archive) {
            Ok(index) => Some(index),
            Err(err) => {
                warn!(archive = %name, error = %err, "cannot mount nested archive");
                None
            }
        }
    }

    /// Mount root-level nested archives of `parent`
    ///
    /// With `allow_pk3` set, nested non-WAD archives are mounted too and
    /// scanned once more for WADs only.
    fn mount_nested(&mut self, parent: usize, allow_pk3: bool) {
        for lump in self.archives[parent].nested_archives(allow_pk3) {
            let Some(nested) = self.load_nested(parent, lump, false) else {
                continue;
            };
            let is_wad = nested.is_wad();
            if !allow_pk3 && !is_wad {
                continue;
            }
            if let Some(index) = self.push_nested(nested) {
                if !is_wad {
                    self.mount_nested(index, false);
                }
            }
        }
    }

    fn mount_nested_wads(&mut self, parent: usize) {
        for lump in self.archives[parent].nested_archives(false) {
            if let Some(nested) = self.load_nested(parent, lump, true) {
                self.push_nested(nested);
            }
        }
    }

    /// Open the auxiliary region if needed; returns its first handle
    pub fn start_auxiliary(&mut self) -> Result<LumpHandle> {
        let index = *self.aux_index.get_or_insert(self.archives.len());
        LumpHandle::new(index, 0)
    }

    /// Replace the auxiliary region with the archive at `path`
    pub fn open_auxiliary<P: AsRef<Path>>(&mut self, path: P) -> Result<LumpHandle> {
        self.close_auxiliary();
        let handle = self.start_auxiliary()?;

        let path = path.as_ref();
        let name = path.display().to_string();
        let opened = Self::open_source(path).and_then(|source| {
            let ctx = ParseContext::new(&name, &self.config);
            Archive::open(&name, source, &self.registry, &ctx)
        });
        match opened.and_then(|archive| self.push(archive)) {
            Ok(_) => Ok(handle),
            Err(err) => {
                self.aux_index = None;
                Err(err)
            }
        }
    }

    /// Mount an already-open stream into the auxiliary region
    ///
    /// Returns the handle of the first archive appended.
    pub fn add_auxiliary_stream<S: ByteSource + 'static>(
        &mut self,
        name: &str,
        stream: S,
        file_type: AuxFileType,
    ) -> Result<LumpHandle> {
        let source = SharedSource::new(stream)?;
        self.start_auxiliary()?;
        let first = self.archives.len();

        let ctx = ParseContext::new(name, &self.config);
        let archive = match file_type {
            AuxFileType::Wad => Archive::open_wad(name, source, &ctx)?,
            AuxFileType::Zip | AuxFileType::Archive => {
                Archive::open(name, source, &self.registry, &ctx)?
            }
        };
        let index = self.push(archive)?;

        if file_type == AuxFileType::Zip {
            self.mount_nested_wads(index);
            let pk3s: Vec<usize> = self.archives[index]
                .nested_archives(true)
                .into_iter()
                .filter(|&lump| {
                    self.archives[index]
                        .record(lump)
                        .map_or(false, |r| r.file_name.ends_with(".pk3"))
                })
                .collect();
            for lump in pk3s {
                if let Some(nested) = self.load_nested(index, lump, false) {
                    if let Some(nested_index) = self.push_nested(nested) {
                        self.mount_nested_wads(nested_index);
                    }
                }
            }
        }

        LumpHandle::new(first, 0)
    }

    /// Unmount the auxiliary region
    pub fn close_auxiliary(&mut self) {
        if let Some(aux) = self.aux_index.take() {
            debug!(count = self.archives.len() - aux, "closing auxiliary archives");
            self.archives.truncate(aux);
        }
    }

    /// Unmount everything
    pub fn shutdown(&mut self) {
        self.archives.clear();
        self.aux_index = None;
        self.user_wads = false;
    }

    /// Archive and record behind `handle`
    pub(crate) fn resolve(&self, handle: LumpHandle) -> Result<(&Archive, usize)> {
        let archive = self
            .archives
            .get(handle.archive())
            .ok_or(FsysError::InvalidHandle(handle.raw()))?;
        if handle.lump() >= archive.len() {
            return Err(FsysError::InvalidHandle(handle.raw()));
        }
        Ok((archive, handle.lump()))
    }
}

/// Handle of a lump already known to be mounted
///
/// [`FileSystem::push`] keeps both indices inside the handle's range.
pub(crate) fn make_handle(archive: usize, lump: usize) -> LumpHandle {
    LumpHandle::encode(archive as u16, lump as u16)
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("archives", &self.archives)
            .field("aux_index", &self.aux_index)
            .field("aux_search", &self.aux_search)
            .finish()
    }
}
