//! Lump metadata and read entry points

use super::FileSystem;
use crate::archive::ArchiveFormat;
use crate::error::{FsysError, Result};
use crate::handle::LumpHandle;
use crate::lump_reader::LumpReader;
use crate::namespace::Namespace;
use std::io::{Read, Seek, SeekFrom};
use tracing::warn;

impl FileSystem {
    /// Decoded size of a lump
    pub fn lump_length(&self, handle: LumpHandle) -> Result<u64> {
        let (archive, lump) = self.resolve(handle)?;
        Ok(archive.records()[lump].size)
    }

    /// Short lump name; `None` for hidden entries and invalid handles
    pub fn lump_name(&self, handle: LumpHandle) -> Option<&str> {
        let (archive, lump) = self.resolve(handle).ok()?;
        archive.records()[lump].name.as_deref()
    }

    pub fn lump_namespace(&self, handle: LumpHandle) -> Option<Namespace> {
        let (archive, lump) = self.resolve(handle).ok()?;
        Some(archive.records()[lump].namespace)
    }

    /// `archive:file` display name
    pub fn full_lump_name(&self, handle: LumpHandle) -> Option<String> {
        let (archive, lump) = self.resolve(handle).ok()?;
        Some(format!("{}:{}", archive.name(), archive.records()[lump].file_name))
    }

    /// File name inside the archive, without the archive prefix
    pub fn real_lump_name(&self, handle: LumpHandle) -> Option<&str> {
        let (archive, lump) = self.resolve(handle).ok()?;
        Some(archive.records()[lump].file_name.as_str())
    }

    /// Display name of the archive holding `handle`
    pub fn full_pak_name_for_lump(&self, handle: LumpHandle) -> Option<&str> {
        self.full_pak_name_by_file(handle.archive())
    }

    pub fn full_pak_name_by_file(&self, file: usize) -> Option<&str> {
        self.archives.get(file).map(|a| a.name())
    }

    /// Archive index of `handle`
    pub fn lump_file(&self, handle: LumpHandle) -> usize {
        handle.archive()
    }

    pub fn is_iwad_file(&self, file: usize) -> bool {
        self.archives.get(file).map_or(false, |a| a.flags().iwad)
    }

    /// Flat-directory WAD (not a PK3, PAK or disk directory)
    pub fn is_wad_file(&self, file: usize) -> bool {
        self.archives
            .get(file)
            .map_or(false, |a| a.format() == ArchiveFormat::Wad)
    }

    pub fn is_aux_file(&self, file: usize) -> bool {
        self.archives.get(file).map_or(false, |a| a.flags().auxiliary)
    }

    pub fn is_user_file(&self, file: usize) -> bool {
        self.archives.get(file).map_or(false, |a| a.flags().user)
    }

    pub fn is_iwad_lump(&self, handle: LumpHandle) -> bool {
        self.is_iwad_file(handle.archive())
    }

    pub fn is_wad_lump(&self, handle: LumpHandle) -> bool {
        self.is_wad_file(handle.archive())
    }

    pub fn is_aux_lump(&self, handle: LumpHandle) -> bool {
        self.is_aux_file(handle.archive())
    }

    pub fn is_user_lump(&self, handle: LumpHandle) -> bool {
        self.is_user_file(handle.archive())
    }

    /// Open a decompressing reader over a lump
    pub fn open_lump(&self, handle: LumpHandle) -> Result<LumpReader> {
        let (archive, lump) = self.resolve(handle)?;
        archive.open_lump(lump, &self.config)
    }

    /// Open the newest lump named `name` in `ns`
    pub fn open_lump_by_name(&self, name: &str, ns: Namespace) -> Result<LumpReader> {
        self.open_lump(self.get_num_for_name(name, ns)?)
    }

    /// Fill `buf` from lump `handle` starting at byte `pos`
    pub fn read_from_lump(&self, handle: LumpHandle, buf: &mut [u8], pos: u64) -> Result<()> {
        let mut reader = self.open_lump(handle)?;
        if pos.checked_add(buf.len() as u64).map_or(true, |end| end > reader.size()) {
            return Err(FsysError::InvalidFormat(format!(
                "read of {} bytes at {} past end of {} ({} bytes)",
                buf.len(),
                pos,
                reader.name(),
                reader.size()
            )));
        }
        reader.seek(SeekFrom::Start(pos)).map_err(FsysError::from_io)?;
        reader.read_exact(buf).map_err(FsysError::from_io)?;
        Ok(())
    }

    /// Whole lump in memory
    pub fn load_lump(&self, handle: LumpHandle) -> Result<Vec<u8>> {
        self.open_lump(handle)?.read_all()
    }

    /// Whole lump in memory, addressed by file name first, then lump name
    pub fn load_lump_into_vec(&self, name: &str) -> Result<Vec<u8>> {
        let handle = match self.check_num_for_file_name(name) {
            Some(handle) => handle,
            None => self.get_num_for_name(name, Namespace::Global)?,
        };
        self.load_lump(handle)
    }

    /// Global lump `name` as text; invalid UTF-8 is read as Latin-1
    pub fn load_text_lump(&self, name: &str) -> Result<String> {
        let data = self.load_lump(self.get_num_for_name(name, Namespace::Global)?)?;
        match String::from_utf8(data) {
            Ok(text) => Ok(text),
            Err(err) => {
                warn!(lump = name, "not a valid UTF-8 text lump, assuming Latin-1");
                Ok(err.into_bytes().iter().map(|&b| b as char).collect())
            }
        }
    }
}
