//! Lump resolver
//!
//! Name queries walk the visible archives newest first and take the last
//! match inside each archive, so later mounts and later entries shadow
//! earlier ones. [`FileSystem::find_first_lump_occurrence`] is the one query
//! that walks oldest first.

use super::{make_handle, FileSystem};
use crate::error::{FsysError, Result};
use crate::handle::LumpHandle;
use crate::namespace::Namespace;

/// Extensions tried by [`FileSystem::check_num_for_texture_file_name`]
pub const TEXTURE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".tga", ".imgz", ".lmp", ".jpeg", ".pcx", ".bmp"];

impl FileSystem {
    /// Newest visible lump named `name` in `ns`
    pub fn check_num_for_name(&self, name: &str, ns: Namespace) -> Option<LumpHandle> {
        (0..self.search_count())
            .rev()
            .find_map(|file| {
                self.archives[file]
                    .find_last(name, ns)
                    .map(|lump| make_handle(file, lump))
            })
    }

    /// Like [`Self::check_num_for_name`], failing with [`FsysError::LumpNotFound`]
    pub fn get_num_for_name(&self, name: &str, ns: Namespace) -> Result<LumpHandle> {
        self.check_num_for_name(name, ns)
            .ok_or_else(|| FsysError::LumpNotFound(name.to_string()))
    }

    /// Oldest definition of `name` in `ns`, ignoring overrides
    ///
    /// Animated ranges anchor on the base definition of their endpoints.
    pub fn find_first_lump_occurrence(&self, name: &str, ns: Namespace) -> Option<LumpHandle> {
        (0..self.search_count()).find_map(|file| {
            self.archives[file]
                .find_first(name, ns)
                .map(|lump| make_handle(file, lump))
        })
    }

    /// Last lump named `name` inside archive `file`
    pub fn check_num_for_name_in_file(&self, name: &str, file: usize, ns: Namespace) -> Option<LumpHandle> {
        if file >= self.search_count() {
            return None;
        }
        self.archives[file]
            .find_last(name, ns)
            .map(|lump| make_handle(file, lump))
    }

    /// First lump named `name` inside archive `file`
    pub fn check_first_num_for_name_in_file(&self, name: &str, file: usize, ns: Namespace) -> Option<LumpHandle> {
        if file >= self.search_count() {
            return None;
        }
        self.archives[file]
            .find_first(name, ns)
            .map(|lump| make_handle(file, lump))
    }

    /// Definition of `name` in effect at `at`: the closest one in the same
    /// archive that does not come after it
    pub fn check_num_for_name_in_file_at_or_before(
        &self,
        name: &str,
        at: LumpHandle,
        ns: Namespace,
    ) -> Option<LumpHandle> {
        let file = at.archive();
        if file >= self.search_count() {
            return None;
        }
        self.archives[file]
            .find_at_or_before(name, ns, at.lump())
            .map(|lump| make_handle(file, lump))
    }

    /// Newest lump named `name` inside the auxiliary region only
    pub fn check_num_for_name_in_auxiliary(&self, name: &str, ns: Namespace) -> Option<LumpHandle> {
        let start = self.aux_index?;
        (start..self.archives.len()).rev().find_map(|file| {
            self.archives[file]
                .find_last(name, ns)
                .map(|lump| make_handle(file, lump))
        })
    }

    /// Newest visible file with this path
    pub fn check_num_for_file_name(&self, name: &str) -> Option<LumpHandle> {
        (0..self.search_count()).rev().find_map(|file| {
            self.archives[file]
                .find_file(name)
                .map(|lump| make_handle(file, lump))
        })
    }

    /// Like [`Self::check_num_for_file_name`], failing with [`FsysError::FileNotFound`]
    pub fn get_num_for_file_name(&self, name: &str) -> Result<LumpHandle> {
        self.check_num_for_file_name(name)
            .ok_or_else(|| FsysError::FileNotFound(name.to_string()))
    }

    /// File `name` inside the archive holding `file_lump`; global lookup without one
    pub fn check_num_for_file_name_in_same_file(
        &self,
        file_lump: Option<LumpHandle>,
        name: &str,
    ) -> Option<LumpHandle> {
        let Some(file_lump) = file_lump else {
            return self.check_num_for_file_name(name);
        };
        let file = file_lump.archive();
        if file >= self.search_count() {
            return None;
        }
        self.archives[file]
            .find_file(name)
            .map(|lump| make_handle(file, lump))
    }

    /// File `name` inside the archive holding `file_lump` or any older one
    pub fn check_num_for_file_name_in_same_file_or_lower(
        &self,
        file_lump: Option<LumpHandle>,
        name: &str,
    ) -> Option<LumpHandle> {
        let Some(file_lump) = file_lump else {
            return self.check_num_for_file_name(name);
        };
        let top = file_lump.archive().min(self.search_count().checked_sub(1)?);
        (0..=top).rev().find_map(|file| {
            self.archives[file]
                .find_file(name)
                .map(|lump| make_handle(file, lump))
        })
    }

    /// Texture addressed by path: exact, under `textures/`, then with each
    /// of [`TEXTURE_EXTENSIONS`]
    pub fn check_num_for_texture_file_name(&self, name: &str) -> Option<LumpHandle> {
        if let Some(handle) = self.check_num_for_file_name(name) {
            return Some(handle);
        }
        let under = format!("textures/{}", name);
        if let Some(handle) = self.check_num_for_file_name(&under) {
            return Some(handle);
        }
        TEXTURE_EXTENSIONS
            .iter()
            .find_map(|ext| self.check_num_for_file_name(&format!("{}{}", under, ext)))
    }

    /// `base.ext` for the first of `exts` that exists in the newest archive
    ///
    /// A newer archive always wins; inside one archive the order of `exts`
    /// decides.
    pub fn find_lump_by_file_name_with_exts(&self, base: &str, exts: &[&str]) -> Option<LumpHandle> {
        let mut found: Option<LumpHandle> = None;
        for ext in exts {
            let candidate = format!("{}.{}", base, ext.trim_start_matches('.'));
            let Some(lump) = self.check_num_for_file_name(&candidate) else {
                continue;
            };
            if let Some(prev) = found {
                if lump <= prev || lump.archive() == prev.archive() {
                    continue;
                }
            }
            found = Some(lump);
        }
        found
    }

    /// Compiled ACS library `name` in archive `file` or any older one
    ///
    /// Auxiliary archives are searched too.
    pub fn find_acs_object_in_file(&self, name: &str, file: usize) -> Option<LumpHandle> {
        if file >= self.archives.len() {
            return None;
        }
        (0..=file).rev().find_map(|index| {
            self.archives[index]
                .find_acs_object(name, &self.config)
                .map(|lump| make_handle(index, lump))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsysConfig;
    use crate::vfs::AuxFileType;
    use std::io::Cursor;

    fn pak(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut data = b"PACK".to_vec();
        data.extend_from_slice(&[0u8; 8]);
        let mut offsets = Vec::new();
        for (_, body) in files {
            offsets.push(data.len() as u32);
            data.extend_from_slice(body);
        }
        let dir = data.len() as u32;
        for ((name, body), offset) in files.iter().zip(offsets) {
            let mut raw = [0u8; 56];
            raw[..name.len()].copy_from_slice(name.as_bytes());
            data.extend_from_slice(&raw);
            data.extend_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        }
        data[4..8].copy_from_slice(&dir.to_le_bytes());
        data[8..12].copy_from_slice(&((files.len() * 64) as u32).to_le_bytes());
        data
    }

    fn mounted(paks: &[&[(&str, &[u8])]]) -> FileSystem {
        let mut fs = FileSystem::new(FsysConfig {
            aux_search: true,
            ..FsysConfig::quiet()
        });
        for (i, files) in paks.iter().enumerate() {
            fs.add_auxiliary_stream(&format!("{}.pak", i), Cursor::new(pak(files)), AuxFileType::Archive)
                .unwrap();
        }
        fs
    }

    #[test]
    fn test_file_name_with_exts() {
        let fs = mounted(&[
            &[("gfx/title.png", b"a"), ("gfx/title.jpg", b"b")],
            &[("gfx/title.tga", b"c")],
        ]);
        let found = fs.find_lump_by_file_name_with_exts("gfx/title", &["png", "jpg", "tga"]).unwrap();
        assert_eq!(found.archive(), 1);

        let fs = mounted(&[&[("gfx/title.png", b"a"), ("gfx/title.jpg", b"b")]]);
        let found = fs.find_lump_by_file_name_with_exts("gfx/title", &["jpg", "png"]).unwrap();
        assert_eq!(fs.real_lump_name(found), Some("gfx/title.jpg"));
    }

    #[test]
    fn test_texture_file_name() {
        let fs = mounted(&[&[("textures/brick.png", b"a"), ("walls/stone.png", b"b")]]);
        assert!(fs.check_num_for_texture_file_name("walls/stone.png").is_some());
        let brick = fs.check_num_for_texture_file_name("BRICK").unwrap();
        assert_eq!(fs.real_lump_name(brick), Some("textures/brick.png"));
        assert!(fs.check_num_for_texture_file_name("missing").is_none());
    }

    #[test]
    fn test_same_file_or_lower() {
        let fs = mounted(&[&[("a.txt", b"1")], &[("b.txt", b"2")], &[("c.txt", b"3")]]);
        let in_second = fs.check_num_for_file_name("b.txt").unwrap();
        assert_eq!(fs.check_num_for_file_name_in_same_file(Some(in_second), "a.txt"), None);
        let lower = fs
            .check_num_for_file_name_in_same_file_or_lower(Some(in_second), "a.txt")
            .unwrap();
        assert_eq!(lower.archive(), 0);
        assert_eq!(fs.check_num_for_file_name_in_same_file_or_lower(Some(in_second), "c.txt"), None);
        assert!(fs.check_num_for_file_name_in_same_file(None, "c.txt").is_some());
    }

    #[test]
    fn test_get_variants_fail() {
        let fs = mounted(&[&[("a.txt", b"1")]]);
        match fs.get_num_for_name("nothing", Namespace::Global) {
            Err(FsysError::LumpNotFound(name)) => assert_eq!(name, "nothing"),
            other => panic!("Expected LumpNotFound, got: {:?}", other),
        }
        match fs.get_num_for_file_name("nothing.txt") {
            Err(FsysError::FileNotFound(_)) => {}
            other => panic!("Expected FileNotFound, got: {:?}", other),
        }
    }
}
