//! Forward cursors over the mounted set
//!
//! Every step re-runs the predicate of the matching point lookup, so an
//! iterator yields exactly the lumps those lookups can return. Iterators
//! borrow the filesystem; mounting while one is alive is impossible.

use super::{make_handle, FileSystem};
use crate::handle::LumpHandle;
use crate::namespace::Namespace;
use std::iter::FusedIterator;

/// Lumps accepted by `ns` across the visible archives, oldest first
#[derive(Debug, Clone)]
pub struct NamespaceIter<'a> {
    fs: &'a FileSystem,
    ns: Namespace,
    file: usize,
    lump: usize,
}

impl Iterator for NamespaceIter<'_> {
    type Item = LumpHandle;

    fn next(&mut self) -> Option<LumpHandle> {
        while self.file < self.fs.search_count() {
            if let Some(lump) = self.fs.archives[self.file].next_lump(self.lump, self.ns) {
                self.lump = lump + 1;
                return Some(make_handle(self.file, lump));
            }
            self.file += 1;
            self.lump = 0;
        }
        None
    }
}

impl FusedIterator for NamespaceIter<'_> {}

/// Lumps accepted by `ns` inside one archive
#[derive(Debug, Clone)]
pub struct FileNamespaceIter<'a> {
    fs: &'a FileSystem,
    ns: Namespace,
    file: usize,
    lump: Option<usize>,
}

impl Iterator for FileNamespaceIter<'_> {
    type Item = LumpHandle;

    fn next(&mut self) -> Option<LumpHandle> {
        let from = self.lump?;
        if self.file >= self.fs.search_count() {
            self.lump = None;
            return None;
        }
        let found = self.fs.archives[self.file].next_lump(from, self.ns);
        self.lump = found.map(|lump| lump + 1);
        found.map(|lump| make_handle(self.file, lump))
    }
}

impl FusedIterator for FileNamespaceIter<'_> {}

/// Every visible archive's copy of one file, oldest first
#[derive(Debug, Clone)]
pub struct FileNameIter<'a> {
    fs: &'a FileSystem,
    name: String,
    file: usize,
}

impl Iterator for FileNameIter<'_> {
    type Item = LumpHandle;

    fn next(&mut self) -> Option<LumpHandle> {
        if self.name.is_empty() {
            return None;
        }
        while self.file < self.fs.search_count() {
            let file = self.file;
            self.file += 1;
            if let Some(lump) = self.fs.archives[file].find_file(&self.name) {
                return Some(make_handle(file, lump));
            }
        }
        None
    }
}

impl FusedIterator for FileNameIter<'_> {}

impl FileSystem {
    /// Iterate a namespace across every visible archive
    pub fn iter_namespace(&self, ns: Namespace) -> NamespaceIter<'_> {
        NamespaceIter {
            fs: self,
            ns,
            file: 0,
            lump: 0,
        }
    }

    /// Iterate a namespace inside archive `file`
    pub fn iter_file_namespace(&self, file: usize, ns: Namespace) -> FileNamespaceIter<'_> {
        FileNamespaceIter {
            fs: self,
            ns,
            file,
            lump: Some(0),
        }
    }

    /// Iterate every visible archive holding file `name`
    pub fn iter_file_name(&self, name: &str) -> FileNameIter<'_> {
        FileNameIter {
            fs: self,
            name: name.to_string(),
            file: 0,
        }
    }
}
