//! Disk directories mounted as archives
//!
//! The tree is scanned once at mount time; every regular file becomes a
//! path-addressed entry read straight from disk, exactly like a PK3 member.

use crate::archive::directory::{assign_path_names, normalize_file_name, DataLocation, LumpRecord};
use crate::archive::format::ParseContext;
use crate::error::{FsysError, Result};
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Scan depth limit
pub const MAX_DEPTH: usize = 32;

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Build records for every file under `root`
pub fn scan(root: &Path, ctx: &ParseContext<'_>) -> Result<Vec<LumpRecord>> {
    if !root.is_dir() {
        return Err(FsysError::FileNotFound(root.display().to_string()));
    }

    let mut records = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|e| FsysError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let file_name = normalize_file_name(&relative.to_string_lossy());
        if file_name.is_empty() {
            continue;
        }
        let size = entry.metadata().map_err(|e| FsysError::Io(e.into()))?.len();

        let mut record = LumpRecord::stored(file_name, 0, size);
        record.location = DataLocation::Disk(entry.path().to_path_buf());
        records.push(record);
    }

    ctx.check_lump_count(records.len())?;
    assign_path_names(&mut records, ctx.config);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsysConfig;
    use crate::namespace::Namespace;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_tree() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("sprites")).unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join("sprites/TROOA1.png"), b"png").unwrap();
        fs::write(temp.path().join("decorate.txt"), b"actor").unwrap();
        fs::write(temp.path().join(".git/config"), b"x").unwrap();

        let config = FsysConfig::quiet();
        let ctx = ParseContext::new("mod", &config);
        let records = scan(temp.path(), &ctx).unwrap();

        assert_eq!(records.len(), 2);
        let sprite = records.iter().find(|r| r.file_name == "sprites/trooa1.png").unwrap();
        assert_eq!(sprite.namespace, Namespace::Sprites);
        assert_eq!(sprite.name.as_deref(), Some("trooa1"));
        assert_eq!(sprite.size, 3);
        assert!(matches!(sprite.location, DataLocation::Disk(_)));
    }

    #[test]
    fn test_missing_directory() {
        let config = FsysConfig::quiet();
        let ctx = ParseContext::new("nope", &config);
        assert!(scan(Path::new("/definitely/not/here"), &ctx).is_err());
    }
}
