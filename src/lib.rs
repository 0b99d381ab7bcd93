//! lumpfs: read-only lump filesystem for Doom-engine style resource archives
//!
//! This library mounts game resource containers into one ordered search
//! path and resolves short lump names and file paths against it:
//! - Flat-directory WADs with marker-driven namespaces
//! - ZIP/PK3 (stored, DEFLATE, LZMA), Quake PAK and DFWAD archives
//! - Disk directories mounted as if they were PK3s
//! - Later mounts shadow earlier ones; an auxiliary region stays hidden
//!   from ordinary queries until asked for
//!
//! # Example
//!
//! ```no_run
//! use lumpfs::{FileSystem, FsysConfig, Namespace};
//! use std::io::Read;
//!
//! let mut fs = FileSystem::new(FsysConfig::default());
//! fs.add_disk_file("doom2.wad", false)?;
//! fs.add_disk_file("mymod.pk3", false)?;
//!
//! let playpal = fs.get_num_for_name("PLAYPAL", Namespace::Global)?;
//! let mut reader = fs.open_lump(playpal)?;
//! let mut data = Vec::new();
//! reader.read_to_end(&mut data)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod handle;
pub mod lump_reader;
pub mod namespace;
pub mod stream;
pub mod vfs;

// Re-export commonly used types
pub use archive::{Archive, ArchiveFlags, ArchiveFormat, FormatOpener, FormatRegistry};
pub use config::FsysConfig;
pub use error::{FsysError, Result};
pub use handle::LumpHandle;
pub use lump_reader::{LumpReader, ReaderState};
pub use namespace::Namespace;
pub use stream::{ByteSource, SharedSource};
pub use vfs::{AuxFileType, FileSystem};
