//! Lump namespaces
//!
//! Every lump carries exactly one [`Namespace`]. Flat-directory archives
//! assign it from marker lumps, ZIP-like archives from the entry's leading
//! path component (see [`RESOURCE_DIRS`]). The two wildcard namespaces only
//! ever appear in queries.

use std::fmt;

/// Logical partition of the flat lump name space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Global,
    Sprites,
    Flats,
    ColorMaps,
    AcsLibrary,
    NewTextures,
    Voices,
    HiResTextures,
    HiResFlats,

    // ZIP-only; a flat-directory archive answers these from Global
    ZipSpecial,
    Patches,
    Graphics,
    Sounds,
    Music,

    /// Wildcard: any lump with a name of 1..=8 bytes
    AnyNamed,
    /// Wildcard: any lump, nameless ones included
    Any,
}

/// ZIP resource directories, matched in order against the lowercased path
pub const RESOURCE_DIRS: &[(&str, Namespace)] = &[
    ("sprites/", Namespace::Sprites),
    ("flats/", Namespace::Flats),
    ("colormaps/", Namespace::ColorMaps),
    ("acs/", Namespace::AcsLibrary),
    ("textures/", Namespace::NewTextures),
    ("voices/", Namespace::Voices),
    ("hires/flats/", Namespace::HiResFlats),
    ("hires/", Namespace::HiResTextures),
    ("patches/", Namespace::Patches),
    ("graphics/", Namespace::Graphics),
    ("sounds/", Namespace::Sounds),
    ("music/", Namespace::Music),
];

/// Extensions that never produce a lump name inside ZIP-like archives
pub const IGNORED_EXTENSIONS: &[&str] = &[
    ".wad", ".zip", ".7z", ".pk3", ".pk7", ".exe", ".bat", ".ini", ".cpp", ".doc", ".me", ".rtf",
    ".rsp", ".now", ".htm", ".html", ".wri", ".nfo", ".diz", ".bbs",
];

impl Namespace {
    pub fn is_wildcard(self) -> bool {
        matches!(self, Namespace::AnyNamed | Namespace::Any)
    }

    /// Namespaces that only ZIP-like archives can assign
    pub fn is_zip_only(self) -> bool {
        matches!(
            self,
            Namespace::HiResFlats
                | Namespace::Patches
                | Namespace::Graphics
                | Namespace::Sounds
                | Namespace::Music
        )
    }

    /// The namespace a flat-directory archive actually searches for this query
    pub fn for_flat_directory(self) -> Namespace {
        if self.is_zip_only() {
            Namespace::Global
        } else {
            self
        }
    }

    /// Does a lump tagged `lump_ns` with `name` satisfy a query for `self`?
    pub fn accepts(self, lump_ns: Namespace, name: Option<&str>) -> bool {
        match self {
            Namespace::Any => true,
            Namespace::AnyNamed => name.map_or(false, |n| !n.is_empty() && n.len() <= 8),
            wanted => name.is_some() && lump_ns == wanted,
        }
    }

    /// Namespace for a ZIP path (already lowercased), if it sits in a resource dir
    pub fn from_zip_path(path: &str) -> Option<Namespace> {
        RESOURCE_DIRS
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix))
            .map(|&(_, ns)| ns)
    }

    /// True when `dir` (lowercase, `/`-terminated) is a resource directory
    pub fn is_resource_dir(dir: &str) -> bool {
        RESOURCE_DIRS.iter().any(|(prefix, _)| prefix.starts_with(dir))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Global => "global",
            Namespace::Sprites => "sprites",
            Namespace::Flats => "flats",
            Namespace::ColorMaps => "colormaps",
            Namespace::AcsLibrary => "acslibrary",
            Namespace::NewTextures => "newtextures",
            Namespace::Voices => "voices",
            Namespace::HiResTextures => "hirestextures",
            Namespace::HiResFlats => "hiresflats",
            Namespace::ZipSpecial => "zipspecial",
            Namespace::Patches => "patches",
            Namespace::Graphics => "graphics",
            Namespace::Sounds => "sounds",
            Namespace::Music => "music",
            Namespace::AnyNamed => "anynamed",
            Namespace::Any => "any",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// True if the path ends with one of [`IGNORED_EXTENSIONS`]
pub fn has_ignored_extension(path: &str) -> bool {
    IGNORED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
