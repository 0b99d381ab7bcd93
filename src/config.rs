//! Filesystem configuration
//!
//! All knobs have defaults, so an empty TOML document is a valid config:
//!
//! ```toml
//! report_added_paks = false
//! skip_sounds = true
//! backward_seeks_before_caching = 4
//! ```

use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

/// Sanity bound on directory entries per archive
pub const DEFAULT_MAX_LUMPS: usize = 65520;

/// Nested archives above this size are not mounted
pub const DEFAULT_MAX_NESTED_SIZE: u64 = 0x1fff_ffff;

/// Runtime options for [`crate::FileSystem`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FsysConfig {
    /// Log every archive as it is mounted
    pub report_added_paks: bool,
    /// Warn about duplicate file names inside one archive
    pub warn_duplicates: bool,
    /// Hide sound lumps (`ds*`/`dp*` in WADs, `sounds/` in ZIPs)
    pub skip_sounds: bool,
    /// Hide `sprites/` lumps from ZIPs
    pub skip_sprites: bool,
    /// Hide `dehacked` lumps
    pub skip_dehacked: bool,
    /// Files at the root of a ZIP land in the global namespace
    pub zip_root_is_global: bool,
    /// Initial value of the "auxiliary archives participate" flag
    pub aux_search: bool,
    pub max_lumps_per_archive: usize,
    /// Backward seeks a lump reader tolerates before caching the whole entry
    pub backward_seeks_before_caching: u32,
    pub max_nested_archive_size: u64,
}

impl Default for FsysConfig {
    fn default() -> Self {
        Self {
            report_added_paks: true,
            warn_duplicates: true,
            skip_sounds: false,
            skip_sprites: false,
            skip_dehacked: false,
            zip_root_is_global: false,
            aux_search: false,
            max_lumps_per_archive: DEFAULT_MAX_LUMPS,
            backward_seeks_before_caching: 2,
            max_nested_archive_size: DEFAULT_MAX_NESTED_SIZE,
        }
    }
}

impl FsysConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Quiet config used by tests and tools
    pub fn quiet() -> Self {
        Self {
            report_added_paks: false,
            warn_duplicates: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsysError;

    #[test]
    fn test_empty_toml_is_default() {
        let config = FsysConfig::from_toml_str("").unwrap();
        assert_eq!(config, FsysConfig::default());
        assert_eq!(config.max_lumps_per_archive, 65520);
        assert_eq!(config.backward_seeks_before_caching, 2);
    }

    #[test]
    fn test_partial_override() {
        let config = FsysConfig::from_toml_str(
            "skip_sounds = true\nbackward_seeks_before_caching = 5\n",
        )
        .unwrap();
        assert!(config.skip_sounds);
        assert_eq!(config.backward_seeks_before_caching, 5);
        assert!(config.report_added_paks);
    }

    #[test]
    fn test_bad_toml() {
        match FsysConfig::from_toml_str("skip_sounds = \"yes\"") {
            Err(FsysError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }
}
