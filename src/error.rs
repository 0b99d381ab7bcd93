use std::io;
use thiserror::Error;

/// Result type for lumpfs operations
pub type Result<T> = std::result::Result<T, FsysError>;

/// Unified error type for all lumpfs operations
#[derive(Debug, Error)]
pub enum FsysError {
    // Archive errors
    #[error("Invalid archive format: {0}")]
    InvalidFormat(String),

    #[error("No archive reader accepted '{0}'")]
    UnknownFormat(String),

    #[error("Unsupported archive format {format} for '{name}'")]
    Unsupported { name: String, format: &'static str },

    #[error("Too many lumps in '{archive}': {count}")]
    TooManyLumps { archive: String, count: usize },

    #[error("Invalid compression method: {0}")]
    InvalidCompression(u16),

    // Lookup errors
    #[error("Lump not found: {0}")]
    LumpNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid lump handle: {0:#010x}")]
    InvalidHandle(u32),

    // Reader errors
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("CRC mismatch: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("Lump reader is in error state: {0}")]
    ReaderFailed(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for FsysError {
    fn from(err: toml::de::Error) -> Self {
        FsysError::Config(err.to_string())
    }
}

impl FsysError {
    /// True for errors that only mean "this stream is not that format".
    pub fn is_probe_miss(&self) -> bool {
        matches!(
            self,
            FsysError::InvalidFormat(_) | FsysError::TooManyLumps { .. } | FsysError::Io(_)
        )
    }
}

impl FsysError {
    /// Recover an error that travelled through [`std::io::Read`] or
    /// [`std::io::Seek`] as an `io::Error`
    pub fn from_io(err: io::Error) -> Self {
        let carried = err
            .get_ref()
            .map_or(false, |inner| inner.is::<FsysError>());
        if !carried {
            return FsysError::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<FsysError>()) {
            Some(Ok(inner)) => *inner,
            _ => FsysError::ReaderFailed("unrecoverable reader error".to_string()),
        }
    }
}

impl From<FsysError> for io::Error {
    fn from(err: FsysError) -> Self {
        match err {
            FsysError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_io_error() {
        let original = FsysError::CrcMismatch {
            expected: 1,
            actual: 2,
        };
        let io_err: io::Error = original.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        match FsysError::from_io(io_err) {
            FsysError::CrcMismatch { expected: 1, actual: 2 } => {}
            other => panic!("Expected CrcMismatch, got: {:?}", other),
        }
    }

    #[test]
    fn test_plain_io_error_stays_io() {
        let err = FsysError::from_io(io::Error::new(io::ErrorKind::UnexpectedEof, "short"));
        match err {
            FsysError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("Expected Io, got: {:?}", other),
        }
        assert!(FsysError::InvalidFormat("x".into()).is_probe_miss());
        assert!(!FsysError::CrcMismatch { expected: 0, actual: 1 }.is_probe_miss());
    }
}
