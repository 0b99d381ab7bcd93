//! Backing byte streams
//!
//! Every mounted archive owns one [`SharedSource`]. Readers never keep the
//! underlying cursor between calls: each access locks, seeks and reads, so
//! several lump readers can share one archive stream.

use crate::error::{FsysError, Result};
use parking_lot::{Mutex, MutexGuard};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Anything an archive can be read from
pub trait ByteSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ByteSource for T {}

/// Mutex-guarded, reference-counted byte source with positional reads
#[derive(Clone)]
pub struct SharedSource {
    inner: Arc<Mutex<Box<dyn ByteSource>>>,
    len: u64,
}

impl SharedSource {
    /// Wrap an arbitrary source; its length is taken from a seek to the end
    pub fn new<S: ByteSource + 'static>(mut source: S) -> Result<Self> {
        let len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Box::new(source))),
            len,
        })
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            inner: Arc::new(Mutex::new(Box::new(Cursor::new(data)))),
            len,
        }
    }

    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read up to `buf.len()` bytes at `offset`; short only at end of stream
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        let mut source = self.inner.lock();
        source.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match source.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let n = self.read_at(offset, buf)?;
        if n != buf.len() {
            return Err(FsysError::InvalidFormat(format!(
                "unexpected end of stream: wanted {} bytes at {}, got {}",
                buf.len(),
                offset,
                n
            )));
        }
        Ok(())
    }

    /// Read `len` bytes at `offset` into a fresh buffer
    pub fn read_vec_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.read_exact_at(offset, &mut data)?;
        Ok(data)
    }

    /// Exclusive access for sequential parsing
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn ByteSource>> {
        self.inner.lock()
    }
}

impl std::fmt::Debug for SharedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSource").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_reads() {
        let source = SharedSource::from_bytes((0u8..100).collect());
        assert_eq!(source.len(), 100);

        let mut buf = [0u8; 4];
        source.read_exact_at(10, &mut buf).unwrap();
        assert_eq!(buf, [10, 11, 12, 13]);

        // Clones share the same bytes
        let clone = source.clone();
        clone.read_exact_at(96, &mut buf).unwrap();
        assert_eq!(buf, [96, 97, 98, 99]);
    }

    #[test]
    fn test_short_read_at_end() {
        let source = SharedSource::from_bytes(vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(source.read_at(1, &mut buf).unwrap(), 2);
        assert_eq!(source.read_at(3, &mut buf).unwrap(), 0);
        assert!(source.read_exact_at(2, &mut buf).is_err());
    }

    #[test]
    fn test_wraps_seekable_source() {
        let source = SharedSource::new(Cursor::new(vec![7u8; 32])).unwrap();
        assert_eq!(source.len(), 32);
        assert_eq!(source.read_vec_at(30, 2).unwrap(), vec![7, 7]);
    }
}
