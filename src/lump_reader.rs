//! Seekable reader over a single archive entry
//!
//! State machine:
//!
//! ```text
//! Uninitialized -> Streaming -> Exhausted
//!                    |   ^
//!        backward    v   |
//!          seek -> Restarting
//!
//! any state -> Errored (sticky)      Streaming -> Cached (materialized)
//! ```
//!
//! Seeks are lazy and only move the logical position. A read behind the
//! decoder position restarts the codec and discards output up to the target;
//! once the configured number of such rewinds is reached the whole entry is
//! decoded into memory and served from there.

use crate::archive::directory::{DataLocation, LumpRecord, Storage};
use crate::archive::local_entry::LocalEntryHeader;
use crate::error::{FsysError, Result};
use crate::stream::SharedSource;
use flate2::{Decompress, FlushDecompress, Status};
use lzma_rs::decompress::{Options as LzmaOptions, Stream as LzmaStream, UnpackedSize};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, error};

/// Compressed bytes fetched from the archive per refill
const INPUT_CHUNK: usize = 16 * 1024;

/// Scratch size used while discarding decoded bytes
const SKIP_CHUNK: usize = 4096;

/// Decoded bytes produced per step while materializing
const DECODE_CHUNK: usize = 64 * 1024;

/// Largest buffer reserved up front from a size taken out of a header
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Best ratio DEFLATE can reach
const MAX_DEFLATE_RATIO: u64 = 1032;

/// lc/lp/pb byte and dictionary size
const LZMA_PROPS_LEN: usize = 5;

/// Where the reader is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    Uninitialized,
    Streaming,
    /// Codec is being reset after a backward seek
    Restarting,
    /// Every byte has been delivered once
    Exhausted,
    /// Entry fully decoded in memory
    Cached,
    Errored(String),
}

enum Codec {
    Inflate(Decompress),
    Lzma(LzmaDecoder),
}

/// Push decoder for ZIP method 14
///
/// `lzma-rs` hands out output one dictionary window at a time, so decoded
/// bytes wait in `pending` until the caller drains them.
struct LzmaDecoder {
    /// `None` once the stream has been finished
    stream: Option<LzmaStream<Vec<u8>>>,
    pending: Vec<u8>,
    pending_start: usize,
}

fn lzma_failed(err: impl std::fmt::Display) -> FsysError {
    FsysError::DecompressionFailed(format!("LZMA: {}", err))
}

/// Decompressing `Read + Seek` adapter for one lump
pub struct LumpReader {
    name: String,
    source: SharedSource,
    storage: Storage,
    data_offset: u64,
    packed_size: u64,
    size: u64,
    expected_crc: Option<u32>,
    state: ReaderState,

    codec: Option<Codec>,
    input: Vec<u8>,
    input_start: usize,
    input_end: usize,
    packed_consumed: u64,
    /// Decoder output position
    decoded: u64,
    /// Logical read position
    pos: u64,

    crc: crc32fast::Hasher,
    crc_pos: u64,

    backward_seeks: u32,
    cache_after: u32,
    cache: Vec<u8>,
}

impl LumpReader {
    /// Open `record`, whose bytes live in `source` (unused for disk files)
    ///
    /// `cache_after` is the number of backward seeks tolerated before the
    /// entry is materialized.
    pub fn open(
        name: impl Into<String>,
        source: Option<&SharedSource>,
        record: &LumpRecord,
        cache_after: u32,
    ) -> Result<Self> {
        let name = name.into();
        let (source, data_offset) = match (&record.location, source) {
            (DataLocation::Disk(path), _) => (SharedSource::open_file(path)?, 0),
            (DataLocation::Offset(offset), Some(source)) => (source.clone(), *offset),
            (DataLocation::ZipLocalHeader(offset), Some(source)) => {
                (source.clone(), LocalEntryHeader::data_offset(source, *offset)?)
            }
            (_, None) => {
                return Err(FsysError::ReaderFailed(format!(
                    "{}: archive has no backing stream",
                    name
                )))
            }
        };

        if data_offset.saturating_add(record.packed_size) > source.len() {
            return Err(FsysError::InvalidFormat(format!(
                "{}: entry data ({} bytes at {}) runs past end of archive",
                name, record.packed_size, data_offset
            )));
        }

        Ok(Self {
            name,
            source,
            storage: record.storage,
            data_offset,
            packed_size: record.packed_size,
            size: record.size,
            expected_crc: record.crc32,
            state: ReaderState::Uninitialized,
            codec: None,
            input: Vec::new(),
            input_start: 0,
            input_end: 0,
            packed_consumed: 0,
            decoded: 0,
            pos: 0,
            crc: crc32fast::Hasher::new(),
            crc_pos: 0,
            backward_seeks: 0,
            cache_after,
            cache: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded size of the entry
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    pub fn is_cached(&self) -> bool {
        self.state == ReaderState::Cached
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.state, ReaderState::Errored(_))
    }

    /// Rewinds that had to restart the codec or triggered caching
    pub fn backward_seeks(&self) -> u32 {
        self.backward_seeks
    }

    /// Read the whole entry from the start
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.seek(SeekFrom::Start(0)).map_err(FsysError::from_io)?;
        let mut data = Vec::with_capacity(self.preallocation());
        self.read_to_end(&mut data).map_err(FsysError::from_io)?;
        Ok(data)
    }

    /// Capacity worth reserving for the decoded entry
    ///
    /// The declared size is untrusted until the data has been decoded.
    fn preallocation(&self) -> usize {
        let bound = match self.storage {
            Storage::Stored => self.packed_size,
            _ => self.packed_size.saturating_mul(MAX_DEFLATE_RATIO),
        };
        self.size.min(bound).min(MAX_PREALLOC) as usize
    }

    fn start(&mut self) -> Result<()> {
        if self.storage != Storage::Stored {
            self.reset_codec()?;
        }
        self.state = ReaderState::Streaming;
        Ok(())
    }

    /// Rewind the codec to the first byte of the entry
    fn reset_codec(&mut self) -> Result<()> {
        if self.input.is_empty() {
            self.input = vec![0u8; INPUT_CHUNK];
        }
        self.input_start = 0;
        self.input_end = 0;
        self.packed_consumed = 0;
        self.decoded = 0;

        match self.storage {
            Storage::Stored => {}
            Storage::Deflate | Storage::Zlib => {
                let zlib_header = self.storage == Storage::Zlib;
                match self.codec.as_mut() {
                    Some(Codec::Inflate(inflater)) => inflater.reset(zlib_header),
                    _ => self.codec = Some(Codec::Inflate(Decompress::new(zlib_header))),
                }
            }
            Storage::Lzma => {
                let (decoder, header_len) = self.open_lzma()?;
                self.codec = Some(Codec::Lzma(decoder));
                self.packed_consumed = header_len;
            }
        }
        Ok(())
    }

    /// Fresh LZMA decoder primed with the entry's properties, and the length
    /// of the ZIP LZMA header to skip
    fn open_lzma(&self) -> Result<(LzmaDecoder, u64)> {
        // ZIP LZMA header: version (2), properties size (2), properties
        if self.packed_size < 4 {
            return Err(FsysError::DecompressionFailed("LZMA header truncated".to_string()));
        }
        let header = self.source.read_vec_at(self.data_offset, 4)?;
        let props_size = u16::from_le_bytes([header[2], header[3]]) as u64;
        if props_size < LZMA_PROPS_LEN as u64 || self.packed_size < 4 + props_size {
            return Err(FsysError::DecompressionFailed(format!(
                "bad LZMA properties size {}",
                props_size
            )));
        }
        let props = self.source.read_vec_at(self.data_offset + 4, LZMA_PROPS_LEN)?;

        let options = LzmaOptions {
            unpacked_size: UnpackedSize::UseProvided(Some(self.size)),
            ..Default::default()
        };
        let mut stream = LzmaStream::new_with_options(&options, Vec::new());
        stream.write_all(&props).map_err(lzma_failed)?;

        let decoder = LzmaDecoder {
            stream: Some(stream),
            pending: Vec::new(),
            pending_start: 0,
        };
        Ok((decoder, 4 + props_size))
    }

    fn restart(&mut self) -> Result<()> {
        self.state = ReaderState::Restarting;
        debug!(lump = %self.name, target = self.pos, decoded = self.decoded, "backward seek, restarting decoder");
        self.reset_codec()?;
        self.state = ReaderState::Streaming;
        Ok(())
    }

    /// Feed a decoded (or stored) chunk at `at` into the running CRC
    fn track_crc(&mut self, at: u64, data: &[u8]) -> Result<()> {
        let Some(expected) = self.expected_crc else {
            return Ok(());
        };
        if self.crc_pos >= self.size {
            return Ok(());
        }
        let end = at + data.len() as u64;
        if at <= self.crc_pos && self.crc_pos < end {
            let skip = (self.crc_pos - at) as usize;
            self.crc.update(&data[skip..]);
            self.crc_pos = end;
            if self.crc_pos >= self.size {
                let actual = self.crc.clone().finalize();
                if actual != expected {
                    return Err(FsysError::CrcMismatch { expected, actual });
                }
            }
        }
        Ok(())
    }

    fn refill(&mut self) -> Result<()> {
        let remaining = self.packed_size - self.packed_consumed;
        let chunk = remaining.min(INPUT_CHUNK as u64) as usize;
        let n = self
            .source
            .read_at(self.data_offset + self.packed_consumed, &mut self.input[..chunk])?;
        if n == 0 {
            return Err(FsysError::DecompressionFailed(
                "archive stream ended inside compressed entry".to_string(),
            ));
        }
        self.packed_consumed += n as u64;
        self.input_start = 0;
        self.input_end = n;
        Ok(())
    }

    /// Decode the next bytes into `out`; 0 only at end of the compressed stream
    fn decode(&mut self, out: &mut [u8]) -> Result<usize> {
        let produced = match self.storage {
            Storage::Lzma => self.lzma_step(out)?,
            _ => self.inflate_step(out)?,
        };
        if produced > 0 {
            let at = self.decoded;
            self.decoded += produced as u64;
            self.track_crc(at, &out[..produced])?;
        }
        Ok(produced)
    }

    fn inflate_step(&mut self, out: &mut [u8]) -> Result<usize> {
        loop {
            if self.input_start == self.input_end && self.packed_consumed < self.packed_size {
                self.refill()?;
            }
            let Some(Codec::Inflate(inflater)) = self.codec.as_mut() else {
                return Err(FsysError::DecompressionFailed("decoder not initialized".to_string()));
            };
            let before_in = inflater.total_in();
            let before_out = inflater.total_out();
            let status = inflater
                .decompress(&self.input[self.input_start..self.input_end], out, FlushDecompress::None)
                .map_err(|e| FsysError::DecompressionFailed(e.to_string()))?;
            let consumed = (inflater.total_in() - before_in) as usize;
            let produced = (inflater.total_out() - before_out) as usize;
            self.input_start += consumed;

            if produced > 0 {
                return Ok(produced);
            }
            if status == Status::StreamEnd {
                return Ok(0);
            }
            let no_more_input = self.packed_consumed >= self.packed_size;
            if consumed == 0 && (self.input_start < self.input_end || no_more_input) {
                return Err(FsysError::DecompressionFailed(
                    "compressed data ended early".to_string(),
                ));
            }
        }
    }

    fn lzma_step(&mut self, out: &mut [u8]) -> Result<usize> {
        loop {
            let Some(Codec::Lzma(lzma)) = self.codec.as_mut() else {
                return Err(FsysError::DecompressionFailed("decoder not initialized".to_string()));
            };

            let available = lzma.pending.len() - lzma.pending_start;
            if available > 0 {
                let n = available.min(out.len());
                let start = lzma.pending_start;
                out[..n].copy_from_slice(&lzma.pending[start..start + n]);
                lzma.pending_start += n;
                if lzma.pending_start == lzma.pending.len() {
                    lzma.pending.clear();
                    lzma.pending_start = 0;
                }
                return Ok(n);
            }

            if self.input_start < self.input_end {
                if let Some(stream) = lzma.stream.as_mut() {
                    stream
                        .write_all(&self.input[self.input_start..self.input_end])
                        .map_err(lzma_failed)?;
                    if let Some(decoded) = stream.get_output_mut() {
                        lzma.pending.append(decoded);
                    }
                }
                self.input_start = self.input_end;
                continue;
            }

            if self.packed_consumed < self.packed_size {
                self.refill()?;
                continue;
            }

            match lzma.stream.take() {
                Some(stream) => {
                    lzma.pending = stream.finish().map_err(lzma_failed)?;
                    lzma.pending_start = 0;
                }
                None => return Ok(0),
            }
        }
    }

    /// Decode and discard until the decoder reaches `target`
    fn skip_to(&mut self, target: u64) -> Result<()> {
        let mut scratch = [0u8; SKIP_CHUNK];
        while self.decoded < target {
            let want = (target - self.decoded).min(SKIP_CHUNK as u64) as usize;
            if self.decode(&mut scratch[..want])? == 0 {
                return Err(FsysError::DecompressionFailed(format!(
                    "entry ended at {} while skipping to {}",
                    self.decoded, target
                )));
            }
        }
        Ok(())
    }

    /// Decode the whole entry into memory
    fn materialize(&mut self) -> Result<()> {
        debug!(lump = %self.name, size = self.size, "caching whole entry");
        let data = if self.storage == Storage::Stored {
            self.source
                .read_vec_at(self.data_offset, self.size.min(self.packed_size) as usize)?
        } else {
            self.reset_codec()?;
            let mut data = Vec::with_capacity(self.preallocation());
            let mut chunk = vec![0u8; DECODE_CHUNK];
            while (data.len() as u64) < self.size {
                let want = (self.size - data.len() as u64).min(DECODE_CHUNK as u64) as usize;
                let n = self.decode(&mut chunk[..want])?;
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);
            }
            data
        };

        if data.len() as u64 != self.size {
            return Err(FsysError::DecompressionFailed(format!(
                "entry decoded to {} bytes, expected {}",
                data.len(),
                self.size
            )));
        }
        self.track_crc(0, &data)?;

        self.cache = data;
        self.codec = None;
        self.input = Vec::new();
        self.state = ReaderState::Cached;
        Ok(())
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        if let ReaderState::Errored(reason) = &self.state {
            return Err(FsysError::ReaderFailed(reason.clone()));
        }
        if buf.is_empty() || self.pos >= self.size {
            return Ok(0);
        }
        if self.state == ReaderState::Uninitialized {
            self.start()?;
        }

        let want = (self.size - self.pos).min(buf.len() as u64) as usize;
        let n = match self.state {
            ReaderState::Cached => {
                let start = self.pos as usize;
                buf[..want].copy_from_slice(&self.cache[start..start + want]);
                want
            }
            _ if self.storage == Storage::Stored => {
                let n = self.source.read_at(self.data_offset + self.pos, &mut buf[..want])?;
                if n < want {
                    return Err(FsysError::InvalidFormat(format!(
                        "{}: archive stream ended inside stored entry",
                        self.name
                    )));
                }
                self.track_crc(self.pos, &buf[..n])?;
                n
            }
            _ => {
                if self.pos < self.decoded {
                    self.backward_seeks += 1;
                    if self.backward_seeks >= self.cache_after {
                        self.materialize()?;
                        return self.read_inner(buf);
                    }
                    self.restart()?;
                }
                self.skip_to(self.pos)?;
                let n = self.decode(&mut buf[..want])?;
                if n == 0 {
                    return Err(FsysError::DecompressionFailed(format!(
                        "{}: compressed stream ended at {} of {} bytes",
                        self.name, self.decoded, self.size
                    )));
                }
                n
            }
        };

        self.pos += n as u64;
        if self.pos >= self.size && self.state == ReaderState::Streaming {
            self.state = ReaderState::Exhausted;
        }
        Ok(n)
    }

    /// Enter the sticky error state
    fn poison(&mut self, err: FsysError) -> FsysError {
        if !self.is_errored() {
            error!(lump = %self.name, error = %err, "lump reader failed");
            self.state = ReaderState::Errored(err.to_string());
            self.codec = None;
            self.cache = Vec::new();
        }
        err
    }
}

impl Read for LumpReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_inner(buf) {
            Ok(n) => Ok(n),
            Err(err) => Err(self.poison(err).into()),
        }
    }
}

impl Seek for LumpReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if let ReaderState::Errored(reason) = &self.state {
            return Err(FsysError::ReaderFailed(reason.clone()).into());
        }
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(delta) => self.size as i128 + delta as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of lump",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl std::fmt::Debug for LumpReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LumpReader")
            .field("name", &self.name)
            .field("storage", &self.storage)
            .field("size", &self.size)
            .field("pos", &self.pos)
            .field("state", &self.state)
            .finish()
    }
}
