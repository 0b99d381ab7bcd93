//! Archive format registry
//!
//! Resolving a stream walks the registered openers in a fixed order:
//! every opener with a signature comes before every opener without one,
//! whatever their priorities, and lower priority values come first inside
//! each group. Signature checks are cheap and exact; signature-less openers
//! (ZIP: scan the tail for an end record) only run once all of them failed.

use crate::archive::format::{ArchiveFormat, ParseContext};
use crate::archive::directory::LumpRecord;
use crate::archive::{dfwad, pak, wad, zip};
use crate::error::{FsysError, Result};
use crate::stream::{ByteSource, SharedSource};
use std::io::SeekFrom;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Opener entry point: `Ok(None)` means "not my format"
pub type OpenFn = fn(&mut dyn ByteSource, u64, &ParseContext<'_>) -> Result<Option<ParsedArchive>>;

/// Registration record for one archive format
#[derive(Debug, Clone, Copy)]
pub struct FormatOpener {
    pub name: &'static str,
    /// Literal prefix; `None` means the opener probes structurally
    pub signature: Option<&'static [u8]>,
    /// Lower values are tried first
    pub priority: i32,
    pub open: OpenFn,
}

/// Output of a successful probe
#[derive(Debug)]
pub struct ParsedArchive {
    pub format: ArchiveFormat,
    /// Header says this is an authoritative (IWAD) file
    pub iwad: bool,
    pub records: Vec<LumpRecord>,
}

impl ParsedArchive {
    pub fn new(format: ArchiveFormat, records: Vec<LumpRecord>) -> Self {
        Self {
            format,
            iwad: false,
            records,
        }
    }
}

pub const SEVEN_ZIP_SIGNATURE: &[u8] = &[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C];
pub const RAR_SIGNATURE: &[u8] = b"Rar!\x1a\x07";

fn open_wad(src: &mut dyn ByteSource, len: u64, ctx: &ParseContext<'_>) -> Result<Option<ParsedArchive>> {
    let (header, records) = wad::parse(src, len, ctx)?;
    Ok(Some(ParsedArchive {
        format: ArchiveFormat::Wad,
        iwad: header.iwad,
        records,
    }))
}

fn open_pak(src: &mut dyn ByteSource, len: u64, ctx: &ParseContext<'_>) -> Result<Option<ParsedArchive>> {
    let records = pak::parse(src, len, ctx)?;
    Ok(Some(ParsedArchive::new(ArchiveFormat::Pak, records)))
}

fn open_dfwad(src: &mut dyn ByteSource, len: u64, ctx: &ParseContext<'_>) -> Result<Option<ParsedArchive>> {
    let records = dfwad::parse(src, len, ctx)?;
    Ok(Some(ParsedArchive::new(ArchiveFormat::DfWad, records)))
}

fn open_zip(src: &mut dyn ByteSource, len: u64, ctx: &ParseContext<'_>) -> Result<Option<ParsedArchive>> {
    Ok(zip::parse(src, len, ctx)?.map(|records| ParsedArchive::new(ArchiveFormat::Zip, records)))
}

fn reject_7z(_: &mut dyn ByteSource, _: u64, ctx: &ParseContext<'_>) -> Result<Option<ParsedArchive>> {
    Err(FsysError::Unsupported {
        name: ctx.name.to_string(),
        format: "7z",
    })
}

fn reject_rar(_: &mut dyn ByteSource, _: u64, ctx: &ParseContext<'_>) -> Result<Option<ParsedArchive>> {
    Err(FsysError::Unsupported {
        name: ctx.name.to_string(),
        format: "rar",
    })
}

/// Formats known to lumpfs, in declaration (not probe) order
static BUILTIN_OPENERS: &[FormatOpener] = &[
    FormatOpener { name: "zip", signature: None, priority: 999, open: open_zip },
    FormatOpener { name: "wad", signature: Some(b"IWAD"), priority: 100, open: open_wad },
    FormatOpener { name: "wad", signature: Some(b"PWAD"), priority: 100, open: open_wad },
    FormatOpener { name: "pak", signature: Some(b"PACK"), priority: 200, open: open_pak },
    FormatOpener { name: "pak", signature: Some(b"SPAK"), priority: 200, open: open_pak },
    FormatOpener { name: "dfwad", signature: Some(b"DFWAD"), priority: 300, open: open_dfwad },
    FormatOpener { name: "7z", signature: Some(SEVEN_ZIP_SIGNATURE), priority: 900, open: reject_7z },
    FormatOpener { name: "rar", signature: Some(RAR_SIGNATURE), priority: 900, open: reject_rar },
];

/// Ordered list of archive openers
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    openers: Vec<FormatOpener>,
    signature_len: usize,
}

impl FormatRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in format
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for opener in BUILTIN_OPENERS {
            registry.register(*opener);
        }
        registry
    }

    /// Process-wide built-in registry, constructed on first use
    pub fn global() -> &'static FormatRegistry {
        static GLOBAL: OnceLock<FormatRegistry> = OnceLock::new();
        GLOBAL.get_or_init(FormatRegistry::builtin)
    }

    /// Add an opener and restore probe order
    pub fn register(&mut self, opener: FormatOpener) {
        if let Some(signature) = opener.signature {
            self.signature_len = self.signature_len.max(signature.len());
        }
        self.openers.push(opener);
        self.openers
            .sort_by_key(|o| (o.signature.is_none(), o.priority));
    }

    /// Openers in probe order
    pub fn openers(&self) -> &[FormatOpener] {
        &self.openers
    }

    /// Identify and parse `source`
    ///
    /// Fails with [`FsysError::Unsupported`] as soon as a rejecting opener
    /// matches; otherwise with the first parse failure of an opener whose
    /// signature matched, or [`FsysError::UnknownFormat`].
    pub fn probe(&self, source: &SharedSource, ctx: &ParseContext<'_>) -> Result<ParsedArchive> {
        let len = source.len();
        let mut guard = source.lock();
        let stream: &mut dyn ByteSource = &mut **guard;

        let mut prefix = vec![0u8; self.signature_len.min(len as usize)];
        stream.seek(SeekFrom::Start(0))?;
        stream.read_exact(&mut prefix)?;

        let mut first_failure = None;
        for opener in &self.openers {
            if let Some(signature) = opener.signature {
                if !prefix.starts_with(signature) {
                    continue;
                }
            }

            stream.seek(SeekFrom::Start(0))?;
            match (opener.open)(stream, len, ctx) {
                Ok(Some(parsed)) => {
                    debug!(archive = ctx.name, format = opener.name, lumps = parsed.records.len(), "archive recognised");
                    return Ok(parsed);
                }
                Ok(None) => {}
                Err(err) if err.is_probe_miss() => {
                    warn!(archive = ctx.name, format = opener.name, error = %err, "archive rejected");
                    first_failure.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(first_failure.unwrap_or_else(|| FsysError::UnknownFormat(ctx.name.to_string())))
    }
}
