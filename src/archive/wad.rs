//! IWAD/PWAD flat-directory archives
//!
//! Layout: a 12-byte header (`IWAD`/`PWAD`, lump count, directory offset)
//! and a directory of 16-byte records (offset, size, 8-byte padded name).
//! Namespaces come from marker lumps bracketing runs of entries; the markers
//! themselves are hidden.

use crate::archive::directory::{normalize_lump_name, LumpRecord};
use crate::archive::format::{fixed_name, read_i32, read_u32, ParseContext};
use crate::error::Result;
use crate::namespace::Namespace;
use std::io::{Read, Seek, SeekFrom};
use tracing::warn;

pub const IWAD_MAGIC: [u8; 4] = *b"IWAD";
pub const PWAD_MAGIC: [u8; 4] = *b"PWAD";

/// Header size in bytes
pub const HEADER_SIZE: u64 = 12;

/// Directory record size in bytes
pub const DIR_ENTRY_SIZE: u64 = 16;

/// Parsed WAD header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WadHeader {
    pub iwad: bool,
    pub lump_count: usize,
    pub directory_offset: u64,
}

impl WadHeader {
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, ctx: &ParseContext<'_>) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        let iwad = match magic {
            IWAD_MAGIC => true,
            PWAD_MAGIC => false,
            _ => return Err(ctx.invalid("neither IWAD nor PWAD")),
        };

        let lump_count = read_i32(reader)?;
        let directory_offset = read_u32(reader)?;
        if lump_count < 0 {
            return Err(ctx.invalid(format!("negative lump count {}", lump_count)));
        }
        ctx.check_lump_count(lump_count as usize)?;

        Ok(Self {
            iwad,
            lump_count: lump_count as usize,
            directory_offset: directory_offset as u64,
        })
    }
}

/// Start/end marker pair assigning one namespace
struct MarkerSet {
    namespace: Namespace,
    start: &'static str,
    end: &'static str,
    alt: Option<(&'static str, &'static str)>,
    /// Also honour `F1_START`-style sub-sections
    flat_sections: bool,
}

const MARKER_SETS: &[MarkerSet] = &[
    MarkerSet { namespace: Namespace::Sprites, start: "s_start", end: "s_end", alt: Some(("ss_start", "ss_end")), flat_sections: false },
    MarkerSet { namespace: Namespace::Flats, start: "f_start", end: "f_end", alt: Some(("ff_start", "ff_end")), flat_sections: true },
    MarkerSet { namespace: Namespace::ColorMaps, start: "c_start", end: "c_end", alt: Some(("cc_start", "cc_end")), flat_sections: false },
    MarkerSet { namespace: Namespace::AcsLibrary, start: "a_start", end: "a_end", alt: Some(("aa_start", "aa_end")), flat_sections: false },
    MarkerSet { namespace: Namespace::NewTextures, start: "tx_start", end: "tx_end", alt: None, flat_sections: false },
    MarkerSet { namespace: Namespace::Voices, start: "v_start", end: "v_end", alt: Some(("vv_start", "vv_end")), flat_sections: false },
    MarkerSet { namespace: Namespace::HiResTextures, start: "hi_start", end: "hi_end", alt: None, flat_sections: false },
];

/// `f_start`, `f1_start`, ... -> matching end marker
fn flat_section_end(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'f' || !name.ends_with("_start") {
        return None;
    }
    if bytes[1] != b'_' && !bytes[1].is_ascii_digit() {
        return None;
    }
    let under = name.find('_')?;
    let end = format!("{}_end", &name[..under]);
    (end.len() <= 8).then_some(end)
}

fn is_flat_section_end(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2
        && bytes[0] == b'f'
        && name.ends_with("_end")
        && (bytes[1] == b'_' || bytes[1].is_ascii_digit())
}

/// Sequential marker scanner for one [`MarkerSet`]
struct MarkerScan<'a> {
    set: &'a MarkerSet,
    current_end: Option<String>,
}

impl<'a> MarkerScan<'a> {
    fn new(set: &'a MarkerSet) -> Self {
        Self {
            set,
            current_end: None,
        }
    }

    fn inside(&self) -> bool {
        self.current_end.is_some()
    }

    fn is_main_end(&self, name: &str) -> bool {
        name == self.set.end || self.set.alt.map_or(false, |(_, end)| name == end)
    }

    /// Returns true when `name` is a marker and must be hidden
    fn check(&mut self, name: &str) -> bool {
        if let Some(current_end) = &self.current_end {
            if name == current_end || self.is_main_end(name) {
                self.current_end = None;
                return true;
            }
            if !self.set.flat_sections {
                return false;
            }
            if self.is_main_end(current_end) {
                // Sub-section markers inside the main run are dropped
                return is_flat_section_end(name) || flat_section_end(name).is_some();
            }
            if is_flat_section_end(name) {
                self.current_end = None;
                return true;
            }
            return flat_section_end(name).is_some();
        }

        if name == self.set.start {
            self.current_end = Some(self.set.end.to_string());
            return true;
        }
        if let Some((alt_start, alt_end)) = self.set.alt {
            if name == alt_start {
                self.current_end = Some(alt_end.to_string());
                return true;
            }
        }
        if self.set.flat_sections {
            if let Some(end) = flat_section_end(name) {
                self.current_end = Some(end);
                return true;
            }
        }
        false
    }
}

/// Assign marker-driven namespaces, one namespace per pass
fn assign_namespaces(records: &mut [LumpRecord]) {
    for set in MARKER_SETS {
        let mut scan = MarkerScan::new(set);
        for record in records.iter_mut() {
            if record.namespace != Namespace::Global {
                continue;
            }
            let Some(name) = record.name.clone() else {
                continue;
            };
            if scan.check(&name) {
                record.hide();
                continue;
            }
            if scan.inside() {
                record.namespace = set.namespace;
            }
        }
    }
}

/// `voc` followed only by digits
fn is_voice_lump(name: &str) -> bool {
    name.len() >= 4
        && name.starts_with("voc")
        && name[3..].bytes().all(|b| b.is_ascii_digit())
}

/// Parse a WAD directory into lump records
pub fn parse<R: Read + Seek + ?Sized>(
    reader: &mut R,
    len: u64,
    ctx: &ParseContext<'_>,
) -> Result<(WadHeader, Vec<LumpRecord>)> {
    reader.seek(SeekFrom::Start(0))?;
    let header = WadHeader::read_from(reader, ctx)?;

    let table_end = header.directory_offset + header.lump_count as u64 * DIR_ENTRY_SIZE;
    if header.lump_count > 0 && table_end > len {
        return Err(ctx.invalid("directory runs past end of file"));
    }

    let mut records = Vec::with_capacity(header.lump_count);
    if header.lump_count > 0 {
        reader.seek(SeekFrom::Start(header.directory_offset))?;
    }
    for _ in 0..header.lump_count {
        let offset = read_u32(reader)? as u64;
        let size = read_u32(reader)? as u64;
        let mut raw = [0u8; 8];
        reader.read_exact(&mut raw)?;
        if raw[0] == 0 {
            continue;
        }
        // Mac demo WADs set the high bit on some names
        for b in raw.iter_mut() {
            *b &= 0x7f;
        }
        // Kept in the directory; opening it fails instead
        if size > 0 && offset.saturating_add(size) > len {
            warn!(archive = ctx.name, lump = %fixed_name(&raw), offset, size, "lump lies outside the file");
        }

        let name = normalize_lump_name(&fixed_name(&raw));
        let mut record = LumpRecord::stored(name.clone().unwrap_or_default(), offset, size);
        record.name = name;
        records.push(record);
    }

    assign_namespaces(&mut records);

    let config = ctx.config;
    for record in records.iter_mut() {
        if record.namespace != Namespace::Global {
            continue;
        }
        let Some(name) = record.name.as_deref() else {
            continue;
        };
        if config.skip_sounds && (name.starts_with("ds") || name.starts_with("dp")) {
            record.hide();
        } else if config.skip_dehacked && name == "dehacked" {
            record.hide();
        } else if ctx.fix_voices && is_voice_lump(name) {
            record.namespace = Namespace::Voices;
        }
    }

    Ok((header, records))
}
