//! In-memory archive builders shared by the integration tests

#![allow(dead_code)]

use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use lumpfs::{FileSystem, FsysConfig};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Config with mount reports and duplicate warnings off
pub fn quiet_config() -> FsysConfig {
    FsysConfig::quiet()
}

pub fn quiet_fs() -> FileSystem {
    FileSystem::new(quiet_config())
}

/// Write `data` to `dir/name` and return the path
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, data).unwrap();
    path
}

/// Deterministic, mildly compressible test payload
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i / 7) as u8).wrapping_mul(31).wrapping_add(seed) ^ (i as u8 & 0x0f))
        .collect()
}

/// WAD with lump data laid out before the directory
pub fn wad(magic: &[u8; 4], lumps: &[(&str, &[u8])]) -> Vec<u8> {
    let mut data = magic.to_vec();
    data.extend_from_slice(&(lumps.len() as u32).to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());

    let mut offsets = Vec::with_capacity(lumps.len());
    for (_, body) in lumps {
        offsets.push(data.len() as u32);
        data.extend_from_slice(body);
    }

    let directory = data.len() as u32;
    for ((name, body), offset) in lumps.iter().zip(offsets) {
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        let mut raw = [0u8; 8];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        data.extend_from_slice(&raw);
    }
    data[8..12].copy_from_slice(&directory.to_le_bytes());
    data
}

pub fn pwad(lumps: &[(&str, &[u8])]) -> Vec<u8> {
    wad(b"PWAD", lumps)
}

/// Quake PAK (56-byte names)
pub fn pak(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut data = b"PACK".to_vec();
    data.extend_from_slice(&[0u8; 8]);

    let mut offsets = Vec::with_capacity(files.len());
    for (_, body) in files {
        offsets.push(data.len() as u32);
        data.extend_from_slice(body);
    }

    let directory = data.len() as u32;
    for ((name, body), offset) in files.iter().zip(offsets) {
        let mut raw = [0u8; 56];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        data.extend_from_slice(&raw);
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
    }
    data[4..8].copy_from_slice(&directory.to_le_bytes());
    data[8..12].copy_from_slice(&((files.len() * 64) as u32).to_le_bytes());
    data
}

/// DFWAD: one section record per group, entries zlib-compressed
pub fn dfwad(sections: &[(&str, &[(&str, &[u8])])]) -> Vec<u8> {
    let mut records: Vec<(String, Option<Vec<u8>>)> = Vec::new();
    for (section, entries) in sections {
        records.push((section.to_string(), None));
        for (name, body) in entries.iter() {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(body).unwrap();
            records.push((name.to_string(), Some(encoder.finish().unwrap())));
        }
    }

    let header_len = 8 + records.len() * 24;
    let mut table = Vec::new();
    let mut bodies = Vec::new();
    for (name, body) in &records {
        let mut raw = [0u8; 16];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        table.extend_from_slice(&raw);
        match body {
            Some(body) => {
                let offset = (header_len + bodies.len()) as u32;
                table.extend_from_slice(&offset.to_le_bytes());
                table.extend_from_slice(&(body.len() as u32).to_le_bytes());
                bodies.extend_from_slice(body);
            }
            None => table.extend_from_slice(&[0u8; 8]),
        }
    }

    let mut data = b"DFWAD".to_vec();
    data.push(1);
    data.extend_from_slice(&(records.len() as u16).to_le_bytes());
    data.extend_from_slice(&table);
    data.extend_from_slice(&bodies);
    data
}

/// ZIP compression used for one fixture entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Stored,
    Deflate,
    Lzma,
}

impl Method {
    fn number(self) -> u16 {
        match self {
            Method::Stored => 0,
            Method::Deflate => 8,
            Method::Lzma => 14,
        }
    }

    fn pack(self, data: &[u8]) -> Vec<u8> {
        match self {
            Method::Stored => data.to_vec(),
            Method::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data).unwrap();
                encoder.finish().unwrap()
            }
            Method::Lzma => {
                // .lzma: 5 property bytes, 8-byte size, stream
                let mut raw = Vec::new();
                lzma_rs::lzma_compress(&mut &data[..], &mut raw).unwrap();
                let mut packed = vec![9, 20, 5, 0];
                packed.extend_from_slice(&raw[..5]);
                packed.extend_from_slice(&raw[13..]);
                packed
            }
        }
    }
}

/// ZIP archive; `(path, data, method)` per entry
pub fn zip(entries: &[(&str, &[u8], Method)]) -> Vec<u8> {
    zip_with_crc(entries, None)
}

/// ZIP archive whose central directory lies about every CRC when `bad_crc` is set
pub fn zip_with_crc(entries: &[(&str, &[u8], Method)], bad_crc: Option<u32>) -> Vec<u8> {
    let mut data = Vec::new();
    let mut central = Vec::new();

    for (name, body, method) in entries {
        let packed = method.pack(body);
        let crc = bad_crc.unwrap_or_else(|| crc32fast::hash(body));
        let offset = data.len() as u32;

        data.extend_from_slice(&[0x50, 0x4B, 0x03, 0x04]);
        data.extend_from_slice(&20u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&method.number().to_le_bytes());
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(&crc.to_le_bytes());
        data.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        data.extend_from_slice(&(name.len() as u16).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        data.extend_from_slice(&packed);

        central.extend_from_slice(&[0x50, 0x4B, 0x01, 0x02]);
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&method.number().to_le_bytes());
        central.extend_from_slice(&[0u8; 4]);
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        central.extend_from_slice(&(body.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&[0u8; 4]);
        central.extend_from_slice(&[0u8; 8]);
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }

    let central_offset = data.len() as u32;
    data.extend_from_slice(&central);
    data.extend_from_slice(&[0x50, 0x4B, 0x05, 0x06]);
    data.extend_from_slice(&[0u8; 4]);
    data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    data.extend_from_slice(&(central.len() as u32).to_le_bytes());
    data.extend_from_slice(&central_offset.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data
}
