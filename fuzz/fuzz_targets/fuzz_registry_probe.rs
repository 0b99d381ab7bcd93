#![no_main]

use libfuzzer_sys::fuzz_target;
use lumpfs::archive::{Archive, ParseContext};
use lumpfs::{FormatRegistry, FsysConfig, Namespace, SharedSource};
use std::io::{Read, Seek, SeekFrom};

fuzz_target!(|data: &[u8]| {
    let config = FsysConfig {
        max_nested_archive_size: 1 << 20,
        ..FsysConfig::quiet()
    };
    let ctx = ParseContext::new("fuzz.pk3", &config);
    let source = SharedSource::from_bytes(data.to_vec());

    // Detection and directory parsing must never panic
    let archive = match Archive::open("fuzz.pk3", source, FormatRegistry::global(), &ctx) {
        Ok(archive) => archive,
        Err(_) => return,
    };

    // Neither must reading entries
    for index in 0..archive.len() {
        let Ok(mut reader) = archive.open_lump(index, &config) else {
            continue;
        };
        if reader.size() > 1 << 24 {
            continue;
        }
        let mut out = Vec::new();
        let _ = reader.read_to_end(&mut out);
        let _ = reader.seek(SeekFrom::Start(reader.size() / 2));
        let mut tail = [0u8; 64];
        let _ = reader.read(&mut tail);
    }

    // Lookups over whatever names the archive produced
    for record in archive.records() {
        if let Some(name) = &record.name {
            let _ = archive.find_last(name, Namespace::Any);
        }
        let _ = archive.find_file(&record.file_name);
    }
    let _ = archive.nested_archives(true);
});
