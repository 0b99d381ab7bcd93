//! Mounting: disk files, nested archives, directories and configuration

mod common;

use common::{dfwad, pak, pwad, quiet_config, quiet_fs, wad, write_file, zip, Method};
use lumpfs::{ArchiveFormat, AuxFileType, FileSystem, FsysConfig, Namespace};
use std::io::Cursor;
use tempfile::TempDir;

#[test]
fn test_nested_wads_and_pk3s() {
    let temp = TempDir::new().unwrap();
    let maps = pwad(&[("MAP02", b""), ("THINGS", b"things")]);
    let deep = pwad(&[("DEEPLUMP", b"deep")]);
    let deeper = zip(&[("never.wad", &pwad(&[("NEVER", b"x")]), Method::Stored)]);
    let inner = zip(&[
        ("deep.wad", &deep, Method::Deflate),
        ("deeper.pk3", &deeper, Method::Stored),
    ]);
    let path = write_file(
        temp.path(),
        "mod.pk3",
        &zip(&[
            ("maps.wad", &maps, Method::Deflate),
            ("inner.pk3", &inner, Method::Stored),
            ("sub/ignored.wad", &pwad(&[("SUBLUMP", b"s")]), Method::Stored),
        ]),
    );

    let mut fs = quiet_fs();
    assert_eq!(fs.add_disk_file(&path, false).unwrap(), 0);

    let names: Vec<_> = fs.archives().iter().map(|a| a.name().to_string()).collect();
    let root = path.display().to_string();
    assert_eq!(
        names,
        vec![
            root.clone(),
            format!("{}:maps.wad", root),
            format!("{}:inner.pk3", root),
            format!("{}:inner.pk3:deep.wad", root),
        ]
    );
    assert_eq!(fs.archive(1).unwrap().format(), ArchiveFormat::Wad);
    assert_eq!(fs.archive(2).unwrap().format(), ArchiveFormat::Zip);

    let things = fs.check_num_for_name("THINGS", Namespace::Global).unwrap();
    assert_eq!(things.archive(), 1);
    assert_eq!(fs.load_lump(things).unwrap(), b"things");
    assert_eq!(
        fs.full_lump_name(things).unwrap(),
        format!("{}:maps.wad:things", root)
    );
    assert!(fs.check_num_for_name("DEEPLUMP", Namespace::Global).is_some());
    assert_eq!(fs.check_num_for_name("NEVER", Namespace::Global), None);
    assert_eq!(fs.check_num_for_name("SUBLUMP", Namespace::Global), None);
    assert_eq!(fs.next_mount_file_id(), 4);
}

#[test]
fn test_oversized_nested_archive_is_skipped() {
    let temp = TempDir::new().unwrap();
    let big = pwad(&[("BIG", &vec![7u8; 4096])]);
    let small = pwad(&[("SMALL", b"s")]);
    let path = write_file(
        temp.path(),
        "bundle.pk3",
        &zip(&[("big.wad", &big, Method::Deflate), ("small.wad", &small, Method::Stored)]),
    );

    let mut fs = FileSystem::new(FsysConfig {
        max_nested_archive_size: 1024,
        ..quiet_config()
    });
    fs.add_disk_file(&path, false).unwrap();
    assert_eq!(fs.archive_count(), 2);
    assert!(fs.check_num_for_name("SMALL", Namespace::Global).is_some());
    assert_eq!(fs.check_num_for_name("BIG", Namespace::Global), None);
}

#[test]
fn test_garbage_nested_wad_is_ignored() {
    let temp = TempDir::new().unwrap();
    let path = write_file(
        temp.path(),
        "junk.pk3",
        &zip(&[
            ("notreally.wad", b"this is plain text, not a wad file", Method::Stored),
            ("tiny.wad", b"PWAD", Method::Stored),
        ]),
    );

    let mut fs = quiet_fs();
    fs.add_disk_file(&path, false).unwrap();
    assert_eq!(fs.archive_count(), 1);
    assert!(fs.check_num_for_file_name("notreally.wad").is_some());
}

#[test]
fn test_auxiliary_zip_stream_mounts_nested() {
    let extra = pwad(&[("EXTRA", b"e")]);
    let more = pwad(&[("MORE", b"m")]);
    let sub = zip(&[("more.wad", &more, Method::Stored), ("text.txt", b"junk", Method::Stored)]);
    let outer = zip(&[
        ("extra.wad", &extra, Method::Deflate),
        ("fake.wad", &vec![0u8; 64], Method::Stored),
        ("sub.pk3", &sub, Method::Deflate),
    ]);

    let mut fs = quiet_fs();
    let first = fs
        .add_auxiliary_stream("aux.pk3", Cursor::new(outer.clone()), AuxFileType::Zip)
        .unwrap();
    assert_eq!(first.archive(), 0);
    let names: Vec<_> = fs.archives().iter().map(|a| a.name()).collect();
    assert_eq!(
        names,
        vec!["aux.pk3", "aux.pk3:extra.wad", "aux.pk3:sub.pk3", "aux.pk3:sub.pk3:more.wad"]
    );
    assert!(fs.archives().iter().all(|a| a.flags().auxiliary));
    assert!(fs.check_num_for_name_in_auxiliary("MORE", Namespace::Global).is_some());

    // Plain archives get no nested mounts
    let mut plain = quiet_fs();
    plain
        .add_auxiliary_stream("aux.pk3", Cursor::new(outer), AuxFileType::Archive)
        .unwrap();
    assert_eq!(plain.archive_count(), 1);
}

#[test]
fn test_disk_directory_mount() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("mymod");
    write_file(&root, "textures/Brick.png", b"png-bytes");
    write_file(&root, "sprites/trooa1.lmp", b"sprite");
    write_file(&root, "decorate.txt", b"actor");
    write_file(&root, ".hidden/secret.txt", b"no");
    write_file(&root, "extra.wad", &pwad(&[("DIRLUMP", b"from wad")]));

    let mut fs = quiet_fs();
    let index = fs.mount_disk_dir(&root).unwrap();
    assert_eq!(index, 0);
    assert_eq!(fs.archive(0).unwrap().format(), ArchiveFormat::Directory);
    assert_eq!(fs.archive_count(), 2);

    let brick = fs.get_num_for_file_name("textures/brick.png").unwrap();
    assert_eq!(fs.load_lump(brick).unwrap(), b"png-bytes");
    assert_eq!(fs.lump_namespace(brick), Some(Namespace::NewTextures));

    let sprite = fs.get_num_for_name("TROOA1", Namespace::Sprites).unwrap();
    assert_eq!(fs.load_lump(sprite).unwrap(), b"sprite");
    assert_eq!(fs.check_num_for_file_name(".hidden/secret.txt"), None);

    let dirlump = fs.get_num_for_name("DIRLUMP", Namespace::Global).unwrap();
    assert_eq!(dirlump.archive(), 1);
    assert_eq!(fs.load_lump(dirlump).unwrap(), b"from wad");

    assert!(fs.mount_disk_dir(temp.path().join("absent")).is_err());
}

#[test]
fn test_iwad_and_user_flags() {
    let temp = TempDir::new().unwrap();
    let iwad = write_file(temp.path(), "doom2.wad", &wad(b"IWAD", &[("PLAYPAL", b"pal")]));
    let user = write_file(temp.path(), "user.wad", &pwad(&[("DEHACKED", b"patch")]));

    let mut fs = quiet_fs();
    fs.add_disk_file(&iwad, false).unwrap();
    fs.start_user_wads();
    fs.add_disk_file(&user, false).unwrap();
    fs.end_user_wads();

    assert!(fs.is_iwad_file(0));
    assert!(!fs.is_user_file(0));
    assert!(!fs.is_iwad_file(1));
    assert!(fs.is_user_file(1));
    assert!(fs.is_wad_file(1));
    assert_eq!(fs.archive(0).unwrap().mount_index(), 0);
    assert_eq!(fs.archive(1).unwrap().mount_index(), 1);

    fs.shutdown();
    assert_eq!(fs.archive_count(), 0);
    assert_eq!(fs.check_num_for_name("PLAYPAL", Namespace::Global), None);
}

#[test]
fn test_dfwad_sections() {
    let temp = TempDir::new().unwrap();
    let path = write_file(
        temp.path(),
        "game.dfwad",
        &dfwad(&[
            ("", &[("SCRIPT", b"print hello".as_slice())]),
            ("TEXTURES", &[("WALL", b"wall pixels".as_slice())]),
        ]),
    );

    let mut fs = quiet_fs();
    fs.add_disk_file(&path, false).unwrap();
    assert_eq!(fs.archive(0).unwrap().format(), ArchiveFormat::DfWad);

    let wall = fs.get_num_for_name("WALL", Namespace::Global).unwrap();
    assert_eq!(fs.load_lump(wall).unwrap(), b"wall pixels");
    assert_eq!(fs.load_text_lump("SCRIPT").unwrap(), "print hello");
}

#[test]
fn test_config_file_controls_parsing() {
    let temp = TempDir::new().unwrap();
    let config_path = write_file(
        temp.path(),
        "lumpfs.toml",
        b"report_added_paks = false\nskip_sounds = true\nzip_root_is_global = true\n",
    );
    let config = FsysConfig::load(&config_path).unwrap();
    assert!(config.skip_sounds);
    assert!(config.zip_root_is_global);
    assert!(config.warn_duplicates);

    let archive = write_file(
        temp.path(),
        "sounds.pk3",
        &zip(&[
            ("sounds/dsbang.ogg", b"ogg", Method::Stored),
            ("mapinfo.txt", b"map", Method::Stored),
        ]),
    );
    let mut fs = FileSystem::new(config);
    fs.add_disk_file(&archive, false).unwrap();

    assert_eq!(fs.check_num_for_name("DSBANG", Namespace::Sounds), None);
    assert!(fs.check_num_for_file_name("sounds/dsbang.ogg").is_some());
    assert!(fs.check_num_for_name("MAPINFO", Namespace::Global).is_some());
}

#[test]
fn test_pak_entries_are_global() {
    let mut fs = quiet_fs();
    fs.set_aux_search(true);
    fs.add_auxiliary_stream(
        "pak0.pak",
        Cursor::new(pak(&[("maps/e1m1.bsp", b"bsp"), ("gfx/palette.lmp", b"pal")])),
        AuxFileType::Archive,
    )
    .unwrap();

    let palette = fs.get_num_for_name("PALETTE", Namespace::Global).unwrap();
    assert_eq!(fs.real_lump_name(palette), Some("gfx/palette.lmp"));
    assert!(!fs.is_wad_lump(palette));
    assert!(fs.check_num_for_name("E1M1", Namespace::Global).is_some());
}
