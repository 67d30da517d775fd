use std::fs;
use std::io::Cursor;

use block_dev::BLOCK_SIZE;
use prodos::{SharedVolume, Volume, VolumeOptions};
use tempfile::TempDir;
use vfs::{DirEntryType, HostFs};

use crate::{StdFs, hex_dump, pack};

fn host_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("A.TXT"), b"0123456789").unwrap();
    fs::create_dir(dir.path().join("SUB")).unwrap();
    dir
}

fn path(dir: &TempDir) -> &str {
    dir.path().to_str().unwrap()
}

#[test]
fn lists_host_directory() {
    let dir = host_dir();
    let mut entries = StdFs.read_dir(path(&dir)).unwrap();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    assert_eq!(2, entries.len());
    assert_eq!("A.TXT", entries[0].name);
    assert_eq!(DirEntryType::Regular, entries[0].ty);
    assert_eq!("SUB", entries[1].name);
    assert_eq!(DirEntryType::Directory, entries[1].ty);
}

#[test]
fn stat_and_read() {
    let dir = host_dir();
    let file = vfs::join(path(&dir), "A.TXT");

    let stat = StdFs.stat(&file).unwrap();
    assert_eq!(DirEntryType::Regular, stat.ty);
    assert_eq!(10, stat.size);

    let mut buf = [0; 4];
    assert_eq!(4, StdFs.read_at(&file, 6, &mut buf).unwrap());
    assert_eq!(b"6789", &buf);
    assert_eq!(0, StdFs.read_at(&file, 10, &mut buf).unwrap());
}

#[test]
fn missing_path() {
    let dir = host_dir();
    let missing = vfs::join(path(&dir), "NOPE");

    assert!(matches!(StdFs.stat(&missing), Err(vfs::Error::NotFound(_))));
    assert!(matches!(StdFs.read_dir(&missing), Err(vfs::Error::NotFound(_))));
}

#[test]
fn pack_whole_volume() {
    let dir = host_dir();
    let options = VolumeOptions {
        capacity: 280,
        volume_name: Some(String::from("DISK")),
    };
    let volume = Volume::new(StdFs, path(&dir), options).unwrap();

    let mut image = Cursor::new(Vec::new());
    let size = pack(&SharedVolume::new(volume), &mut image).unwrap();
    let image = image.into_inner();

    assert_eq!(280 * BLOCK_SIZE as u64, size);
    assert_eq!(280 * BLOCK_SIZE, image.len());

    let root = &image[2 * BLOCK_SIZE..3 * BLOCK_SIZE];
    assert_eq!(0xF4, root[4]);
    assert_eq!(b"DISK", &root[5..9]);
    assert_eq!([2, 0], root[0x25..0x27]);
    assert_eq!([0x18, 0x01], root[0x29..0x2B]);
}

#[test]
fn dump_format() {
    let mut block = [0; BLOCK_SIZE];
    block[..5].copy_from_slice(b"HELLO");
    block[16] = b'A' | 0x80;

    let dump = hex_dump(&block);
    let lines: Vec<_> = dump.lines().collect();
    assert_eq!(32, lines.len());
    assert!(lines[0].starts_with("000: 48 45 4c 4c 4f 00"));
    assert!(lines[0].ends_with("|HELLO...........|"));
    assert!(lines[1].starts_with("010: c1"));
    assert!(lines[1].ends_with("|A...............|"));
}
