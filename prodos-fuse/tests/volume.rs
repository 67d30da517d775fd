use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use prodos::layout::{DirBlock, EntryKind, IndexBlock, is_free};
use prodos::{BLOCK_SIZE, Block, Volume, VolumeOptions};
use prodos_fuse::StdFs;
use tempfile::TempDir;

fn mount(dir: &TempDir) -> Volume<StdFs> {
    let options = VolumeOptions {
        volume_name: Some(String::from("HOST")),
        ..Default::default()
    };
    Volume::new(StdFs, dir.path().to_str().unwrap(), options).unwrap()
}

fn read(volume: &mut Volume<StdFs>, block: u16) -> Block {
    let mut buf = [0; BLOCK_SIZE];
    volume.read_block(block.into(), &mut buf).unwrap();
    buf
}

/// 显式设置修改时间，不依赖文件系统的时间精度
fn set_mtime(path: &Path, secs: u64) {
    File::open(path)
        .unwrap()
        .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

#[test]
fn text_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("A.TXT"), b"first").unwrap();
    fs::write(dir.path().join("B.TXT"), b"second").unwrap();
    let mut volume = mount(&dir);

    let root = read(&mut volume, 2);
    let dir_block = DirBlock::from_block(&root);
    assert_eq!(2, dir_block.header().file_count());
    assert_eq!(b"A", dir_block.entry(1).name());
    assert_eq!(b"B", dir_block.entry(2).name());

    let b = *dir_block.entry(2);
    assert_eq!(0x04, b.file_type());
    assert_eq!(6, b.eof());
    let data = read(&mut volume, b.key_pointer().get());
    assert_eq!(b"second", &data[..6]);
}

#[test]
fn binary_with_load_address() {
    let dir = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
    fs::write(dir.path().join("GAME#2000.BIN"), &content).unwrap();
    let mut volume = mount(&dir);

    let root = read(&mut volume, 2);
    let entry = *DirBlock::from_block(&root).entry(1);
    assert_eq!(b"GAME", entry.name());
    assert_eq!(0x06, entry.file_type());
    assert_eq!(0x2000, entry.aux_type());
    assert_eq!(Some(EntryKind::Sapling), entry.kind());

    let index = read(&mut volume, entry.key_pointer().get());
    let second = IndexBlock::from_block(&index).get(1);
    let data = read(&mut volume, second.get());
    assert_eq!(&content[512..], &data[..88]);
}

#[test]
fn empty_host_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("EMPTY")).unwrap();
    let mut volume = mount(&dir);

    let root = read(&mut volume, 2);
    let entry = *DirBlock::from_block(&root).entry(1);
    assert_eq!(Some(EntryKind::Subdirectory), entry.kind());
    assert_eq!(1, entry.blocks_used());

    let sub = read(&mut volume, entry.key_pointer().get());
    let sub = DirBlock::from_block(&sub);
    assert_eq!(Some(EntryKind::SubdirectoryHeader), sub.header().kind());
    assert_eq!(0, sub.header().file_count());
}

#[test]
fn follows_host_changes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("A.TXT"), b"a").unwrap();
    set_mtime(dir.path(), 1_000);
    let mut volume = mount(&dir);
    assert_eq!(1, DirBlock::from_block(&read(&mut volume, 2)).header().file_count());

    fs::write(dir.path().join("B.TXT"), b"b").unwrap();
    set_mtime(dir.path(), 2_000);
    assert_eq!(2, DirBlock::from_block(&read(&mut volume, 2)).header().file_count());

    let a = volume.find("/A").unwrap();
    let a_key = volume.node(a).unwrap().base_block().unwrap();
    fs::remove_file(dir.path().join("A.TXT")).unwrap();
    set_mtime(dir.path(), 3_000);

    let root = read(&mut volume, 2);
    assert_eq!(1, DirBlock::from_block(&root).header().file_count());
    assert!(volume.node(a).is_none());
    assert!(is_free(&read(&mut volume, 6), a_key.into()));
}

#[test]
fn rewritten_file_keeps_key_block() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("LOG.TXT");
    fs::write(&file, b"tiny").unwrap();
    set_mtime(&file, 1_000);
    let mut volume = mount(&dir);

    let before = *DirBlock::from_block(&read(&mut volume, 2)).entry(1);
    assert_eq!(Some(EntryKind::Seedling), before.kind());

    fs::write(&file, vec![b'x'; 2000]).unwrap();
    set_mtime(&file, 2_000);

    let after = *DirBlock::from_block(&read(&mut volume, 2)).entry(1);
    assert_eq!(Some(EntryKind::Sapling), after.kind());
    assert_eq!(before.key_pointer(), after.key_pointer());
    assert_eq!(2000, after.eof());
    assert_eq!(5, after.blocks_used());
}
