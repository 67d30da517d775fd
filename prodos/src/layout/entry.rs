//! 目录块、目录头与文件目录项

use core::{ptr, slice};

use enumflags2::{BitFlags, bitflags};

use super::{ENTRIES_PER_BLOCK, FILE_ENTRY_SIZE, MAX_EOF, MIN_VERSION, NAME_MAX_LEN, VERSION};
use crate::{BLOCK_SIZE, Block, BlockId};

/// 目录项首字节的高4位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    Deleted = 0x0,
    /// 单个数据块，键块就是数据
    Seedling = 0x1,
    /// 键块为索引块，最多256个数据块
    Sapling = 0x2,
    /// 键块为主索引块，指向若干索引块
    Tree = 0x3,
    Subdirectory = 0xD,
    SubdirectoryHeader = 0xE,
    VolumeHeader = 0xF,
}

impl EntryKind {
    /// 单块文件的上限
    pub const SEEDLING_MAX: u64 = BLOCK_SIZE as u64;
    /// 单索引文件的上限
    pub const SAPLING_MAX: u64 = 128 * BLOCK_SIZE as u64;

    pub fn for_size(size: u64) -> Self {
        if size <= Self::SEEDLING_MAX {
            Self::Seedling
        } else if size <= Self::SAPLING_MAX {
            Self::Sapling
        } else {
            Self::Tree
        }
    }

    pub fn from_nibble(nibble: u8) -> Option<Self> {
        Some(match nibble {
            0x0 => Self::Deleted,
            0x1 => Self::Seedling,
            0x2 => Self::Sapling,
            0x3 => Self::Tree,
            0xD => Self::Subdirectory,
            0xE => Self::SubdirectoryHeader,
            0xF => Self::VolumeHeader,
            _ => return None,
        })
    }

    pub const fn nibble(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[bitflags]
#[repr(u8)]
pub enum Access {
    Read = 0b0000_0001,
    Write = 0b0000_0010,
    Invisible = 0b0000_0100,
    Reserved3 = 0b0000_1000,
    Reserved4 = 0b0001_0000,
    /// The file has been modified since the last backup
    Backup = 0b0010_0000,
    Rename = 0b0100_0000,
    Destroy = 0b1000_0000,
}

/// 目录里除首项之外的每一项
#[derive(Debug, Default, Clone, Copy)]
#[repr(packed)]
pub struct FileEntry {
    /// High nibble is the storage kind, low nibble the name length
    storage_name_len: u8,
    name: [u8; NAME_MAX_LEN],
    file_type: u8,
    /// Seedling: the data block; Sapling and Tree: the (master) index block;
    /// Subdirectory: the first directory block
    key_pointer: u16,
    blocks_used: u16,
    /// Three-byte little-endian length in bytes
    eof: [u8; 3],
    _creation: [u8; 4],
    version: u8,
    min_version: u8,
    access: BitFlags<Access>,
    /// Load address for binaries, record length for text files
    aux_type: u16,
    _last_mod: [u8; 4],
    /// Key block of the directory holding this entry
    header_pointer: u16,
}

impl FileEntry {
    pub fn new(kind: EntryKind, name: &str) -> Self {
        let mut entry = Self {
            version: VERSION,
            min_version: MIN_VERSION,
            access: BitFlags::all(),
            ..Default::default()
        };
        entry.storage_name_len = (kind.nibble() << 4) | write_name(&mut entry.name, name);
        entry
    }

    pub fn with_file_type(mut self, file_type: u8) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn with_key_pointer(mut self, block: BlockId) -> Self {
        self.key_pointer = block.get().to_le();
        self
    }

    pub fn with_blocks_used(mut self, blocks: u16) -> Self {
        self.blocks_used = blocks.to_le();
        self
    }

    pub fn with_eof(mut self, eof: u32) -> Self {
        let [b0, b1, b2, _] = eof.min(MAX_EOF).to_le_bytes();
        self.eof = [b0, b1, b2];
        self
    }

    pub fn with_aux_type(mut self, aux_type: u16) -> Self {
        self.aux_type = aux_type.to_le();
        self
    }

    pub fn with_header_pointer(mut self, block: BlockId) -> Self {
        self.header_pointer = block.get().to_le();
        self
    }

    pub fn kind(&self) -> Option<EntryKind> {
        EntryKind::from_nibble(self.storage_name_len >> 4)
    }

    pub fn name(&self) -> &[u8] {
        let len = (self.storage_name_len & 0x0F) as usize;
        &self.name[..len.min(NAME_MAX_LEN)]
    }

    pub fn file_type(&self) -> u8 {
        self.file_type
    }

    pub fn key_pointer(&self) -> BlockId {
        BlockId::new(u16::from_le(self.key_pointer))
    }

    pub fn blocks_used(&self) -> u16 {
        u16::from_le(self.blocks_used)
    }

    pub fn eof(&self) -> u32 {
        let [b0, b1, b2] = self.eof;
        u32::from_le_bytes([b0, b1, b2, 0])
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn min_version(&self) -> u8 {
        self.min_version
    }

    pub fn access(&self) -> BitFlags<Access> {
        self.access
    }

    pub fn aux_type(&self) -> u16 {
        u16::from_le(self.aux_type)
    }

    pub fn header_pointer(&self) -> BlockId {
        BlockId::new(u16::from_le(self.header_pointer))
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), FILE_ENTRY_SIZE) }
    }
}

/// 目录首块的第一项，卷目录与子目录共用一种布局
#[derive(Debug, Default, Clone, Copy)]
#[repr(packed)]
pub struct DirHeader {
    /// 0xF? for the volume directory, 0xE? for a subdirectory
    storage_name_len: u8,
    name: [u8; NAME_MAX_LEN],
    _reserved: [u8; 8],
    _creation: [u8; 4],
    version: u8,
    min_version: u8,
    access: BitFlags<Access>,
    entry_length: u8,
    entries_per_block: u8,
    /// Active entries in the directory, header excluded
    file_count: u16,
    bitmap_pointer: u16,
    total_blocks: u16,
}

impl DirHeader {
    pub fn new(kind: EntryKind, name: &str) -> Self {
        let mut header = Self {
            version: VERSION,
            min_version: MIN_VERSION,
            access: Access::Read | Access::Write,
            entry_length: FILE_ENTRY_SIZE as u8,
            entries_per_block: ENTRIES_PER_BLOCK as u8,
            ..Default::default()
        };
        header.storage_name_len = (kind.nibble() << 4) | write_name(&mut header.name, name);
        header
    }

    pub fn with_file_count(mut self, count: u16) -> Self {
        self.file_count = count.to_le();
        self
    }

    pub fn with_bitmap_pointer(mut self, block: BlockId) -> Self {
        self.bitmap_pointer = block.get().to_le();
        self
    }

    pub fn with_total_blocks(mut self, blocks: u16) -> Self {
        self.total_blocks = blocks.to_le();
        self
    }

    pub fn kind(&self) -> Option<EntryKind> {
        EntryKind::from_nibble(self.storage_name_len >> 4)
    }

    pub fn name(&self) -> &[u8] {
        let len = (self.storage_name_len & 0x0F) as usize;
        &self.name[..len.min(NAME_MAX_LEN)]
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn min_version(&self) -> u8 {
        self.min_version
    }

    pub fn access(&self) -> BitFlags<Access> {
        self.access
    }

    /// 目录项长度，恒为0x27
    pub fn entry_length(&self) -> u8 {
        self.entry_length
    }

    pub fn entries_per_block(&self) -> u8 {
        self.entries_per_block
    }

    pub fn file_count(&self) -> u16 {
        u16::from_le(self.file_count)
    }

    pub fn bitmap_pointer(&self) -> BlockId {
        BlockId::new(u16::from_le(self.bitmap_pointer))
    }

    pub fn total_blocks(&self) -> u16 {
        u16::from_le(self.total_blocks)
    }
}

/// 目录链上的一个块
#[derive(Debug, Clone, Copy)]
#[repr(packed)]
pub struct DirBlock {
    prev: u16,
    next: u16,
    entries: [FileEntry; ENTRIES_PER_BLOCK],
    _pad: u8,
}

impl DirBlock {
    /// 把整块缓冲区当作目录块
    pub fn from_block(block: &Block) -> &Self {
        unsafe { &*ptr::from_ref(block).cast() }
    }

    pub fn from_block_mut(block: &mut Block) -> &mut Self {
        unsafe { &mut *ptr::from_mut(block).cast() }
    }

    pub fn set_links(&mut self, prev: Option<BlockId>, next: Option<BlockId>) {
        self.prev = prev.map_or(0, BlockId::get).to_le();
        self.next = next.map_or(0, BlockId::get).to_le();
    }

    pub fn prev(&self) -> u16 {
        u16::from_le(self.prev)
    }

    pub fn next(&self) -> u16 {
        u16::from_le(self.next)
    }

    /// 首块的0号项
    pub fn header(&self) -> &DirHeader {
        unsafe { &*ptr::from_ref(&self.entries[0]).cast::<DirHeader>() }
    }

    pub fn set_header(&mut self, header: DirHeader) {
        unsafe { *ptr::from_mut(&mut self.entries[0]).cast::<DirHeader>() = header }
    }

    pub fn entry(&self, slot: usize) -> &FileEntry {
        &self.entries[slot]
    }

    pub fn set_entry(&mut self, slot: usize, entry: FileEntry) {
        self.entries[slot] = entry;
    }
}

/// 名字写入定长字段，返回写入的长度
fn write_name(field: &mut [u8; NAME_MAX_LEN], name: &str) -> u8 {
    let mut len = 0;
    for (b, nb) in field.iter_mut().zip(name.bytes()) {
        *b = nb.to_ascii_uppercase();
        len += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_entry_offsets() {
        let entry = FileEntry::new(EntryKind::Sapling, "HELLO")
            .with_file_type(0x06)
            .with_key_pointer(BlockId::new(0x1234))
            .with_blocks_used(3)
            .with_eof(600)
            .with_aux_type(0x2000)
            .with_header_pointer(BlockId::new(2));
        let bytes = entry.as_bytes();

        assert_eq!(0x25, bytes[0x00]);
        assert_eq!(b"HELLO", &bytes[0x01..0x06]);
        assert_eq!(0x06, bytes[0x10]);
        assert_eq!([0x34, 0x12], bytes[0x11..0x13]);
        assert_eq!([3, 0], bytes[0x13..0x15]);
        assert_eq!([0x58, 0x02, 0x00], bytes[0x15..0x18]);
        assert_eq!(VERSION, bytes[0x1C]);
        assert_eq!(0, bytes[0x1D]);
        assert_eq!(0xFF, bytes[0x1E]);
        assert_eq!([0x00, 0x20], bytes[0x1F..0x21]);
        assert_eq!([2, 0], bytes[0x25..0x27]);

        assert_eq!(VERSION, entry.version());
        assert_eq!(MIN_VERSION, entry.min_version());
        assert_eq!(BitFlags::all(), entry.access());
    }

    #[test]
    fn eof_is_clamped_to_24_bits() {
        let entry = FileEntry::new(EntryKind::Tree, "BIG").with_eof(u32::MAX);
        assert_eq!(MAX_EOF, entry.eof());
    }

    #[test]
    fn header_in_block() {
        let mut block = [0u8; BLOCK_SIZE];
        let dir = DirBlock::from_block_mut(&mut block);
        dir.set_links(None, Some(BlockId::new(3)));
        dir.set_header(
            DirHeader::new(EntryKind::VolumeHeader, "VOL")
                .with_file_count(2)
                .with_bitmap_pointer(BlockId::new(6))
                .with_total_blocks(0xFFFF),
        );

        assert_eq!([0, 0, 3, 0], block[0..4]);
        assert_eq!(0xF3, block[0x04]);
        assert_eq!(b"VOL", &block[0x05..0x08]);
        assert!(block[0x14..0x20].iter().all(|&b| b == 0));
        assert_eq!(0x19, block[0x20]);
        assert_eq!(0x00, block[0x21]);
        assert_eq!(0x03, block[0x22]);
        assert_eq!(0x27, block[0x23]);
        assert_eq!(0x0D, block[0x24]);
        assert_eq!([2, 0], block[0x25..0x27]);
        assert_eq!([6, 0], block[0x27..0x29]);
        assert_eq!([0xFF, 0xFF], block[0x29..0x2B]);

        let dir = DirBlock::from_block(&block);
        let header = dir.header();
        assert_eq!(Some(EntryKind::VolumeHeader), header.kind());
        assert_eq!(b"VOL", header.name());
        assert_eq!((VERSION, MIN_VERSION), (header.version(), header.min_version()));
        assert_eq!(Access::Read | Access::Write, header.access());
        assert_eq!(FILE_ENTRY_SIZE, header.entry_length() as usize);
        assert_eq!(ENTRIES_PER_BLOCK, header.entries_per_block() as usize);
        assert_eq!(3, dir.next());
    }

    #[test]
    fn entries_follow_header() {
        let mut block = [0u8; BLOCK_SIZE];
        let dir = DirBlock::from_block_mut(&mut block);
        dir.set_entry(1, FileEntry::new(EntryKind::Seedling, "a.txt"));
        dir.set_entry(12, FileEntry::new(EntryKind::Seedling, "Z"));

        assert_eq!(0x15, block[4 + FILE_ENTRY_SIZE]);
        assert_eq!(b"A.TXT", &block[5 + FILE_ENTRY_SIZE..10 + FILE_ENTRY_SIZE]);
        assert_eq!(0x11, block[4 + 12 * FILE_ENTRY_SIZE]);
        assert_eq!(0, block[BLOCK_SIZE - 1]);
    }
}
