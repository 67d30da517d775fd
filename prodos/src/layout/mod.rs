//! ProDOS 磁盘上的数据结构
//!
//! 引导块(0-1) | 卷目录(2-5) | 空闲位图(6-) | 其余块按需分配
//!
//! 所有多字节字段均为小端序；结构体只含字节与字节数组，
//! 对齐为1，可以直接叠放在块缓冲区上。

mod bitmap;
mod entry;
mod index;
mod name;

pub use self::{
    bitmap::{bitmap_blocks, is_free, render_bitmap},
    entry::{Access, DirBlock, DirHeader, EntryKind, FileEntry},
    index::IndexBlock,
    name::{FileName, FileType, display_name},
};

/// 目录项的长度
pub const FILE_ENTRY_SIZE: usize = 0x27;
/// 每个目录块容纳的项数（首块的第一项是目录头）
pub const ENTRIES_PER_BLOCK: usize = 13;
/// 一个索引块能编号的块数
pub const POINTERS_PER_INDEX: usize = 256;
/// 名字最长15字节
pub const NAME_MAX_LEN: usize = 15;
/// EOF 字段只有24位
pub const MAX_EOF: u32 = 0x00FF_FFFF;
/// 目录项与目录头的版本字节
pub const VERSION: u8 = 0x19;
pub const MIN_VERSION: u8 = 0;

#[cfg(test)]
mod tests {
    use core::mem;

    use super::*;
    use crate::BLOCK_SIZE;

    #[test]
    fn layout() {
        assert_eq!(FILE_ENTRY_SIZE, mem::size_of::<FileEntry>());
        assert_eq!(FILE_ENTRY_SIZE, mem::size_of::<DirHeader>());
        assert_eq!(BLOCK_SIZE, mem::size_of::<DirBlock>());
        assert_eq!(BLOCK_SIZE, mem::size_of::<IndexBlock>());
    }
}
