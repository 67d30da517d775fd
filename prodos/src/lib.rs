//! 以宿主目录为后端的虚拟 ProDOS 卷。
//!
//! 存储驱动只会按块号读块；每个块的内容都是在请求到来时，
//! 由宿主上的目录树现场合成的 ProDOS 结构。

#![no_std]

extern crate alloc;

/* 自上而下 */

// 卷：对外的块读写、引导入口
mod volume;

// 节点层：文件、目录、空闲位图，以及它们共同的生命周期
mod node;

// 块分配器：块号与节点的绑定关系
mod allocator;

// 磁盘数据结构层：目录项、索引块、位图等 ProDOS 布局
pub mod layout;

mod error;

pub use self::{
    allocator::{BlockAllocator, BlockId},
    error::{Error, Result},
    node::{DirectoryNode, DiskNode, FileNode, FreespaceTracker, NodeId, NodeKind},
    volume::{SharedVolume, Volume, VolumeOptions},
};
pub use block_dev::{BLOCK_SIZE, Block};

/// 卷目录的键块
pub const ROOT_BLOCK: BlockId = BlockId::new(2);
/// 空闲位图的起始块
pub const BITMAP_BLOCK: BlockId = BlockId::new(6);
/// 16位块号所能表示的最大卷
pub const MAX_BLOCKS: u16 = u16::MAX;
/// 一个位图块能描述的块数
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;
