//! 块号分配器
//!
//! 记录每个块号此刻归哪个节点所有；空闲位图由它即时推导。

use alloc::vec;
use alloc::vec::Vec;

use derive_more::{Add, Display, From, Into};

use crate::{Error, NodeId, Result, ROOT_BLOCK};

/// ProDOS 的块号，16位
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Add, From, Into, Display)]
#[repr(transparent)]
pub struct BlockId(u16);

impl From<BlockId> for usize {
    fn from(id: BlockId) -> Self {
        id.0 as usize
    }
}

impl BlockId {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// 拆成低字节与高字节，索引块按这两条字节带存放块号
    pub const fn split(self) -> (u8, u8) {
        (self.0 as u8, (self.0 >> 8) as u8)
    }
}

#[derive(Debug)]
pub struct BlockAllocator {
    /// 下标即块号
    owners: Vec<Option<NodeId>>,
}

impl BlockAllocator {
    pub fn new(capacity: u16) -> Self {
        Self {
            owners: vec![None; capacity as usize],
        }
    }

    /// 卷的总块数
    pub fn capacity(&self) -> u16 {
        self.owners.len() as u16
    }

    /// 块的当前所有者；越界或未分配都返回空
    pub fn owner(&self, block: usize) -> Option<NodeId> {
        self.owners.get(block).copied().flatten()
    }

    #[inline]
    pub fn is_allocated(&self, block: usize) -> bool {
        self.owner(block).is_some()
    }

    pub fn allocated_count(&self) -> usize {
        self.owners.iter().filter(|owner| owner.is_some()).count()
    }

    /// 从2号块开始线性扫描，返回第一个未绑定的块。
    /// 0、1号块是引导块，永不分配。
    pub fn next_free_block(&self) -> Result<BlockId> {
        self.owners
            .iter()
            .enumerate()
            .skip(ROOT_BLOCK.get() as usize)
            .find_map(|(block, owner)| owner.is_none().then_some(BlockId(block as u16)))
            .ok_or(Error::Full)
    }

    pub(crate) fn bind(&mut self, block: BlockId, id: NodeId) -> Result<()> {
        let slot = self.owners.get_mut(usize::from(block)).ok_or(Error::Full)?;
        debug_assert!(
            slot.is_none_or(|owner| owner == id),
            "block {block} is already owned by {slot:?}"
        );
        *slot = Some(id);
        Ok(())
    }

    /// 仅当块仍归`id`所有时才解除绑定，防止误释放已被他人接手的块
    pub(crate) fn unbind_if(&mut self, block: BlockId, id: NodeId) -> bool {
        match self.owners.get_mut(usize::from(block)) {
            Some(slot) if *slot == Some(id) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}
