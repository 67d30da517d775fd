use vfs::Stat;

use super::{ExtraBlocks, Layout};
use crate::layout::{bitmap_blocks, render_bitmap};
use crate::{BITMAP_BLOCK, Block, BlockAllocator};

/// 空闲位图，从6号块起连续存放，内容由分配器即时推导
#[derive(Debug)]
pub struct FreespaceTracker {
    blocks: u16,
}

impl FreespaceTracker {
    pub fn new(capacity: u16) -> Self {
        Self {
            blocks: bitmap_blocks(capacity),
        }
    }

    /// 位图占用的块数
    pub fn blocks(&self) -> u16 {
        self.blocks
    }

    pub(super) fn render(&self, sequence: usize, alloc: &BlockAllocator, out: &mut Block) {
        render_bitmap(
            sequence,
            alloc.capacity(),
            |block| alloc.is_allocated(block),
            out,
        );
    }
}

impl Layout for FreespaceTracker {
    fn plan(&mut self, _stat: Option<&Stat>) -> ExtraBlocks {
        let first = BITMAP_BLOCK.get() + 1;
        ExtraBlocks::Fixed(first..BITMAP_BLOCK.get() + self.blocks)
    }
}
