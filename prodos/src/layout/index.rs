use core::ptr;

use super::POINTERS_PER_INDEX;
use crate::{Block, BlockId};

/// 索引块：块号的低字节与高字节分别连续存放
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct IndexBlock {
    low: [u8; POINTERS_PER_INDEX],
    high: [u8; POINTERS_PER_INDEX],
}

impl IndexBlock {
    pub fn from_block(block: &Block) -> &Self {
        unsafe { &*ptr::from_ref(block).cast() }
    }

    pub fn from_block_mut(block: &mut Block) -> &mut Self {
        unsafe { &mut *ptr::from_mut(block).cast() }
    }

    pub fn get(&self, i: usize) -> BlockId {
        BlockId::new(u16::from_le_bytes([self.low[i], self.high[i]]))
    }

    pub fn set(&mut self, i: usize, block: BlockId) {
        (self.low[i], self.high[i]) = block.split();
    }

    /// 从0号槽起依次写入，超出256项的部分被忽略
    pub fn fill<'a>(&mut self, blocks: impl IntoIterator<Item = &'a BlockId>) {
        for (i, &block) in (0..POINTERS_PER_INDEX).zip(blocks) {
            self.set(i, block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BLOCK_SIZE;

    #[test]
    fn split_bytes() {
        let mut block = [0u8; BLOCK_SIZE];
        let blocks = [BlockId::new(0x0107), BlockId::new(0x0008)];
        IndexBlock::from_block_mut(&mut block).fill(&blocks);

        assert_eq!([0x07, 0x08], block[0..2]);
        assert_eq!([0x01, 0x00], block[256..258]);
        assert!(block[2..256].iter().all(|&b| b == 0));
        assert_eq!(BlockId::new(0x0107), IndexBlock::from_block(&block).get(0));
    }
}
