//! 空闲位图
//!
//! 每个块对应一位，1表示空闲；字节内高位在前。

use crate::{BLOCK_BITS, BLOCK_SIZE, Block};

/// 块号在位图中的位置
struct BitPos(usize);

impl BitPos {
    /// 线性映射解码为(位图块序号, 块内字节, 字节内掩码)
    fn decode(self) -> (usize, usize, u8) {
        let block_index = self.0 / BLOCK_BITS;
        let bit = self.0 % BLOCK_BITS;
        (block_index, bit / 8, 0x80 >> (bit % 8))
    }
}

/// 描述`capacity`个块所需的位图块数
pub fn bitmap_blocks(capacity: u16) -> u16 {
    (capacity as usize).div_ceil(BLOCK_BITS) as u16
}

/// 合成第`block_index`个位图块：未被分配的块对应位置1，超出容量的位保持0
pub fn render_bitmap(
    block_index: usize,
    capacity: u16,
    is_allocated: impl Fn(usize) -> bool,
    out: &mut Block,
) {
    out.fill(0);
    let first = block_index * BLOCK_BITS;
    let last = (first + BLOCK_BITS).min(capacity as usize);

    for block in first..last {
        if !is_allocated(block) {
            let (_, byte, mask) = BitPos(block).decode();
            out[byte] |= mask;
        }
    }
}

/// 在整段位图里查询某块是否空闲
pub fn is_free(bitmap: &[u8], block: usize) -> bool {
    let (block_index, byte, mask) = BitPos(block).decode();
    bitmap
        .get(block_index * BLOCK_SIZE + byte)
        .is_some_and(|b| b & mask != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_first() {
        let mut block = [0u8; BLOCK_SIZE];
        render_bitmap(0, 16, |b| (2..8).contains(&b), &mut block);

        assert_eq!(0b1100_0000, block[0]);
        assert_eq!(0xFF, block[1]);
        assert!(block[2..].iter().all(|&b| b == 0));
        assert!(is_free(&block, 0));
        assert!(!is_free(&block, 7));
        assert!(!is_free(&block, 16));
    }

    #[test]
    fn second_bitmap_block() {
        let mut block = [0u8; BLOCK_SIZE];
        render_bitmap(1, 4096 + 9, |_| false, &mut block);

        assert_eq!(0xFF, block[0]);
        assert_eq!(0x80, block[1]);
        assert_eq!(0, block[2]);
    }

    #[test]
    fn blocks_needed() {
        assert_eq!(1, bitmap_blocks(280));
        assert_eq!(1, bitmap_blocks(4096));
        assert_eq!(2, bitmap_blocks(4097));
        assert_eq!(16, bitmap_blocks(u16::MAX));
    }
}
