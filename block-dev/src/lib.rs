//! 虚拟机一侧的外设边界：块设备与内存写入器。

#![no_std]

use core::fmt::Debug;

/// 块设备一次读写的字节数
pub const BLOCK_SIZE: usize = 512;

pub type Block = [u8; BLOCK_SIZE];

/// 以块为单位读写的存储设备。
///
/// 存储驱动只认识块编号，块内的字节由设备自己负责。
pub trait BlockDevice: Send + Sync + Debug {
    type Error;

    fn read_block(&self, block_id: usize, buf: &mut Block) -> Result<(), Self::Error>;

    fn write_block(&self, block_id: usize, buf: &Block) -> Result<(), Self::Error>;

    fn is_write_protected(&self) -> bool {
        false
    }

    /// 设备的总块数
    fn block_count(&self) -> u32;
}

/// 按字节写入被模拟机器的内存，并能让 CPU 从某地址开始执行。
///
/// 引导时用来把引导文件与零页参数交给 CPU 一侧。
pub trait MemoryWriter {
    fn write_byte(&mut self, address: u16, value: u8);

    /// Little-endian, like every 6502 pointer.
    fn write_word(&mut self, address: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(address, lo);
        self.write_byte(address.wrapping_add(1), hi);
    }

    fn write_bytes(&mut self, address: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            self.write_byte(address.wrapping_add(offset as u16), byte);
        }
    }

    /// 让 CPU 从`address`处开始执行
    fn start_at(&mut self, address: u16);
}
