//! 文件节点
//!
//! | 类型     | 键块     | 额外块                    |
//! |----------|----------|---------------------------|
//! | Seedling | 数据     | 无                        |
//! | Sapling  | 索引块   | 数据块                    |
//! | Tree     | 主索引块 | 二级索引块，随后是数据块  |

use vfs::{HostFs, Stat};

use super::{DiskNode, ExtraBlocks, Layout, read_full};
use crate::layout::{EntryKind, FileType, IndexBlock, MAX_EOF, POINTERS_PER_INDEX};
use crate::{BLOCK_SIZE, Block, Result};

#[derive(Debug, Clone)]
pub struct FileNode {
    file_type: FileType,
    kind: EntryKind,
    /// 布局时宿主文件的长度
    eof: u32,
    data_blocks: usize,
    /// 树形文件的二级索引块数
    index_blocks: usize,
}

impl FileNode {
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            kind: EntryKind::Seedling,
            eof: 0,
            data_blocks: 0,
            index_blocks: 0,
        }
    }

    pub fn entry_kind(&self) -> EntryKind {
        self.kind
    }

    pub fn file_type(&self) -> u8 {
        self.file_type.code
    }

    pub fn aux_type(&self) -> u16 {
        self.file_type.aux_type
    }

    pub fn eof(&self) -> u32 {
        self.eof
    }

    pub fn data_blocks(&self) -> usize {
        self.data_blocks
    }

    pub fn index_blocks(&self) -> usize {
        self.index_blocks
    }

    pub(super) fn render(
        &self,
        node: &DiskNode,
        sequence: usize,
        host: &dyn HostFs,
        out: &mut Block,
    ) -> Result<()> {
        let Some(path) = node.host_path() else {
            return Ok(());
        };
        let extras = node.extra_blocks();

        match (self.kind, sequence) {
            (EntryKind::Seedling, 0) => {
                read_full(host, path, 0, out)?;
            }
            (EntryKind::Sapling, 0) => {
                let data = extras.get(..self.data_blocks).unwrap_or_default();
                IndexBlock::from_block_mut(out).fill(data);
            }
            (EntryKind::Sapling, seq) => {
                read_full(host, path, ((seq - 1) * BLOCK_SIZE) as u64, out)?;
            }
            (EntryKind::Tree, 0) => {
                let used = self.data_blocks.div_ceil(POINTERS_PER_INDEX);
                let index = extras.get(..used).unwrap_or_default();
                IndexBlock::from_block_mut(out).fill(index);
            }
            (EntryKind::Tree, seq) if seq <= self.index_blocks => {
                // 多出来的那个二级索引块不覆盖任何数据，渲染为空
                let start = self.index_blocks + (seq - 1) * POINTERS_PER_INDEX;
                let end = (start + POINTERS_PER_INDEX).min(self.index_blocks + self.data_blocks);
                let data = extras.get(start..end).unwrap_or_default();
                IndexBlock::from_block_mut(out).fill(data);
            }
            (EntryKind::Tree, seq) => {
                let block = seq - 1 - self.index_blocks;
                read_full(host, path, (block * BLOCK_SIZE) as u64, out)?;
            }
            (kind, seq) => {
                log::warn!("{path}: nothing to render for {kind:?} sequence {seq}");
            }
        }

        Ok(())
    }
}

impl Layout for FileNode {
    fn plan(&mut self, stat: Option<&Stat>) -> ExtraBlocks {
        let size = stat.map_or(0, |stat| stat.size).min(MAX_EOF as u64);

        self.eof = size as u32;
        self.kind = EntryKind::for_size(size);
        self.data_blocks = (size as usize).div_ceil(BLOCK_SIZE);
        self.index_blocks = match (self.data_blocks * 2).div_ceil(BLOCK_SIZE) {
            blocks if blocks > 1 => blocks + 1,
            blocks => blocks,
        };

        ExtraBlocks::Next(match self.kind {
            EntryKind::Sapling => self.data_blocks,
            EntryKind::Tree => self.index_blocks + self.data_blocks,
            _ => 0,
        })
    }
}
