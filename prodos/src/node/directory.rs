//! 目录节点
//!
//! 目录由一串块组成：首块放目录头与前12个子项，之后每块13项，
//! 块与块之间用前后指针相连。

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;
use core::mem;

use vfs::{DirEntry, DirEntryType, Stat};

use super::{DiskNode, Env, ExtraBlocks, Layout, NodeId, NodeKind, Nodes};
use crate::layout::{DirBlock, DirHeader, ENTRIES_PER_BLOCK, EntryKind, MAX_EOF};
use crate::{BITMAP_BLOCK, Block, Result};

/// 首块除去目录头后能放的子项数
const FIRST_BLOCK_ENTRIES: usize = ENTRIES_PER_BLOCK - 1;

#[derive(Debug)]
pub struct DirectoryNode {
    is_root: bool,
    /// 按名字排好序
    children: Vec<NodeId>,
}

impl DirectoryNode {
    pub fn new(is_root: bool) -> Self {
        Self {
            is_root,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// 容纳`children`个子项需要的块数
    pub fn blocks_for(children: usize) -> usize {
        if children <= FIRST_BLOCK_ENTRIES {
            1
        } else {
            1 + (children - FIRST_BLOCK_ENTRIES).div_ceil(ENTRIES_PER_BLOCK)
        }
    }

    pub(super) fn render(
        &self,
        node: &DiskNode,
        sequence: usize,
        nodes: &Nodes,
        capacity: u16,
        out: &mut Block,
    ) {
        let Some(base) = node.base_block() else {
            return;
        };

        let dir = DirBlock::from_block_mut(out);
        let prev = sequence.checked_sub(1).and_then(|seq| node.block_at(seq));
        dir.set_links(prev, node.block_at(sequence + 1));

        let (first_slot, first_child) = if sequence == 0 {
            let kind = if self.is_root {
                EntryKind::VolumeHeader
            } else {
                EntryKind::SubdirectoryHeader
            };
            dir.set_header(
                DirHeader::new(kind, node.name())
                    .with_file_count(self.children.len() as u16)
                    .with_bitmap_pointer(BITMAP_BLOCK)
                    .with_total_blocks(capacity),
            );
            (1, 0)
        } else {
            (0, ENTRIES_PER_BLOCK * sequence - 1)
        };

        let children = self.children.iter().skip(first_child);
        for (slot, &child) in (first_slot..ENTRIES_PER_BLOCK).zip(children) {
            dir.set_entry(slot, nodes.node(child).entry(base));
        }
    }
}

impl Layout for DirectoryNode {
    fn plan(&mut self, _stat: Option<&Stat>) -> ExtraBlocks {
        ExtraBlocks::Next(Self::blocks_for(self.children.len()) - 1)
    }
}

/// 不映射到卷上的宿主项
fn is_eligible(entry: &DirEntry) -> bool {
    !entry.hidden
        && entry.ty != DirEntryType::Other
        && !entry.name.starts_with('.')
        && !entry.name.starts_with('~')
        && !entry.name.ends_with('~')
}

impl Nodes {
    fn dir_mut(&mut self, id: NodeId) -> &mut DirectoryNode {
        match &mut self.node_mut(id).kind {
            NodeKind::Directory(dir) => dir,
            _ => unreachable!("{id} is not a directory"),
        }
    }

    /// 让子节点与宿主目录的内容一致，返回是否无需任何改动。
    ///
    /// 某个子项分配失败时，其余子项照常处理，目录仍会排序并重排块链，
    /// 最后返回第一个错误；失败的子项留待下次检查重试。
    pub(super) fn reconcile(&mut self, id: NodeId, env: &mut Env) -> Result<bool> {
        let Some(path) = self.node(id).host_path.clone() else {
            return Ok(true);
        };
        let listing: Vec<DirEntry> = env
            .host
            .read_dir(&path)?
            .into_iter()
            .filter(is_eligible)
            .collect();

        let mut fresh = true;
        let mut changed = false;
        let mut failure = None;
        let mut added = Vec::new();
        // 本轮腾出的基块，留给改了名的同一个宿主项
        let mut vacated = Vec::new();

        // 消失的子项立刻回收
        for child in self.node(id).children().to_vec() {
            let node = self.node(child);
            let present = listing
                .iter()
                .any(|entry| entry.name == node.host_name && entry.ty == node.host_type());

            if !present {
                log::debug!("{path}: {} removed", node.host_name);
                if let Some(base) = node.base_block {
                    vacated.push((node.host_type(), node.host_size(), base));
                }
                self.deallocate(child, env.alloc);
                self.remove_subtree(child);
                self.dir_mut(id).children.retain(|&c| c != child);
                changed = true;
            } else if node.allocated && !node.is_directory() {
                match self.check(child, env) {
                    Ok(child_fresh) => fresh &= child_fresh,
                    Err(err) => {
                        fresh = false;
                        failure = failure.or(Some(err));
                    }
                }
            }
        }

        let known: BTreeSet<String> = self
            .node(id)
            .children()
            .iter()
            .map(|&child| self.node(child).host_name.clone())
            .collect();

        for entry in listing.iter().filter(|entry| !known.contains(&entry.name)) {
            let host_path = vfs::join(&path, &entry.name);
            let size = match entry.ty {
                DirEntryType::Directory => None,
                _ => env
                    .host
                    .stat(&host_path)
                    .ok()
                    .map(|stat| stat.size.min(u64::from(MAX_EOF))),
            };
            let mut node = match entry.ty {
                DirEntryType::Directory => DiskNode::directory(host_path, &entry.name, id),
                _ => DiskNode::file(host_path, &entry.name, id),
            };
            if let Some(i) = vacated
                .iter()
                .position(|&(ty, vacated_size, _)| ty == node.host_type() && vacated_size == size)
            {
                node.base_block = Some(vacated.swap_remove(i).2);
            }

            let child = self.insert(node);
            if let Err(err) = self.allocate(child, env) {
                self.nodes.remove(&child);
                failure = failure.or(Some(err));
                continue;
            }

            log::debug!("{path}: {} added as {child}", entry.name);
            self.dir_mut(id).children.push(child);
            added.push(child);
            changed = true;
        }

        if changed {
            self.sort_children(id);
            if let Err(err) = self.refresh(id, env) {
                // 块链放不下：撤回本轮新增的子项
                for child in added {
                    self.deallocate(child, env.alloc);
                    self.remove_subtree(child);
                    self.dir_mut(id).children.retain(|&c| c != child);
                }
                self.refresh(id, env)?;
                failure = failure.or(Some(err));
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(fresh && !changed),
        }
    }

    fn sort_children(&mut self, id: NodeId) {
        let mut children = mem::take(&mut self.dir_mut(id).children);
        children.sort_by(|&a, &b| {
            let (a, b) = (self.node(a), self.node(b));
            (&a.name, &a.host_name).cmp(&(&b.name, &b.host_name))
        });
        self.dir_mut(id).children = children;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_length() {
        assert_eq!(1, DirectoryNode::blocks_for(0));
        assert_eq!(1, DirectoryNode::blocks_for(12));
        assert_eq!(2, DirectoryNode::blocks_for(13));
        assert_eq!(2, DirectoryNode::blocks_for(25));
        assert_eq!(3, DirectoryNode::blocks_for(26));
    }

    #[test]
    fn hidden_entries() {
        let entry = |name: &str, ty, hidden| DirEntry {
            name: String::from(name),
            ty,
            hidden,
        };

        assert!(is_eligible(&entry("GAME.BIN", DirEntryType::Regular, false)));
        assert!(is_eligible(&entry("SUB", DirEntryType::Directory, false)));
        assert!(!is_eligible(&entry(".git", DirEntryType::Directory, false)));
        assert!(!is_eligible(&entry("~lock", DirEntryType::Regular, false)));
        assert!(!is_eligible(&entry("notes.txt~", DirEntryType::Regular, false)));
        assert!(!is_eligible(&entry("DESKTOP.INI", DirEntryType::Regular, true)));
        assert!(!is_eligible(&entry("fifo", DirEntryType::Other, false)));
    }
}
