//! # 节点层
//!
//! 卷上的每个对象（文件、目录、空闲位图）都是一个[`DiskNode`]，
//! 存放在以[`NodeId`]为键的节点表里；父子关系只记句柄。
//!
//! 节点的生命周期：创建 → `allocate` → 反复`check`/`refresh` → `deallocate`。
//! 布局随宿主修改时间惰性更新，基块一经分配便不再变化。

mod directory;
mod file;
mod freespace;

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::mem;
use core::ops::Range;

use derive_more::Display;
use vfs::{DirEntryType, HostFs, Stat, Timestamp};

pub use self::{directory::DirectoryNode, file::FileNode, freespace::FreespaceTracker};
use crate::layout::{EntryKind, FileEntry, FileName, FileType, display_name};
use crate::{BLOCK_SIZE, Block, BlockAllocator, BlockId, Error, Result};

/// 节点表中的句柄，永不复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "#{}", _0)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }
}

#[derive(Debug)]
pub enum NodeKind {
    File(FileNode),
    Directory(DirectoryNode),
    Freespace(FreespaceTracker),
}

/// 基块之外还要哪些块
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExtraBlocks {
    /// 任取若干空闲块
    Next(usize),
    /// 必须是这段连续块号
    Fixed(Range<u16>),
}

/// 各类节点的布局计算
pub(crate) trait Layout {
    /// 依据宿主状态重新计算布局，返回所需的额外块
    fn plan(&mut self, stat: Option<&Stat>) -> ExtraBlocks;
}

impl Layout for NodeKind {
    fn plan(&mut self, stat: Option<&Stat>) -> ExtraBlocks {
        match self {
            Self::File(file) => file.plan(stat),
            Self::Directory(dir) => dir.plan(stat),
            Self::Freespace(tracker) => tracker.plan(stat),
        }
    }
}

#[derive(Debug)]
pub struct DiskNode {
    id: NodeId,
    base_block: Option<BlockId>,
    /// 卷目录与空闲位图的基块位置固定
    fixed_base: Option<BlockId>,
    extra_blocks: Vec<BlockId>,
    allocated: bool,
    /// 当前布局是在第几次请求时算出的
    allocation_time: u64,
    last_check_time: Option<Timestamp>,
    parent: Option<NodeId>,
    host_path: Option<String>,
    host_name: String,
    name: String,
    kind: NodeKind,
}

impl DiskNode {
    fn new(kind: NodeKind, name: String) -> Self {
        Self {
            id: NodeId(0),
            base_block: None,
            fixed_base: None,
            extra_blocks: Vec::new(),
            allocated: false,
            allocation_time: 0,
            last_check_time: None,
            parent: None,
            host_path: None,
            host_name: String::new(),
            name,
            kind,
        }
    }

    pub(crate) fn file(host_path: String, host_name: &str, parent: NodeId) -> Self {
        let FileName {
            name,
            file_type,
            aux_type,
        } = FileName::parse(host_name);
        Self {
            host_path: Some(host_path),
            host_name: String::from(host_name),
            parent: Some(parent),
            ..Self::new(
                NodeKind::File(FileNode::new(FileType::new(file_type, aux_type))),
                name,
            )
        }
    }

    pub(crate) fn directory(host_path: String, host_name: &str, parent: NodeId) -> Self {
        Self {
            host_path: Some(host_path),
            host_name: String::from(host_name),
            parent: Some(parent),
            ..Self::new(
                NodeKind::Directory(DirectoryNode::new(false)),
                display_name(host_name),
            )
        }
    }

    pub(crate) fn root(host_path: String, name: &str) -> Self {
        Self {
            host_path: Some(host_path),
            fixed_base: Some(crate::ROOT_BLOCK),
            ..Self::new(
                NodeKind::Directory(DirectoryNode::new(true)),
                display_name(name),
            )
        }
    }

    pub(crate) fn freespace(capacity: u16) -> Self {
        Self {
            fixed_base: Some(crate::BITMAP_BLOCK),
            ..Self::new(
                NodeKind::Freespace(FreespaceTracker::new(capacity)),
                String::from("BITMAP"),
            )
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// 未分配过的节点没有基块
    pub fn base_block(&self) -> Option<BlockId> {
        self.base_block
    }

    pub fn extra_blocks(&self) -> &[BlockId] {
        &self.extra_blocks
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    pub fn allocation_time(&self) -> u64 {
        self.allocation_time
    }

    pub fn last_check_time(&self) -> Option<Timestamp> {
        self.last_check_time
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Directory(dir) => dir.children(),
            _ => &[],
        }
    }

    pub fn host_path(&self) -> Option<&str> {
        self.host_path.as_deref()
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// ProDOS 名字
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    /// 占用的块数：基块加额外块
    pub fn blocks_used(&self) -> usize {
        if self.allocated {
            1 + self.extra_blocks.len()
        } else {
            0
        }
    }

    /// 块在本节点内的序号：基块为0，第i个额外块为i+1
    pub fn sequence_of(&self, block: BlockId) -> Option<usize> {
        if self.base_block == Some(block) {
            return Some(0);
        }
        self.extra_blocks
            .iter()
            .position(|&b| b == block)
            .map(|i| i + 1)
    }

    /// `sequence_of`的逆映射
    pub fn block_at(&self, sequence: usize) -> Option<BlockId> {
        match sequence {
            0 => self.base_block,
            seq => self.extra_blocks.get(seq - 1).copied(),
        }
    }

    /// 宿主上对应的项类型，用来识别“同名但换了类型”的情况
    fn host_type(&self) -> DirEntryType {
        match self.kind {
            NodeKind::Directory(_) => DirEntryType::Directory,
            _ => DirEntryType::Regular,
        }
    }

    /// 文件在上次布局时的长度，目录没有长度
    fn host_size(&self) -> Option<u64> {
        match &self.kind {
            NodeKind::File(file) => Some(u64::from(file.eof())),
            _ => None,
        }
    }

    /// 本节点在父目录中的目录项
    fn entry(&self, header_pointer: BlockId) -> FileEntry {
        let entry = match &self.kind {
            NodeKind::File(file) => FileEntry::new(file.entry_kind(), &self.name)
                .with_file_type(file.file_type())
                .with_aux_type(file.aux_type())
                .with_eof(file.eof()),
            _ => FileEntry::new(EntryKind::Subdirectory, &self.name)
                .with_file_type(FileType::DIRECTORY)
                .with_eof((self.blocks_used() * BLOCK_SIZE) as u32),
        };

        entry
            .with_key_pointer(self.base_block.unwrap_or(BlockId::new(0)))
            .with_blocks_used(self.blocks_used() as u16)
            .with_header_pointer(header_pointer)
    }

    fn bind_extras(&mut self, plan: ExtraBlocks, alloc: &mut BlockAllocator) -> Result<()> {
        match plan {
            ExtraBlocks::Next(count) => {
                for _ in 0..count {
                    let block = alloc.next_free_block()?;
                    alloc.bind(block, self.id)?;
                    self.extra_blocks.push(block);
                }
            }
            ExtraBlocks::Fixed(range) => {
                for raw in range {
                    let block = BlockId::new(raw);
                    alloc.bind(block, self.id)?;
                    self.extra_blocks.push(block);
                }
            }
        }
        Ok(())
    }

    fn release_extras(&mut self, alloc: &mut BlockAllocator) {
        for block in self.extra_blocks.drain(..) {
            alloc.unbind_if(block, self.id);
        }
    }

    /// 按新的宿主状态重排额外块。失败时恢复原来的布局与额外块，
    /// 卷上看到的仍是上一次成功的结果。
    fn relayout(&mut self, stat: Option<&Stat>, alloc: &mut BlockAllocator) -> Result<()> {
        let previous = mem::take(&mut self.extra_blocks);
        for &block in &previous {
            alloc.unbind_if(block, self.id);
        }
        let saved = match &self.kind {
            NodeKind::File(file) => Some(file.clone()),
            _ => None,
        };

        let plan = self.kind.plan(stat);
        if let Err(err) = self.bind_extras(plan, alloc) {
            log::warn!("{}: relayout failed: {err}", self.name);
            self.release_extras(alloc);
            for &block in &previous {
                alloc.bind(block, self.id)?;
            }
            self.extra_blocks = previous;
            if let (Some(saved), NodeKind::File(file)) = (saved, &mut self.kind) {
                *file = saved;
            }
            return Err(err);
        }

        Ok(())
    }
}

/// 一次请求中节点操作所依赖的外部状态
pub(crate) struct Env<'a> {
    pub alloc: &'a mut BlockAllocator,
    pub host: &'a dyn HostFs,
    /// 当前请求的序号
    pub now: u64,
}

/// 节点表
#[derive(Debug, Default)]
pub(crate) struct Nodes {
    nodes: BTreeMap<NodeId, DiskNode>,
    next_id: u32,
}

impl Nodes {
    pub fn insert(&mut self, mut node: DiskNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        node.id = id;
        self.nodes.insert(id, node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&DiskNode> {
        self.nodes.get(&id)
    }

    /// 句柄在节点表里还有效时返回`Ok`
    pub fn live(&self, id: NodeId) -> Result<()> {
        if self.nodes.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("node {id}")))
        }
    }

    fn node(&self, id: NodeId) -> &DiskNode {
        &self.nodes[&id]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut DiskNode {
        self.nodes.get_mut(&id).expect("dangling node handle")
    }

    /// 连同子树一起移出节点表
    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for &child in node.children() {
                self.remove_subtree(child);
            }
        }
    }

    pub fn allocate(&mut self, id: NodeId, env: &mut Env) -> Result<()> {
        let node = self.node_mut(id);
        if node.allocated {
            return Ok(());
        }

        let stat = match &node.host_path {
            Some(path) => Some(env.host.stat(path)?),
            None => None,
        };

        let base = match node.fixed_base.or(node.base_block) {
            Some(block) if env.alloc.owner(block.into()).is_none_or(|owner| owner == id) => block,
            _ => env.alloc.next_free_block()?,
        };
        env.alloc.bind(base, id)?;
        node.base_block = Some(base);

        let plan = node.kind.plan(stat.as_ref());
        if let Err(err) = node.bind_extras(plan, env.alloc) {
            log::warn!("{}: allocation failed: {err}", node.name);
            node.release_extras(env.alloc);
            env.alloc.unbind_if(base, id);
            return Err(err);
        }

        node.last_check_time = stat.map(|stat| stat.modified);
        node.allocation_time = env.now;
        node.allocated = true;
        log::debug!(
            "allocate {id} {}: base={base}, extras={}",
            node.name,
            node.extra_blocks.len()
        );

        Ok(())
    }

    pub fn deallocate(&mut self, id: NodeId, alloc: &mut BlockAllocator) {
        let node = self.node(id);
        if !node.allocated {
            return;
        }

        for child in node.children().to_vec() {
            self.deallocate(child, alloc);
        }

        let node = self.node_mut(id);
        node.release_extras(alloc);
        if let Some(base) = node.base_block {
            alloc.unbind_if(base, id);
        }
        node.allocated = false;
        log::debug!("deallocate {id} {}", node.name);
    }

    pub fn refresh(&mut self, id: NodeId, env: &mut Env) -> Result<()> {
        if !self.node(id).allocated {
            return self.allocate(id, env);
        }

        let node = self.node_mut(id);
        let stat = match &node.host_path {
            Some(path) => Some(env.host.stat(path)?),
            None => None,
        };

        node.relayout(stat.as_ref(), env.alloc)?;

        if let Some(stat) = stat {
            node.last_check_time = Some(stat.modified);
        }
        node.allocation_time = env.now;
        log::debug!("refresh {id} {}: extras={}", node.name, node.extra_blocks.len());

        Ok(())
    }

    /// 与宿主比对，返回节点是否仍是最新的
    pub fn check(&mut self, id: NodeId, env: &mut Env) -> Result<bool> {
        self.allocate(id, env)?;

        let node = self.node_mut(id);
        let Some(path) = node.host_path.as_deref() else {
            return Ok(false);
        };

        let modified = env.host.stat(path)?.modified;
        let mut fresh = true;
        if node.last_check_time != Some(modified) {
            log::debug!("{path} changed on host");
            // 刷新成功才记下新的修改时间，失败的话下次检查会重试
            self.refresh(id, env)?;
            fresh = false;
        }

        if self.node(id).is_directory() {
            fresh &= self.reconcile(id, env)?;
        }

        Ok(fresh)
    }

    pub fn render_block(
        &mut self,
        id: NodeId,
        sequence: usize,
        env: &mut Env,
        out: &mut Block,
    ) -> Result<()> {
        self.check(id, env)?;
        self.render(id, sequence, env, out)
    }

    /// 不做检查，直接按当前布局合成
    pub fn render(&self, id: NodeId, sequence: usize, env: &Env, out: &mut Block) -> Result<()> {
        out.fill(0);
        let node = self.node(id);
        match &node.kind {
            NodeKind::File(file) => file.render(node, sequence, env.host, out),
            NodeKind::Directory(dir) => {
                dir.render(node, sequence, self, env.alloc.capacity(), out);
                Ok(())
            }
            NodeKind::Freespace(tracker) => {
                tracker.render(sequence, &*env.alloc, out);
                Ok(())
            }
        }
    }
}

/// 尽量读满缓冲区，返回读到的字节数
pub(crate) fn read_full(
    host: &dyn HostFs,
    path: &str,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = host.read_at(path, offset + filled as u64, &mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
