//! 卷：对外只暴露块读写与引导

use alloc::format;
use alloc::string::String;
use alloc::vec;

use block_dev::{BlockDevice, MemoryWriter};
use spin::{Mutex, MutexGuard};
use vfs::{DirEntryType, HostFs};

use crate::layout::{NAME_MAX_LEN, bitmap_blocks};
use crate::node::{Env, Nodes, read_full};
use crate::{
    BITMAP_BLOCK, Block, BlockAllocator, BlockId, DiskNode, Error, MAX_BLOCKS, NodeId, Result,
};

/// 块的归属在检查期间变化时，最多重新解析几次
const RESOLVE_ATTEMPTS: usize = 4;

/// 引导文件的名字前缀
const BOOT_FILE_PREFIX: &str = "PRODOS";
/// 引导文件的加载地址，也是入口
const BOOT_ADDRESS: u16 = 0x2000;
/// 零页：引导设备的单元号(slot << 4)
const UNIT_NUMBER_ADDRESS: u16 = 0x43;
/// 零页：块驱动入口
const DRIVER_ADDRESS: u16 = 0x48;
/// 驱动入口在扩展卡 ROM 页内的偏移
const DRIVER_ENTRY_OFFSET: u16 = 0x0A;

#[derive(Debug, Clone)]
pub struct VolumeOptions {
    /// 卷的总块数
    pub capacity: u16,
    /// 卷名，缺省时取宿主目录名
    pub volume_name: Option<String>,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            capacity: MAX_BLOCKS,
            volume_name: None,
        }
    }
}

impl VolumeOptions {
    fn validate(&self) -> Result<()> {
        // 至少要放下引导块、卷目录、位图，外加一个数据块
        let reserved = BITMAP_BLOCK.get() + bitmap_blocks(self.capacity);
        if self.capacity <= reserved {
            return Err(Error::InvalidConfig(format!(
                "capacity {} leaves no room after the bitmap",
                self.capacity
            )));
        }

        if let Some(name) = &self.volume_name {
            let valid = !name.is_empty()
                && name.len() <= NAME_MAX_LEN
                && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.');
            if !valid {
                return Err(Error::InvalidConfig(format!("bad volume name {name:?}")));
            }
        }

        Ok(())
    }
}

/// 以宿主目录为后端的只读 ProDOS 卷
#[derive(Debug)]
pub struct Volume<H> {
    host: H,
    nodes: Nodes,
    alloc: BlockAllocator,
    root: NodeId,
    bitmap: NodeId,
    /// 已处理的请求数
    requests: u64,
}

impl<H: HostFs> Volume<H> {
    pub fn new(host: H, root_path: &str, options: VolumeOptions) -> Result<Self> {
        options.validate()?;

        let stat = host.stat(root_path)?;
        if stat.ty != DirEntryType::Directory {
            return Err(Error::InvalidConfig(format!("{root_path} is not a directory")));
        }

        let name = match &options.volume_name {
            Some(name) => name.as_str(),
            None => root_path
                .trim_end_matches(['/', '\\'])
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or_default(),
        };

        let mut nodes = Nodes::default();
        let bitmap = nodes.insert(DiskNode::freespace(options.capacity));
        let root = nodes.insert(DiskNode::root(String::from(root_path), name));

        let mut volume = Self {
            host,
            nodes,
            alloc: BlockAllocator::new(options.capacity),
            root,
            bitmap,
            requests: 0,
        };

        let (nodes, mut env) = volume.parts();
        nodes.allocate(bitmap, &mut env)?;
        nodes.allocate(root, &mut env)?;
        nodes.check(root, &mut env)?;
        log::info!(
            "volume {} on {root_path}: {} blocks, {} in use",
            nodes.get(root).map_or("", DiskNode::name),
            options.capacity,
            env.alloc.allocated_count()
        );

        Ok(volume)
    }

    fn parts(&mut self) -> (&mut Nodes, Env<'_>) {
        (
            &mut self.nodes,
            Env {
                alloc: &mut self.alloc,
                host: &self.host,
                now: self.requests,
            },
        )
    }

    /// 合成第`block`块。没有所有者的块用块号的低字节填充，便于辨认。
    pub fn read_block(&mut self, block: u32, out: &mut Block) -> Result<()> {
        self.requests += 1;
        let (nodes, mut env) = self.parts();

        for _ in 0..RESOLVE_ATTEMPTS {
            let Some(owner) = env.alloc.owner(block as usize) else {
                log::trace!("read block {block}: unmapped");
                out.fill(block as u8);
                return Ok(());
            };

            nodes.check(owner, &mut env)?;
            if env.alloc.owner(block as usize) != Some(owner) {
                log::debug!("block {block} moved while checking {owner}");
                continue;
            }

            let Some(sequence) = nodes
                .get(owner)
                .and_then(|node| node.sequence_of(BlockId::new(block as u16)))
            else {
                continue;
            };

            log::trace!("read block {block}: {owner}[{sequence}]");
            return nodes.render(owner, sequence, &env, out);
        }

        log::warn!("block {block}: ownership kept moving");
        Err(Error::Inconsistent)
    }

    pub fn write_block(&mut self, block: u32, _data: &Block) -> Result<()> {
        log::debug!("rejected write to block {block}");
        Err(Error::Unsupported("read-only volume"))
    }

    pub fn format(&mut self) -> Result<()> {
        Err(Error::Unsupported("formatting a host-backed volume"))
    }

    /// 把根目录下的`PRODOS*`装入内存并从0x2000开始执行
    pub fn boot(&mut self, slot: u8, memory: &mut dyn MemoryWriter) -> Result<()> {
        if !(1..=7).contains(&slot) {
            return Err(Error::InvalidConfig(format!("slot {slot} out of range")));
        }

        let root_path = self.nodes.get(self.root).and_then(DiskNode::host_path);
        let root_path = String::from(root_path.unwrap_or_default());
        let entry = self
            .host
            .read_dir(&root_path)?
            .into_iter()
            .find(|entry| {
                entry.ty == DirEntryType::Regular
                    && entry
                        .name
                        .get(..BOOT_FILE_PREFIX.len())
                        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BOOT_FILE_PREFIX))
            })
            .ok_or_else(|| Error::NotFound(vfs::join(&root_path, "PRODOS*")))?;

        let path = vfs::join(&root_path, &entry.name);
        let mut image = vec![0; 0x10000 - BOOT_ADDRESS as usize];
        let len = read_full(&self.host, &path, 0, &mut image)?;
        log::info!("boot {path} ({len} bytes) from slot {slot}");

        memory.write_bytes(BOOT_ADDRESS, &image[..len]);
        memory.write_byte(UNIT_NUMBER_ADDRESS, slot << 4);
        memory.write_word(
            DRIVER_ADDRESS,
            0xC000 | (u16::from(slot) << 8) | DRIVER_ENTRY_OFFSET,
        );
        memory.start_at(BOOT_ADDRESS);

        Ok(())
    }

    pub fn is_write_protected(&self) -> bool {
        true
    }

    pub fn capacity_blocks(&self) -> u16 {
        self.alloc.capacity()
    }

    pub fn next_free_block(&self) -> Result<BlockId> {
        self.alloc.next_free_block()
    }

    pub fn allocator(&self) -> &BlockAllocator {
        &self.alloc
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// 卷目录
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 空闲位图
    pub fn bitmap(&self) -> NodeId {
        self.bitmap
    }

    pub fn node(&self, id: NodeId) -> Option<&DiskNode> {
        self.nodes.get(id)
    }

    /// 按 ProDOS 名字逐级查找，如`/GAMES/GAME`，不区分大小写
    pub fn find(&self, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self.root, |dir, part| {
                self.nodes.get(dir)?.children().iter().copied().find(|&child| {
                    self.nodes
                        .get(child)
                        .is_some_and(|node| node.name().eq_ignore_ascii_case(part))
                })
            })
    }

    /// 以下按节点操作的接口都先校验句柄：已被回收的节点返回`NotFound`
    pub fn allocate(&mut self, id: NodeId) -> Result<()> {
        self.nodes.live(id)?;
        self.requests += 1;
        let (nodes, mut env) = self.parts();
        nodes.allocate(id, &mut env)
    }

    pub fn deallocate(&mut self, id: NodeId) -> Result<()> {
        self.nodes.live(id)?;
        self.nodes.deallocate(id, &mut self.alloc);
        Ok(())
    }

    pub fn refresh(&mut self, id: NodeId) -> Result<()> {
        self.nodes.live(id)?;
        self.requests += 1;
        let (nodes, mut env) = self.parts();
        nodes.refresh(id, &mut env)
    }

    pub fn check(&mut self, id: NodeId) -> Result<bool> {
        self.nodes.live(id)?;
        self.requests += 1;
        let (nodes, mut env) = self.parts();
        nodes.check(id, &mut env)
    }

    pub fn render_block(&mut self, id: NodeId, sequence: usize, out: &mut Block) -> Result<()> {
        self.nodes.live(id)?;
        self.requests += 1;
        let (nodes, mut env) = self.parts();
        nodes.render_block(id, sequence, &mut env, out)
    }
}

/// 加锁后可以在线程间共享的卷
#[derive(Debug)]
pub struct SharedVolume<H>(Mutex<Volume<H>>);

impl<H: HostFs> SharedVolume<H> {
    pub fn new(volume: Volume<H>) -> Self {
        Self(Mutex::new(volume))
    }

    pub fn lock(&self) -> MutexGuard<'_, Volume<H>> {
        self.0.lock()
    }
}

impl<H: HostFs + Send + core::fmt::Debug> BlockDevice for SharedVolume<H> {
    type Error = Error;

    fn read_block(&self, block_id: usize, buf: &mut Block) -> Result<()> {
        let block = u32::try_from(block_id).unwrap_or(u32::MAX);
        self.lock().read_block(block, buf)
    }

    fn write_block(&self, block_id: usize, buf: &Block) -> Result<()> {
        let block = u32::try_from(block_id).unwrap_or(u32::MAX);
        self.lock().write_block(block, buf)
    }

    fn is_write_protected(&self) -> bool {
        true
    }

    fn block_count(&self) -> u32 {
        self.lock().capacity_blocks().into()
    }
}
