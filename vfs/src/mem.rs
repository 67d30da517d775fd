//! 内存中的宿主文件系统，供测试与演示使用。

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use spin::Mutex;

use crate::{DirEntry, DirEntryType, Error, HostFs, Stat, Timestamp};

/// 以完整路径为键的扁平目录树。
///
/// 每次修改都会推进内部时钟，被修改的项（以及增删项的父目录）
/// 获得新的修改时间，行为与真实文件系统一致。
#[derive(Debug)]
pub struct MemFs {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    nodes: BTreeMap<String, MemNode>,
    clock: u64,
}

#[derive(Debug)]
struct MemNode {
    /// `None`表示目录
    data: Option<Vec<u8>>,
    modified: Timestamp,
    hidden: bool,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            String::from("/"),
            MemNode {
                data: None,
                modified: Timestamp(0),
                hidden: false,
            },
        );

        Self {
            inner: Mutex::new(Inner { nodes, clock: 0 }),
        }
    }

    /// 创建目录，缺失的上级目录一并创建
    pub fn mkdir(&self, path: &str) {
        let mut inner = self.inner.lock();
        inner.ensure_dir(path);
    }

    /// 创建或覆盖文件
    pub fn write(&self, path: &str, data: impl Into<Vec<u8>>) {
        let mut inner = self.inner.lock();
        let parent = parent_of(path);
        inner.ensure_dir(parent);

        let now = inner.tick();
        let is_new = !inner.nodes.contains_key(path);
        inner.nodes.insert(
            path.to_string(),
            MemNode {
                data: Some(data.into()),
                modified: now,
                hidden: false,
            },
        );
        if is_new {
            inner.touch(parent, now);
        }
        log::trace!("memfs: write {path}");
    }

    /// 只更新修改时间
    pub fn touch(&self, path: &str) {
        let mut inner = self.inner.lock();
        let now = inner.tick();
        inner.touch(path, now);
    }

    /// 删除文件或整个子树
    pub fn remove(&self, path: &str) {
        let mut inner = self.inner.lock();
        let prefix = if path.ends_with('/') {
            path.to_string()
        } else {
            alloc::format!("{path}/")
        };
        inner
            .nodes
            .retain(|key, _| key != path && !key.starts_with(&prefix));

        let now = inner.tick();
        inner.touch(parent_of(path), now);
        log::trace!("memfs: remove {path}");
    }

    pub fn set_hidden(&self, path: &str, hidden: bool) {
        if let Some(node) = self.inner.lock().nodes.get_mut(path) {
            node.hidden = hidden;
        }
    }
}

impl Inner {
    fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        Timestamp(self.clock)
    }

    fn touch(&mut self, path: &str, now: Timestamp) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.modified = now;
        }
    }

    fn ensure_dir(&mut self, path: &str) {
        if self.nodes.contains_key(path) {
            return;
        }

        let parent = parent_of(path);
        self.ensure_dir(parent);

        let now = self.tick();
        self.nodes.insert(
            path.to_string(),
            MemNode {
                data: None,
                modified: now,
                hidden: false,
            },
        );
        self.touch(parent, now);
    }
}

impl HostFs for MemFs {
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, Error> {
        let inner = self.inner.lock();
        match inner.nodes.get(path) {
            None => return Err(Error::NotFound(path.to_string())),
            Some(MemNode { data: Some(_), .. }) => {
                return Err(Error::NotADirectory(path.to_string()));
            }
            Some(_) => {}
        }

        Ok(inner
            .nodes
            .iter()
            .filter(|(key, _)| key.as_str() != "/" && parent_of(key) == path)
            .map(|(key, node)| DirEntry {
                name: key.rsplit('/').next().unwrap_or_default().to_string(),
                ty: if node.data.is_some() {
                    DirEntryType::Regular
                } else {
                    DirEntryType::Directory
                },
                hidden: node.hidden,
            })
            .collect())
    }

    fn stat(&self, path: &str) -> Result<Stat, Error> {
        let inner = self.inner.lock();
        let node = inner
            .nodes
            .get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;

        Ok(Stat {
            ty: if node.data.is_some() {
                DirEntryType::Regular
            } else {
                DirEntryType::Directory
            },
            size: node.data.as_ref().map_or(0, |data| data.len() as u64),
            modified: node.modified,
        })
    }

    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        let inner = self.inner.lock();
        let data = inner
            .nodes
            .get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?
            .data
            .as_ref()
            .ok_or_else(|| Error::Io {
                path: path.to_string(),
                reason: String::from("is a directory"),
            })?;

        let start = (offset as usize).min(data.len());
        let end = (start + buf.len()).min(data.len());
        buf[..end - start].copy_from_slice(&data[start..end]);
        Ok(end - start)
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_direct_children_only() {
        let fs = MemFs::new();
        fs.write("/A.TXT", b"hello".as_slice());
        fs.write("/SUB/B.TXT", b"world".as_slice());

        let mut names: Vec<_> = fs.read_dir("/").unwrap().into_iter().map(|e| e.name).collect();
        names.sort();
        assert_eq!(names, ["A.TXT", "SUB"]);

        let sub = fs.read_dir("/SUB").unwrap();
        assert_eq!(1, sub.len());
        assert_eq!(DirEntryType::Regular, sub[0].ty);
    }

    #[test]
    fn modifications_bump_timestamps() {
        let fs = MemFs::new();
        fs.write("/A.TXT", b"x".as_slice());
        let before = fs.stat("/").unwrap().modified;
        let file_before = fs.stat("/A.TXT").unwrap().modified;

        fs.touch("/A.TXT");
        assert_ne!(file_before, fs.stat("/A.TXT").unwrap().modified);
        assert_eq!(before, fs.stat("/").unwrap().modified);

        fs.remove("/A.TXT");
        assert_ne!(before, fs.stat("/").unwrap().modified);
        assert!(matches!(fs.stat("/A.TXT"), Err(Error::NotFound(_))));
    }

    #[test]
    fn short_reads_at_eof() {
        let fs = MemFs::new();
        fs.write("/A", b"0123456789".as_slice());

        let mut buf = [0u8; 8];
        assert_eq!(8, fs.read_at("/A", 0, &mut buf).unwrap());
        assert_eq!(2, fs.read_at("/A", 8, &mut buf).unwrap());
        assert_eq!(0, fs.read_at("/A", 20, &mut buf).unwrap());
    }
}
