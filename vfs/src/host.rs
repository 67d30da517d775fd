use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::{DirEntry, Error, Stat};

/// 宿主文件系统能力。
///
/// 路径一律是以`/`连接的字符串，由实现自行解释。
pub trait HostFs {
    /// 列出目录下的全部项，不含`.`与`..`，顺序不作保证
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, Error>;

    fn stat(&self, path: &str) -> Result<Stat, Error>;

    /// 从`offset`处读取文件，返回实际读到的字节数。
    /// 读到文件末尾时返回0。
    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize, Error>;
}

impl<T: HostFs + ?Sized> HostFs for &T {
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, Error> {
        (**self).read_dir(path)
    }

    fn stat(&self, path: &str) -> Result<Stat, Error> {
        (**self).stat(path)
    }

    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        (**self).read_at(path, offset, buf)
    }
}

impl<T: HostFs + ?Sized> HostFs for alloc::sync::Arc<T> {
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, Error> {
        (**self).read_dir(path)
    }

    fn stat(&self, path: &str) -> Result<Stat, Error> {
        (**self).stat(path)
    }

    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        (**self).read_at(path, offset, buf)
    }
}

/// 拼接目录与其中一项的名字
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::join;

    #[test]
    fn join_paths() {
        assert_eq!("/A.TXT", join("/", "A.TXT"));
        assert_eq!("/games/GAME", join("/games", "GAME"));
        assert_eq!("/games/GAME", join("/games/", "GAME"));
    }
}
