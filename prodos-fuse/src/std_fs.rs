use std::fs::{self, File, Metadata};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::UNIX_EPOCH;

use vfs::{DirEntry, DirEntryType, Error, HostFs, Stat, Timestamp};

/// 直接访问本机文件系统，路径原样交给`std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFs;

impl HostFs for StdFs {
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, Error> {
        let to_vfs = |err| vfs_error(path, err);

        fs::read_dir(path)
            .map_err(to_vfs)?
            .map(|entry| -> Result<DirEntry, Error> {
                let entry = entry.map_err(to_vfs)?;
                let name = entry.file_name().to_string_lossy().into_owned();
                // 符号链接按其目标分类，悬空的链接归为其它
                let ty = fs::metadata(entry.path())
                    .map_or(DirEntryType::Other, |meta| entry_type(&meta));
                let hidden = is_hidden(&entry.path());

                Ok(DirEntry { name, ty, hidden })
            })
            .collect()
    }

    fn stat(&self, path: &str) -> Result<Stat, Error> {
        let meta = fs::metadata(path).map_err(|err| vfs_error(path, err))?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |since| since.as_nanos() as u64);

        Ok(Stat {
            ty: entry_type(&meta),
            size: meta.len(),
            modified: Timestamp(modified),
        })
    }

    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        let read = || -> io::Result<usize> {
            let mut file = File::open(path)?;
            file.seek(SeekFrom::Start(offset))?;
            file.read(buf)
        };
        read().map_err(|err| vfs_error(path, err))
    }
}

fn entry_type(meta: &Metadata) -> DirEntryType {
    if meta.is_dir() {
        DirEntryType::Directory
    } else if meta.is_file() {
        DirEntryType::Regular
    } else {
        DirEntryType::Other
    }
}

fn vfs_error(path: &str, err: io::Error) -> Error {
    if err.kind() == ErrorKind::NotFound {
        Error::NotFound(path.to_owned())
    } else {
        Error::Io {
            path: path.to_owned(),
            reason: err.to_string(),
        }
    }
}

#[cfg(windows)]
fn is_hidden(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    fs::metadata(path).is_ok_and(|meta| meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
}

#[cfg(not(windows))]
fn is_hidden(_path: &Path) -> bool {
    false
}
