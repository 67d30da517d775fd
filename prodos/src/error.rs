use alloc::string::{String, ToString};

use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// 节点引用的宿主路径已经不存在
    #[error("host path vanished: {0}")]
    NotFound(String),

    #[error("volume full")]
    Full,

    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("storage I/O failure: {0}")]
    IoFailure(String),

    /// 渲染期间块的归属一直在变化
    #[error("volume drifted from host state while rendering")]
    Inconsistent,

    #[error("invalid volume options: {0}")]
    InvalidConfig(String),
}

impl From<vfs::Error> for Error {
    fn from(err: vfs::Error) -> Self {
        match err {
            vfs::Error::NotFound(path) => Self::NotFound(path),
            err => Self::IoFailure(err.to_string()),
        }
    }
}
