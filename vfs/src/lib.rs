//! 宿主文件系统的抽象。
//!
//! 虚拟卷的全部内容都来自宿主上的目录树，核心只通过[`HostFs`]
//! 列目录、查询元信息、按偏移读取文件。

#![no_std]

extern crate alloc;

mod dirent;
mod error;
mod host;
mod mem;
mod stat;

pub use self::{
    dirent::{DirEntry, DirEntryType},
    error::Error,
    host::{join, HostFs},
    mem::MemFs,
    stat::{Stat, Timestamp},
};
