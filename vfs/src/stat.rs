use crate::DirEntryType;

/// 宿主修改时间，纳秒精度，只用来比较是否变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Timestamp(pub u64);

#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub ty: DirEntryType,
    /// File size
    pub size: u64,
    /// Last modification time
    pub modified: Timestamp,
}
