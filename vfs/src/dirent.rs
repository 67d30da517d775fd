use alloc::string::String;

/// 宿主目录中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 宿主上的文件名，不含路径
    pub name: String,
    pub ty: DirEntryType,
    /// 由宿主系统标记为隐藏（点文件之外的隐藏属性）
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DirEntryType {
    Directory,
    #[default]
    Regular,
    /// 设备、管道、套接字等，虚拟卷不收录
    Other,
}
