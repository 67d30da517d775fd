//! 宿主文件名到 ProDOS 名字与文件类型的映射
//!
//! `GAME#2000.BIN` => `GAME`，类型0x06，加载地址0x2000

use alloc::string::String;

use super::NAME_MAX_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileType {
    pub code: u8,
    /// 默认的辅助类型（二进制文件的加载地址）
    pub aux_type: u16,
}

static TYPES: &[(&str, FileType)] = &[
    ("BAD", FileType::new(0x01, 0)),
    ("TXT", FileType::new(0x04, 0)),
    ("BIN", FileType::new(0x06, 0x0300)),
    ("ADB", FileType::new(0x19, 0)),
    ("AWP", FileType::new(0x1A, 0)),
    ("ASP", FileType::new(0x1B, 0)),
    ("S16", FileType::new(0xB3, 0)),
    ("PNT", FileType::new(0xC0, 0x2000)),
    ("PIC", FileType::new(0xC1, 0x2000)),
    ("PAS", FileType::new(0xEF, 0)),
    ("CMD", FileType::new(0xF0, 0)),
    ("INT", FileType::new(0xFA, 0x0801)),
    ("IVR", FileType::new(0xFB, 0)),
    ("BAS", FileType::new(0xFC, 0x0801)),
    ("VAR", FileType::new(0xFD, 0)),
    ("REL", FileType::new(0xFE, 0)),
    ("SYS", FileType::new(0xFF, 0x2000)),
    (SYSTEM_TOKEN, FileType::new(0xFF, 0x2000)),
];

const SYSTEM_TOKEN: &str = "SYSTEM";

impl FileType {
    pub const UNKNOWN: Self = Self::new(0x00, 0);
    /// 子目录项的类型字节
    pub const DIRECTORY: u8 = 0x0F;

    pub const fn new(code: u8, aux_type: u16) -> Self {
        Self { code, aux_type }
    }

    /// 按扩展名查表，不区分大小写
    pub fn from_token(token: &str) -> Option<Self> {
        TYPES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|&(_, ty)| ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    pub name: String,
    pub file_type: u8,
    pub aux_type: u16,
}

impl FileName {
    pub fn parse(host_name: &str) -> Self {
        let mut stem = host_name;
        let mut file_type = FileType::UNKNOWN;
        let mut token_address = None;
        let mut suffix = "";

        // 以`.`开头的名字没有扩展名
        if let Some((head, ext)) = host_name
            .rsplit_once('.')
            .filter(|(head, _)| !head.is_empty())
        {
            let (token, address) = split_address(ext);
            if let Some(ty) = FileType::from_token(token) {
                stem = head;
                file_type = ty;
                token_address = address;
                if token.eq_ignore_ascii_case(SYSTEM_TOKEN) {
                    suffix = ".SYSTEM";
                }
            }
        }

        let (stem, stem_address) = split_address(stem);
        let mut name = display_name(stem);
        name.truncate(NAME_MAX_LEN - suffix.len());
        name.push_str(suffix);

        Self {
            name,
            file_type: file_type.code,
            aux_type: stem_address
                .or(token_address)
                .unwrap_or(file_type.aux_type),
        }
    }
}

/// 拆出结尾的`#hhhh`，1到4位十六进制
fn split_address(segment: &str) -> (&str, Option<u16>) {
    segment
        .rsplit_once('#')
        .and_then(|(head, hex)| {
            ((1..=4).contains(&hex.len()) && hex.bytes().all(|b| b.is_ascii_hexdigit()))
                .then(|| u16::from_str_radix(hex, 16).ok())
                .flatten()
                .map(|address| (head, Some(address)))
        })
        .unwrap_or((segment, None))
}

/// 大写，非法字符换成`.`，截到15字节
pub fn display_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            c @ ('A'..='Z' | '0'..='9' | '.') => c,
            _ => '.',
        })
        .take(NAME_MAX_LEN)
        .collect();

    if name.is_empty() {
        String::from("UNTITLED")
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_address_on_stem() {
        let name = FileName::parse("GAME#2000.BIN");
        assert_eq!("GAME", name.name);
        assert_eq!(0x06, name.file_type);
        assert_eq!(0x2000, name.aux_type);
    }

    #[test]
    fn load_address_on_token() {
        let name = FileName::parse("loader.bin#0800");
        assert_eq!("LOADER", name.name);
        assert_eq!(0x06, name.file_type);
        assert_eq!(0x0800, name.aux_type);
    }

    #[test]
    fn table_defaults() {
        assert_eq!(
            FileName {
                name: String::from("A"),
                file_type: 0x04,
                aux_type: 0
            },
            FileName::parse("A.TXT")
        );
        assert_eq!(0x0300, FileName::parse("x.bin").aux_type);
        assert_eq!(0x0801, FileName::parse("HELLO.bas").aux_type);
    }

    #[test]
    fn system_keeps_suffix() {
        let name = FileName::parse("prodos.system");
        assert_eq!("PRODOS.SYSTEM", name.name);
        assert_eq!(0xFF, name.file_type);
        assert_eq!(0x2000, name.aux_type);

        let long = FileName::parse("VERYLONGNAME.SYSTEM");
        assert_eq!("VERYLONG.SYSTEM", long.name);
    }

    #[test]
    fn unknown_extension_is_kept() {
        let name = FileName::parse("readme.md");
        assert_eq!("README.MD", name.name);
        assert_eq!(0x00, name.file_type);
        assert_eq!(0, name.aux_type);
    }

    #[test]
    fn bad_hex_is_part_of_name() {
        let name = FileName::parse("TRACK#12345.BIN");
        assert_eq!("TRACK.12345", name.name);
        assert_eq!(0x0300, name.aux_type);
    }

    #[test]
    fn sanitize() {
        assert_eq!("MY.FILE.1", display_name("my file_1"));
        assert_eq!("ABCDEFGHIJKLMNO", display_name("abcdefghijklmnopqrs"));
        assert_eq!("UNTITLED", display_name(""));
    }
}
