#[cfg(test)]
mod tests;

mod std_fs;

use std::fmt::Write as _;
use std::io::{self, ErrorKind, Write};

use block_dev::{BLOCK_SIZE, Block, BlockDevice};

pub use self::std_fs::StdFs;

/// 把卷的每一块依次写出，返回写入的字节数
pub fn pack<D>(device: &D, out: &mut impl Write) -> io::Result<u64>
where
    D: BlockDevice<Error = prodos::Error> + ?Sized,
{
    let mut block: Block = [0; BLOCK_SIZE];
    let count = device.block_count();

    for block_id in 0..count as usize {
        device.read_block(block_id, &mut block).map_err(io_error)?;
        out.write_all(&block)?;
    }
    log::info!("packed {count} blocks");

    Ok(u64::from(count) * BLOCK_SIZE as u64)
}

pub fn io_error(err: prodos::Error) -> io::Error {
    let kind = match err {
        prodos::Error::NotFound(_) => ErrorKind::NotFound,
        prodos::Error::Unsupported(_) => ErrorKind::Unsupported,
        prodos::Error::InvalidConfig(_) => ErrorKind::InvalidInput,
        _ => ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

/// 每行16字节：偏移、十六进制、可打印字符
pub fn hex_dump(block: &Block) -> String {
    let mut dump = String::new();
    for (line, bytes) in block.chunks(16).enumerate() {
        let _ = write!(dump, "{:03x}:", line * 16);
        for byte in bytes {
            let _ = write!(dump, " {byte:02x}");
        }
        let text: String = bytes
            .iter()
            .map(|&b| {
                // Apple II 文本常带高位
                let c = b & 0x7F;
                if c.is_ascii_graphic() || c == b' ' {
                    c as char
                } else {
                    '.'
                }
            })
            .collect();
        let _ = writeln!(dump, "  |{text}|");
    }
    dump
}
