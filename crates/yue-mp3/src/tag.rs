//! 跳过流开头的 ID3 标签
//!
//! ID3v1 (`TAG`, 共 128 字节) 和 ID3v2 (`ID3`, 10 字节头 + syncsafe 长度,
//! 可选 10 字节尾) 都不属于音频数据.

use log::debug;
use yue_core::{IoContext, YueResult};

const ID3V1_SIZE: u64 = 128;
const ID3V2_HEADER_SIZE: usize = 10;
const ID3V2_FOOTER_SIZE: u64 = 10;
const ID3V2_FLAG_FOOTER: u8 = 0x10;

/// 跳过开头的标签, 返回音频数据起始位置
///
/// 不是标签时把探测读取的字节推回字节源.
pub fn skip_tag(io: &mut IoContext) -> YueResult<u64> {
    let mut probe = [0u8; 3];
    let n = io.read_full(&mut probe)?;
    if n < probe.len() {
        io.unread(&probe[..n]);
        return Ok(io.position());
    }

    match &probe {
        b"TAG" => {
            io.skip(ID3V1_SIZE - 3).map_err(|e| e.truncated("id3v1 tag"))?;
            debug!("MP3: 跳过 ID3v1 标签, 大小={ID3V1_SIZE} 字节");
        }
        b"ID3" => {
            let mut header = [0u8; ID3V2_HEADER_SIZE];
            header[..3].copy_from_slice(&probe);
            io.read_exact(&mut header[3..])
                .map_err(|e| e.truncated("id3v2 header"))?;

            let size = header[6..10]
                .iter()
                .fold(0u64, |acc, &b| (acc << 7) | u64::from(b & 0x7F));
            let footer = if header[5] & ID3V2_FLAG_FOOTER != 0 {
                ID3V2_FOOTER_SIZE
            } else {
                0
            };
            io.skip(size + footer)
                .map_err(|e| e.truncated("id3v2 tag"))?;
            debug!(
                "MP3: 跳过 ID3v2 标签, 版本=2.{}, 大小={} 字节",
                header[3],
                ID3V2_HEADER_SIZE as u64 + size + footer
            );
        }
        _ => io.unread(&probe),
    }
    Ok(io.position())
}
