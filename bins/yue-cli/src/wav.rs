//! WAV (RIFF WAVE) 输出.
//!
//! 44 字节标准头 + 16 位 PCM 数据. 输出可随机访问时写完后回填大小字段,
//! 否则使用预估长度 (未知时为最大值).

use std::io::{self, Seek, SeekFrom, Write};

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;

/// 生成 WAV 头, `data_len` 超出 32 位范围时饱和
pub fn header(sample_rate: u32, data_len: u64) -> [u8; 44] {
    let data_len = data_len.min(u64::from(u32::MAX) - 36) as u32;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * u32::from(block_align);

    let mut h = [0u8; 44];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&block_align.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_len.to_le_bytes());
    h
}

/// 回填 RIFF 与 data 块大小
pub fn patch_sizes<W: Write + Seek>(w: &mut W, sample_rate: u32, data_len: u64) -> io::Result<()> {
    w.seek(SeekFrom::Start(0))?;
    w.write_all(&header(sample_rate, data_len))?;
    w.seek(SeekFrom::End(0))?;
    w.flush()
}
