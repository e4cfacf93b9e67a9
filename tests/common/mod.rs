//! 集成测试共用的合成码流构造工具.
//!
//! 缩放因子位宽恒为 0, 频谱只占用 big_values 区. 帧的主数据可以独立成帧
//! (main_data_begin 为 0), 也可以按比特储备库规则尽量提前放入前面帧的空闲字节.

#![allow(dead_code)]

use yue::core::BitWriter;
use yue::mp3::FrameHeader;
use yue::mp3::tables::{LINBITS, big_value_table};

/// MPEG-1 44100Hz 128kbps 立体声
pub const STEREO_44K: u32 = 0xFFFB_9004;
/// MPEG-1 44100Hz 64kbps 立体声
pub const STEREO_44K_64K: u32 = 0xFFFB_5004;
/// MPEG-1 44100Hz 64kbps 联合立体声 (仅强度立体声)
pub const JOINT_IS_44K_64K: u32 = 0xFFFB_5054;
/// MPEG-1 44100Hz 32kbps 立体声
pub const STEREO_44K_32K: u32 = 0xFFFB_1004;
/// MPEG-1 44100Hz 128kbps 联合立体声 (仅 M/S)
pub const JOINT_MS_44K: u32 = 0xFFFB_9064;
/// MPEG-1 48000Hz 128kbps 单声道
pub const MONO_48K: u32 = 0xFFFB_94C4;
/// MPEG-2 22050Hz 32kbps 单声道
pub const MONO_22K: u32 = 0xFFF3_40C4;

const DEFAULT_TABLE: u32 = 15;
const GLOBAL_GAIN: u32 = 180;

/// 一个 granule/声道的频谱对
pub type Lines = Vec<(i32, i32)>;

/// 块类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Long,
    Short,
    Mixed,
}

/// 一个 granule/声道的编码参数
#[derive(Debug, Clone)]
pub struct Granule {
    pub table: u32,
    pub block: Block,
    pub lines: Lines,
}

impl Granule {
    pub fn long(table: u32, lines: Lines) -> Self {
        Self {
            table,
            block: Block::Long,
            lines,
        }
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.block = block;
        self
    }
}

/// 由种子生成一组小幅度频谱对 (适用于任何码表)
pub fn lines(seed: usize, pairs: usize) -> Lines {
    (0..pairs)
        .map(|i| {
            let x = ((seed + i) % 5) as i32;
            let y = ((seed * 3 + i) % 4) as i32;
            if (seed + i) % 3 == 0 { (-x, y) } else { (x, -y) }
        })
        .collect()
}

/// 码表能表示的最大幅度 (含 linbits 扩展)
pub fn max_magnitude(table: u32) -> i32 {
    match LINBITS[table as usize] {
        0 => 15,
        bits => 15 + (1 << bits) - 1,
    }
}

/// 由种子生成覆盖码表全部幅度范围的频谱对, 大值会用到 linbits
pub fn wide_lines(seed: usize, pairs: usize, table: u32) -> Lines {
    let span = max_magnitude(table) as usize + 1;
    (0..pairs)
        .map(|i| {
            let k = seed * 31 + i * 17;
            let mut x = (if i % 4 == 0 { (k * 7 + 3) % span } else { k % 4 }) as i32;
            let mut y = (if i % 6 == 1 { (k * 5 + 1) % span } else { (k / 3) % 3 }) as i32;
            if k % 5 == 0 {
                x = -x;
            }
            if k % 7 == 1 {
                y = -y;
            }
            (x, y)
        })
        .collect()
}

fn write_value(bw: &mut BitWriter, value: i32, coded: u32, linbits: u32) {
    if linbits > 0 && coded == 15 {
        bw.write_bits(value.unsigned_abs() - 15, linbits);
    }
    if value != 0 {
        bw.write_bit(u32::from(value < 0));
    }
}

/// 编码一个 granule/声道的频谱
fn encode_lines(bw: &mut BitWriter, granule: &Granule) {
    let spec = big_value_table(granule.table as usize).expect("码表存在");
    let linbits = LINBITS[granule.table as usize];
    for &(x, y) in &granule.lines {
        let (cx, cy) = if linbits > 0 {
            (x.unsigned_abs().min(15), y.unsigned_abs().min(15))
        } else {
            (x.unsigned_abs(), y.unsigned_abs())
        };
        assert!((cx as usize) < spec.wrap && (cy as usize) < spec.wrap, "幅度超出码表");
        let symbol = cx as usize * spec.wrap + cy as usize;
        bw.write_bits(u32::from(spec.codes[symbol]), u32::from(spec.lens[symbol]));
        write_value(bw, x, cx, linbits);
        write_value(bw, y, cy, linbits);
    }
}

fn part3_bits(granule: &Granule) -> u32 {
    let mut bw = BitWriter::new();
    encode_lines(&mut bw, granule);
    bw.bits_written() as u32
}

/// 编码边信息
fn side_info(header: &FrameHeader, main_data_begin: usize, granules: &[[Granule; 2]; 2]) -> Vec<u8> {
    let lsf = header.is_lsf();
    let nch = header.channels();
    let mut side = BitWriter::new();
    side.write_bits(main_data_begin as u32, if lsf { 8 } else { 9 });
    side.write_bits(
        0,
        match (lsf, nch) {
            (false, 1) => 5,
            (false, _) => 3,
            (true, 1) => 1,
            (true, _) => 2,
        },
    );
    if !lsf {
        side.write_bits(0, 4 * nch as u32);
    }
    for gr in granules.iter().take(header.granules()) {
        for g in gr.iter().take(nch) {
            let bits = part3_bits(g);
            assert!(bits < 4096, "part2_3_length 超出 12 位");
            side.write_bits(bits, 12);
            side.write_bits(g.lines.len() as u32, 9);
            side.write_bits(GLOBAL_GAIN, 8);
            side.write_bits(0, if lsf { 9 } else { 4 });
            if g.block == Block::Long {
                side.write_bit(0); // window_switching
                for _ in 0..3 {
                    side.write_bits(g.table, 5);
                }
                side.write_bits(7, 4); // region0_count
                side.write_bits(7, 3); // region1_count
            } else {
                side.write_bit(1);
                side.write_bits(2, 2); // 短块
                side.write_bit(u32::from(g.block == Block::Mixed));
                for _ in 0..2 {
                    side.write_bits(g.table, 5);
                }
                side.write_bits(0, 9); // subblock_gain
            }
            if !lsf {
                side.write_bit(0); // preflag
            }
            side.write_bit(0); // scalefac_scale
            side.write_bit(0); // count1table_select
        }
    }
    let mut side = side.finish();
    side.resize(header.side_info_size(), 0);
    side
}

/// 由多帧内容构造码流
///
/// `reservoir` 为 true 时每帧主数据紧接上一帧的数据之后放置, 可以落在前面
/// 帧的空闲字节里 (main_data_begin 最大 511, LSF 为 255).
pub fn build_stream(frames: &[(u32, [[Granule; 2]; 2])], reservoir: bool) -> Vec<u8> {
    let headers: Vec<FrameHeader> = frames.iter().map(|(w, _)| FrameHeader::from_raw(*w)).collect();
    let capacity: Vec<usize> = headers
        .iter()
        .map(|h| h.frame_size().expect("Layer III 帧头") - 4 - h.side_info_size())
        .collect();

    // 所有帧主数据区拼接而成的字节流
    let mut main = vec![0u8; capacity.iter().sum()];
    let mut begins = Vec::with_capacity(frames.len());
    let mut slot_start = 0usize;
    let mut data_end = 0usize;
    for ((header, (_, granules)), &cap) in headers.iter().zip(frames).zip(&capacity) {
        let mut bw = BitWriter::new();
        for gr in granules.iter().take(header.granules()) {
            for g in gr.iter().take(header.channels()) {
                encode_lines(&mut bw, g);
            }
        }
        let payload = bw.finish();

        let lookback = match (reservoir, header.is_lsf()) {
            (false, _) => 0,
            (true, false) => 511,
            (true, true) => 255,
        };
        let start = data_end.max(slot_start.saturating_sub(lookback));
        assert!(start + payload.len() <= slot_start + cap, "主数据超出储备库容量");
        main[start..start + payload.len()].copy_from_slice(&payload);
        begins.push(slot_start - start);
        data_end = start + payload.len();
        slot_start += cap;
    }

    let mut out = Vec::new();
    let mut slot_start = 0usize;
    for (((header, (_, granules)), &cap), &begin) in
        headers.iter().zip(frames).zip(&capacity).zip(&begins)
    {
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&side_info(header, begin, granules));
        out.extend_from_slice(&main[slot_start..slot_start + cap]);
        slot_start += cap;
    }
    out
}

/// 构造一帧. `content[gr][ch]` 给出每个 granule/声道的频谱 (15 号表, 长块)
pub fn build_frame(header_word: u32, content: &[[Lines; 2]; 2]) -> Vec<u8> {
    let granules = content
        .clone()
        .map(|gr| gr.map(|lines| Granule::long(DEFAULT_TABLE, lines)));
    build_stream(&[(header_word, granules)], false)
}

/// 每个 granule/声道内容不同的帧
pub fn tone_frame(header_word: u32, seed: usize) -> Vec<u8> {
    let content = [
        [lines(seed, 24), lines(seed + 1, 20)],
        [lines(seed + 2, 24), lines(seed + 3, 20)],
    ];
    build_frame(header_word, &content)
}

/// 连续 `frames` 帧的独立帧码流
pub fn tone_stream(header_word: u32, frames: usize) -> Vec<u8> {
    (0..frames).flat_map(|i| tone_frame(header_word, i)).collect()
}

/// 依赖比特储备库的码流
///
/// 奇数帧的主数据超过自身容量, 只能借用前面帧的空闲字节. 各 granule/声道
/// 轮流使用 13, 16, 24, 15 号表 (16/24 号表带 linbits), 并穿插短块和混合块.
pub fn reservoir_stream(header_word: u32, frames: usize) -> Vec<u8> {
    const TABLES: [u32; 4] = [13, 16, 24, 15];
    let content: Vec<(u32, [[Granule; 2]; 2])> = (0..frames)
        .map(|i| {
            let pairs = if i % 2 == 1 { 56 } else { 4 };
            let granule = |gr: usize, ch: usize| {
                let table = TABLES[(i + gr * 2 + ch) % 4];
                Granule::long(table, wide_lines(i * 4 + gr * 2 + ch, pairs, table))
            };
            let mut g = [[granule(0, 0), granule(0, 1)], [granule(1, 0), granule(1, 1)]];
            if i % 3 == 1 {
                g[1][0] = g[1][0].clone().with_block(Block::Short);
            }
            if i % 4 == 2 {
                g[0][1] = g[0][1].clone().with_block(Block::Mixed);
            }
            (header_word, g)
        })
        .collect();
    build_stream(&content, true)
}

/// 全零静音帧 (所有 part2_3_length 为 0)
pub fn silent_frame(header_word: u32) -> Vec<u8> {
    let header = FrameHeader::from_raw(header_word);
    let mut frame = vec![0u8; header.frame_size().expect("Layer III 帧头")];
    frame[..4].copy_from_slice(&header.to_bytes());
    frame
}

/// 静音帧, 但 main_data_begin 指向前面帧的数据
pub fn silent_frame_with_begin(header_word: u32, main_data_begin: u32) -> Vec<u8> {
    let header = FrameHeader::from_raw(header_word);
    let mut frame = silent_frame(header_word);
    let mut bw = BitWriter::new();
    bw.write_bits(main_data_begin, if header.is_lsf() { 8 } else { 9 });
    let side = bw.finish();
    frame[4..4 + side.len()].copy_from_slice(&side);
    frame
}

/// 读取全部 PCM
pub fn drain(decoder: &mut yue::Decoder) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = decoder.read_pcm(&mut buf).expect("解码失败");
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// 初始化测试日志
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
