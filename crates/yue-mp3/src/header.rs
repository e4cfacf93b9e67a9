//! MP3 帧头解析
//!
//! 帧头是一个 32 位大端字, 各字段均由固定位位置的纯函数导出:
//!
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! A: 同步字 (11 位)   B: 版本   C: Layer   D: 保护位 (0 表示带 CRC)
//! E: 码率索引   F: 采样率索引   G: 填充   H: 私有位
//! I: 声道模式   J: 模式扩展   K: 版权   L: 原创   M: 加重
//! ```

use yue_core::{IoContext, YueError, YueResult};

/// 每个 granule 的输出样本数
pub const SAMPLES_PER_GRANULE: usize = 576;

/// MPEG-1 Layer III 码率表 (kbps)
const BITRATE_V1_L3: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];

/// MPEG-2/2.5 Layer III 码率表 (kbps)
const BITRATE_V2_L3: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

/// MPEG 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
    Reserved,
}

/// MPEG Layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    Layer1,
    Layer2,
    Layer3,
    Reserved,
}

/// 声道模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    SingleChannel,
}

/// MP3 帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader(u32);

impl FrameHeader {
    /// 包装原始 32 位帧头字
    pub const fn from_raw(word: u32) -> Self {
        Self(word)
    }

    /// 原始 32 位帧头字
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// 大端字节序的 4 字节帧头
    pub fn to_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    fn field(&self, shift: u32, bits: u32) -> u32 {
        (self.0 >> shift) & ((1 << bits) - 1)
    }

    pub fn version(&self) -> MpegVersion {
        match self.field(19, 2) {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => MpegVersion::Reserved,
        }
    }

    pub fn layer(&self) -> MpegLayer {
        match self.field(17, 2) {
            1 => MpegLayer::Layer3,
            2 => MpegLayer::Layer2,
            3 => MpegLayer::Layer1,
            _ => MpegLayer::Reserved,
        }
    }

    /// 保护位为 0 时帧头后跟 16 位 CRC
    pub fn has_crc(&self) -> bool {
        self.field(16, 1) == 0
    }

    pub fn bitrate_index(&self) -> u32 {
        self.field(12, 4)
    }

    pub fn sampling_frequency_index(&self) -> u32 {
        self.field(10, 2)
    }

    pub fn padding(&self) -> bool {
        self.field(9, 1) == 1
    }

    pub fn private_bit(&self) -> bool {
        self.field(8, 1) == 1
    }

    pub fn mode(&self) -> ChannelMode {
        match self.field(6, 2) {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::SingleChannel,
        }
    }

    pub fn mode_extension(&self) -> u32 {
        self.field(4, 2)
    }

    pub fn copyright(&self) -> bool {
        self.field(3, 1) == 1
    }

    pub fn original(&self) -> bool {
        self.field(2, 1) == 1
    }

    pub fn emphasis(&self) -> u32 {
        self.field(0, 2)
    }

    /// 低采样率扩展 (MPEG-2 / MPEG-2.5)
    pub fn is_lsf(&self) -> bool {
        self.version() != MpegVersion::Mpeg1
    }

    /// 输入声道数
    pub fn channels(&self) -> usize {
        if self.mode() == ChannelMode::SingleChannel {
            1
        } else {
            2
        }
    }

    /// 每帧 granule 数: MPEG-1 为 2, 其余为 1
    pub fn granules(&self) -> usize {
        if self.is_lsf() { 1 } else { 2 }
    }

    /// 每帧输出的 PCM 字节数 (固定为双声道 16 位)
    pub fn bytes_per_frame(&self) -> usize {
        SAMPLES_PER_GRANULE * self.granules() * 4
    }

    /// M/S 立体声
    pub fn uses_ms_stereo(&self) -> bool {
        self.mode() == ChannelMode::JointStereo && self.mode_extension() & 0x2 != 0
    }

    /// 强度立体声
    pub fn uses_intensity_stereo(&self) -> bool {
        self.mode() == ChannelMode::JointStereo && self.mode_extension() & 0x1 != 0
    }

    /// 采样率 (Hz), 非 MPEG-1 时减半
    pub fn sampling_frequency(&self) -> YueResult<u32> {
        let base = match self.sampling_frequency_index() {
            0 => 44100,
            1 => 48000,
            2 => 32000,
            idx => {
                return Err(YueError::InvalidData(format!(
                    "MP3: 保留的采样率索引 {idx}"
                )));
            }
        };
        Ok(if self.is_lsf() { base >> 1 } else { base })
    }

    /// 码率 (kbps)
    pub fn bitrate_kbps(&self) -> YueResult<u32> {
        let table = if self.is_lsf() {
            &BITRATE_V2_L3
        } else {
            &BITRATE_V1_L3
        };
        match table[self.bitrate_index() as usize] {
            0 => Err(YueError::InvalidData(format!(
                "MP3: 不支持的码率索引 {} (自由格式或保留值)",
                self.bitrate_index()
            ))),
            kbps => Ok(kbps),
        }
    }

    /// 整帧字节数 (含帧头)
    pub fn frame_size(&self) -> YueResult<usize> {
        if self.layer() != MpegLayer::Layer3 {
            return Err(YueError::Unsupported(format!(
                "MP3: 仅支持 Layer III, 实际 {:?}",
                self.layer()
            )));
        }
        let bitrate = self.bitrate_kbps()? as usize * 1000;
        let rate = self.sampling_frequency()? as usize;
        let coefficient = if self.is_lsf() { 72 } else { 144 };
        Ok(coefficient * bitrate / rate + usize::from(self.padding()))
    }

    /// 边信息字节数
    pub fn side_info_size(&self) -> usize {
        match (self.is_lsf(), self.channels()) {
            (false, 1) => 17,
            (false, _) => 32,
            (true, 1) => 9,
            (true, _) => 17,
        }
    }

    /// 频带表索引, 对应 [`crate::tables::SF_BANDS`]
    pub fn band_table_index(&self) -> usize {
        let group = match self.version() {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 | MpegVersion::Reserved => 1,
            MpegVersion::Mpeg25 => 2,
        };
        group * 3 + (self.sampling_frequency_index() as usize).min(2)
    }

    /// 帧头是否合法
    pub fn is_valid(&self) -> bool {
        const SYNC: u32 = 0xFFE0_0000;
        (self.0 & SYNC) == SYNC
            && self.version() != MpegVersion::Reserved
            && self.bitrate_index() != 15
            && self.sampling_frequency_index() != 3
            && self.layer() != MpegLayer::Reserved
            && self.emphasis() != 2
    }
}

/// 读取下一个帧头, 返回帧头及其起始位置
///
/// 当前 4 字节不构成合法帧头时, 逐字节向后滑动直到找到同步.
/// 没有任何字节可读时返回 `Eof`, 读到一半时返回 `UnexpectedEof`.
pub fn read_header(io: &mut IoContext) -> YueResult<(FrameHeader, u64)> {
    let mut buf = [0u8; 4];
    let n = io.read_full(&mut buf)?;
    if n == 0 {
        return Err(YueError::Eof);
    }
    if n < buf.len() {
        return Err(YueError::UnexpectedEof { at: "frame header" });
    }

    let mut word = u32::from_be_bytes(buf);
    let mut start = io.position() - 4;
    let first = start;
    while !FrameHeader(word).is_valid() {
        let byte = io.read_u8().map_err(|e| e.truncated("frame header sync"))?;
        word = (word << 8) | u32::from(byte);
        start += 1;
    }
    if start != first {
        log::debug!("MP3: 跳过 {} 字节非帧数据, 偏移={first}", start - first);
    }

    let header = FrameHeader(word);
    if header.bitrate_index() == 0 {
        return Err(YueError::InvalidData(format!(
            "MP3: 不支持自由格式码率, 帧头=0x{word:08X}, 偏移={start}"
        )));
    }
    Ok((header, start))
}
