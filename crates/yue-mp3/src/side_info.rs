//! MP3 边信息 (Side Information) 解析
//!
//! 边信息紧跟帧头 (及 CRC) 之后, 长度由版本和声道模式决定.
//! 它描述每个 granule/声道的主数据长度、增益、块类型和霍夫曼表选择.

use yue_core::{BitReader, IoContext, YueError, YueResult};

use crate::header::FrameHeader;

/// 帧大小上限 (字节), 超出视为损坏的帧头
pub const MAX_FRAME_SIZE: usize = 2000;

/// 边信息最大字节数 (MPEG-1 双声道)
pub const MAX_SIDE_INFO_SIZE: usize = 32;

/// 块类型
pub const BLOCK_TYPE_NORMAL: u8 = 0;
pub const BLOCK_TYPE_START: u8 = 1;
pub const BLOCK_TYPE_SHORT: u8 = 2;
pub const BLOCK_TYPE_STOP: u8 = 3;

/// 单个 granule/声道的边信息
#[derive(Debug, Clone, Default)]
pub struct GranuleInfo {
    pub part2_3_length: u32,
    pub big_values: u32,
    pub global_gain: u32,
    pub scalefac_compress: u32,
    pub window_switching: bool,

    pub block_type: u8,
    pub mixed_block: bool,
    pub table_select: [u8; 3],
    pub subblock_gain: [u8; 3],

    pub region0_count: u32,
    pub region1_count: u32,

    pub preflag: bool,
    pub scalefac_scale: bool,
    pub count1table_select: bool,

    /// 零值区起点, 由霍夫曼解码填写
    pub count1: usize,
}

impl GranuleInfo {
    /// 纯短块 (不含混合块)
    pub fn is_pure_short(&self) -> bool {
        self.is_short() && !self.mixed_block
    }

    /// 短块或混合块
    pub fn is_short(&self) -> bool {
        self.window_switching && self.block_type == BLOCK_TYPE_SHORT
    }

    /// 混合块 (低 2 个子带为长块)
    pub fn is_mixed(&self) -> bool {
        self.is_short() && self.mixed_block
    }
}

/// 边信息
#[derive(Debug, Clone, Default)]
pub struct SideInfo {
    pub main_data_begin: usize,
    pub private_bits: u32,
    /// `[channel][band group]`, 仅 MPEG-1
    pub scfsi: [[bool; 4]; 2],
    /// `[granule][channel]`
    pub granules: [[GranuleInfo; 2]; 2],
}

impl SideInfo {
    /// 从字节源读取边信息
    ///
    /// 原始字节写入 `raw` 的前 `header.side_info_size()` 字节, 供 CRC 校验使用.
    pub fn read(
        io: &mut IoContext,
        header: &FrameHeader,
        raw: &mut [u8; MAX_SIDE_INFO_SIZE],
    ) -> YueResult<Self> {
        let frame_size = header.frame_size()?;
        if frame_size > MAX_FRAME_SIZE {
            return Err(YueError::UnexpectedEof { at: "side info" });
        }

        let size = header.side_info_size();
        io.read_exact(&mut raw[..size])
            .map_err(|e| e.truncated("side info"))?;
        Self::parse(&raw[..size], header)
    }

    /// 从内存解析边信息
    pub fn parse(data: &[u8], header: &FrameHeader) -> YueResult<Self> {
        let mut reader = BitReader::new(data);
        Self::parse_bits(&mut reader, header).map_err(|e| e.truncated("side info"))
    }

    fn parse_bits(reader: &mut BitReader, header: &FrameHeader) -> YueResult<Self> {
        let nch = header.channels();
        let lsf = header.is_lsf();
        let mut side = SideInfo::default();

        side.main_data_begin = reader.read_bits(if lsf { 8 } else { 9 })? as usize;
        side.private_bits = reader.read_bits(match (lsf, nch) {
            (false, 1) => 5,
            (false, _) => 3,
            (true, 1) => 1,
            (true, _) => 2,
        })?;

        if !lsf {
            for ch in 0..nch {
                for band in 0..4 {
                    side.scfsi[ch][band] = reader.read_bit()? == 1;
                }
            }
        }

        for gr in 0..header.granules() {
            for ch in 0..nch {
                let g = &mut side.granules[gr][ch];

                g.part2_3_length = reader.read_bits(12)?;
                g.big_values = reader.read_bits(9)?;
                if g.big_values > 288 {
                    return Err(YueError::InvalidData(format!(
                        "MP3: big_values={} 超过 288, gr={gr}, ch={ch}",
                        g.big_values
                    )));
                }
                g.global_gain = reader.read_bits(8)?;
                g.scalefac_compress = reader.read_bits(if lsf { 9 } else { 4 })?;
                g.window_switching = reader.read_bit()? == 1;

                if g.window_switching {
                    g.block_type = reader.read_bits(2)? as u8;
                    if g.block_type == BLOCK_TYPE_NORMAL {
                        return Err(YueError::InvalidData(format!(
                            "MP3: 窗口切换时块类型为 0, gr={gr}, ch={ch}"
                        )));
                    }
                    g.mixed_block = reader.read_bit()? == 1;
                    for i in 0..2 {
                        g.table_select[i] = reader.read_bits(5)? as u8;
                    }
                    for i in 0..3 {
                        g.subblock_gain[i] = reader.read_bits(3)? as u8;
                    }
                    // region 边界隐式给出
                    g.region0_count = if g.block_type == BLOCK_TYPE_SHORT && !g.mixed_block {
                        8
                    } else {
                        7
                    };
                    g.region1_count = 20 - g.region0_count;
                } else {
                    for i in 0..3 {
                        g.table_select[i] = reader.read_bits(5)? as u8;
                    }
                    g.region0_count = reader.read_bits(4)?;
                    g.region1_count = reader.read_bits(3)?;
                    g.block_type = BLOCK_TYPE_NORMAL;
                }

                // LSF 的 preflag 在解析缩放因子时由 scalefac_compress 推导
                if !lsf {
                    g.preflag = reader.read_bit()? == 1;
                }
                g.scalefac_scale = reader.read_bit()? == 1;
                g.count1table_select = reader.read_bit()? == 1;
            }
        }

        Ok(side)
    }
}
