//! MP3 主数据解析
//!
//! 主数据按 granule、声道顺序排列, 每段 part2_3_length 位:
//! 先是缩放因子 (part2), 然后是霍夫曼编码的频谱 (part3).

use yue_core::{BitReader, YueError, YueResult};

use crate::header::FrameHeader;
use crate::huffman::read_spectrum;
use crate::scalefactor::{Scalefactors, read_lsf, read_mpeg1};
use crate::side_info::SideInfo;
use crate::tables::SF_BANDS;

/// 一个 granule/声道的解码中间结果
#[derive(Debug, Clone)]
pub struct GranuleData {
    pub scalefactors: Scalefactors,
    /// 量化频谱值
    pub is: [i32; 576],
    /// 反量化后的频谱, 之后原地变为时域样本
    pub xr: [f32; 576],
}

impl Default for GranuleData {
    fn default() -> Self {
        Self {
            scalefactors: Scalefactors::default(),
            is: [0; 576],
            xr: [0.0; 576],
        }
    }
}

/// 一帧的主数据 `[granule][channel]`
#[derive(Debug, Clone, Default)]
pub struct MainData {
    pub granules: [[GranuleData; 2]; 2],
}

/// 解析一帧的主数据
///
/// `data` 为储备库给出的完整可解码区域. 解析过程中把每个 granule 的
/// 零值区起点 (以及 LSF 推导出的 preflag) 写回 `side`.
pub fn read_main_data(
    data: &[u8],
    header: &FrameHeader,
    side: &mut SideInfo,
    main: &mut MainData,
) -> YueResult<()> {
    let bands = &SF_BANDS[header.band_table_index()];
    let lsf = header.is_lsf();
    let mut br = BitReader::new(data);

    for gr in 0..header.granules() {
        for ch in 0..header.channels() {
            let start = br.position();
            let g = &mut side.granules[gr][ch];
            let end_bit = start + g.part2_3_length as usize;
            if end_bit > br.len_bits() {
                return Err(YueError::InvalidData(format!(
                    "MP3: part2_3_length={} 超出主数据 ({} 位可用), gr={gr}, ch={ch}",
                    g.part2_3_length,
                    br.len_bits() - start
                )));
            }

            let result = if lsf {
                let intensity_right = ch == 1 && header.uses_intensity_stereo();
                read_lsf(
                    &mut br,
                    g,
                    intensity_right,
                    &mut main.granules[gr][ch].scalefactors,
                )
            } else if gr == 1 {
                let first = main.granules[0][ch].scalefactors;
                read_mpeg1(
                    &mut br,
                    g,
                    Some((&side.scfsi[ch], &first)),
                    &mut main.granules[1][ch].scalefactors,
                )
            } else {
                read_mpeg1(&mut br, g, None, &mut main.granules[0][ch].scalefactors)
            };
            result.map_err(|e| bit_error(e, "缩放因子"))?;

            if br.position() > end_bit {
                return Err(YueError::InvalidData(format!(
                    "MP3: 缩放因子长度 {} 超过 part2_3_length={}, gr={gr}, ch={ch}",
                    br.position() - start,
                    g.part2_3_length
                )));
            }

            let gd = &mut main.granules[gr][ch];
            read_spectrum(&mut br, g, bands, end_bit, &mut gd.is)
                .map_err(|e| bit_error(e, "频谱"))?;
        }
    }
    Ok(())
}

/// 主数据内读到末尾说明数据损坏, 不是流结束
fn bit_error(e: YueError, what: &str) -> YueError {
    if e.is_end_of_stream() {
        YueError::InvalidData(format!("MP3: {what}读取越过主数据末尾"))
    } else {
        e
    }
}
