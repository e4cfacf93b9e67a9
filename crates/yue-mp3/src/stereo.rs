//! MP3 联合立体声处理
//!
//! 在重排序之后、抗混叠之前执行. 强度立体声频带从右声道的零值区开始,
//! 由右声道缩放因子 (is_pos) 决定左右比例; 其余频带在开启时做 M/S 还原.

use std::f32::consts::FRAC_1_SQRT_2;

use crate::header::FrameHeader;
use crate::scalefactor::Scalefactors;
use crate::side_info::GranuleInfo;
use crate::tables::SfBands;

/// 强度立体声比例 (左, 右), is_pos = 0..=6, 即 tan(is_pos * pi / 12) 归一化
const IS_RATIOS: [(f32, f32); 7] = [
    (0.000000000, 1.000000000),
    (0.211324865, 0.788675135),
    (0.366025404, 0.633974596),
    (0.500000000, 0.500000000),
    (0.633974596, 0.366025404),
    (0.788675135, 0.211324865),
    (1.000000000, 0.000000000),
];

/// 一段谱线的访问方式: 连续区间或短块交织区间
#[derive(Clone, Copy)]
struct Span {
    start: usize,
    len: usize,
    step: usize,
}

impl Span {
    fn indices(self) -> impl Iterator<Item = usize> {
        (0..self.len).map(move |k| self.start + k * self.step)
    }
}

/// 对一个 granule 的两个声道做立体声还原
///
/// `infos` 为 `[左, 右]` 的边信息, `right_sf` 为右声道缩放因子.
pub fn process_stereo(
    header: &FrameHeader,
    infos: &[GranuleInfo; 2],
    right_sf: &Scalefactors,
    bands: &SfBands,
    left: &mut [f32; 576],
    right: &mut [f32; 576],
) {
    let ms = header.uses_ms_stereo();
    if !header.uses_intensity_stereo() {
        if ms {
            let end = infos[0].count1.max(infos[1].count1).min(576);
            mid_side(Span { start: 0, len: end, step: 1 }, left, right);
        }
        return;
    }

    let bound = infos[1].count1;
    let g = &infos[1];

    let mut band = |span: Span, band_start: usize, is_pos: u8| {
        if band_start >= bound && usize::from(is_pos) < IS_RATIOS.len() {
            let (kl, kr) = IS_RATIOS[usize::from(is_pos)];
            for i in span.indices() {
                let m = left[i];
                left[i] = m * kl;
                right[i] = m * kr;
            }
        } else if ms {
            mid_side(span, left, right);
        }
    };

    let long_bands = if !g.is_short() {
        22
    } else if g.mixed_block {
        bands.long.iter().take_while(|&&b| b < 36).count()
    } else {
        0
    };
    for sfb in 0..long_bands {
        let start = bands.long[sfb];
        let span = Span {
            start,
            len: bands.long[sfb + 1] - start,
            step: 1,
        };
        // 最后一个频带没有传输缩放因子, 沿用前一个频带
        let is_pos = right_sf.long[sfb.min(20)];
        band(span, start, is_pos);
    }

    if g.is_short() {
        let first_sfb = if g.mixed_block { 3 } else { 0 };
        for sfb in first_sfb..13 {
            let start = bands.short[sfb] * 3;
            let width = bands.short[sfb + 1] - bands.short[sfb];
            for win in 0..3 {
                let span = Span {
                    start: start + win,
                    len: width,
                    step: 3,
                };
                let is_pos = right_sf.short[sfb.min(11)][win];
                band(span, start, is_pos);
            }
        }
    }
}

fn mid_side(span: Span, left: &mut [f32; 576], right: &mut [f32; 576]) {
    for i in span.indices() {
        let m = left[i];
        let s = right[i];
        left[i] = (m + s) * FRAC_1_SQRT_2;
        right[i] = (m - s) * FRAC_1_SQRT_2;
    }
}
