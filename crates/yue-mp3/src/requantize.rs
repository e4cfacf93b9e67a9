//! MP3 反量化 (Requantization)
//!
//! `xr = sign(q) * |q|^(4/3) * 2^(0.25 * (global_gain - 210) - 缩放)`,
//! 短块额外减去 `2 * subblock_gain[win]`. `|q|^(4/3)` 查表得到.

use std::sync::OnceLock;

use crate::scalefactor::Scalefactors;
use crate::side_info::GranuleInfo;
use crate::tables::{PRETAB, SfBands};

/// 量化值的最大幅度: 15 + (2^13 - 1)
pub const MAX_QUANTIZED: usize = 8206;

static POW43: OnceLock<Vec<f32>> = OnceLock::new();

/// `|q|^(4/3)` 查找表, 覆盖 0..=8206
pub fn pow43_table() -> &'static [f32] {
    POW43.get_or_init(|| {
        (0..=MAX_QUANTIZED)
            .map(|i| (i as f64).powf(4.0 / 3.0) as f32)
            .collect()
    })
}

#[inline]
fn dequantize(table: &[f32], q: i32, scale: f32) -> f32 {
    let magnitude = q.unsigned_abs() as usize;
    let value = match table.get(magnitude) {
        Some(&v) => v,
        None => (magnitude as f32).powf(4.0 / 3.0),
    };
    if q < 0 { -value * scale } else { value * scale }
}

/// 反量化一个 granule/声道, `count1` 之后的谱线置零
pub fn requantize(
    g: &GranuleInfo,
    sf: &Scalefactors,
    bands: &SfBands,
    is: &[i32; 576],
    xr: &mut [f32; 576],
) {
    let table = pow43_table();
    let end = g.count1.min(576);
    let gain = 0.25 * (g.global_gain as f64 - 210.0);
    let multiplier = if g.scalefac_scale { 1.0 } else { 0.5 };

    let long_scale = |sfb: usize| -> f32 {
        let pre = if g.preflag { f64::from(PRETAB[sfb]) } else { 0.0 };
        let exponent = gain - multiplier * (f64::from(sf.long[sfb]) + pre);
        2f64.powf(exponent) as f32
    };

    xr.fill(0.0);

    // 长块部分: 纯长块为全部谱线, 混合块为前 36 条
    let long_end = if !g.is_short() {
        end
    } else if g.mixed_block {
        end.min(36)
    } else {
        0
    };
    let mut sfb = 0;
    let mut scale = long_scale(0);
    for i in 0..long_end {
        while sfb < 21 && i >= bands.long[sfb + 1] {
            sfb += 1;
            scale = long_scale(sfb);
        }
        xr[i] = dequantize(table, is[i], scale);
    }

    if !g.is_short() {
        return;
    }

    // 短块部分: 频带内按窗口依次存放
    let first_sfb = if g.mixed_block { 3 } else { 0 };
    for sfb in first_sfb..13 {
        let start = bands.short[sfb] * 3;
        if start >= end {
            break;
        }
        let width = bands.short[sfb + 1] - bands.short[sfb];
        for win in 0..3 {
            let exponent = gain
                - 2.0 * f64::from(g.subblock_gain[win])
                - multiplier * f64::from(sf.short[sfb][win]);
            let scale = 2f64.powf(exponent) as f32;
            let base = start + win * width;
            for i in base..(base + width).min(end) {
                xr[i] = dequantize(table, is[i], scale);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::SF_BANDS;

    #[test]
    fn test_pow43_表覆盖最大量化值() {
        let table = pow43_table();
        assert_eq!(table.len(), MAX_QUANTIZED + 1);
        assert_eq!(table[0], 0.0);
        assert_eq!(table[1], 1.0);
        assert!((table[8] - 16.0).abs() < 1e-4);
        let expected = (MAX_QUANTIZED as f64).powf(4.0 / 3.0) as f32;
        assert!((table[MAX_QUANTIZED] - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn test_长块反量化() {
        let g = GranuleInfo {
            global_gain: 214, // 2^1
            count1: 8,
            ..Default::default()
        };
        let mut sf = Scalefactors::default();
        sf.long[1] = 2; // 频带 1 (谱线 4..8): 2^(1 - 0.5 * 2) = 1
        let mut is = [0i32; 576];
        is[0] = 1;
        is[1] = -8;
        is[4] = 8;
        is[8] = 5; // count1 之外, 忽略
        let mut xr = [1.0f32; 576];
        requantize(&g, &sf, &SF_BANDS[0], &is, &mut xr);

        assert!((xr[0] - 2.0).abs() < 1e-5);
        assert!((xr[1] + 32.0).abs() < 1e-3);
        assert!((xr[4] - 16.0).abs() < 1e-3);
        assert_eq!(xr[8], 0.0);
        assert_eq!(xr[575], 0.0);
    }

    #[test]
    fn test_预加重与缩放因子倍数() {
        let g = GranuleInfo {
            global_gain: 210,
            preflag: true,
            scalefac_scale: true,
            count1: 576,
            ..Default::default()
        };
        let sf = Scalefactors::default();
        let mut is = [0i32; 576];
        // 44100Hz 频带 17 起始于 196, pretab=3 => 2^-3
        is[196] = 1;
        let mut xr = [0.0f32; 576];
        requantize(&g, &sf, &SF_BANDS[0], &is, &mut xr);
        assert!((xr[196] - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_短块子块增益() {
        let g = GranuleInfo {
            global_gain: 210,
            window_switching: true,
            block_type: 2,
            subblock_gain: [0, 1, 0],
            count1: 12,
            ..Default::default()
        };
        let sf = Scalefactors::default();
        let mut is = [0i32; 576];
        // 频带 0 宽 4: 窗口 0 = 0..4, 窗口 1 = 4..8
        is[0] = 1;
        is[4] = 1;
        let mut xr = [0.0f32; 576];
        requantize(&g, &sf, &SF_BANDS[0], &is, &mut xr);
        assert!((xr[0] - 1.0).abs() < 1e-6);
        assert!((xr[4] - 0.25).abs() < 1e-6);
    }
}
