//! MP3 短块重排序
//!
//! 短块谱线在码流中按 "频带 → 窗口 → 谱线" 存放, 重排为谱线优先、窗口交织
//! (`3 * 谱线 + 窗口`), 使每个 18 点子带包含三个窗口各 6 条谱线.

use crate::side_info::GranuleInfo;
use crate::tables::SfBands;

/// 重排序短块 (混合块从短块频带 3 开始), 长块不处理
pub fn reorder(g: &GranuleInfo, bands: &SfBands, xr: &mut [f32; 576]) {
    if !g.is_short() {
        return;
    }

    let mut tmp = [0.0f32; 576];
    let first_sfb = if g.mixed_block { 3 } else { 0 };
    for sfb in first_sfb..13 {
        let start = bands.short[sfb] * 3;
        if start >= g.count1 {
            break;
        }
        let width = bands.short[sfb + 1] - bands.short[sfb];
        for win in 0..3 {
            for j in 0..width {
                tmp[3 * j + win] = xr[start + win * width + j];
            }
        }
        xr[start..start + 3 * width].copy_from_slice(&tmp[..3 * width]);
    }
}
