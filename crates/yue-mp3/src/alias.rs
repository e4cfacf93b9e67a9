//! MP3 抗混叠 (Alias Reduction)
//!
//! 在相邻子带边界做 8 组蝶形运算. 纯短块跳过, 混合块仅处理第一个边界.

use crate::side_info::GranuleInfo;

const CS: [f32; 8] = [
    0.857_492_9, 0.881_742, 0.949_628_65, 0.983_314_6, 0.995_517_8, 0.999_160_6, 0.999_899_2,
    0.999_993_2,
];

const CA: [f32; 8] = [
    -0.514_495_8,
    -0.471_731_97,
    -0.313_377_44,
    -0.181_913_2,
    -0.094_574_19,
    -0.040_965_58,
    -0.014_198_569,
    -0.003_699_975,
];

/// 对一个 granule/声道做抗混叠
pub fn antialias(g: &GranuleInfo, xr: &mut [f32; 576]) {
    let sblimit = if g.is_pure_short() {
        return;
    } else if g.is_mixed() {
        2
    } else {
        32
    };

    for sb in 1..sblimit {
        for i in 0..8 {
            let li = 18 * sb - 1 - i;
            let ui = 18 * sb + i;
            let lower = xr[li];
            let upper = xr[ui];
            xr[li] = lower * CS[i] - upper * CA[i];
            xr[ui] = upper * CS[i] + lower * CA[i];
        }
    }
}
