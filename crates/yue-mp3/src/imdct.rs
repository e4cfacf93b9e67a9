//! MP3 IMDCT (Inverse Modified Discrete Cosine Transform)
//!
//! 每个子带 18 个频域系数变换为 36 个时域样本, 前 18 个与上一 granule 的
//! 后半部分重叠相加. 短块为三个 12 点变换, 在 36 点窗内偏移 6 + 6w 放置.

use std::f32::consts::PI;
use std::sync::OnceLock;

use crate::side_info::{
    BLOCK_TYPE_NORMAL, BLOCK_TYPE_SHORT, BLOCK_TYPE_START, BLOCK_TYPE_STOP, GranuleInfo,
};

struct ImdctTables {
    /// 四种块类型的 36 点窗口: 0=普通, 1=起始, 2=短块 (仅前 12 点), 3=结束
    windows: [[f32; 36]; 4],
    /// 长块余弦表 `[k][p]`
    cos36: [[f32; 36]; 18],
    /// 短块余弦表 `[k][p]`
    cos12: [[f32; 12]; 6],
}

static TABLES: OnceLock<ImdctTables> = OnceLock::new();

fn tables() -> &'static ImdctTables {
    TABLES.get_or_init(|| {
        let long = |i: usize| (PI / 36.0 * (i as f32 + 0.5)).sin();
        let short = |i: usize| (PI / 12.0 * (i as f32 + 0.5)).sin();

        let mut windows = [[0.0f32; 36]; 4];
        let normal = usize::from(BLOCK_TYPE_NORMAL);
        let start = usize::from(BLOCK_TYPE_START);
        let short_block = usize::from(BLOCK_TYPE_SHORT);
        let stop = usize::from(BLOCK_TYPE_STOP);
        for i in 0..36 {
            windows[normal][i] = long(i);
        }
        for i in 0..18 {
            windows[start][i] = long(i);
        }
        for i in 18..24 {
            windows[start][i] = 1.0;
        }
        for i in 24..30 {
            windows[start][i] = short(i - 18);
        }
        for i in 0..12 {
            windows[short_block][i] = short(i);
        }
        for i in 6..12 {
            windows[stop][i] = short(i - 6);
        }
        for i in 12..18 {
            windows[stop][i] = 1.0;
        }
        for i in 18..36 {
            windows[stop][i] = long(i);
        }

        let mut cos36 = [[0.0f32; 36]; 18];
        for (k, row) in cos36.iter_mut().enumerate() {
            for (p, c) in row.iter_mut().enumerate() {
                *c = (PI / 72.0 * (2 * p + 1 + 18) as f32 * (2 * k + 1) as f32).cos();
            }
        }
        let mut cos12 = [[0.0f32; 12]; 6];
        for (k, row) in cos12.iter_mut().enumerate() {
            for (p, c) in row.iter_mut().enumerate() {
                *c = (PI / 24.0 * (2 * p + 1 + 6) as f32 * (2 * k + 1) as f32).cos();
            }
        }

        ImdctTables {
            windows,
            cos36,
            cos12,
        }
    })
}

/// 对一个 granule/声道做 IMDCT 与重叠相加
///
/// `xr` 原地替换为 576 个时域样本, `overlap` 保存每个子带的后 18 个样本.
pub fn imdct_granule(g: &GranuleInfo, xr: &mut [f32; 576], overlap: &mut [[f32; 18]; 32]) {
    let t = tables();
    for (sb, store) in overlap.iter_mut().enumerate() {
        let block_type = if g.window_switching && g.mixed_block && sb < 2 {
            BLOCK_TYPE_NORMAL
        } else {
            g.block_type
        };

        let input = &mut xr[sb * 18..sb * 18 + 18];
        let mut raw = [0.0f32; 36];
        if block_type == BLOCK_TYPE_SHORT {
            imdct_short(t, input, &mut raw);
        } else {
            imdct_long(t, input, &t.windows[usize::from(block_type & 3)], &mut raw);
        }

        for i in 0..18 {
            input[i] = raw[i] + store[i];
            store[i] = raw[i + 18];
        }
    }
}

fn imdct_long(t: &ImdctTables, input: &[f32], window: &[f32; 36], raw: &mut [f32; 36]) {
    for (p, out) in raw.iter_mut().enumerate() {
        let sum: f32 = input
            .iter()
            .zip(t.cos36.iter())
            .map(|(&x, row)| x * row[p])
            .sum();
        *out = sum * window[p];
    }
}

fn imdct_short(t: &ImdctTables, input: &[f32], raw: &mut [f32; 36]) {
    let window = &t.windows[usize::from(BLOCK_TYPE_SHORT)];
    for w in 0..3 {
        for p in 0..12 {
            let sum: f32 = (0..6).map(|k| input[w + 3 * k] * t.cos12[k][p]).sum();
            raw[6 * w + p + 6] += sum * window[p];
        }
    }
}
