//! MP3 多相合成滤波器组 (Polyphase Synthesis Filterbank)
//!
//! 每个时间片把 32 个子带样本合成为 32 个 PCM 样本:
//! 1. 频率反转 (Frequency Inversion)
//! 2. 64 点矩阵运算写入 V 向量 (1024 点, 每次移位 64)
//! 3. 由 V 构造 U 并与 512 点窗口 D 加权求和

use std::f32::consts::PI;
use std::sync::OnceLock;

use bytes::{BufMut, BytesMut};

use crate::tables::SYNTH_WINDOW;

/// 单声道跨 granule 保存的状态
#[derive(Debug, Clone)]
pub struct ChannelState {
    /// IMDCT 重叠部分 `[subband][sample]`
    pub overlap: [[f32; 18]; 32],
    /// 合成滤波器 V 向量
    pub v: [f32; 1024],
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            overlap: [[0.0; 18]; 32],
            v: [0.0; 1024],
        }
    }

    pub fn reset(&mut self) {
        self.overlap = [[0.0; 18]; 32];
        self.v.fill(0.0);
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

/// 频率反转: 奇数子带的奇数样本取反
pub fn frequency_inversion(samples: &mut [f32; 576]) {
    for sb in (1..32).step_by(2) {
        for i in (1..18).step_by(2) {
            samples[sb * 18 + i] = -samples[sb * 18 + i];
        }
    }
}

struct SynthTables {
    /// 合成窗 D
    window: [f32; 512],
    /// 矩阵系数 `[i][k] = cos((16 + i)(2k + 1) pi / 64)`
    matrix: [[f32; 32]; 64],
}

static TABLES: OnceLock<SynthTables> = OnceLock::new();

fn tables() -> &'static SynthTables {
    TABLES.get_or_init(|| {
        let mut window = [0.0f32; 512];
        for (i, &raw) in SYNTH_WINDOW.iter().enumerate() {
            let value = raw as f32 / 65536.0;
            window[i] = value;
            if i > 0 {
                window[512 - i] = if i % 64 == 0 { value } else { -value };
            }
        }

        let mut matrix = [[0.0f32; 32]; 64];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (k, m) in row.iter_mut().enumerate() {
                *m = ((16 + i) as f32 * (2 * k + 1) as f32 * PI / 64.0).cos();
            }
        }

        SynthTables { window, matrix }
    })
}

/// 合成一个 granule (18 个时间片)
///
/// `samples` 为 IMDCT 输出 (已做频率反转), 按 `[subband * 18 + slot]` 排列;
/// `out` 接收 576 个浮点 PCM 样本.
pub fn synthesize(samples: &[f32; 576], v: &mut [f32; 1024], out: &mut [f32; 576]) {
    let t = tables();
    let mut u = [0.0f32; 512];

    for slot in 0..18 {
        v.copy_within(0..960, 64);
        for (i, row) in t.matrix.iter().enumerate() {
            v[i] = row
                .iter()
                .enumerate()
                .map(|(k, &m)| m * samples[k * 18 + slot])
                .sum();
        }

        for i in 0..8 {
            for j in 0..32 {
                u[i * 64 + j] = v[i * 128 + j];
                u[i * 64 + 32 + j] = v[i * 128 + 96 + j];
            }
        }

        let pcm = &mut out[slot * 32..slot * 32 + 32];
        for (j, sample) in pcm.iter_mut().enumerate() {
            *sample = (0..16).map(|i| u[j + 32 * i] * t.window[j + 32 * i]).sum();
        }
    }
}

/// 浮点样本转换为 16 位整数, 超出范围时饱和
#[inline]
pub fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

/// 写入交织的 16 位小端立体声 PCM, 单声道时复制到两个声道
pub fn write_pcm(left: &[f32; 576], right: Option<&[f32; 576]>, pcm: &mut BytesMut) {
    let right = right.unwrap_or(left);
    pcm.reserve(576 * 4);
    for (&l, &r) in left.iter().zip(right.iter()) {
        pcm.put_i16_le(to_i16(l));
        pcm.put_i16_le(to_i16(r));
    }
}
