//! MP3 缩放因子解析
//!
//! MPEG-1 使用 slen 表和 scfsi 复用; MPEG-2 LSF 使用由 scalefac_compress
//! 推导出的四组位宽与个数.

use std::sync::OnceLock;

use yue_core::{BitReader, YueResult};

use crate::side_info::GranuleInfo;
use crate::tables::{NR_OF_SFB, SLEN};

/// 一个 granule/声道的缩放因子
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scalefactors {
    /// 长块, 第 21 个频带恒为 0
    pub long: [u8; 22],
    /// 短块 `[band][window]`, 第 12 个频带恒为 0
    pub short: [[u8; 3]; 13],
}

/// MPEG-1 scfsi 的四个长块频带组
const SCFSI_GROUPS: [(usize, usize); 4] = [(0, 6), (6, 11), (11, 16), (16, 21)];

/// 读取 MPEG-1 缩放因子
///
/// `reuse` 仅在第二个 granule 给出: `(scfsi, 第一个 granule 的缩放因子)`.
pub fn read_mpeg1(
    br: &mut BitReader,
    g: &GranuleInfo,
    reuse: Option<(&[bool; 4], &Scalefactors)>,
    out: &mut Scalefactors,
) -> YueResult<()> {
    let (slen1, slen2) = SLEN[g.scalefac_compress as usize & 0xF];
    *out = Scalefactors::default();

    if g.is_short() {
        let first_short = if g.mixed_block {
            for sfb in 0..8 {
                out.long[sfb] = br.read_bits(slen1)? as u8;
            }
            3
        } else {
            0
        };
        for sfb in first_short..12 {
            let slen = if sfb < 6 { slen1 } else { slen2 };
            for win in 0..3 {
                out.short[sfb][win] = br.read_bits(slen)? as u8;
            }
        }
        return Ok(());
    }

    for (group, &(start, end)) in SCFSI_GROUPS.iter().enumerate() {
        let slen = if group < 2 { slen1 } else { slen2 };
        match reuse {
            Some((scfsi, first)) if scfsi[group] => {
                out.long[start..end].copy_from_slice(&first.long[start..end]);
            }
            _ => {
                for sfb in start..end {
                    out.long[sfb] = br.read_bits(slen)? as u8;
                }
            }
        }
    }
    Ok(())
}

/// LSF 位宽推导结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LsfSlen {
    /// 四组位宽
    pub slen: [u32; 4],
    /// [`NR_OF_SFB`] 的表号
    pub table: usize,
    pub preflag: bool,
}

/// `[是否强度立体声右声道][scalefac_compress]`
static LSF_SLEN: OnceLock<[[LsfSlen; 512]; 2]> = OnceLock::new();

fn derive_lsf_slen(sfc: u32, intensity_right: bool) -> LsfSlen {
    if !intensity_right {
        if sfc < 400 {
            LsfSlen {
                slen: [(sfc >> 4) / 5, (sfc >> 4) % 5, (sfc & 15) >> 2, sfc & 3],
                table: 0,
                preflag: false,
            }
        } else if sfc < 500 {
            let s = sfc - 400;
            LsfSlen {
                slen: [(s >> 2) / 5, (s >> 2) % 5, s & 3, 0],
                table: 1,
                preflag: false,
            }
        } else {
            let s = sfc - 500;
            LsfSlen {
                slen: [s / 3, s % 3, 0, 0],
                table: 2,
                preflag: true,
            }
        }
    } else {
        let isc = sfc >> 1;
        if isc < 180 {
            LsfSlen {
                slen: [isc / 36, (isc % 36) / 6, (isc % 36) % 6, 0],
                table: 3,
                preflag: false,
            }
        } else if isc < 244 {
            let s = isc - 180;
            LsfSlen {
                slen: [(s & 63) >> 4, (s & 15) >> 2, s & 3, 0],
                table: 4,
                preflag: false,
            }
        } else {
            let s = isc - 244;
            LsfSlen {
                slen: [s / 3, s % 3, 0, 0],
                table: 5,
                preflag: false,
            }
        }
    }
}

/// 查 LSF 位宽表
pub fn lsf_slen(scalefac_compress: u32, intensity_right: bool) -> LsfSlen {
    let table = LSF_SLEN.get_or_init(|| {
        let mut table = [[LsfSlen::default(); 512]; 2];
        for (is_right, row) in table.iter_mut().enumerate() {
            for (sfc, entry) in row.iter_mut().enumerate() {
                *entry = derive_lsf_slen(sfc as u32, is_right == 1);
            }
        }
        table
    });
    table[usize::from(intensity_right)][scalefac_compress as usize & 0x1FF]
}

/// 读取 MPEG-2 LSF 缩放因子, 同时写回推导出的 preflag
pub fn read_lsf(
    br: &mut BitReader,
    g: &mut GranuleInfo,
    intensity_right: bool,
    out: &mut Scalefactors,
) -> YueResult<()> {
    let derived = lsf_slen(g.scalefac_compress, intensity_right);
    g.preflag = derived.preflag;

    let class = match (g.is_short(), g.mixed_block) {
        (false, _) => 0,
        (true, false) => 1,
        (true, true) => 2,
    };
    let counts = NR_OF_SFB[derived.table][class];

    let mut values = [0u8; 40];
    let mut n = 0;
    for (group, &count) in counts.iter().enumerate() {
        for _ in 0..count {
            values[n] = br.read_bits(derived.slen[group])? as u8;
            n += 1;
        }
    }

    *out = Scalefactors::default();
    match class {
        0 => {
            for (i, &v) in values[..n.min(21)].iter().enumerate() {
                out.long[i] = v;
            }
        }
        1 => {
            for (i, &v) in values[..n.min(36)].iter().enumerate() {
                out.short[i / 3][i % 3] = v;
            }
        }
        _ => {
            for (i, &v) in values[..n.min(6)].iter().enumerate() {
                out.long[i] = v;
            }
            for (j, &v) in values[6.min(n)..n.min(33)].iter().enumerate() {
                out.short[3 + j / 3][j % 3] = v;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yue_core::BitWriter;

    fn long_granule(scalefac_compress: u32) -> GranuleInfo {
        GranuleInfo {
            scalefac_compress,
            ..Default::default()
        }
    }

    #[test]
    fn test_mpeg1_长块缩放因子() {
        // scalefac_compress=15 => slen1=4, slen2=3
        let mut bw = BitWriter::new();
        for sfb in 0..11 {
            bw.write_bits(sfb, 4);
        }
        for sfb in 11..21 {
            bw.write_bits(sfb % 8, 3);
        }
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let mut sf = Scalefactors::default();
        read_mpeg1(&mut br, &long_granule(15), None, &mut sf).unwrap();

        for sfb in 0..11 {
            assert_eq!(sf.long[sfb], sfb as u8);
        }
        for sfb in 11..21 {
            assert_eq!(sf.long[sfb], (sfb % 8) as u8);
        }
        assert_eq!(sf.long[21], 0);
        assert_eq!(br.position(), 11 * 4 + 10 * 3);
    }

    #[test]
    fn test_mpeg1_scfsi_复用第一个_granule() {
        let mut first = Scalefactors::default();
        first.long = [9; 22];

        // 复用组 0 和 2, 读取组 1 (5 个, slen1=1) 和组 3 (5 个, slen2=1)
        let scfsi = [true, false, true, false];
        let mut bw = BitWriter::new();
        for _ in 0..10 {
            bw.write_bit(1);
        }
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let mut sf = Scalefactors::default();
        // scalefac_compress=5 => (1, 1)
        read_mpeg1(&mut br, &long_granule(5), Some((&scfsi, &first)), &mut sf).unwrap();

        assert!(sf.long[0..6].iter().all(|&v| v == 9));
        assert!(sf.long[6..11].iter().all(|&v| v == 1));
        assert!(sf.long[11..16].iter().all(|&v| v == 9));
        assert!(sf.long[16..21].iter().all(|&v| v == 1));
        assert_eq!(br.position(), 10);
    }

    #[test]
    fn test_mpeg1_混合块缩放因子() {
        let g = GranuleInfo {
            scalefac_compress: 5,
            window_switching: true,
            block_type: 2,
            mixed_block: true,
            ..Default::default()
        };
        // 8 个长块 + 9 个短频带 * 3 窗口, 位宽均为 1
        let mut bw = BitWriter::new();
        for _ in 0..(8 + 27) {
            bw.write_bit(1);
        }
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let mut sf = Scalefactors::default();
        read_mpeg1(&mut br, &g, None, &mut sf).unwrap();
        assert!(sf.long[..8].iter().all(|&v| v == 1));
        assert_eq!(sf.short[2], [0, 0, 0]);
        assert_eq!(sf.short[3], [1, 1, 1]);
        assert_eq!(sf.short[11], [1, 1, 1]);
        assert_eq!(sf.short[12], [0, 0, 0]);
        assert_eq!(br.position(), 35);
    }

    #[test]
    fn test_lsf_位宽推导() {
        let e = lsf_slen(0, false);
        assert_eq!(e.slen, [0, 0, 0, 0]);
        assert_eq!(e.table, 0);

        // 399 = (24 << 4) | 15 => [4, 4, 3, 3]
        let e = lsf_slen(399, false);
        assert_eq!(e.slen, [4, 4, 3, 3]);

        let e = lsf_slen(450, false);
        assert_eq!(e.slen, [2, 2, 2, 0]);
        assert_eq!(e.table, 1);

        let e = lsf_slen(511, false);
        assert_eq!(e.slen, [3, 2, 0, 0]);
        assert_eq!(e.table, 2);
        assert!(e.preflag);

        let e = lsf_slen(100, true);
        assert_eq!(e.slen, [1, 2, 2, 0]);
        assert_eq!(e.table, 3);

        let e = lsf_slen(400, true);
        assert_eq!(e.table, 4);
        let e = lsf_slen(500, true);
        assert_eq!(e.table, 5);
        assert!(!e.preflag);
    }

    #[test]
    fn test_lsf_短块缩放因子分布() {
        // scalefac_compress=500 => 位宽全 0, preflag 由推导得出
        let mut g = GranuleInfo {
            scalefac_compress: 500,
            window_switching: true,
            block_type: 2,
            preflag: false,
            ..Default::default()
        };
        let data = [0u8; 16];
        let mut br = BitReader::new(&data);
        let mut sf = Scalefactors::default();
        read_lsf(&mut br, &mut g, false, &mut sf).unwrap();
        assert!(g.preflag);
        assert_eq!(br.position(), 0);
    }

    #[test]
    fn test_lsf_长块缩放因子() {
        // scalefac_compress = (1*5+1) << 4 | (1 << 2) | 1 => 各组位宽 1
        let sfc = (6 << 4) | (1 << 2) | 1;
        let mut g = long_granule(sfc);
        let mut bw = BitWriter::new();
        for _ in 0..21 {
            bw.write_bit(1);
        }
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let mut sf = Scalefactors::default();
        read_lsf(&mut br, &mut g, false, &mut sf).unwrap();
        assert!(sf.long[..21].iter().all(|&v| v == 1));
        assert_eq!(sf.long[21], 0);
        assert_eq!(br.position(), 21);
    }
}
