//! MP3 霍夫曼解码
//!
//! 每张码表在首次使用时构建为二叉解码树, 之后进程内只读共享.
//! big_values 区按对解码 (可带 linbits 扩展), count1 区按四元组解码.

use std::sync::OnceLock;

use yue_core::{BitReader, YueError, YueResult};

use crate::side_info::GranuleInfo;
use crate::tables::{HuffmanSpec, LINBITS, SfBands, big_value_table, count1_table};

/// 未分配的子节点
const EMPTY: i32 = i32::MAX;

/// 二叉解码树
///
/// 子节点值 >= 0 为内部节点下标, < 0 为叶子 `-(symbol + 1)`.
struct VlcTree {
    nodes: Vec<[i32; 2]>,
    wrap: usize,
}

impl VlcTree {
    fn build(spec: &HuffmanSpec) -> Self {
        let mut nodes = vec![[EMPTY; 2]];
        for (symbol, (&code, &len)) in spec.codes.iter().zip(spec.lens).enumerate() {
            // 13 号表码长可达 19 位, 超过 u16 的移位范围
            let code = u32::from(code);
            let mut node = 0usize;
            for i in (0..u32::from(len)).rev() {
                let bit = ((code >> i) & 1) as usize;
                if i == 0 {
                    nodes[node][bit] = -(symbol as i32) - 1;
                    break;
                }
                match nodes[node][bit] {
                    EMPTY => {
                        nodes.push([EMPTY; 2]);
                        let next = nodes.len() - 1;
                        nodes[node][bit] = next as i32;
                        node = next;
                    }
                    next if next > 0 => node = next as usize,
                    // 码表无前缀冲突, 不会走到叶子之下
                    _ => break,
                }
            }
        }
        Self {
            nodes,
            wrap: spec.wrap,
        }
    }

    #[inline]
    fn decode(&self, br: &mut BitReader) -> YueResult<usize> {
        let mut node = 0usize;
        loop {
            let bit = br.read_bit()? as usize;
            match self.nodes[node][bit] {
                EMPTY => {
                    return Err(YueError::InvalidData("MP3: 无效的霍夫曼码字".into()));
                }
                next if next < 0 => return Ok((-next - 1) as usize),
                next => node = next as usize,
            }
        }
    }
}

/// 解码树缓存: 下标 0..=15 为同号 big_values 表, 16/17 为共享的 16/24 号表, 18/19 为 count1 A/B 表
static VLC_TREES: OnceLock<Vec<Option<VlcTree>>> = OnceLock::new();

fn trees() -> &'static [Option<VlcTree>] {
    VLC_TREES.get_or_init(|| {
        let mut trees: Vec<Option<VlcTree>> = (0..16)
            .map(|idx| big_value_table(idx).map(|spec| VlcTree::build(&spec)))
            .collect();
        trees.push(big_value_table(16).map(|spec| VlcTree::build(&spec)));
        trees.push(big_value_table(24).map(|spec| VlcTree::build(&spec)));
        trees.push(Some(VlcTree::build(&count1_table(false))));
        trees.push(Some(VlcTree::build(&count1_table(true))));
        trees
    })
}

fn big_value_tree(table: usize) -> YueResult<&'static VlcTree> {
    let slot = match table {
        0..=15 => table,
        16..=23 => 16,
        24..=31 => 17,
        _ => usize::MAX,
    };
    trees()
        .get(slot)
        .and_then(Option::as_ref)
        .ok_or_else(|| YueError::InvalidData(format!("MP3: 无效的霍夫曼表 {table}")))
}

/// 解码一对 big_values 频谱值
pub fn decode_pair(br: &mut BitReader, table: usize) -> YueResult<(i32, i32)> {
    if table == 0 {
        return Ok((0, 0));
    }
    let tree = big_value_tree(table)?;
    let symbol = tree.decode(br)?;
    let linbits = LINBITS[table];

    let mut x = (symbol / tree.wrap) as i32;
    let mut y = (symbol % tree.wrap) as i32;

    if x == 15 && linbits > 0 {
        x += br.read_bits(linbits)? as i32;
    }
    if x != 0 && br.read_bit()? == 1 {
        x = -x;
    }
    if y == 15 && linbits > 0 {
        y += br.read_bits(linbits)? as i32;
    }
    if y != 0 && br.read_bit()? == 1 {
        y = -y;
    }
    Ok((x, y))
}

/// 解码一个 count1 四元组 (v, w, x, y)
pub fn decode_quad(br: &mut BitReader, table_b: bool) -> YueResult<[i32; 4]> {
    let slot = if table_b { 19 } else { 18 };
    let tree = trees()[slot]
        .as_ref()
        .ok_or_else(|| YueError::InvalidData("MP3: count1 码表缺失".into()))?;
    let symbol = tree.decode(br)?;

    let mut quad = [
        ((symbol >> 3) & 1) as i32,
        ((symbol >> 2) & 1) as i32,
        ((symbol >> 1) & 1) as i32,
        (symbol & 1) as i32,
    ];
    for value in quad.iter_mut() {
        if *value != 0 && br.read_bit()? == 1 {
            *value = -*value;
        }
    }
    Ok(quad)
}

/// 解码一个 granule/声道的 576 个量化频谱值
///
/// `end_bit` 为 part2_3 区的结束位置. 解码完成后读取器定位到 `end_bit`,
/// 零值区起点写回 `g.count1`.
pub fn read_spectrum(
    br: &mut BitReader,
    g: &mut GranuleInfo,
    bands: &SfBands,
    end_bit: usize,
    is: &mut [i32; 576],
) -> YueResult<()> {
    is.fill(0);

    let (region1, region2) = if g.is_short() {
        (bands.short[3] * 3, 576)
    } else {
        let i = g.region0_count as usize + 1;
        let j = i + g.region1_count as usize + 1;
        match (bands.long.get(i), bands.long.get(j)) {
            (Some(&r1), Some(&r2)) => (r1, r2),
            _ => {
                return Err(YueError::InvalidData(format!(
                    "MP3: region 边界越界, region0={}, region1={}",
                    g.region0_count, g.region1_count
                )));
            }
        }
    };

    let big_end = g.big_values as usize * 2;
    let mut pos = 0;
    while pos < big_end {
        let table = if pos < region1 {
            g.table_select[0]
        } else if pos < region2 {
            g.table_select[1]
        } else {
            g.table_select[2]
        };
        let (x, y) = decode_pair(br, table as usize)?;
        is[pos] = x;
        is[pos + 1] = y;
        pos += 2;
    }

    while pos + 4 <= 576 && br.position() < end_bit {
        let quad = decode_quad(br, g.count1table_select)?;
        is[pos..pos + 4].copy_from_slice(&quad);
        pos += 4;
    }

    // 读过了 part2_3 的末尾, 丢弃最后一组
    if br.position() > end_bit && pos >= big_end + 4 {
        pos -= 4;
        is[pos..pos + 4].fill(0);
    }

    g.count1 = pos;
    br.set_position(end_bit)
}
