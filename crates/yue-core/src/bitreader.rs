//! 比特流读取器.
//!
//! 从内存字节缓冲区中按位读取数据, 是帧头、边信息和主数据解析的基础设施.
//!
//! 按大端位序读取 (MSB first), 与 MPEG 音频码流一致.

use crate::{YueError, YueResult};

/// 比特流读取器
///
/// 位置以"从缓冲区起点算起的位数"表示, 内部的字节/位拆分对调用方不可见.
///
/// # 示例
/// ```
/// use yue_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.position(), 8);
/// br.set_position(4).unwrap();
/// assert_eq!(br.read_bits(12).unwrap(), 0b0001_0101_0101);
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 当前位位置
    pub fn position(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 重新定位到指定位位置
    ///
    /// 允许定位到缓冲区末尾 (之后的读取返回 `Eof`), 越过末尾则返回错误.
    pub fn set_position(&mut self, bit: usize) -> YueResult<()> {
        if bit > self.data.len() * 8 {
            return Err(YueError::InvalidArgument(format!(
                "set_position: 位置 {} 超出缓冲区 {} 位",
                bit,
                self.data.len() * 8,
            )));
        }
        self.byte_pos = bit / 8;
        self.bit_pos = (bit % 8) as u8;
        Ok(())
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.position())
    }

    /// 总位数
    pub fn len_bits(&self) -> usize {
        self.data.len() * 8
    }

    /// 读取 1 个位
    #[inline]
    pub fn read_bit(&mut self) -> YueResult<u32> {
        let Some(&byte) = self.data.get(self.byte_pos) else {
            return Err(YueError::Eof);
        };

        let bit = (byte >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(u32::from(bit))
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效.
    pub fn read_bits(&mut self, n: u32) -> YueResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(YueError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(YueError::Eof);
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        Ok(result)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: usize) -> YueResult<()> {
        if n > self.bits_left() {
            return Err(YueError::Eof);
        }
        let target = self.position() + n;
        self.set_position(target)
    }

    /// 获取底层数据的引用
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}
