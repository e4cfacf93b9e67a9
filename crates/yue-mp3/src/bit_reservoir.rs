//! MP3 比特储备库 (Bit Reservoir)
//!
//! 一帧的主数据可以从前面若干帧的字节开始. 储备库保存最近交付的主数据字节,
//! 新帧的可解码区域从"追加前末尾向前 main_data_begin 字节"处开始.

use yue_core::{IoContext, YueError, YueResult};

/// 单帧主数据上限 (字节)
pub const MAX_MAIN_DATA_SIZE: usize = 1500;

/// main_data_begin 的最大值 (9 位)
const MAX_MAIN_DATA_BEGIN: usize = 511;

/// 比特储备库
#[derive(Debug, Clone)]
pub struct BitReservoir {
    buf: Vec<u8>,
    len: usize,
}

impl BitReservoir {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; MAX_MAIN_DATA_BEGIN + MAX_MAIN_DATA_SIZE],
            len: 0,
        }
    }

    /// 当前保存的历史字节数
    pub fn history_len(&self) -> usize {
        self.len
    }

    /// 从字节源读取本帧 `size` 字节主数据并追加
    ///
    /// 历史不足 `main_data_begin` 字节时返回 `Ok(None)`, 此时字节仍会保留供后续帧使用.
    pub fn fill_from(
        &mut self,
        io: &mut IoContext,
        size: usize,
        main_data_begin: usize,
    ) -> YueResult<Option<&[u8]>> {
        let start = self.prepare(size)?;
        io.read_exact(&mut self.buf[start..start + size])
            .map_err(|e| e.truncated("main data"))?;
        Ok(self.commit(size, main_data_begin))
    }

    /// 追加内存中的主数据, 语义同 [`BitReservoir::fill_from`]
    pub fn fill(&mut self, main_data: &[u8], main_data_begin: usize) -> YueResult<Option<&[u8]>> {
        let start = self.prepare(main_data.len())?;
        self.buf[start..start + main_data.len()].copy_from_slice(main_data);
        Ok(self.commit(main_data.len(), main_data_begin))
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// 裁剪历史并返回写入起点
    fn prepare(&mut self, size: usize) -> YueResult<usize> {
        if size > MAX_MAIN_DATA_SIZE {
            return Err(YueError::InvalidData(format!(
                "MP3: 主数据 {size} 字节超过上限 {MAX_MAIN_DATA_SIZE}"
            )));
        }
        if self.len > MAX_MAIN_DATA_BEGIN {
            self.buf.copy_within(self.len - MAX_MAIN_DATA_BEGIN..self.len, 0);
            self.len = MAX_MAIN_DATA_BEGIN;
        }
        Ok(self.len)
    }

    fn commit(&mut self, size: usize, main_data_begin: usize) -> Option<&[u8]> {
        let history = self.len;
        self.len += size;
        if main_data_begin > history {
            return None;
        }
        Some(&self.buf[history - main_data_begin..self.len])
    }
}

impl Default for BitReservoir {
    fn default() -> Self {
        Self::new()
    }
}
