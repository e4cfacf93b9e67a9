//! 字节源抽象层.
//!
//! 为解码器提供统一的读取接口, 支持文件、内存缓冲区以及任意 `Read` / `Read + Seek` 来源.
//! 上下文带有读缓冲区和回推 (pushback) 能力, 并维护已消费的逻辑字节位置.

use std::io::{self, Read, Seek, SeekFrom};

use crate::{YueError, YueResult};

/// 字节源后端 trait
///
/// 实现此 trait 以支持不同的数据来源.
pub trait IoBackend: Send {
    /// 读取数据到缓冲区
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 定位 (seek), 不支持随机访问的后端返回错误
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;
    /// 获取总大小 (如果可知)
    fn size(&self) -> Option<u64>;
    /// 是否支持 seek
    fn is_seekable(&self) -> bool;
}

/// 默认缓冲区大小 (32 KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// 字节源上下文
pub struct IoContext {
    /// 内部后端
    inner: Box<dyn IoBackend>,
    /// 读缓冲区
    buffer: Vec<u8>,
    /// 缓冲区中的有效数据长度
    buf_len: usize,
    /// 缓冲区当前读取位置
    buf_pos: usize,
    /// 回推的字节, 优先于缓冲区被读取
    pushback: Vec<u8>,
    /// 已消费的逻辑位置
    pos: u64,
}

impl IoContext {
    /// 从后端创建上下文
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self {
            inner: backend,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            buf_len: 0,
            buf_pos: 0,
            pushback: Vec::new(),
            pos: 0,
        }
    }

    // ========================
    // 读取方法
    // ========================

    /// 尽量填满 `buf`, 返回实际读取的字节数
    ///
    /// 返回值小于 `buf.len()` 表示已到达末尾.
    pub fn read_full(&mut self, buf: &mut [u8]) -> YueResult<usize> {
        let mut total = 0;
        while total < buf.len() {
            if !self.pushback.is_empty() {
                let n = self.pushback.len().min(buf.len() - total);
                buf[total..total + n].copy_from_slice(&self.pushback[..n]);
                self.pushback.drain(..n);
                total += n;
                continue;
            }

            let buffered = self.buf_len - self.buf_pos;
            if buffered > 0 {
                let n = buffered.min(buf.len() - total);
                buf[total..total + n].copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + n]);
                self.buf_pos += n;
                total += n;
                continue;
            }

            if !self.refill()? {
                break;
            }
        }
        self.pos += total as u64;
        Ok(total)
    }

    /// 读取指定字节数, 数据不足时返回 `Eof`
    pub fn read_exact(&mut self, buf: &mut [u8]) -> YueResult<()> {
        if self.read_full(buf)? < buf.len() {
            return Err(YueError::Eof);
        }
        Ok(())
    }

    /// 读取 1 个字节
    pub fn read_u8(&mut self) -> YueResult<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// 读取 u32 大端
    pub fn read_u32_be(&mut self) -> YueResult<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// 回推字节, 下次读取时首先返回这些字节
    pub fn unread(&mut self, bytes: &[u8]) {
        self.pushback.splice(0..0, bytes.iter().copied());
        self.pos = self.pos.saturating_sub(bytes.len() as u64);
    }

    /// 跳过指定字节数
    pub fn skip(&mut self, count: u64) -> YueResult<()> {
        let mut left = count;

        let from_pushback = (self.pushback.len() as u64).min(left);
        self.pushback.drain(..from_pushback as usize);
        left -= from_pushback;

        let buffered = (self.buf_len - self.buf_pos) as u64;
        if left <= buffered {
            self.buf_pos += left as usize;
            self.pos += count;
            return Ok(());
        }
        left -= buffered;
        self.buf_pos = self.buf_len;

        if self.inner.is_seekable() {
            self.inner.seek(SeekFrom::Current(left as i64))?;
        } else {
            // 逐块丢弃读取的数据
            while left > 0 {
                let to_read = (left as usize).min(self.buffer.len());
                let n = read_retry(self.inner.as_mut(), &mut self.buffer[..to_read])?;
                if n == 0 {
                    self.buf_pos = 0;
                    self.buf_len = 0;
                    self.pos += count - left;
                    return Err(YueError::Eof);
                }
                left -= n as u64;
            }
            self.buf_pos = 0;
            self.buf_len = 0;
        }
        self.pos += count;
        Ok(())
    }

    // ========================
    // 定位方法
    // ========================

    /// 定位到绝对字节偏移
    ///
    /// 清空读缓冲区和回推数据. 后端不支持随机访问时返回 `Unsupported`.
    pub fn seek_to(&mut self, offset: u64) -> YueResult<u64> {
        if !self.inner.is_seekable() {
            return Err(YueError::Unsupported("字节源不支持随机访问".into()));
        }
        self.buf_pos = 0;
        self.buf_len = 0;
        self.pushback.clear();
        self.pos = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(self.pos)
    }

    /// 获取当前逻辑位置
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// 是否支持随机访问
    pub fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    /// 获取总大小
    pub fn size(&self) -> Option<u64> {
        self.inner.size()
    }

    fn refill(&mut self) -> YueResult<bool> {
        self.buf_pos = 0;
        self.buf_len = read_retry(self.inner.as_mut(), &mut self.buffer)?;
        Ok(self.buf_len > 0)
    }
}

/// 读取并忽略 `Interrupted`
fn read_retry(backend: &mut dyn IoBackend, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match backend.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// 文件后端
pub struct FileBackend {
    file: std::fs::File,
    size: Option<u64>,
}

impl FileBackend {
    /// 包装已打开的文件
    pub fn new(file: std::fs::File) -> Self {
        let size = file.metadata().ok().map(|m| m.len());
        Self { file, size }
    }
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 内存缓冲区后端
pub struct MemoryBackend {
    /// 数据缓冲区
    data: Vec<u8>,
    /// 当前位置
    pos: usize,
}

impl MemoryBackend {
    /// 从已有数据创建
    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let to_read = buf.len().min(available);
        if to_read == 0 {
            return Ok(0);
        }
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.data.len() as i64 + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 任意 `Read + Seek` 来源的后端
pub struct SeekableBackend<R> {
    inner: R,
    size: Option<u64>,
}

impl<R: Read + Seek + Send> SeekableBackend<R> {
    /// 包装可随机访问的读取器
    ///
    /// 总大小在构造时定位到末尾测得, 随后恢复原位置. 测量失败时大小未知.
    pub fn new(mut inner: R) -> Self {
        let size = stream_len(&mut inner).ok();
        Self { inner, size }
    }
}

fn stream_len(inner: &mut impl Seek) -> io::Result<u64> {
    let pos = inner.stream_position()?;
    let end = inner.seek(SeekFrom::End(0))?;
    if end != pos {
        inner.seek(SeekFrom::Start(pos))?;
    }
    Ok(end)
}

impl<R: Read + Seek + Send> IoBackend for SeekableBackend<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 只能顺序读取的后端 (管道、网络流等)
pub struct StreamBackend<R> {
    inner: R,
}

impl<R: Read + Send> StreamBackend<R> {
    /// 包装顺序读取器
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> IoBackend for StreamBackend<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "顺序字节源不支持 seek",
        ))
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn is_seekable(&self) -> bool {
        false
    }
}
