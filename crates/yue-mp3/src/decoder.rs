//! MP3 流式解码器
//!
//! 把 MP3 字节源包装为 16 位小端立体声 PCM 字节流, 实现 [`std::io::Read`]
//! 和 [`std::io::Seek`]. 字节源支持随机访问时构造阶段会扫描一遍帧头,
//! 建立帧索引以得到总长度并支持定位.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use yue_core::io::{FileBackend, SeekableBackend, StreamBackend};
use yue_core::{IoBackend, IoContext, YueError, YueResult};

use crate::frame::{FrameDecoder, FrameOutcome};
use crate::header::{FrameHeader, read_header};
use crate::side_info::{MAX_SIDE_INFO_SIZE, SideInfo};
use crate::tag::skip_tag;

/// 储备库可引用的最大历史字节数
const MAX_RESERVOIR_HISTORY: usize = 511;

/// 解码器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// 校验受保护帧的 CRC, 不匹配时仅记录警告
    pub verify_crc: bool,
    /// 字节源可随机访问时建立帧索引
    pub build_index: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            verify_crc: true,
            build_index: true,
        }
    }
}

/// 索引中的一帧
#[derive(Debug, Clone, Copy)]
struct IndexedFrame {
    offset: u64,
    main_data_begin: usize,
    /// 追加到储备库的主数据字节数, 边信息无效的帧为 0
    main_size: usize,
    /// 从流起点顺序解码时本帧可用的储备库历史
    history: usize,
    /// 边信息有效
    valid: bool,
}

impl IndexedFrame {
    fn decodable(&self, history: usize) -> bool {
        self.valid && self.main_data_begin <= history
    }
}

/// 帧索引
///
/// `frames` 记录扫描到的所有帧, `outputs` 为其中会输出 PCM 的帧的下标.
#[derive(Debug, Clone, Default)]
struct FrameIndex {
    frames: Vec<IndexedFrame>,
    outputs: Vec<usize>,
    length: u64,
}

impl FrameIndex {
    fn push(&mut self, frame: IndexedFrame, bytes_per_frame: u64) {
        if frame.decodable(frame.history) {
            self.outputs.push(self.frames.len());
            self.length += bytes_per_frame;
        }
        self.frames.push(frame);
    }

    /// 定位到第 `target` 帧时开始预解码的帧下标
    ///
    /// 至少提前 2 帧, 并继续向前直到目标帧及其前 2 帧的可解码性与顺序解码一致.
    fn replay_start(&self, target: usize) -> usize {
        let priming = target.saturating_sub(2);
        let mut start = priming;
        while start > 0 && !self.replays_identically(start, priming, target) {
            start -= 1;
        }
        start
    }

    fn replays_identically(&self, start: usize, priming: usize, target: usize) -> bool {
        let mut history = 0usize;
        for (i, frame) in self.frames[start..=target].iter().enumerate() {
            if start + i >= priming && frame.decodable(history) != frame.decodable(frame.history)
            {
                return false;
            }
            history = (history + frame.main_size).min(MAX_RESERVOIR_HISTORY);
        }
        true
    }
}

/// MP3 流式解码器
pub struct Decoder {
    io: IoContext,
    frames: FrameDecoder,
    config: DecoderConfig,
    /// 已解码尚未被读取的 PCM
    pending: BytesMut,
    first_header: FrameHeader,
    sample_rate: u32,
    bytes_per_frame: u64,
    /// 标签之后第一个字节的位置
    data_start: u64,
    index: Option<FrameIndex>,
    position: u64,
    finished: bool,
}

impl Decoder {
    /// 使用默认配置创建解码器
    pub fn new(backend: impl IoBackend + 'static) -> YueResult<Self> {
        Self::with_config(backend, DecoderConfig::default())
    }

    /// 从只能顺序读取的数据源创建, 不支持定位且长度未知
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> YueResult<Self> {
        Self::new(StreamBackend::new(reader))
    }

    /// 从可随机访问的数据源创建
    pub fn from_seekable<R: Read + Seek + Send + 'static>(reader: R) -> YueResult<Self> {
        Self::new(SeekableBackend::new(reader))
    }

    /// 打开 MP3 文件
    pub fn open(path: impl AsRef<Path>) -> YueResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::new(FileBackend::new(file))
    }

    pub fn with_config(backend: impl IoBackend + 'static, config: DecoderConfig) -> YueResult<Self> {
        let mut io = IoContext::new(Box::new(backend));
        let data_start = skip_tag(&mut io)?;

        let mut frames = FrameDecoder::new(config.verify_crc);
        let mut pending = BytesMut::new();
        let first = frames.decode_frame(&mut io, &mut pending)?;
        let first_header = first.header();
        let sample_rate = first_header.sampling_frequency()?;
        let bytes_per_frame = first_header.bytes_per_frame() as u64;
        debug!(
            "MP3: 首帧 偏移={}, {:?} {}Hz {}kbps {:?}",
            first.offset(),
            first_header.version(),
            sample_rate,
            first_header.bitrate_kbps()?,
            first_header.mode(),
        );

        let mut decoder = Self {
            io,
            frames,
            config,
            pending,
            first_header,
            sample_rate,
            bytes_per_frame,
            data_start,
            index: None,
            position: 0,
            finished: false,
        };

        if config.build_index && decoder.io.is_seekable() {
            let index = scan_frames(&mut decoder.io, data_start)?;
            debug!(
                "MP3: 帧索引 {} 帧 (输出 {} 帧), PCM 长度={} 字节",
                index.frames.len(),
                index.outputs.len(),
                index.length
            );
            decoder.index = Some(index);
            decoder.rewind()?;
        }
        Ok(decoder)
    }

    /// 读取 PCM 字节, 返回 0 表示流结束
    ///
    /// 某一帧格式错误时返回错误, 字节源已越过该帧, 可以继续读取.
    pub fn read_pcm(&mut self, buf: &mut [u8]) -> YueResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() {
            if self.finished {
                return Ok(0);
            }
            match self.frames.decode_frame(&mut self.io, &mut self.pending) {
                Ok(_) => {}
                Err(e) if e.is_end_of_stream() => {
                    debug!("MP3: 流结束, 位置={}, 原因: {e}", self.position);
                    self.finished = true;
                }
                Err(e) => return Err(e),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        self.position += n as u64;
        Ok(n)
    }

    /// 定位到 PCM 字节位置, 返回新位置
    ///
    /// 至少从目标帧之前 2 帧开始解码以填充重叠区, 若目标帧依赖更早的储备库
    /// 历史则继续向前. 目标帧之前的输出被丢弃.
    pub fn seek_pcm(&mut self, pos: SeekFrom) -> YueResult<u64> {
        let target = match pos {
            SeekFrom::Current(0) => return Ok(self.position),
            SeekFrom::Start(p) => i128::from(p),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(delta) => {
                let length = self.length().ok_or_else(|| {
                    YueError::Unsupported("MP3: 长度未知, 不支持从末尾定位".into())
                })?;
                i128::from(length) + i128::from(delta)
            }
        };
        if target < 0 {
            return Err(YueError::InvalidArgument(format!(
                "MP3: 定位目标 {target} 为负"
            )));
        }
        let target = u64::try_from(target)
            .map_err(|_| YueError::InvalidArgument(format!("MP3: 定位目标 {target} 过大")))?;

        let Some(index) = &self.index else {
            return Err(YueError::Unsupported(
                "MP3: 字节源不可随机访问或未建立帧索引".into(),
            ));
        };

        let frame = usize::try_from(target / self.bytes_per_frame).unwrap_or(usize::MAX);
        let Some(&target_frame) = index.outputs.get(frame).filter(|_| target < index.length)
        else {
            debug!("MP3: 定位到 {target}, 超出长度 {}", index.length);
            self.pending.clear();
            self.finished = true;
            self.position = target;
            return Ok(target);
        };

        let start = index.replay_start(target_frame);
        let target_offset = index.frames[target_frame].offset;
        let start_offset = index.frames[start].offset;
        debug!(
            "MP3: 定位到 {target}, 帧 {frame} (偏移 {target_offset}), 从偏移 {start_offset} 开始预解码"
        );

        self.io.seek_to(start_offset)?;
        self.frames.reset();
        self.pending.clear();
        self.finished = false;

        loop {
            match self.frames.decode_frame(&mut self.io, &mut self.pending) {
                Ok(outcome) if outcome.offset() < target_offset => self.pending.clear(),
                Ok(FrameOutcome::Decoded { .. }) => break,
                Ok(FrameOutcome::Skipped { offset, .. }) => {
                    self.finished = true;
                    return Err(YueError::InvalidData(format!(
                        "MP3: 定位目标帧 (偏移 {offset}) 储备库不足, 字节源与帧索引不一致"
                    )));
                }
                Err(e) if e.is_end_of_stream() => {
                    self.finished = true;
                    break;
                }
                // 预解码帧的格式错误不影响目标帧
                Err(e) if self.io.position() <= target_offset => {
                    debug!("MP3: 预解码帧出错: {e}");
                    self.pending.clear();
                }
                Err(e) => return Err(e),
            }
        }

        let skip = ((target % self.bytes_per_frame) as usize).min(self.pending.len());
        self.pending.advance(skip);
        self.position = target;
        Ok(target)
    }

    /// PCM 总字节数, 未建立帧索引时为 `None`
    pub fn length(&self) -> Option<u64> {
        self.index.as_ref().map(|index| index.length)
    }

    /// 采样率 (Hz), 由第一帧决定
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 当前 PCM 字节位置
    pub fn position(&self) -> u64 {
        self.position
    }

    /// 会输出 PCM 的帧数, 未建立帧索引时为 `None`
    pub fn frame_count(&self) -> Option<usize> {
        self.index.as_ref().map(|index| index.outputs.len())
    }

    /// 总时长, 未建立帧索引时为 `None`
    pub fn duration(&self) -> Option<Duration> {
        let samples = self.length()? / 4;
        Some(Duration::from_secs_f64(
            samples as f64 / f64::from(self.sample_rate),
        ))
    }

    /// 第一帧的帧头
    pub fn first_header(&self) -> FrameHeader {
        self.first_header
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 回到数据起点并清空解码状态
    fn rewind(&mut self) -> YueResult<()> {
        self.io.seek_to(self.data_start)?;
        self.frames.reset();
        self.pending.clear();
        self.position = 0;
        self.finished = false;
        Ok(())
    }
}

impl Read for Decoder {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_pcm(buf).map_err(io::Error::from)
    }
}

impl Seek for Decoder {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_pcm(pos).map_err(io::Error::from)
    }
}

/// 从数据起点扫描所有帧头
///
/// 按储备库的规则推算哪些帧会因历史不足而没有输出, 这些帧不计入长度.
/// 遇到流结束或截断的最后一帧时停止, 遇到格式错误时记录警告并停止.
/// 字节源大小未知时逐帧读出主数据, 以确认最后一帧完整.
fn scan_frames(io: &mut IoContext, data_start: u64) -> YueResult<FrameIndex> {
    io.seek_to(data_start)?;
    let size = io.size();
    let mut index = FrameIndex::default();
    let mut history = 0usize;
    let mut side_bytes = [0u8; 2 + MAX_SIDE_INFO_SIZE];
    let mut main_bytes = Vec::new();

    loop {
        let (header, offset) = match read_header(io) {
            Ok(v) => v,
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => {
                warn!("MP3: 扫描帧头失败, 停止建立索引: {e}");
                break;
            }
        };
        let frame_size = match header.frame_size() {
            Ok(n) => n,
            Err(e) => {
                warn!("MP3: 偏移 {offset} 处的帧无法解码, 停止建立索引: {e}");
                break;
            }
        };
        if size.is_some_and(|size| offset + frame_size as u64 > size) {
            debug!("MP3: 偏移 {offset} 处的最后一帧被截断");
            break;
        }

        let crc_size = if header.has_crc() { 2 } else { 0 };
        let side_size = header.side_info_size();
        let Some(main_size) = frame_size.checked_sub(4 + crc_size + side_size) else {
            warn!("MP3: 偏移 {offset} 处帧长 {frame_size} 过小, 停止建立索引");
            break;
        };
        let head = &mut side_bytes[..crc_size + side_size];
        if io.read_exact(head).is_err() {
            break;
        }
        let body = if size.is_some() {
            io.skip(main_size as u64)
        } else {
            main_bytes.resize(main_size, 0);
            io.read_exact(&mut main_bytes)
        };
        if body.is_err() {
            debug!("MP3: 偏移 {offset} 处的最后一帧被截断");
            break;
        }

        history = history.min(MAX_RESERVOIR_HISTORY);
        let frame = match SideInfo::parse(&head[crc_size..], &header) {
            Ok(side) => IndexedFrame {
                offset,
                main_data_begin: side.main_data_begin,
                main_size,
                history,
                valid: true,
            },
            Err(e) => {
                // 解码时这类帧的主数据不进入储备库
                debug!("MP3: 偏移 {offset} 处边信息无效: {e}");
                IndexedFrame {
                    offset,
                    main_data_begin: 0,
                    main_size: 0,
                    history,
                    valid: false,
                }
            }
        };
        history += frame.main_size;
        index.push(frame, header.bytes_per_frame() as u64);
    }
    Ok(index)
}
