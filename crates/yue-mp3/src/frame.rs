//! MP3 单帧解码
//!
//! 读取一帧 (帧头, CRC, 边信息, 主数据), 经储备库拼出可解码的主数据,
//! 再逐 granule 重建 PCM. 跨帧状态 (储备库, 重叠区, 合成 V 向量) 由
//! [`FrameDecoder`] 持有.

use bytes::BytesMut;
use log::{trace, warn};
use yue_core::crc::mpeg_audio_crc;
use yue_core::{IoContext, YueError, YueResult};

use crate::alias::antialias;
use crate::bit_reservoir::BitReservoir;
use crate::header::{FrameHeader, read_header};
use crate::imdct::imdct_granule;
use crate::main_data::{MainData, read_main_data};
use crate::reorder::reorder;
use crate::requantize::requantize;
use crate::side_info::{MAX_SIDE_INFO_SIZE, SideInfo};
use crate::stereo::process_stereo;
use crate::synthesis::{ChannelState, frequency_inversion, synthesize, write_pcm};
use crate::tables::SF_BANDS;

/// 单帧解码结果
///
/// `offset` 为帧头在字节源中的位置.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 输出了 `bytes` 字节 PCM
    Decoded {
        header: FrameHeader,
        offset: u64,
        bytes: usize,
    },
    /// 储备库历史不足, 本帧没有输出
    Skipped { header: FrameHeader, offset: u64 },
}

impl FrameOutcome {
    pub fn header(&self) -> FrameHeader {
        match *self {
            FrameOutcome::Decoded { header, .. } | FrameOutcome::Skipped { header, .. } => header,
        }
    }

    pub fn offset(&self) -> u64 {
        match *self {
            FrameOutcome::Decoded { offset, .. } | FrameOutcome::Skipped { offset, .. } => offset,
        }
    }
}

/// 帧解码器
pub struct FrameDecoder {
    reservoir: BitReservoir,
    main: Box<MainData>,
    channels: [ChannelState; 2],
    verify_crc: bool,
    frames: u64,
}

impl FrameDecoder {
    pub fn new(verify_crc: bool) -> Self {
        Self {
            reservoir: BitReservoir::new(),
            main: Box::default(),
            channels: [ChannelState::new(), ChannelState::new()],
            verify_crc,
            frames: 0,
        }
    }

    /// 清空跨帧状态, 用于流重新开始 (构造或定位)
    pub fn reset(&mut self) {
        self.reservoir.clear();
        for state in &mut self.channels {
            state.reset();
        }
    }

    /// 解码下一帧, PCM 追加到 `pcm`
    ///
    /// 格式错误只影响当前帧: 返回错误时字节源已位于该帧之后.
    pub fn decode_frame(&mut self, io: &mut IoContext, pcm: &mut BytesMut) -> YueResult<FrameOutcome> {
        let (header, offset) = read_header(io)?;
        let frame_size = header.frame_size()?;
        let side_size = header.side_info_size();
        let crc_size = if header.has_crc() { 2 } else { 0 };
        let main_size = frame_size
            .checked_sub(4 + crc_size + side_size)
            .ok_or_else(|| {
                YueError::InvalidData(format!(
                    "MP3: 帧长 {frame_size} 小于帧头与边信息, 偏移={offset}"
                ))
            })?;

        let mut stored_crc = [0u8; 2];
        if header.has_crc() {
            io.read_exact(&mut stored_crc)
                .map_err(|e| e.truncated("crc"))?;
        }

        let mut raw = [0u8; MAX_SIDE_INFO_SIZE];
        let mut side = match SideInfo::read(io, &header, &mut raw) {
            Ok(side) => side,
            Err(e) if e.is_end_of_stream() => return Err(e),
            Err(e) => {
                io.skip(main_size as u64)
                    .map_err(|e| e.truncated("main data"))?;
                return Err(e);
            }
        };

        if self.verify_crc && header.has_crc() {
            let expected = u16::from_be_bytes(stored_crc);
            let actual = mpeg_audio_crc(header.to_bytes(), &raw[..side_size]);
            if expected != actual {
                warn!(
                    "MP3: CRC 校验失败, 偏移={offset}, 期望=0x{expected:04X}, 实际=0x{actual:04X}"
                );
            }
        }

        self.frames += 1;
        let Some(data) = self
            .reservoir
            .fill_from(io, main_size, side.main_data_begin)?
        else {
            warn!(
                "MP3: 储备库不足 main_data_begin={}, 跳过第 {} 帧",
                side.main_data_begin, self.frames
            );
            return Ok(FrameOutcome::Skipped { header, offset });
        };
        read_main_data(data, &header, &mut side, &mut self.main)?;

        let before = pcm.len();
        self.reconstruct(&header, &side, pcm);
        let bytes = pcm.len() - before;
        trace!(
            "MP3: 帧 {} 偏移={offset} 长度={frame_size} 输出 {bytes} 字节",
            self.frames
        );
        Ok(FrameOutcome::Decoded {
            header,
            offset,
            bytes,
        })
    }

    /// 逐 granule 重建 PCM
    fn reconstruct(&mut self, header: &FrameHeader, side: &SideInfo, pcm: &mut BytesMut) {
        let bands = &SF_BANDS[header.band_table_index()];
        let nch = header.channels();
        let mut out = [[0.0f32; 576]; 2];

        for gr in 0..header.granules() {
            let infos = &side.granules[gr];
            for ch in 0..nch {
                let gd = &mut self.main.granules[gr][ch];
                requantize(&infos[ch], &gd.scalefactors, bands, &gd.is, &mut gd.xr);
                reorder(&infos[ch], bands, &mut gd.xr);
            }

            if nch == 2 {
                let [left, right] = &mut self.main.granules[gr];
                process_stereo(
                    header,
                    infos,
                    &right.scalefactors,
                    bands,
                    &mut left.xr,
                    &mut right.xr,
                );
            }

            for ch in 0..nch {
                let xr = &mut self.main.granules[gr][ch].xr;
                let state = &mut self.channels[ch];
                antialias(&infos[ch], xr);
                imdct_granule(&infos[ch], xr, &mut state.overlap);
                frequency_inversion(xr);
                synthesize(xr, &mut state.v, &mut out[ch]);
            }

            let right = if nch == 2 { Some(&out[1]) } else { None };
            write_pcm(&out[0], right, pcm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yue_core::BitWriter;
    use yue_core::io::MemoryBackend;

    fn memory(data: Vec<u8>) -> IoContext {
        IoContext::new(Box::new(MemoryBackend::from_data(data)))
    }

    /// 全零的 MPEG-1 帧: 边信息全零即所有 granule 没有主数据
    fn silent_frame(header: u32) -> Vec<u8> {
        let header = FrameHeader::from_raw(header);
        let mut frame = vec![0u8; header.frame_size().unwrap()];
        frame[..4].copy_from_slice(&header.to_bytes());
        frame
    }

    #[test]
    fn test_静音立体声帧() {
        // MPEG-1 44100Hz 128kbps 立体声
        let mut io = memory(silent_frame(0xFFFB_9004));
        let mut decoder = FrameDecoder::new(true);
        let mut pcm = BytesMut::new();
        let outcome = decoder.decode_frame(&mut io, &mut pcm).unwrap();
        assert!(matches!(outcome, FrameOutcome::Decoded { bytes: 4608, .. }));
        assert_eq!(pcm.len(), 4608);
        assert!(pcm.iter().all(|&b| b == 0));
        assert!(matches!(
            decoder.decode_frame(&mut io, &mut pcm),
            Err(YueError::Eof)
        ));
    }

    #[test]
    fn test_储备库不足跳过帧() {
        let mut frame = silent_frame(0xFFFB_9004);
        // main_data_begin = 100
        let mut bw = BitWriter::new();
        bw.write_bits(100, 9);
        let side = bw.finish();
        frame[4..4 + side.len()].copy_from_slice(&side);

        let mut io = memory(frame);
        let mut decoder = FrameDecoder::new(true);
        let mut pcm = BytesMut::new();
        let outcome = decoder.decode_frame(&mut io, &mut pcm).unwrap();
        assert!(matches!(outcome, FrameOutcome::Skipped { .. }));
        assert!(pcm.is_empty());
        assert_eq!(io.position(), 417);
    }

    #[test]
    fn test_边信息错误后跳过整帧() {
        let mut data = silent_frame(0xFFFB_9004);
        // granule 0 / 声道 0 的 big_values 置为 511
        let mut bw = BitWriter::new();
        bw.write_bits(0, 9 + 3 + 8 + 12);
        bw.write_bits(511, 9);
        let side = bw.finish();
        data[4..4 + side.len()].copy_from_slice(&side);
        data.extend(silent_frame(0xFFFB_9004));

        let mut io = memory(data);
        let mut decoder = FrameDecoder::new(true);
        let mut pcm = BytesMut::new();
        assert!(matches!(
            decoder.decode_frame(&mut io, &mut pcm),
            Err(YueError::InvalidData(_))
        ));
        assert_eq!(io.position(), 417);
        let outcome = decoder.decode_frame(&mut io, &mut pcm).unwrap();
        assert!(matches!(outcome, FrameOutcome::Decoded { .. }));
    }

    #[test]
    fn test_截断的帧() {
        let mut data = silent_frame(0xFFFB_9004);
        data.truncate(100);
        let mut io = memory(data);
        let mut decoder = FrameDecoder::new(true);
        let mut pcm = BytesMut::new();
        assert!(matches!(
            decoder.decode_frame(&mut io, &mut pcm),
            Err(YueError::UnexpectedEof { at: "main data" })
        ));
    }

    #[test]
    fn test_crc_不匹配仍然解码() {
        // 去掉保护位 => 帧头后携带 CRC
        let mut data = silent_frame(0xFFFA_9004);
        data[4] = 0x12;
        data[5] = 0x34;
        let mut io = memory(data);
        let mut decoder = FrameDecoder::new(true);
        let mut pcm = BytesMut::new();
        let outcome = decoder.decode_frame(&mut io, &mut pcm).unwrap();
        assert!(matches!(outcome, FrameOutcome::Decoded { bytes: 4608, .. }));
    }

    #[test]
    fn test_单声道复制到双声道() {
        // MPEG-2 22050Hz 单声道 32kbps
        let mut io = memory(silent_frame(0xFFF3_40C4));
        let mut decoder = FrameDecoder::new(false);
        let mut pcm = BytesMut::new();
        let outcome = decoder.decode_frame(&mut io, &mut pcm).unwrap();
        assert!(matches!(outcome, FrameOutcome::Decoded { bytes: 2304, .. }));
        assert_eq!(outcome.header().channels(), 1);
    }
}
