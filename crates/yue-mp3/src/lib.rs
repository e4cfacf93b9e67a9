//! # yue-mp3
//!
//! MPEG-1/2 Audio Layer III 解码器, 输出 16 位小端交织立体声 PCM.
//!
//! 解码流程: 帧头 → 边信息 → 主数据 (经比特储备库) → 反量化 → 重排序
//! → 立体声处理 → 抗混叠 → IMDCT → 频率反转 → 多相合成.
//!
//! ## 使用示例
//!
//! ```no_run
//! use std::io::Read;
//! use yue_mp3::Decoder;
//!
//! let mut decoder = Decoder::open("song.mp3").unwrap();
//! println!("采样率: {} Hz, 长度: {:?}", decoder.sample_rate(), decoder.length());
//! let mut pcm = Vec::new();
//! decoder.read_to_end(&mut pcm).unwrap();
//! ```

pub mod alias;
pub mod bit_reservoir;
pub mod decoder;
pub mod frame;
pub mod header;
pub mod huffman;
pub mod imdct;
pub mod main_data;
pub mod reorder;
pub mod requantize;
pub mod scalefactor;
pub mod side_info;
pub mod stereo;
pub mod synthesis;
pub mod tables;
pub mod tag;

pub use decoder::{Decoder, DecoderConfig};
pub use frame::{FrameDecoder, FrameOutcome};
pub use header::{ChannelMode, FrameHeader, MpegLayer, MpegVersion};
