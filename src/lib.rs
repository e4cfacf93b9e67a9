//! # Yue (乐)
//!
//! 纯 Rust 实现的 MP3 (MPEG-1/2 Audio Layer III) 流式解码器.
//!
//! 解码结果为 16 位小端交织立体声 PCM, 以 [`std::io::Read`] 字节流的形式提供;
//! 字节源可随机访问时还支持 [`std::io::Seek`] 和总长度查询.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::io::Read;
//!
//! let mut decoder = yue::open("song.mp3").unwrap();
//! println!("{} Hz, {:?} 字节", decoder.sample_rate(), decoder.length());
//! let mut pcm = Vec::new();
//! decoder.read_to_end(&mut pcm).unwrap();
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `yue-core` | 错误类型、比特流读写、CRC、字节源 |
//! | `yue-mp3` | Layer III 帧解码与流式解码器 |

/// 核心类型与工具
pub use yue_core as core;

/// MP3 解码器
pub use yue_mp3 as mp3;

pub use yue_mp3::{Decoder, DecoderConfig};

/// 获取 Yue 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 以默认配置打开 MP3 文件
pub fn open(path: impl AsRef<std::path::Path>) -> yue_core::YueResult<Decoder> {
    Decoder::open(path)
}
