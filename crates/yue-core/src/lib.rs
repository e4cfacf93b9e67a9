//! # yue-core
//!
//! Yue 音频解码框架核心库, 提供错误类型、比特流读写、CRC 校验和字节源抽象.
//!
//! 各解码器 crate 在此基础上实现具体的码流解析.

pub mod bitreader;
pub mod bitwriter;
pub mod crc;
pub mod error;
pub mod io;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{YueError, YueResult};
pub use io::{IoBackend, IoContext};
