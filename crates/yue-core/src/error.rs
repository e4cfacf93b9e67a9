//! 统一错误类型定义.
//!
//! 所有 Yue crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Yue 框架统一错误类型
#[derive(Debug, Error)]
pub enum YueError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 已到达流末尾 (干净结束, 没有任何残缺数据)
    #[error("已到达流末尾")]
    Eof,

    /// 读取中途遇到流末尾
    ///
    /// `at` 记录出错的解析阶段. 在公开接口处与 [`YueError::Eof`] 合并为正常结束.
    #[error("意外的流末尾: {at}")]
    UnexpectedEof {
        /// 出错位置
        at: &'static str,
    },

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),
}

impl YueError {
    /// 是否表示流结束 (包括中途截断)
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, YueError::Eof | YueError::UnexpectedEof { .. })
    }

    /// 将 [`YueError::Eof`] 转换为带位置的 [`YueError::UnexpectedEof`]
    ///
    /// 用于已经读取了部分数据后又遇到末尾的场景.
    pub fn truncated(self, at: &'static str) -> Self {
        match self {
            YueError::Eof => YueError::UnexpectedEof { at },
            other => other,
        }
    }
}

impl From<YueError> for std::io::Error {
    fn from(err: YueError) -> Self {
        use std::io::ErrorKind;
        match err {
            YueError::Io(e) => e,
            YueError::Eof | YueError::UnexpectedEof { .. } => {
                std::io::Error::new(ErrorKind::UnexpectedEof, err)
            }
            YueError::InvalidArgument(_) => std::io::Error::new(ErrorKind::InvalidInput, err),
            YueError::Unsupported(_) => std::io::Error::new(ErrorKind::Unsupported, err),
            YueError::InvalidData(_) => std::io::Error::new(ErrorKind::InvalidData, err),
        }
    }
}

/// Yue 框架统一 Result 类型
pub type YueResult<T> = Result<T, YueError>;
