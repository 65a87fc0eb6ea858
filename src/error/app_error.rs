use thiserror::Error;

use crate::trading::indicator::pullback_detection_indicator::PullbackError;

/// 应用错误
#[derive(Error, Debug)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// K线数据解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    /// 结构检测失败
    #[error("检测错误: {0}")]
    Detect(#[from] PullbackError),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Unknown(e.to_string())
    }
}
