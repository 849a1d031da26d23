//! 错误类型 (Error types)
//!
//! 所有错误都只影响触发它的那一次调用, 不会终止进程。

use thiserror::Error;

/// 状态存储校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("threshold must be between 50% and 100% (got {0}%)")]
    ThresholdOutOfRange(i32),

    #[error("camera '{0}' is already registered")]
    DuplicateCamera(String),

    #[error("camera '{0}' is not registered")]
    UnknownCamera(String),

    #[error("alert #{0} does not exist")]
    AlertNotFound(u64),
}

/// 采集设备错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// 设备无法打开
    #[error("could not open capture device '{device}': {reason}")]
    Open { device: String, reason: String },

    /// 读帧失败
    #[error("frame read failed: {0}")]
    Read(String),

    /// 视频流结束
    #[error("capture stream ended")]
    EndOfStream,

    /// 未启用采集后端
    #[error("physical capture is not available in this build (enable the `capture` feature)")]
    Unavailable,
}

/// 配置文件错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// 监控系统命令错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
