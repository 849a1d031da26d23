pub mod config; // 面板配置参数
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod monitor; // 监控系统 (状态存储 + 编排)
pub mod renderer; // macroquad + egui 监控面板

pub use crate::config::SentinelConfig;
pub use crate::error::{CaptureError, ConfigError, MonitorError, Result, StateError};
pub use crate::monitor::{ChannelSink, EventSink, Monitor, MonitorCommands, MonitorEvent};
