/// 视频输入系统 (Video Input System)
///
/// - SyntheticSource: 合成画面 (模拟摄像头)
/// - FfmpegBackend:   本地摄像头解码器 (DirectShow/AVFoundation/V4L2), 需要 `capture` 特性
/// - DecodeFilter:    帧过滤与RGBA转换
pub mod source;
pub mod synthetic;

#[cfg(feature = "capture")]
pub mod camera;
#[cfg(feature = "capture")]
pub mod decode_filter;

pub use source::{default_backend, CaptureBackend, FrameSource, UnavailableBackend};
pub use synthetic::{load_font, SyntheticSource};

#[cfg(feature = "capture")]
pub use camera::{FfmpegBackend, FfmpegSource};
