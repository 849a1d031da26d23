/// 视频源接口 (Frame source abstractions)
use crate::error::CaptureError;
use crate::monitor::types::{Camera, Frame};

/// 一个可逐帧读取的视频源
pub trait FrameSource: Send {
    /// 读取下一帧; 返回错误时该摄像头的工作线程结束
    fn next_frame(&mut self, camera: &Camera) -> Result<Frame, CaptureError>;
}

/// 物理采集设备后端
pub trait CaptureBackend: Send + Sync {
    fn open(&self, device: &str) -> Result<Box<dyn FrameSource>, CaptureError>;

    /// 可用设备列表 (索引, 名称)
    fn list_devices(&self) -> Vec<(usize, String)> {
        Vec::new()
    }
}

/// 未启用 `capture` 特性时的后端: 所有设备都不可用
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

impl CaptureBackend for UnavailableBackend {
    fn open(&self, device: &str) -> Result<Box<dyn FrameSource>, CaptureError> {
        tracing::warn!("⚠️ 物理摄像头 {} 不可用: 未启用 capture 特性", device);
        Err(CaptureError::Unavailable)
    }
}

/// 当前构建的默认采集后端
pub fn default_backend() -> Box<dyn CaptureBackend> {
    #[cfg(feature = "capture")]
    {
        Box::new(super::camera::FfmpegBackend::default())
    }
    #[cfg(not(feature = "capture"))]
    {
        Box::new(UnavailableBackend)
    }
}
