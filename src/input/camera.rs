//! 摄像头输入模块 - 物理采集设备
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use super::decode_filter::DecodeFilter;
use super::source::{CaptureBackend, FrameSource};
use crate::error::CaptureError;
use crate::monitor::types::{Camera, Frame};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 读帧超时, 超过则视为设备失效
const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    pub width: u32,
    pub height: u32,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
        }
    }
}

/// 格式化摄像头URL - 根据平台选择
fn format_camera_url(device: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        format!("video={}", device)
    }
    #[cfg(target_os = "linux")]
    {
        if device.chars().all(|c| c.is_ascii_digit()) {
            format!("/dev/video{}", device)
        } else {
            device.to_string()
        }
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        device.to_string()
    }
}

fn input_format() -> &'static str {
    #[cfg(target_os = "windows")]
    let format = "dshow"; // DirectShow

    #[cfg(target_os = "macos")]
    let format = "avfoundation"; // AVFoundation

    #[cfg(target_os = "linux")]
    let format = "v4l2"; // Video4Linux2

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    let format = "video4linux2";

    format
}

impl CaptureBackend for FfmpegBackend {
    fn open(&self, device: &str) -> Result<Box<dyn FrameSource>, CaptureError> {
        let url = format_camera_url(device);
        tracing::info!("📷 打开摄像头: {} (格式: {})", url, input_format());

        let (tx, rx) = crossbeam_channel::bounded(2);
        let closed = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx, closed.clone());

        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let input = Input::new(url.as_str()).set_format(input_format());
        let scale = format!("scale={}:{},format=rgba", self.width, self.height);

        let open_err = |e: &dyn std::fmt::Display| CaptureError::Open {
            device: device.to_string(),
            reason: e.to_string(),
        };

        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_descs([scale.as_str()].into())
            .output(out)
            .build()
            .map_err(|e| open_err(&e))?;
        let sch = ctx.start().map_err(|e| open_err(&e))?;

        let device_name = device.to_string();
        std::thread::Builder::new()
            .name(format!("capture-{}", device))
            .spawn(move || {
                let _ = sch.wait();
                tracing::info!("📹 摄像头 {} 解码循环结束", device_name);
            })
            .map_err(|e| open_err(&e))?;

        tracing::info!("✅ 摄像头连接成功,开始解码!");
        Ok(Box::new(FfmpegSource { rx, closed }))
    }

    fn list_devices(&self) -> Vec<(usize, String)> {
        match ez_ffmpeg::device::get_input_video_devices() {
            Ok(devices) => devices.into_iter().enumerate().collect(),
            Err(e) => {
                tracing::warn!("⚠️ 获取摄像头列表失败: {}", e);
                vec![]
            }
        }
    }
}

/// 解码线程推送, 工作线程拉取
pub struct FfmpegSource {
    rx: Receiver<Frame>,
    closed: Arc<AtomicBool>,
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self, camera: &Camera) -> Result<Frame, CaptureError> {
        match self.rx.recv_timeout(READ_TIMEOUT) {
            Ok(mut frame) => {
                frame.caption = vec![camera.title()];
                Ok(frame)
            }
            Err(RecvTimeoutError::Timeout) => {
                Err(CaptureError::Read(format!("no frame within {:?}", READ_TIMEOUT)))
            }
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::EndOfStream),
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
