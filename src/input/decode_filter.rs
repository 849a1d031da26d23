use crate::monitor::types::Frame;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame as AvFrame};
use std::time::Instant;

/// FFmpeg解码过滤器: 摄像头 → RGBA帧
///
/// 输入已经由 `format=rgba` 滤镜转换, 这里只做逐行拷贝。
#[derive(Clone)]
pub struct DecodeFilter {
    pub count: usize,
    pub last: Instant,
    pub current_fps: f64,
    pub dropped_frames: usize,
    pub total_frames: usize,
    tx: Sender<Frame>,
    closed: Arc<AtomicBool>,
}

impl DecodeFilter {
    pub fn new(tx: Sender<Frame>, closed: Arc<AtomicBool>) -> Self {
        Self {
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
            dropped_frames: 0,
            total_frames: 0,
            tx,
            closed,
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        tracing::info!("✅ 摄像头解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: AvFrame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<AvFrame>, String> {
        // 读取端已关闭则停止解码
        if self.closed.load(Ordering::Relaxed) {
            return Err("Capture closed".to_string());
        }

        unsafe {
            self.total_frames += 1;

            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 || w > 4096 || h > 4096 {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let plane = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0] as usize;
            let row_bytes = w as usize * 4;
            if plane.is_null() || stride < row_bytes {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let mut rgba = Vec::with_capacity(row_bytes * h as usize);
            for row in 0..h as usize {
                let src = std::slice::from_raw_parts(plane.add(row * stride), row_bytes);
                rgba.extend_from_slice(src);
            }

            self.count += 1;
            if self.last.elapsed().as_secs_f64() >= 1.0 {
                let elapsed = self.last.elapsed().as_secs_f64();
                self.current_fps = self.count as f64 / elapsed;
                tracing::debug!(
                    "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                    self.current_fps,
                    self.total_frames,
                    self.dropped_frames
                );
                self.last = Instant::now();
                self.count = 0;
            }

            let decoded = Frame {
                rgba_data: Arc::new(rgba),
                width: w,
                height: h,
                captured_at: chrono::Local::now(),
                caption: Vec::new(),
            };

            // 读取端来不及处理时丢弃本帧
            match self.tx.try_send(decoded) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => self.dropped_frames += 1,
                Err(TrySendError::Disconnected(_)) => {
                    return Err("Capture reader gone".to_string());
                }
            }

            Ok(Some(frame))
        }
    }
}
