//! 合成画面 (Synthetic frames)
//!
//! 黑底画面 + 绿色摄像头名称/位置 + 时间戳 + 若干随机亮点。
//! 亮点只是装饰, 没有任何检测含义。

use super::source::FrameSource;
use crate::error::CaptureError;
use crate::monitor::types::{Camera, Frame};
use ab_glyph::{FontVec, PxScale};
use chrono::{DateTime, Local};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;

const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 加载叠加字幕用的字体, 失败时返回 None (由界面绘制字幕)
pub fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("⚠️ 字体文件 {} 读取失败: {}", path.display(), err);
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => {
            tracing::info!("✅ 字体加载成功: {}", path.display());
            Some(font)
        }
        Err(err) => {
            tracing::warn!("⚠️ 字体文件 {} 解析失败: {}", path.display(), err);
            None
        }
    }
}

pub struct SyntheticSource {
    width: u32,
    height: u32,
    marker_count: usize,
    font: Option<Arc<FontVec>>,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, marker_count: usize, font: Option<Arc<FontVec>>) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            marker_count,
            font,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn render(&mut self, camera: &Camera, now: DateTime<Local>) -> Frame {
        let mut img = RgbaImage::from_pixel(self.width, self.height, BLACK);

        let title = format!("{} - {}", camera.display_name, camera.location);
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();

        // 有字体时字幕直接画进画面, 否则交给界面绘制
        let caption = match &self.font {
            Some(font) => {
                draw_text_mut(&mut img, GREEN, 10, 12, PxScale::from(22.0), font.as_ref(), &title);
                draw_text_mut(&mut img, GREEN, 10, 45, PxScale::from(16.0), font.as_ref(), &timestamp);
                Vec::new()
            }
            None => vec![title, timestamp],
        };

        for _ in 0..self.marker_count {
            let x = self.rng.gen_range(0..self.width) as i32;
            let y = self.rng.gen_range(0..self.height) as i32;
            draw_filled_circle_mut(&mut img, (x, y), 1, GREEN);
        }

        Frame {
            width: self.width,
            height: self.height,
            rgba_data: Arc::new(img.into_raw()),
            captured_at: now,
            caption,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self, camera: &Camera) -> Result<Frame, CaptureError> {
        Ok(self.render(camera, Local::now()))
    }
}
