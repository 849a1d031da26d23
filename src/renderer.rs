mod control_panel;
pub mod dashboard;

pub use dashboard::DashboardModel;

use crate::monitor::{Camera, Frame, MonitorCommands, MonitorEvent};
use control_panel::ControlPanel;
use crossbeam_channel::Receiver;
use dashboard::{FeedTile, TILE_COLUMNS, TOAST_TTL};
use egui_macroquad::egui;
use macroquad::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

const TILE_GAP: f32 = 8.0;
const TITLE_HEIGHT: f32 = 22.0;

struct TileTexture {
    revision: u64,
    texture: Texture2D,
}

pub struct Renderer {
    events: Receiver<MonitorEvent>,
    model: DashboardModel,
    control_panel: ControlPanel,
    textures: HashMap<String, TileTexture>,
    // 渲染帧率统计
    render_count: u64,
    render_last: Instant,
    render_fps: f64,
}

impl Renderer {
    pub fn new(
        events: Receiver<MonitorEvent>,
        commands: Arc<dyn MonitorCommands>,
        cameras: &[Camera],
        presets: &[Camera],
        devices: &[(usize, String)],
        threshold: u8,
    ) -> Self {
        tracing::info!("🎨 渲染器启动");
        Self {
            events,
            model: DashboardModel::new(cameras),
            control_panel: ControlPanel::new(commands, presets, devices, threshold),
            textures: HashMap::new(),
            render_count: 0,
            render_last: Instant::now(),
            render_fps: 0.0,
        }
    }

    /// 取出本帧之前所有事件, 然后同步纹理
    pub fn update(&mut self) {
        let applied = self.model.apply_all(self.events.try_iter());
        if applied > 0 {
            tracing::trace!("界面事件 {} 条", applied);
        }
        self.model.expire_toasts(Instant::now(), TOAST_TTL);

        // 已移除摄像头的纹理直接丢弃
        let model = &self.model;
        self.textures.retain(|id, _| model.has_camera(id));

        for tile in self.model.tiles() {
            let Some(frame) = tile.latest.as_ref() else {
                continue;
            };
            // 只在新建或分辨率变化时重建纹理, 否则更新像素数据
            let needs_rebuild = match self.textures.get(&tile.camera.id) {
                Some(entry) => {
                    entry.texture.width() != frame.width as f32
                        || entry.texture.height() != frame.height as f32
                }
                None => true,
            };

            if needs_rebuild {
                self.textures.insert(
                    tile.camera.id.clone(),
                    TileTexture {
                        revision: tile.revision,
                        texture: build_texture(frame),
                    },
                );
            } else if let Some(entry) = self.textures.get_mut(&tile.camera.id) {
                if entry.revision != tile.revision {
                    entry.texture.update(&Image {
                        bytes: frame.rgba_data.to_vec(),
                        width: frame.width as u16,
                        height: frame.height as u16,
                    });
                    entry.revision = tile.revision;
                }
            }
        }
    }

    /// 一帧: egui 布局 → 画面 → egui 叠加
    pub fn draw(&mut self) {
        clear_background(Color::from_rgba(20, 22, 26, 255));

        let mut area = None;
        egui_macroquad::ui(|egui_ctx| {
            let rect = self.control_panel.show(egui_ctx, &mut self.model);
            area = Some((rect, egui_ctx.pixels_per_point()));
        });

        if let Some((rect, ppp)) = area {
            self.draw_tiles(rect, ppp);
        }

        // FPS统计
        self.render_count += 1;
        let now = Instant::now();
        if now.duration_since(self.render_last).as_secs() >= 1 {
            self.render_fps =
                self.render_count as f64 / now.duration_since(self.render_last).as_secs_f64();
            self.render_count = 0;
            self.render_last = now;
        }

        egui_macroquad::draw();
    }

    fn draw_tiles(&self, rect: egui::Rect, ppp: f32) {
        let tiles = self.model.tiles();
        if tiles.is_empty() {
            draw_text(
                "No cameras",
                rect.min.x * ppp + 20.0,
                rect.min.y * ppp + 40.0,
                24.0,
                GRAY,
            );
            return;
        }

        let rows = tiles.len().div_ceil(TILE_COLUMNS);
        let x0 = rect.min.x * ppp + TILE_GAP;
        let y0 = rect.min.y * ppp + TILE_GAP;
        let cell_w = (rect.width() * ppp - TILE_GAP) / TILE_COLUMNS as f32 - TILE_GAP;
        let cell_h = (rect.height() * ppp - TILE_GAP) / rows as f32 - TILE_GAP;

        for (idx, tile) in tiles.iter().enumerate() {
            let x = x0 + (idx % TILE_COLUMNS) as f32 * (cell_w + TILE_GAP);
            let y = y0 + (idx / TILE_COLUMNS) as f32 * (cell_h + TILE_GAP);
            self.draw_tile(tile, x, y, cell_w, cell_h);
        }

        draw_text(
            &format!("{:.0} FPS", self.render_fps),
            rect.min.x * ppp + 10.0,
            rect.max.y * ppp - 6.0,
            16.0,
            DARKGRAY,
        );
    }

    fn draw_tile(&self, tile: &FeedTile, x: f32, y: f32, w: f32, h: f32) {
        draw_rectangle(x, y, w, h, BLACK);
        draw_text(&tile.title(), x + 4.0, y + TITLE_HEIGHT - 6.0, 20.0, WHITE);

        let view_h = (h - TITLE_HEIGHT).max(1.0);
        let Some(entry) = self.textures.get(&tile.camera.id) else {
            draw_text("Sin señal", x + 10.0, y + TITLE_HEIGHT + 24.0, 20.0, GRAY);
            return;
        };

        // 保持宽高比居中
        let texture = &entry.texture;
        let scale = (w / texture.width()).min(view_h / texture.height());
        let draw_w = texture.width() * scale;
        let draw_h = texture.height() * scale;
        let dx = x + (w - draw_w) / 2.0;
        let dy = y + TITLE_HEIGHT + (view_h - draw_h) / 2.0;
        draw_texture_ex(
            texture,
            dx,
            dy,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(draw_w, draw_h)),
                ..Default::default()
            },
        );

        // 未烧录的字幕由界面补画
        for (line, text) in tile.caption().iter().enumerate() {
            let size = if line == 0 { 20.0 } else { 16.0 };
            draw_text(text, dx + 10.0, dy + 22.0 + line as f32 * 22.0, size, GREEN);
        }
    }
}

fn build_texture(frame: &Frame) -> Texture2D {
    let texture = Texture2D::from_rgba8(frame.width as u16, frame.height as u16, &frame.rgba_data);
    texture.set_filter(FilterMode::Linear);
    texture
}
