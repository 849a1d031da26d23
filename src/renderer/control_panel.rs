use super::dashboard::{clock_text, DashboardModel};
use crate::monitor::types::{THRESHOLD_MAX, THRESHOLD_MIN};
use crate::monitor::{Camera, CameraSource, MonitorCommands, SystemStatus};
use chrono::Local;
use egui_macroquad::egui;
use std::sync::Arc;

/// 预置摄像头 + 检测到但未预置的物理设备
pub fn dialog_options(presets: &[Camera], devices: &[(usize, String)]) -> Vec<Camera> {
    let mut options = presets.to_vec();
    for (index, name) in devices {
        let device = index.to_string();
        let known = options
            .iter()
            .any(|c| matches!(&c.source, CameraSource::Device(d) if *d == device));
        if !known {
            options.push(Camera::device(device.clone(), name.clone(), "Desconocida", device));
        }
    }
    options
}

fn status_color(status: SystemStatus) -> egui::Color32 {
    match status {
        SystemStatus::Stopped => egui::Color32::GRAY,
        SystemStatus::Monitoring => egui::Color32::GREEN,
        SystemStatus::Alert => egui::Color32::RED,
    }
}

/// 控制面板: 只负责绘制模型和转发点击
pub struct ControlPanel {
    commands: Arc<dyn MonitorCommands>,
    options: Vec<Camera>,
    threshold: i32,
    show_add_dialog: bool,
    selected_option: usize,
}

impl ControlPanel {
    pub fn new(
        commands: Arc<dyn MonitorCommands>,
        presets: &[Camera],
        devices: &[(usize, String)],
        threshold: u8,
    ) -> Self {
        Self {
            commands,
            options: dialog_options(presets, devices),
            threshold: threshold as i32,
            show_add_dialog: false,
            selected_option: 0,
        }
    }

    /// 绘制所有面板, 返回留给视频画面的区域
    pub fn show(&mut self, ctx: &egui::Context, model: &mut DashboardModel) -> egui::Rect {
        self.toolbar(ctx, model);
        self.clock_bar(ctx);
        self.alerts_panel(ctx, model);
        self.add_camera_dialog(ctx, model);
        self.toasts(ctx, model);
        ctx.available_rect()
    }

    fn toolbar(&mut self, ctx: &egui::Context, model: &DashboardModel) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.colored_label(
                    status_color(model.status()),
                    egui::RichText::new(model.status_label()).strong(),
                );
                ui.separator();

                let running = model.status() != SystemStatus::Stopped;
                if ui
                    .add_enabled(!running, egui::Button::new("▶ Start monitoring"))
                    .clicked()
                {
                    self.commands.start();
                }
                if ui.add_enabled(running, egui::Button::new("⏹ Stop")).clicked() {
                    self.commands.stop();
                }
                ui.separator();

                ui.add(
                    egui::Slider::new(
                        &mut self.threshold,
                        THRESHOLD_MIN as i32..=THRESHOLD_MAX as i32,
                    )
                    .text("Threshold %"),
                );
                if ui.button("Apply").clicked() {
                    // 结果通过消息提示反馈
                    let _ = self.commands.set_threshold(self.threshold);
                }
                ui.separator();

                if ui.button("➕ Add camera").clicked() {
                    self.show_add_dialog = true;
                }
            });
        });
    }

    fn clock_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("clock").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(clock_text(Local::now()));
            });
        });
    }

    fn alerts_panel(&mut self, ctx: &egui::Context, model: &DashboardModel) {
        egui::SidePanel::right("alerts")
            .default_width(320.0)
            .resizable(true)
            .show(ctx, |ui| {
                egui::CollapsingHeader::new("🚨 Active alerts")
                    .default_open(true)
                    .show(ui, |ui| {
                        let active = model.active_alerts();
                        if active.is_empty() {
                            ui.label("No pending alerts");
                        }
                        egui::ScrollArea::vertical()
                            .id_salt("active_alerts")
                            .max_height(180.0)
                            .show(ui, |ui| {
                                for alert in active {
                                    ui.horizontal(|ui| {
                                        ui.colored_label(
                                            egui::Color32::RED,
                                            format!(
                                                "#{} {} ({}%)",
                                                alert.alert_id,
                                                alert.anomaly_type,
                                                alert.confidence
                                            ),
                                        );
                                        ui.label(super::dashboard::camera_label(&alert.camera_id));
                                        if ui.button("Review").clicked() {
                                            let _ = self.commands.acknowledge(alert.alert_id);
                                        }
                                    });
                                }
                            });
                    });

                ui.separator();

                egui::CollapsingHeader::new("📋 History")
                    .default_open(true)
                    .show(ui, |ui| {
                        egui::ScrollArea::vertical()
                            .id_salt("history")
                            .max_height(260.0)
                            .show(ui, |ui| {
                                egui::Grid::new("history_grid")
                                    .striped(true)
                                    .num_columns(4)
                                    .show(ui, |ui| {
                                        for title in ["ID", "Time", "Camera", "Type"] {
                                            ui.strong(title);
                                        }
                                        ui.end_row();
                                        for row in model.history_rows().iter().rev() {
                                            let id = if row.acknowledged {
                                                format!("{} ✔", row.alert_id)
                                            } else {
                                                row.alert_id.to_string()
                                            };
                                            ui.label(id);
                                            ui.label(row.time.as_str());
                                            ui.label(row.camera.as_str());
                                            ui.label(row.anomaly.as_str());
                                            ui.end_row();
                                        }
                                    });
                            });
                    });

                ui.separator();

                egui::CollapsingHeader::new("📷 Cameras")
                    .default_open(false)
                    .show(ui, |ui| {
                        for tile in model.tiles() {
                            ui.horizontal(|ui| {
                                ui.label(tile.title());
                                if ui.small_button("Remove").clicked() {
                                    let _ = self.commands.remove_camera(&tile.camera.id);
                                }
                            });
                        }
                    });
            });
    }

    fn add_camera_dialog(&mut self, ctx: &egui::Context, model: &DashboardModel) {
        if !self.show_add_dialog {
            return;
        }
        let mut open = true;
        let mut added = false;
        egui::Window::new("Add camera")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                if self.options.is_empty() {
                    ui.label("No cameras available");
                    return;
                }
                self.selected_option = self.selected_option.min(self.options.len() - 1);
                egui::ComboBox::from_id_salt("camera_option")
                    .selected_text(self.options[self.selected_option].title())
                    .show_ui(ui, |ui| {
                        for (idx, camera) in self.options.iter().enumerate() {
                            let label = if model.has_camera(&camera.id) {
                                format!("{} ✔", camera.title())
                            } else {
                                camera.title()
                            };
                            ui.selectable_value(&mut self.selected_option, idx, label);
                        }
                    });
                if ui.button("Add").clicked() {
                    let request = self.options[self.selected_option].clone();
                    added = self.commands.add_camera(request).is_ok();
                }
            });
        self.show_add_dialog = open && !added;
    }

    fn toasts(&self, ctx: &egui::Context, model: &mut DashboardModel) {
        let mut dismissed = None;
        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, 48.0))
            .show(ctx, |ui| {
                for (idx, toast) in model.toasts().enumerate() {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.strong(toast.title.as_str());
                            ui.label(toast.body.as_str());
                            if ui.small_button("✖").clicked() {
                                dismissed = Some(idx);
                            }
                        });
                    });
                }
            });
        if let Some(idx) = dismissed {
            model.dismiss_toast(idx);
        }
    }
}
