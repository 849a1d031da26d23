//! 面板视图模型 (纯数据, 不依赖窗口)
//!
//! 渲染线程每帧把 `MonitorEvent` 交给 `apply`, 绘制层只读取这里的结果。

use crate::monitor::{Alert, AlertStatus, Camera, Frame, MonitorEvent, SystemStatus};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const HISTORY_TIME_FORMAT: &str = "%H:%M:%S";
pub const CLOCK_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
pub const TILE_COLUMNS: usize = 2;

/// 提示消息保留时长
pub const TOAST_TTL: Duration = Duration::from_secs(4);
const MAX_TOASTS: usize = 5;

/// 一路摄像头画面
pub struct FeedTile {
    pub camera: Camera,
    pub latest: Option<Frame>,
    /// 每收到一帧递增, 绘制层据此判断纹理是否需要更新
    pub revision: u64,
}

impl FeedTile {
    fn new(camera: Camera) -> Self {
        Self {
            camera,
            latest: None,
            revision: 0,
        }
    }

    pub fn title(&self) -> String {
        self.camera.title()
    }

    /// 未烧录进画面的字幕行
    pub fn caption(&self) -> &[String] {
        self.latest.as_ref().map(|f| f.caption.as_slice()).unwrap_or(&[])
    }
}

/// 历史表格一行
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub alert_id: u64,
    pub time: String,
    pub camera: String,
    pub anomaly: String,
    pub acknowledged: bool,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub title: String,
    pub body: String,
    pub posted_at: Instant,
}

/// "sim3" → "Camera 3", 物理设备 "0" → "Camera 0"
pub fn camera_label(camera_id: &str) -> String {
    format!("Camera {}", camera_id.strip_prefix("sim").unwrap_or(camera_id))
}

pub fn clock_text(now: DateTime<Local>) -> String {
    now.format(CLOCK_FORMAT).to_string()
}

pub struct DashboardModel {
    status: SystemStatus,
    tiles: Vec<FeedTile>,
    alerts: Vec<Alert>,
    toasts: VecDeque<Toast>,
    frames_received: u64,
}

impl Default for DashboardModel {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl DashboardModel {
    pub fn new(cameras: &[Camera]) -> Self {
        Self {
            status: SystemStatus::Stopped,
            tiles: cameras.iter().cloned().map(FeedTile::new).collect(),
            alerts: Vec::new(),
            toasts: VecDeque::new(),
            frames_received: 0,
        }
    }

    pub fn apply(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Frame { camera_id, frame } => {
                if let Some(tile) = self.tiles.iter_mut().find(|t| t.camera.id == camera_id) {
                    tile.latest = Some(frame);
                    tile.revision += 1;
                    self.frames_received += 1;
                }
            }
            MonitorEvent::Alert(alert) => {
                if !self.alerts.iter().any(|a| a.alert_id == alert.alert_id) {
                    self.alerts.push(alert);
                }
            }
            MonitorEvent::AlertAcknowledged(alert) => {
                match self.alerts.iter_mut().find(|a| a.alert_id == alert.alert_id) {
                    Some(existing) => existing.status = AlertStatus::Acknowledged,
                    None => self.alerts.push(alert),
                }
            }
            MonitorEvent::StatusChanged(status) => self.status = status,
            MonitorEvent::Message { title, body } => {
                self.toasts.push_back(Toast {
                    title,
                    body,
                    posted_at: Instant::now(),
                });
                while self.toasts.len() > MAX_TOASTS {
                    self.toasts.pop_front();
                }
            }
            MonitorEvent::CameraAdded(camera) => {
                if !self.tiles.iter().any(|t| t.camera.id == camera.id) {
                    self.tiles.push(FeedTile::new(camera));
                }
            }
            MonitorEvent::CameraRemoved(camera_id) => {
                self.tiles.retain(|t| t.camera.id != camera_id);
            }
        }
    }

    /// 依次应用一批事件, 返回处理数量
    pub fn apply_all(&mut self, events: impl IntoIterator<Item = MonitorEvent>) -> usize {
        let mut count = 0;
        for event in events {
            self.apply(event);
            count += 1;
        }
        count
    }

    pub fn status(&self) -> SystemStatus {
        self.status
    }

    pub fn status_label(&self) -> String {
        format!("Estado: {}", self.status)
    }

    pub fn tiles(&self) -> &[FeedTile] {
        &self.tiles
    }

    /// 按行分组 (每行 `TILE_COLUMNS` 个)
    pub fn tile_rows(&self) -> impl Iterator<Item = &[FeedTile]> {
        self.tiles.chunks(TILE_COLUMNS)
    }

    pub fn has_camera(&self, camera_id: &str) -> bool {
        self.tiles.iter().any(|t| t.camera.id == camera_id)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// 待处理告警, 最新的在前
    pub fn active_alerts(&self) -> Vec<&Alert> {
        self.alerts.iter().rev().filter(|a| a.is_pending()).collect()
    }

    pub fn history_rows(&self) -> Vec<HistoryRow> {
        self.alerts
            .iter()
            .map(|a| HistoryRow {
                alert_id: a.alert_id,
                time: a.created_at.format(HISTORY_TIME_FORMAT).to_string(),
                camera: camera_label(&a.camera_id),
                anomaly: a.anomaly_type.label().to_string(),
                acknowledged: !a.is_pending(),
            })
            .collect()
    }

    pub fn toasts(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    /// 移除超过 `ttl` 的提示
    pub fn expire_toasts(&mut self, now: Instant, ttl: Duration) {
        self.toasts
            .retain(|t| now.saturating_duration_since(t.posted_at) < ttl);
    }

    pub fn dismiss_toast(&mut self, index: usize) {
        self.toasts.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::AnomalyType;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn frame() -> Frame {
        Frame {
            rgba_data: Arc::new(vec![0; 4]),
            width: 1,
            height: 1,
            captured_at: Local::now(),
            caption: vec!["Cam1 - Caja".into()],
        }
    }

    fn alert(id: u64, camera: &str) -> Alert {
        Alert {
            alert_id: id,
            camera_id: camera.into(),
            anomaly_type: AnomalyType::Intruder,
            confidence: 90,
            created_at: Local.with_ymd_and_hms(2026, 3, 4, 9, 5, 7).unwrap(),
            status: AlertStatus::New,
        }
    }

    fn model() -> DashboardModel {
        DashboardModel::new(&[
            Camera::simulated("sim1", "Cam1", "Caja"),
            Camera::simulated("sim2", "Cam 2", "Pasillo 1"),
            Camera::simulated("sim3", "Cam 3", "Pasillo 2"),
        ])
    }

    #[test]
    fn camera_labels_strip_sim_prefix() {
        assert_eq!(camera_label("sim3"), "Camera 3");
        assert_eq!(camera_label("0"), "Camera 0");
    }

    #[test]
    fn clock_uses_day_first_format() {
        let t = Local.with_ymd_and_hms(2026, 3, 4, 9, 5, 7).unwrap();
        assert_eq!(clock_text(t), "04/03/2026 09:05:07");
    }

    #[test]
    fn frames_update_only_known_tiles() {
        let mut m = model();
        m.apply(MonitorEvent::Frame {
            camera_id: "sim1".into(),
            frame: frame(),
        });
        m.apply(MonitorEvent::Frame {
            camera_id: "ghost".into(),
            frame: frame(),
        });
        assert_eq!(m.tiles()[0].revision, 1);
        assert_eq!(m.tiles()[0].caption(), ["Cam1 - Caja".to_string()]);
        assert_eq!(m.tiles()[1].revision, 0);
        assert_eq!(m.frames_received(), 1);
    }

    #[test]
    fn tiles_are_laid_out_two_per_row() {
        let m = model();
        let rows: Vec<usize> = m.tile_rows().map(|r| r.len()).collect();
        assert_eq!(rows, vec![2, 1]);
    }

    #[test]
    fn camera_added_and_removed_update_tiles() {
        let mut m = model();
        m.apply(MonitorEvent::CameraAdded(Camera::simulated("sim5", "Cámara simulada 5", "Almacén")));
        m.apply(MonitorEvent::CameraAdded(Camera::simulated("sim5", "dup", "dup")));
        assert_eq!(m.tiles().len(), 4);
        assert_eq!(m.tiles()[3].title(), "Cámara simulada 5 (Almacén)");

        m.apply(MonitorEvent::CameraRemoved("sim2".into()));
        assert!(!m.has_camera("sim2"));
        assert_eq!(m.tiles().len(), 3);
    }

    #[test]
    fn acknowledged_alerts_leave_active_panel_but_stay_in_history() {
        let mut m = model();
        m.apply_all([
            MonitorEvent::StatusChanged(SystemStatus::Monitoring),
            MonitorEvent::Alert(alert(1, "sim1")),
            MonitorEvent::Alert(alert(2, "sim3")),
            MonitorEvent::StatusChanged(SystemStatus::Alert),
        ]);
        assert_eq!(m.status_label(), "Estado: Alert");
        let active: Vec<u64> = m.active_alerts().iter().map(|a| a.alert_id).collect();
        assert_eq!(active, vec![2, 1]);

        let mut acked = alert(1, "sim1");
        acked.status = AlertStatus::Acknowledged;
        m.apply(MonitorEvent::AlertAcknowledged(acked));

        let active: Vec<u64> = m.active_alerts().iter().map(|a| a.alert_id).collect();
        assert_eq!(active, vec![2]);

        let rows = m.history_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            HistoryRow {
                alert_id: 1,
                time: "09:05:07".into(),
                camera: "Camera 1".into(),
                anomaly: "Intruder".into(),
                acknowledged: true,
            }
        );
        assert!(!rows[1].acknowledged);
    }

    #[test]
    fn duplicate_alert_events_are_ignored() {
        let mut m = model();
        m.apply(MonitorEvent::Alert(alert(1, "sim1")));
        m.apply(MonitorEvent::Alert(alert(1, "sim1")));
        assert_eq!(m.history_rows().len(), 1);
    }

    #[test]
    fn toasts_expire_and_are_capped() {
        let mut m = model();
        for i in 0..8 {
            m.apply(MonitorEvent::Message {
                title: "Monitoring".into(),
                body: format!("#{}", i),
            });
        }
        assert_eq!(m.toasts().count(), MAX_TOASTS);
        assert_eq!(m.toasts().next().map(|t| t.body.as_str()), Some("#3"));

        m.dismiss_toast(0);
        assert_eq!(m.toasts().count(), MAX_TOASTS - 1);

        m.expire_toasts(Instant::now() + TOAST_TTL, TOAST_TTL);
        assert_eq!(m.toasts().count(), 0);
    }
}
