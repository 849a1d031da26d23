/// 命令 / 事件接口
///
/// 渲染线程 → 监控系统: `MonitorCommands`
/// 监控系统 → 渲染线程: `EventSink`
///
/// 界面不是线程安全的, 工作线程只能通过 `ChannelSink` 投递事件,
/// 由渲染线程每帧统一取出处理。
use super::types::{AddCameraRequest, Alert, Camera, Frame, SystemStatus};
use crate::error::Result;
use crossbeam_channel::{Receiver, Sender};

/// 界面可发出的命令
pub trait MonitorCommands: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn set_threshold(&self, value: i32) -> Result<()>;
    fn add_camera(&self, request: AddCameraRequest) -> Result<Camera>;
    fn remove_camera(&self, camera_id: &str) -> Result<Camera>;
    fn acknowledge(&self, alert_id: u64) -> Result<Alert>;
}

/// 监控系统发往界面的事件
pub trait EventSink: Send + Sync {
    fn on_frame(&self, camera_id: &str, frame: Frame);
    fn on_alert(&self, alert: &Alert);
    fn on_status_changed(&self, status: SystemStatus);
    fn on_message(&self, title: &str, body: &str);

    fn on_camera_added(&self, _camera: &Camera) {}
    fn on_camera_removed(&self, _camera_id: &str) {}
    fn on_alert_acknowledged(&self, _alert: &Alert) {}
}

#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Frame { camera_id: String, frame: Frame },
    Alert(Alert),
    AlertAcknowledged(Alert),
    StatusChanged(SystemStatus),
    Message { title: String, body: String },
    CameraAdded(Camera),
    CameraRemoved(String),
}

/// 线程安全的投递通道: 任意线程 post, 渲染线程 drain
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<MonitorEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<MonitorEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    fn post(&self, event: MonitorEvent) {
        if let Err(err) = self.tx.send(event) {
            tracing::warn!("界面事件投递失败 (接收端已关闭): {:?}", event_kind(&err.0));
        }
    }
}

fn event_kind(event: &MonitorEvent) -> &'static str {
    match event {
        MonitorEvent::Frame { .. } => "frame",
        MonitorEvent::Alert(_) => "alert",
        MonitorEvent::AlertAcknowledged(_) => "alert_acknowledged",
        MonitorEvent::StatusChanged(_) => "status",
        MonitorEvent::Message { .. } => "message",
        MonitorEvent::CameraAdded(_) => "camera_added",
        MonitorEvent::CameraRemoved(_) => "camera_removed",
    }
}

impl EventSink for ChannelSink {
    fn on_frame(&self, camera_id: &str, frame: Frame) {
        self.post(MonitorEvent::Frame {
            camera_id: camera_id.to_string(),
            frame,
        });
    }

    fn on_alert(&self, alert: &Alert) {
        self.post(MonitorEvent::Alert(alert.clone()));
    }

    fn on_status_changed(&self, status: SystemStatus) {
        self.post(MonitorEvent::StatusChanged(status));
    }

    fn on_message(&self, title: &str, body: &str) {
        self.post(MonitorEvent::Message {
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    fn on_camera_added(&self, camera: &Camera) {
        self.post(MonitorEvent::CameraAdded(camera.clone()));
    }

    fn on_camera_removed(&self, camera_id: &str) {
        self.post(MonitorEvent::CameraRemoved(camera_id.to_string()));
    }

    fn on_alert_acknowledged(&self, alert: &Alert) {
        self.post(MonitorEvent::AlertAcknowledged(alert.clone()));
    }
}
