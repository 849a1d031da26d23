use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
/// 安防监控系统数据结构定义
/// Data structures for the security monitoring system

// ========== 公共常量 ==========

/// 置信度阈值允许范围 (百分比)
pub const THRESHOLD_MIN: u8 = 50;
pub const THRESHOLD_MAX: u8 = 100;

// ========== 枚举类型 ==========

/// 系统状态 (状态栏显示)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemStatus {
    Stopped,
    Monitoring,
    Alert,
}

impl SystemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SystemStatus::Stopped => "Stopped",
            SystemStatus::Monitoring => "Monitoring",
            SystemStatus::Alert => "Alert",
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 异常类型 (固定集合)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    SuspiciousMovement,
    AbandonedObject,
    Intruder,
    ExcessOfPeople,
}

impl AnomalyType {
    pub const ALL: [AnomalyType; 4] = [
        AnomalyType::SuspiciousMovement,
        AnomalyType::AbandonedObject,
        AnomalyType::Intruder,
        AnomalyType::ExcessOfPeople,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AnomalyType::SuspiciousMovement => "Suspicious movement",
            AnomalyType::AbandonedObject => "Abandoned object",
            AnomalyType::Intruder => "Intruder",
            AnomalyType::ExcessOfPeople => "Excess of people",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 告警生命周期: New → Acknowledged (单向)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    New,
    Acknowledged,
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::New => f.write_str("New"),
            AlertStatus::Acknowledged => f.write_str("Acknowledged"),
        }
    }
}

/// 视频源类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "device", rename_all = "snake_case")]
pub enum CameraSource {
    /// 合成画面
    Simulated,
    /// 物理采集设备 (设备索引或路径)
    Device(String),
}

// ========== 数据结构 ==========

/// 已注册摄像头, 注册后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    pub id: String,
    pub display_name: String,
    pub location: String,
    pub source: CameraSource,
}

impl Camera {
    pub fn simulated(id: impl Into<String>, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: name.into(),
            location: location.into(),
            source: CameraSource::Simulated,
        }
    }

    pub fn device(
        id: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: name.into(),
            location: location.into(),
            source: CameraSource::Device(device.into()),
        }
    }

    /// 画面标题 "名称 (位置)"
    pub fn title(&self) -> String {
        format!("{} ({})", self.display_name, self.location)
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.source, CameraSource::Simulated)
    }
}

/// 添加摄像头请求 (渲染线程 → 监控系统)
pub type AddCameraRequest = Camera;

/// 告警记录
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub alert_id: u64,
    pub camera_id: String,
    pub anomaly_type: AnomalyType,
    pub confidence: u8,
    pub created_at: DateTime<Local>,
    pub status: AlertStatus,
}

impl Alert {
    pub fn is_pending(&self) -> bool {
        self.status == AlertStatus::New
    }
}

/// 一帧画面 (工作线程 → 渲染线程)
#[derive(Clone)]
pub struct Frame {
    pub rgba_data: Arc<Vec<u8>>, // 使用Arc共享数据,避免复制
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Local>,
    /// 叠加文字 (无字体时由界面绘制)
    pub caption: Vec<String>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba_data.len())
            .field("captured_at", &self.captured_at)
            .field("caption", &self.caption)
            .finish()
    }
}
