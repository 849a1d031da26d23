//! 状态存储 (State Store)
//!
//! 纯数据 + 校验。并发访问由 `Monitor` 外层的互斥锁串行化,
//! 这里的方法都假定调用方已持有锁。

use super::types::{
    Alert, AlertStatus, AnomalyType, Camera, SystemStatus, THRESHOLD_MAX, THRESHOLD_MIN,
};
use crate::error::StateError;
use chrono::{DateTime, Local};

pub const DEFAULT_THRESHOLD: u8 = 80;

#[derive(Debug, Clone)]
pub struct SystemState {
    status: SystemStatus,
    confidence_threshold: u8,
    cameras: Vec<Camera>,
    alerts: Vec<Alert>,
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl SystemState {
    /// 初始阈值超出范围时回退到默认值
    pub fn new(threshold: u8) -> Self {
        let confidence_threshold = if (THRESHOLD_MIN..=THRESHOLD_MAX).contains(&threshold) {
            threshold
        } else {
            DEFAULT_THRESHOLD
        };
        Self {
            status: SystemStatus::Stopped,
            confidence_threshold,
            cameras: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn status(&self) -> SystemStatus {
        self.status
    }

    pub fn set_status(&mut self, status: SystemStatus) {
        self.status = status;
    }

    pub fn confidence_threshold(&self) -> u8 {
        self.confidence_threshold
    }

    /// 仅当 50 <= value <= 100 时写入
    pub fn set_threshold(&mut self, value: i32) -> Result<(), StateError> {
        if value < THRESHOLD_MIN as i32 || value > THRESHOLD_MAX as i32 {
            return Err(StateError::ThresholdOutOfRange(value));
        }
        self.confidence_threshold = value as u8;
        Ok(())
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn camera(&self, id: &str) -> Option<&Camera> {
        self.cameras.iter().find(|c| c.id == id)
    }

    pub fn has_camera(&self, id: &str) -> bool {
        self.camera(id).is_some()
    }

    pub fn register_camera(&mut self, camera: Camera) -> Result<(), StateError> {
        if self.has_camera(&camera.id) {
            return Err(StateError::DuplicateCamera(camera.id));
        }
        self.cameras.push(camera);
        Ok(())
    }

    pub fn unregister_camera(&mut self, id: &str) -> Result<Camera, StateError> {
        let idx = self
            .cameras
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StateError::UnknownCamera(id.to_string()))?;
        Ok(self.cameras.remove(idx))
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn pending_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| a.is_pending())
    }

    /// 分配下一个告警ID并写入历史, 同时把系统状态置为 Alert
    pub fn record_alert(
        &mut self,
        camera_id: &str,
        anomaly_type: AnomalyType,
        confidence: u8,
        created_at: DateTime<Local>,
    ) -> Result<Alert, StateError> {
        if !self.has_camera(camera_id) {
            return Err(StateError::UnknownCamera(camera_id.to_string()));
        }
        let alert = Alert {
            alert_id: self.alerts.len() as u64 + 1,
            camera_id: camera_id.to_string(),
            anomaly_type,
            confidence: confidence.min(100),
            created_at,
            status: AlertStatus::New,
        };
        self.alerts.push(alert.clone());
        self.status = SystemStatus::Alert;
        Ok(alert)
    }

    /// 重复确认视为成功, 状态保持 Acknowledged
    pub fn acknowledge_alert(&mut self, alert_id: u64) -> Result<Alert, StateError> {
        let alert = self
            .alerts
            .iter_mut()
            .find(|a| a.alert_id == alert_id)
            .ok_or(StateError::AlertNotFound(alert_id))?;
        alert.status = AlertStatus::Acknowledged;
        Ok(alert.clone())
    }
}
