//! 监控面板配置 - 通过JSON文件调整参数

use crate::error::ConfigError;
use crate::monitor::types::{AnomalyType, Camera};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 模拟参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub frame_interval_ms: u64,     // 每轮间隔 (帧率 & 取消延迟上限)
    pub detection_probability: f64, // 每轮触发告警的概率
    pub confidence_min: u8,         // 告警置信度下限
    pub confidence_max: u8,         // 告警置信度上限
    pub frame_width: u32,
    pub frame_height: u32,
    pub marker_count: usize,        // 随机亮点数量
    pub font_path: Option<PathBuf>, // 叠加字幕字体 (TTF)
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
            detection_probability: 0.001,
            confidence_min: 75,
            confidence_max: 95,
            frame_width: 320,
            frame_height: 240,
            marker_count: 10,
            font_path: None,
        }
    }
}

impl SimulationConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// 演示用定时告警
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAlert {
    pub delay_ms: u64,
    pub camera_id: String,
    pub anomaly: AnomalyType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub enabled: bool,
    pub start_delay_ms: u64, // 启动后自动开始监控的延迟
    pub alerts: Vec<ScheduledAlert>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_delay_ms: 1000,
            alerts: vec![
                ScheduledAlert {
                    delay_ms: 3000,
                    camera_id: "sim1".into(),
                    anomaly: AnomalyType::Intruder,
                },
                ScheduledAlert {
                    delay_ms: 7000,
                    camera_id: "sim3".into(),
                    anomaly: AnomalyType::AbandonedObject,
                },
                ScheduledAlert {
                    delay_ms: 12000,
                    camera_id: "sim2".into(),
                    anomaly: AnomalyType::SuspiciousMovement,
                },
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: i32,
    pub height: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Sistema de Seguridad con IA".into(),
            width: 1000,
            height: 650,
        }
    }
}

/// 监控面板全部配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub initial_threshold: u8,
    pub simulation: SimulationConfig,
    pub cameras: Vec<Camera>, // 启动时注册
    pub presets: Vec<Camera>, // "添加摄像头" 对话框可选项
    pub demo: DemoConfig,
    pub window: WindowConfig,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 80,
            simulation: SimulationConfig::default(),
            cameras: vec![
                Camera::simulated("sim1", "Cam1", "Caja"),
                Camera::simulated("sim2", "Cam 2", "Pasillo 1"),
                Camera::simulated("sim3", "Cam 3", "Pasillo 2"),
                Camera::simulated("sim4", "Cam 4", "Pasillo 3"),
            ],
            presets: vec![
                Camera::device("0", "Cámara web", "Desconocida", "0"),
                Camera::simulated("sim5", "Cámara simulada 5", "Almacén"),
                Camera::simulated("sim6", "Cámara simulada 6", "Entrada del establecimiento"),
            ],
            demo: DemoConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl SentinelConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写出默认配置; 解析失败时使用默认值。
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Self>(&json) {
                Ok(config) => {
                    tracing::info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    tracing::warn!("⚠️ 默认配置写入失败: {}", e);
                }
                config
            }
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        tracing::info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if !(0.0..=1.0).contains(&sim.detection_probability) {
            return Err(ConfigError::Invalid(format!(
                "detection_probability must be within [0, 1], got {}",
                sim.detection_probability
            )));
        }
        if sim.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("frame_interval_ms must be > 0".into()));
        }
        if sim.confidence_min > sim.confidence_max || sim.confidence_max > 100 {
            return Err(ConfigError::Invalid(format!(
                "confidence range {}..={} is not a valid percentage range",
                sim.confidence_min, sim.confidence_max
            )));
        }
        if sim.frame_width == 0 || sim.frame_height == 0 {
            return Err(ConfigError::Invalid("frame size must be non-zero".into()));
        }
        let max = u32::from(u16::MAX);
        if sim.frame_width > max || sim.frame_height > max {
            return Err(ConfigError::Invalid(format!(
                "frame size {}x{} exceeds {}x{}",
                sim.frame_width, sim.frame_height, max, max
            )));
        }
        if !(50..=100).contains(&self.initial_threshold) {
            return Err(ConfigError::Invalid(format!(
                "initial_threshold must be within [50, 100], got {}",
                self.initial_threshold
            )));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        tracing::info!(
            "🎛️ 当前配置: 间隔 {}ms | 告警概率 {} | 置信度 {}-{}% | 阈值 {}% | 摄像头 {} | 演示 {}",
            self.simulation.frame_interval_ms,
            self.simulation.detection_probability,
            self.simulation.confidence_min,
            self.simulation.confidence_max,
            self.initial_threshold,
            self.cameras.len(),
            if self.demo.enabled { "开" } else { "关" },
        );
    }
}
