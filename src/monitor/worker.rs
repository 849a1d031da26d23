/// 摄像头工作线程 (Per-camera worker)
///
/// 每轮: 取帧 → 投递界面 → 低概率触发告警 → 可中断休眠。
/// 以下任一情况退出循环:
/// - 停止通道断开 (stop)
/// - 运行代数ID已过期 (stop 后立即 start)
/// - 摄像头已被注销
/// - 视频源读帧失败
use super::types::AnomalyType;
use super::Shared;
use crate::input::FrameSource;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::{Arc, Mutex, PoisonError};

/// 物理设备句柄在多次 start/stop 之间复用
pub(crate) type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

pub(crate) enum WorkerSource {
    Owned(Box<dyn FrameSource>),
    Shared(SharedSource),
}

pub(crate) struct CameraWorker {
    pub camera_id: String,
    pub generation: usize,
    pub shared: Arc<Shared>,
    pub source: WorkerSource,
    pub stop_rx: Receiver<()>,
}

impl CameraWorker {
    pub fn run(mut self) {
        tracing::info!("🎥 摄像头 {} 工作线程启动 (Gen: {})", self.camera_id, self.generation);
        let interval = self.shared.sim.frame_interval();
        let mut rng = rand::thread_rng();
        let mut frames: u64 = 0;

        loop {
            if !self.shared.is_live(self.generation) {
                break;
            }

            let camera = match self.shared.camera(&self.camera_id) {
                Some(camera) => camera,
                None => {
                    tracing::info!("📷 摄像头 {} 已注销, 工作线程退出", self.camera_id);
                    break;
                }
            };

            let frame = match &mut self.source {
                WorkerSource::Owned(source) => source.next_frame(&camera),
                WorkerSource::Shared(source) => source
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .next_frame(&camera),
            };
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!("❌ 摄像头 {} 读帧失败, 工作线程结束: {}", self.camera_id, err);
                    break;
                }
            };

            if !self.shared.deliver_frame(self.generation, &self.camera_id, frame) {
                break;
            }
            frames += 1;

            if rng.gen_bool(self.shared.sim.detection_probability) {
                let anomaly = *AnomalyType::ALL
                    .choose(&mut rng)
                    .unwrap_or(&AnomalyType::SuspiciousMovement);
                let confidence =
                    rng.gen_range(self.shared.sim.confidence_min..=self.shared.sim.confidence_max);
                self.shared
                    .raise_alert(Some(self.generation), &self.camera_id, anomaly, confidence);
            }

            match self.stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!(
            "🛑 摄像头 {} 工作线程退出 (Gen: {}, 共{}帧)",
            self.camera_id,
            self.generation,
            frames
        );
    }
}
