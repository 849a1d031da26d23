//! 监控系统 (Monitoring System)
//!
//! 一个摄像头一个工作线程 + 主线程渲染:
//! - Monitor:      编排 start/stop, 持有状态存储与线程注册表
//! - CameraWorker: 取帧 → 投递 → 模拟告警 (独立线程)
//! - Timers:       演示用一次性定时告警 (可取消)
//!
//! 状态存储是唯一的共享可变资源, 所有修改都在同一把锁内完成。

pub mod events;
pub mod state;
pub mod timers;
pub mod types;
mod worker;

pub use events::{ChannelSink, EventSink, MonitorCommands, MonitorEvent};
pub use state::SystemState;
pub use timers::{TimerId, Timers};
pub use types::{
    AddCameraRequest, Alert, AlertStatus, AnomalyType, Camera, CameraSource, Frame, SystemStatus,
};

use crate::config::{DemoConfig, SentinelConfig, SimulationConfig};
use crate::error::{MonitorError, Result, StateError};
use crate::input::{load_font, CaptureBackend, SyntheticSource};
use ab_glyph::FontVec;
use chrono::Local;
use crossbeam_channel::{Receiver, Sender};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use worker::{CameraWorker, SharedSource, WorkerSource};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 工作线程与定时器共享的部分
pub(crate) struct Shared {
    state: Mutex<SystemState>,
    sink: Arc<dyn EventSink>,
    sim: SimulationConfig,
    font: Option<Arc<FontVec>>,
    running: AtomicBool,
    /// 运行代数ID, 每次 start 递增
    generation: AtomicUsize,
}

impl Shared {
    fn is_live(&self, generation: usize) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn camera(&self, id: &str) -> Option<Camera> {
        lock(&self.state).camera(id).cloned()
    }

    /// 与 stop 在同一把锁下判断, stop 返回后不会再有新帧送达界面
    fn deliver_frame(&self, generation: usize, camera_id: &str, frame: Frame) -> bool {
        let _state = lock(&self.state);
        if !self.is_live(generation) {
            return false;
        }
        self.sink.on_frame(camera_id, frame);
        true
    }

    /// `generation` 为 None 时只要求监控处于运行中
    fn raise_alert(
        &self,
        generation: Option<usize>,
        camera_id: &str,
        anomaly: AnomalyType,
        confidence: u8,
    ) -> Option<Alert> {
        let mut state = lock(&self.state);
        let live = match generation {
            Some(generation) => self.is_live(generation),
            None => self.running.load(Ordering::SeqCst),
        };
        if !live {
            tracing::debug!("监控未运行, 忽略 {} 的告警 {}", camera_id, anomaly);
            return None;
        }
        match state.record_alert(camera_id, anomaly, confidence, Local::now()) {
            Ok(alert) => {
                tracing::warn!(
                    "🚨 告警 #{}: {} @ {} (置信度 {}%)",
                    alert.alert_id,
                    alert.anomaly_type,
                    alert.camera_id,
                    alert.confidence
                );
                // 锁内投递, 界面收到的告警顺序与ID顺序一致
                self.sink.on_alert(&alert);
                self.sink.on_status_changed(SystemStatus::Alert);
                Some(alert)
            }
            Err(err) => {
                tracing::warn!("⚠️ 告警未记录: {}", err);
                None
            }
        }
    }
}

/// 一次监控运行期间的线程注册表
struct Run {
    generation: usize,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
    workers: HashMap<String, JoinHandle<()>>,
    /// 本次运行布置的演示告警
    demo_alerts: Vec<TimerId>,
}

struct Inner {
    shared: Arc<Shared>,
    backend: Box<dyn CaptureBackend>,
    demo: DemoConfig,
    run: Mutex<Option<Run>>,
    devices: Mutex<HashMap<String, SharedSource>>,
    timers: Timers,
    /// 已停止但尚未 join 的线程
    retired: Mutex<Vec<JoinHandle<()>>>,
}

/// 监控编排器, 可在线程间克隆共享
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    pub fn new(
        config: &SentinelConfig,
        sink: Arc<dyn EventSink>,
        backend: Box<dyn CaptureBackend>,
    ) -> Self {
        let mut sim = config.simulation.clone();
        sim.detection_probability = sim.detection_probability.clamp(0.0, 1.0);
        sim.frame_interval_ms = sim.frame_interval_ms.max(1);
        sim.confidence_max = sim.confidence_max.min(100);
        sim.confidence_min = sim.confidence_min.min(sim.confidence_max);

        let font = sim.font_path.as_deref().and_then(load_font).map(Arc::new);

        let shared = Arc::new(Shared {
            state: Mutex::new(SystemState::new(config.initial_threshold)),
            sink,
            sim,
            font,
            running: AtomicBool::new(false),
            generation: AtomicUsize::new(0),
        });

        Self {
            inner: Arc::new(Inner {
                shared,
                backend,
                demo: config.demo.clone(),
                run: Mutex::new(None),
                devices: Mutex::new(HashMap::new()),
                timers: Timers::new(),
                retired: Mutex::new(Vec::new()),
            }),
        }
    }

    fn shared(&self) -> &Shared {
        &self.inner.shared
    }

    fn sink(&self) -> &dyn EventSink {
        self.inner.shared.sink.as_ref()
    }

    // ========== 只读访问 ==========

    pub fn is_running(&self) -> bool {
        lock(&self.inner.run).is_some()
    }

    pub fn status(&self) -> SystemStatus {
        lock(&self.shared().state).status()
    }

    pub fn confidence_threshold(&self) -> u8 {
        lock(&self.shared().state).confidence_threshold()
    }

    pub fn cameras(&self) -> Vec<Camera> {
        lock(&self.shared().state).cameras().to_vec()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.shared().state).alerts().to_vec()
    }

    pub fn snapshot(&self) -> SystemState {
        lock(&self.shared().state).clone()
    }

    /// 仍在运行的工作线程数量
    pub fn active_workers(&self) -> usize {
        lock(&self.inner.run)
            .as_ref()
            .map(|run| run.workers.values().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    pub fn capture_backend(&self) -> &dyn CaptureBackend {
        self.inner.backend.as_ref()
    }

    // ========== 摄像头 ==========

    /// 启动时批量注册, 失败只记录日志
    pub fn enroll(&self, cameras: &[Camera]) {
        for camera in cameras {
            if let Err(err) = self.add_camera(camera.clone()) {
                tracing::warn!("⚠️ 摄像头 {} 未注册: {}", camera.id, err);
            }
        }
    }

    fn spawn_worker(&self, run: &mut Run, camera: &Camera) {
        if let Some(handle) = run.workers.get(&camera.id) {
            if !handle.is_finished() {
                tracing::debug!("摄像头 {} 已有工作线程", camera.id);
                return;
            }
        }

        let shared = self.inner.shared.clone();
        let source = match &camera.source {
            CameraSource::Simulated => WorkerSource::Owned(Box::new(SyntheticSource::new(
                shared.sim.frame_width,
                shared.sim.frame_height,
                shared.sim.marker_count,
                shared.font.clone(),
            ))),
            CameraSource::Device(_) => match lock(&self.inner.devices).get(&camera.id) {
                Some(source) => WorkerSource::Shared(source.clone()),
                None => {
                    tracing::warn!("⚠️ 摄像头 {} 没有已打开的设备", camera.id);
                    return;
                }
            },
        };

        let worker = CameraWorker {
            camera_id: camera.id.clone(),
            generation: run.generation,
            shared,
            source,
            stop_rx: run.stop_rx.clone(),
        };
        match std::thread::Builder::new()
            .name(format!("camera-{}", camera.id))
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                if let Some(old) = run.workers.insert(camera.id.clone(), handle) {
                    lock(&self.inner.retired).push(old);
                }
            }
            Err(err) => {
                tracing::error!("❌ 摄像头 {} 工作线程创建失败: {}", camera.id, err);
            }
        }
    }

    // ========== 告警 ==========

    /// 以配置的置信度范围为指定摄像头生成一条告警 (监控未运行时忽略)
    pub fn raise_alert(&self, camera_id: &str, anomaly: AnomalyType) -> Option<Alert> {
        let sim = &self.shared().sim;
        let confidence = rand::thread_rng().gen_range(sim.confidence_min..=sim.confidence_max);
        self.shared().raise_alert(None, camera_id, anomaly, confidence)
    }

    // ========== 演示 ==========

    /// 开始监控并布置配置中的定时告警
    pub fn start_demo(&self) -> Vec<TimerId> {
        self.start();
        let mut run = lock(&self.inner.run);
        let Some(current) = run.as_mut() else {
            return Vec::new();
        };
        let generation = current.generation;

        let ids: Vec<TimerId> = self
            .inner
            .demo
            .alerts
            .iter()
            .map(|scheduled| {
                let shared = Arc::downgrade(&self.inner.shared);
                let camera_id = scheduled.camera_id.clone();
                let anomaly = scheduled.anomaly;
                self.inner
                    .timers
                    .schedule(Duration::from_millis(scheduled.delay_ms), move || {
                        if let Some(shared) = shared.upgrade() {
                            let sim = &shared.sim;
                            let confidence =
                                rand::thread_rng().gen_range(sim.confidence_min..=sim.confidence_max);
                            shared.raise_alert(Some(generation), &camera_id, anomaly, confidence);
                        }
                    })
            })
            .collect();
        current.demo_alerts.extend(ids.iter().copied());
        ids
    }

    /// 延迟 `start_delay_ms` 后自动执行 `start_demo`
    pub fn schedule_demo(&self) -> Option<TimerId> {
        if !self.inner.demo.enabled {
            return None;
        }
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let delay = Duration::from_millis(self.inner.demo.start_delay_ms);
        tracing::info!("⏱️ {}ms 后自动开始演示", self.inner.demo.start_delay_ms);
        Some(self.inner.timers.schedule(delay, move || {
            if let Some(inner) = weak.upgrade() {
                Monitor { inner }.start_demo();
            }
        }))
    }

    pub fn cancel_scheduled(&self, id: TimerId) -> bool {
        self.inner.timers.cancel(id)
    }

    pub fn pending_scheduled(&self) -> usize {
        self.inner.timers.pending_count()
    }

    /// 停止监控并等待所有线程退出 (窗口关闭时调用)
    pub fn shutdown(&self) {
        self.stop();
        self.inner.timers.shutdown();
        let handles: Vec<JoinHandle<()>> = lock(&self.inner.retired).drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        lock(&self.inner.devices).clear();
        tracing::info!("👋 监控系统已关闭");
    }
}

impl MonitorCommands for Monitor {
    fn start(&self) {
        let mut run = lock(&self.inner.run);
        if run.is_some() {
            tracing::debug!("监控已在运行");
            return;
        }

        let shared = self.shared();
        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cameras = {
            let mut state = lock(&shared.state);
            shared.running.store(true, Ordering::SeqCst);
            state.set_status(SystemStatus::Monitoring);
            self.sink().on_status_changed(SystemStatus::Monitoring);
            state.cameras().to_vec()
        };

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        let mut current = Run {
            generation,
            stop_tx,
            stop_rx,
            workers: HashMap::new(),
            demo_alerts: Vec::new(),
        };
        for camera in &cameras {
            self.spawn_worker(&mut current, camera);
        }
        tracing::info!("🚀 监控开始 (Gen: {}, {}路摄像头)", generation, current.workers.len());
        *run = Some(current);
        drop(run);

        self.sink().on_message("Monitoring", "Monitoring started");
    }

    fn stop(&self) {
        let mut run = lock(&self.inner.run);
        let Some(current) = run.take() else {
            tracing::debug!("监控未运行");
            return;
        };

        let shared = self.shared();
        {
            let mut state = lock(&shared.state);
            shared.running.store(false, Ordering::SeqCst);
            state.set_status(SystemStatus::Stopped);
            self.sink().on_status_changed(SystemStatus::Stopped);
        }

        // 断开停止通道, 唤醒所有休眠中的工作线程
        drop(current.stop_tx);
        // 只取消本次运行的演示告警, 尚未触发的自动开始保留
        let cancelled = current
            .demo_alerts
            .iter()
            .filter(|id| self.inner.timers.cancel(**id))
            .count();

        let mut retired = lock(&self.inner.retired);
        retired.retain(|h| !h.is_finished());
        retired.extend(current.workers.into_values());
        drop(retired);
        drop(run);

        tracing::info!("🛑 监控停止 (Gen: {}, 取消定时告警 {} 个)", current.generation, cancelled);
        self.sink().on_message("Monitoring", "Monitoring stopped");
    }

    fn set_threshold(&self, value: i32) -> Result<()> {
        let result = lock(&self.shared().state).set_threshold(value);
        match &result {
            Ok(()) => {
                tracing::info!("🎚️ 告警阈值更新为 {}%", value);
                self.sink()
                    .on_message("Threshold updated", &format!("New alert threshold: {}%", value));
            }
            Err(err) => {
                tracing::warn!("⚠️ {}", err);
                self.sink()
                    .on_message("Error", "The threshold must be between 50% and 100%");
            }
        }
        result.map_err(MonitorError::from)
    }

    fn add_camera(&self, request: AddCameraRequest) -> Result<Camera> {
        let mut run = lock(&self.inner.run);

        if lock(&self.shared().state).has_camera(&request.id) {
            self.sink().on_message("Error", "This camera has already been added");
            return Err(StateError::DuplicateCamera(request.id).into());
        }

        let device = match &request.source {
            CameraSource::Simulated => None,
            CameraSource::Device(device) => match self.inner.backend.open(device) {
                Ok(source) => Some(Arc::new(Mutex::new(source))),
                Err(err) => {
                    tracing::warn!("❌ 摄像头 {} 连接失败: {}", request.id, err);
                    self.sink().on_message("Error", "Could not connect to the camera");
                    return Err(err.into());
                }
            },
        };

        lock(&self.shared().state).register_camera(request.clone())?;
        if let Some(device) = device {
            lock(&self.inner.devices).insert(request.id.clone(), device);
        }
        tracing::info!("📷 摄像头已注册: {} {}", request.id, request.title());
        self.sink().on_camera_added(&request);

        if let Some(current) = run.as_mut() {
            self.spawn_worker(current, &request);
        }
        Ok(request)
    }

    fn remove_camera(&self, camera_id: &str) -> Result<Camera> {
        let mut run = lock(&self.inner.run);
        let camera = lock(&self.shared().state).unregister_camera(camera_id)?;
        lock(&self.inner.devices).remove(camera_id);
        if let Some(current) = run.as_mut() {
            if let Some(handle) = current.workers.remove(camera_id) {
                lock(&self.inner.retired).push(handle);
            }
        }
        tracing::info!("🗑️ 摄像头已注销: {}", camera_id);
        self.sink().on_camera_removed(camera_id);
        Ok(camera)
    }

    fn acknowledge(&self, alert_id: u64) -> Result<Alert> {
        let shared = self.shared();
        let mut state = lock(&shared.state);
        let alert = match state.acknowledge_alert(alert_id) {
            Ok(alert) => alert,
            Err(err) => {
                drop(state);
                tracing::warn!("⚠️ {}", err);
                self.sink()
                    .on_message("Error", "Could not mark the alert as reviewed");
                return Err(err.into());
            }
        };

        // 全部确认后恢复为 Monitoring (停止状态保持不变)
        let reverted = state.status() == SystemStatus::Alert
            && state.pending_alerts().next().is_none()
            && shared.running.load(Ordering::SeqCst);
        if reverted {
            state.set_status(SystemStatus::Monitoring);
        }

        // 锁内投递, 避免与工作线程的告警事件乱序
        self.sink().on_alert_acknowledged(&alert);
        if reverted {
            self.sink().on_status_changed(SystemStatus::Monitoring);
        }
        drop(state);

        tracing::info!("✅ 告警 #{} 已确认", alert_id);
        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduledAlert;
    use crate::error::CaptureError;
    use crate::input::{FrameSource, UnavailableBackend};
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<MonitorEvent>>,
    }

    impl RecordingSink {
        fn push(&self, event: MonitorEvent) {
            lock(&self.events).push(event);
        }

        fn frames(&self, camera_id: &str) -> usize {
            lock(&self.events)
                .iter()
                .filter(|e| matches!(e, MonitorEvent::Frame { camera_id: id, .. } if id == camera_id))
                .count()
        }

        fn total_frames(&self) -> usize {
            lock(&self.events)
                .iter()
                .filter(|e| matches!(e, MonitorEvent::Frame { .. }))
                .count()
        }

        fn alert_ids(&self) -> Vec<u64> {
            lock(&self.events)
                .iter()
                .filter_map(|e| match e {
                    MonitorEvent::Alert(a) => Some(a.alert_id),
                    _ => None,
                })
                .collect()
        }

        fn messages(&self) -> Vec<(String, String)> {
            lock(&self.events)
                .iter()
                .filter_map(|e| match e {
                    MonitorEvent::Message { title, body } => Some((title.clone(), body.clone())),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn on_frame(&self, camera_id: &str, frame: Frame) {
            self.push(MonitorEvent::Frame {
                camera_id: camera_id.to_string(),
                frame,
            });
        }
        fn on_alert(&self, alert: &Alert) {
            self.push(MonitorEvent::Alert(alert.clone()));
        }
        fn on_status_changed(&self, status: SystemStatus) {
            self.push(MonitorEvent::StatusChanged(status));
        }
        fn on_message(&self, title: &str, body: &str) {
            self.push(MonitorEvent::Message {
                title: title.to_string(),
                body: body.to_string(),
            });
        }
    }

    /// 产出固定数量的帧后结束
    struct FiniteSource {
        remaining: usize,
    }

    impl FrameSource for FiniteSource {
        fn next_frame(&mut self, camera: &Camera) -> std::result::Result<Frame, CaptureError> {
            if self.remaining == 0 {
                return Err(CaptureError::EndOfStream);
            }
            self.remaining -= 1;
            Ok(SyntheticSource::new(8, 8, 0, None).render(camera, Local::now()))
        }
    }

    struct FiniteBackend(usize);

    impl CaptureBackend for FiniteBackend {
        fn open(&self, _device: &str) -> std::result::Result<Box<dyn FrameSource>, CaptureError> {
            Ok(Box::new(FiniteSource { remaining: self.0 }))
        }
    }

    fn test_config(interval_ms: u64, probability: f64) -> SentinelConfig {
        let mut config = SentinelConfig::default();
        config.simulation.frame_interval_ms = interval_ms;
        config.simulation.detection_probability = probability;
        config.simulation.frame_width = 16;
        config.simulation.frame_height = 12;
        config.simulation.font_path = None;
        config.demo.alerts.clear();
        config
    }

    fn monitor_with(config: &SentinelConfig) -> (Monitor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let monitor = Monitor::new(config, sink.clone(), Box::new(UnavailableBackend));
        (monitor, sink)
    }

    fn two_cameras(monitor: &Monitor) {
        monitor.add_camera(Camera::simulated("cam1", "Cam1", "Caja")).unwrap();
        monitor.add_camera(Camera::simulated("cam2", "Cam2", "Pasillo")).unwrap();
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn end_to_end_alert_lifecycle() {
        let (monitor, sink) = monitor_with(&test_config(10, 0.0));
        two_cameras(&monitor);
        monitor.start();
        assert_eq!(monitor.status(), SystemStatus::Monitoring);

        let alert = monitor.raise_alert("cam1", AnomalyType::Intruder).unwrap();
        assert_eq!(alert.alert_id, 1);
        assert_eq!(alert.anomaly_type, AnomalyType::Intruder);
        assert!((75..=95).contains(&alert.confidence));

        let history = monitor.alerts();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, AlertStatus::New);
        assert_eq!(monitor.status(), SystemStatus::Alert);
        assert_eq!(sink.alert_ids(), vec![1]);

        let acked = monitor.acknowledge(1).unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(monitor.alerts()[0].status, AlertStatus::Acknowledged);
        assert_eq!(monitor.status(), SystemStatus::Monitoring);

        monitor.shutdown();
    }

    #[test]
    fn status_stays_alert_while_other_alerts_pending() {
        let (monitor, _sink) = monitor_with(&test_config(10, 0.0));
        two_cameras(&monitor);
        monitor.start();
        monitor.raise_alert("cam1", AnomalyType::Intruder).unwrap();
        monitor.raise_alert("cam2", AnomalyType::ExcessOfPeople).unwrap();

        monitor.acknowledge(2).unwrap();
        assert_eq!(monitor.status(), SystemStatus::Alert);
        monitor.acknowledge(1).unwrap();
        assert_eq!(monitor.status(), SystemStatus::Monitoring);
        monitor.shutdown();
    }

    #[test]
    fn acknowledge_is_idempotent_and_unknown_fails() {
        let (monitor, sink) = monitor_with(&test_config(10, 0.0));
        two_cameras(&monitor);
        monitor.start();
        monitor.raise_alert("cam1", AnomalyType::AbandonedObject).unwrap();

        assert_eq!(monitor.acknowledge(1).unwrap().status, AlertStatus::Acknowledged);
        assert_eq!(monitor.acknowledge(1).unwrap().status, AlertStatus::Acknowledged);

        let err = monitor.acknowledge(42).unwrap_err();
        assert_eq!(err, MonitorError::State(StateError::AlertNotFound(42)));
        assert!(sink.messages().iter().any(|(t, _)| t == "Error"));
        assert_eq!(monitor.alerts().len(), 1);
        monitor.shutdown();
    }

    #[test]
    fn alerts_are_ignored_while_idle() {
        let (monitor, _sink) = monitor_with(&test_config(10, 0.0));
        two_cameras(&monitor);
        assert!(monitor.raise_alert("cam1", AnomalyType::Intruder).is_none());
        assert!(monitor.alerts().is_empty());
        assert_eq!(monitor.status(), SystemStatus::Stopped);
    }

    #[test]
    fn start_twice_spawns_one_worker_per_camera() {
        let (monitor, sink) = monitor_with(&test_config(10, 0.0));
        two_cameras(&monitor);
        monitor.start();
        monitor.start();
        assert_eq!(monitor.active_workers(), 2);

        let started = sink
            .messages()
            .iter()
            .filter(|(_, body)| body == "Monitoring started")
            .count();
        assert_eq!(started, 1);

        assert!(wait_until(Duration::from_secs(2), || {
            sink.frames("cam1") > 0 && sink.frames("cam2") > 0
        }));
        monitor.shutdown();
    }

    #[test]
    fn stop_halts_all_frame_delivery() {
        let (monitor, sink) = monitor_with(&test_config(10, 0.0));
        two_cameras(&monitor);
        monitor.start();
        assert!(wait_until(Duration::from_secs(2), || sink.total_frames() >= 4));

        monitor.stop();
        assert!(!monitor.is_running());
        assert_eq!(monitor.status(), SystemStatus::Stopped);
        assert_eq!(monitor.active_workers(), 0);

        let after_stop = sink.total_frames();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(sink.total_frames(), after_stop);

        // 第二次 stop 为空操作
        monitor.stop();
        let stopped = sink
            .messages()
            .iter()
            .filter(|(_, body)| body == "Monitoring stopped")
            .count();
        assert_eq!(stopped, 1);
        monitor.shutdown();
    }

    #[test]
    fn stop_then_restart_retires_old_workers() {
        let (monitor, sink) = monitor_with(&test_config(10, 0.0));
        two_cameras(&monitor);
        monitor.start();
        monitor.stop();
        monitor.start();
        assert_eq!(monitor.active_workers(), 2);

        let before = sink.frames("cam1");
        assert!(wait_until(Duration::from_secs(2), || sink.frames("cam1") > before + 2));
        monitor.shutdown();
        assert_eq!(monitor.active_workers(), 0);
    }

    #[test]
    fn concurrent_alert_ids_have_no_gaps() {
        let mut config = test_config(1, 1.0);
        config.cameras.clear();
        let (monitor, sink) = monitor_with(&config);
        for i in 0..4 {
            monitor
                .add_camera(Camera::simulated(format!("sim{}", i), format!("Cam {}", i), "Test"))
                .unwrap();
        }
        monitor.start();
        assert!(wait_until(Duration::from_secs(3), || monitor.alerts().len() >= 40));
        monitor.stop();

        let ids: Vec<u64> = monitor.alerts().iter().map(|a| a.alert_id).collect();
        let expected: Vec<u64> = (1..=ids.len() as u64).collect();
        assert_eq!(ids, expected);
        // 界面收到的顺序与ID顺序一致
        assert_eq!(sink.alert_ids(), expected);
        monitor.shutdown();
    }

    #[test]
    fn adding_camera_while_running_spawns_worker() {
        let (monitor, sink) = monitor_with(&test_config(10, 0.0));
        monitor.add_camera(Camera::simulated("cam1", "Cam1", "Caja")).unwrap();
        assert_eq!(monitor.active_workers(), 0);

        monitor.start();
        assert_eq!(monitor.active_workers(), 1);
        monitor.add_camera(Camera::simulated("sim5", "Cámara simulada 5", "Almacén")).unwrap();
        assert_eq!(monitor.active_workers(), 2);
        assert!(wait_until(Duration::from_secs(2), || sink.frames("sim5") > 0));
        monitor.shutdown();
    }

    #[test]
    fn duplicate_camera_is_reported_and_ignored() {
        let (monitor, sink) = monitor_with(&test_config(10, 0.0));
        two_cameras(&monitor);
        let err = monitor
            .add_camera(Camera::simulated("cam1", "Again", "Nowhere"))
            .unwrap_err();
        assert_eq!(err, MonitorError::State(StateError::DuplicateCamera("cam1".into())));
        assert_eq!(monitor.cameras().len(), 2);
        assert_eq!(monitor.cameras()[0].display_name, "Cam1");
        assert!(sink
            .messages()
            .contains(&("Error".to_string(), "This camera has already been added".to_string())));
    }

    #[test]
    fn device_open_failure_registers_nothing() {
        let (monitor, sink) = monitor_with(&test_config(10, 0.0));
        let err = monitor
            .add_camera(Camera::device("0", "Webcam", "Desk", "0"))
            .unwrap_err();
        assert_eq!(err, MonitorError::Capture(CaptureError::Unavailable));
        assert!(monitor.cameras().is_empty());
        assert!(sink
            .messages()
            .contains(&("Error".to_string(), "Could not connect to the camera".to_string())));
    }

    #[test]
    fn device_read_failure_ends_only_that_worker() {
        let sink = Arc::new(RecordingSink::default());
        let monitor = Monitor::new(&test_config(5, 0.0), sink.clone(), Box::new(FiniteBackend(3)));
        monitor.add_camera(Camera::simulated("sim1", "Cam1", "Caja")).unwrap();
        monitor.add_camera(Camera::device("0", "Webcam", "Desk", "0")).unwrap();
        monitor.start();

        assert!(wait_until(Duration::from_secs(2), || monitor.active_workers() == 1));
        assert_eq!(sink.frames("0"), 3);
        assert!(monitor.is_running());
        let before = sink.frames("sim1");
        assert!(wait_until(Duration::from_secs(2), || sink.frames("sim1") > before));
        monitor.shutdown();
    }

    #[test]
    fn removed_camera_worker_stops() {
        let (monitor, sink) = monitor_with(&test_config(5, 0.0));
        two_cameras(&monitor);
        monitor.start();
        assert!(wait_until(Duration::from_secs(2), || sink.frames("cam2") > 0));

        monitor.remove_camera("cam2").unwrap();
        assert_eq!(monitor.active_workers(), 1);
        std::thread::sleep(Duration::from_millis(50));
        let after = sink.frames("cam2");
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(sink.frames("cam2"), after);
        assert!(monitor.remove_camera("cam2").is_err());
        monitor.shutdown();
    }

    #[test]
    fn threshold_commands_report_outcome() {
        let (monitor, sink) = monitor_with(&test_config(10, 0.0));
        assert!(monitor.set_threshold(70).is_ok());
        assert_eq!(monitor.confidence_threshold(), 70);

        let err = monitor.set_threshold(120).unwrap_err();
        assert_eq!(err, MonitorError::State(StateError::ThresholdOutOfRange(120)));
        assert_eq!(monitor.confidence_threshold(), 70);

        let messages = sink.messages();
        assert_eq!(messages[0].0, "Threshold updated");
        assert_eq!(messages[0].1, "New alert threshold: 70%");
        assert_eq!(messages[1].0, "Error");
    }

    #[test]
    fn demo_alerts_fire_in_order() {
        let mut config = test_config(10, 0.0);
        config.demo.alerts = vec![
            ScheduledAlert {
                delay_ms: 20,
                camera_id: "cam1".into(),
                anomaly: AnomalyType::Intruder,
            },
            ScheduledAlert {
                delay_ms: 60,
                camera_id: "cam2".into(),
                anomaly: AnomalyType::SuspiciousMovement,
            },
        ];
        let (monitor, _sink) = monitor_with(&config);
        two_cameras(&monitor);
        assert_eq!(monitor.start_demo().len(), 2);
        assert!(wait_until(Duration::from_secs(2), || monitor.alerts().len() == 2));

        let alerts = monitor.alerts();
        assert_eq!(alerts[0].camera_id, "cam1");
        assert_eq!(alerts[0].anomaly_type, AnomalyType::Intruder);
        assert_eq!(alerts[1].camera_id, "cam2");
        monitor.shutdown();
    }

    #[test]
    fn stop_cancels_pending_demo_alerts() {
        let mut config = test_config(10, 0.0);
        config.demo.alerts = vec![ScheduledAlert {
            delay_ms: 80,
            camera_id: "cam1".into(),
            anomaly: AnomalyType::Intruder,
        }];
        let (monitor, _sink) = monitor_with(&config);
        two_cameras(&monitor);
        monitor.start_demo();
        assert_eq!(monitor.pending_scheduled(), 1);

        monitor.stop();
        assert_eq!(monitor.pending_scheduled(), 0);
        monitor.start();
        std::thread::sleep(Duration::from_millis(200));
        assert!(monitor.alerts().is_empty());
        monitor.shutdown();
    }

    #[test]
    fn schedule_demo_starts_monitoring_later() {
        let mut config = test_config(10, 0.0);
        config.demo.start_delay_ms = 30;
        let (monitor, _sink) = monitor_with(&config);
        two_cameras(&monitor);
        assert!(monitor.schedule_demo().is_some());
        assert!(!monitor.is_running());
        assert!(wait_until(Duration::from_secs(2), || monitor.is_running()));
        monitor.shutdown();

        let mut disabled = test_config(10, 0.0);
        disabled.demo.enabled = false;
        let (monitor, _sink) = monitor_with(&disabled);
        assert!(monitor.schedule_demo().is_none());
    }

    /// 确认告警的同时, 另一线程为其他摄像头触发新告警
    #[derive(Default)]
    struct RacingSink {
        recorded: RecordingSink,
        monitor: Mutex<Option<Monitor>>,
        racer: Mutex<Option<std::thread::JoinHandle<()>>>,
    }

    impl RacingSink {
        fn statuses(&self) -> Vec<SystemStatus> {
            lock(&self.recorded.events)
                .iter()
                .filter_map(|e| match e {
                    MonitorEvent::StatusChanged(status) => Some(*status),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventSink for RacingSink {
        fn on_frame(&self, camera_id: &str, frame: Frame) {
            self.recorded.on_frame(camera_id, frame);
        }
        fn on_alert(&self, alert: &Alert) {
            self.recorded.on_alert(alert);
        }
        fn on_status_changed(&self, status: SystemStatus) {
            self.recorded.on_status_changed(status);
        }
        fn on_message(&self, title: &str, body: &str) {
            self.recorded.on_message(title, body);
        }
        fn on_alert_acknowledged(&self, _alert: &Alert) {
            let Some(monitor) = lock(&self.monitor).take() else {
                return;
            };
            let racer = std::thread::spawn(move || {
                monitor.raise_alert("cam2", AnomalyType::ExcessOfPeople);
            });
            *lock(&self.racer) = Some(racer);
            // 给抢先的告警留出时间
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    #[test]
    fn status_events_follow_state_when_alert_races_acknowledge() {
        let sink = Arc::new(RacingSink::default());
        let monitor = Monitor::new(
            &test_config(10, 0.0),
            sink.clone(),
            Box::new(UnavailableBackend),
        );
        two_cameras(&monitor);
        monitor.start();
        monitor.raise_alert("cam1", AnomalyType::Intruder).unwrap();
        *lock(&sink.monitor) = Some(monitor.clone());

        monitor.acknowledge(1).unwrap();
        let racer = lock(&sink.racer).take().unwrap();
        racer.join().unwrap();

        assert_eq!(monitor.alerts().len(), 2);
        assert_eq!(monitor.status(), SystemStatus::Alert);
        assert_eq!(
            sink.statuses(),
            vec![
                SystemStatus::Monitoring,
                SystemStatus::Alert,
                SystemStatus::Monitoring,
                SystemStatus::Alert,
            ]
        );
        assert_eq!(sink.statuses().last(), Some(&monitor.status()));
        monitor.shutdown();
    }

    #[test]
    fn stop_wakes_sleeping_workers() {
        let (monitor, sink) = monitor_with(&test_config(2000, 0.0));
        two_cameras(&monitor);
        monitor.start();
        assert!(wait_until(Duration::from_secs(1), || {
            sink.frames("cam1") >= 1 && sink.frames("cam2") >= 1
        }));

        let begin = Instant::now();
        monitor.stop();
        monitor.shutdown();
        assert!(begin.elapsed() < Duration::from_millis(500));
        assert_eq!(sink.total_frames(), 2);
    }

    #[test]
    fn manual_stop_keeps_pending_auto_start() {
        let mut config = test_config(10, 0.0);
        config.demo.start_delay_ms = 150;
        config.demo.alerts = vec![ScheduledAlert {
            delay_ms: 5_000,
            camera_id: "cam1".into(),
            anomaly: AnomalyType::Intruder,
        }];
        let (monitor, _sink) = monitor_with(&config);
        two_cameras(&monitor);
        assert!(monitor.schedule_demo().is_some());

        monitor.start();
        monitor.stop();
        assert_eq!(monitor.pending_scheduled(), 1);

        assert!(wait_until(Duration::from_secs(2), || {
            monitor.is_running() && monitor.pending_scheduled() == 1
        }));
        monitor.stop();
        assert_eq!(monitor.pending_scheduled(), 0);
        monitor.shutdown();
    }
}
