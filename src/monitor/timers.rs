/// 一次性定时任务 (可按ID取消)
///
/// 每个定时器一个线程, 在取消通道上 `recv_timeout` 等待:
/// 超时则执行回调, 通道断开则视为取消。
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct PendingTimer {
    cancel_tx: Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TimerTable {
    next_id: u64,
    pending: HashMap<TimerId, PendingTimer>,
}

#[derive(Clone, Default)]
pub struct Timers {
    table: Arc<Mutex<TimerTable>>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 延迟 `delay` 后在后台线程执行 `task`
    pub fn schedule<F>(&self, delay: Duration, task: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(1);
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.next_id += 1;
        let id = TimerId(table.next_id);

        let weak_table = Arc::downgrade(&self.table);
        let handle = std::thread::Builder::new()
            .name(format!("timer-{}", id.0))
            .spawn(move || {
                match cancel_rx.recv_timeout(delay) {
                    Err(RecvTimeoutError::Timeout) => {
                        // 先从表中移除, 避免回调内再次取消自己
                        if let Some(table) = weak_table.upgrade() {
                            let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
                            table.pending.remove(&id);
                        }
                        task();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        tracing::debug!("⏱️ 定时器 {:?} 已取消", id);
                    }
                }
            });

        match handle {
            Ok(handle) => {
                table.pending.insert(id, PendingTimer { cancel_tx, handle });
            }
            Err(err) => {
                tracing::error!("❌ 定时器线程创建失败: {}", err);
            }
        }
        id
    }

    /// 取消尚未触发的定时器, 返回是否确实取消
    pub fn cancel(&self, id: TimerId) -> bool {
        let pending = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.pending.remove(&id)
        };
        match pending {
            Some(timer) => {
                let _ = timer.cancel_tx.try_send(());
                true
            }
            None => false,
        }
    }

    /// 取消全部并等待线程退出
    pub fn shutdown(&self) {
        let drained: Vec<PendingTimer> = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.pending.drain().map(|(_, t)| t).collect()
        };
        for timer in drained {
            drop(timer.cancel_tx);
            let _ = timer.handle.join();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn timer_fires_after_delay() {
        let timers = Timers::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        timers.schedule(Duration::from_millis(20), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(timers.pending_count(), 0);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let timers = Timers::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = timers.schedule(Duration::from_millis(100), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn shutdown_only_touches_pending() {
        let timers = Timers::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for delay in [10u64, 300, 400] {
            let h = hits.clone();
            timers.schedule(Duration::from_millis(delay), move || {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(timers.pending_count(), 2);
        timers.shutdown();
        assert_eq!(timers.pending_count(), 0);
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
