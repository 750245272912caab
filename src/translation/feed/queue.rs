//! 行处理队列
//!
//! 所有"处理这一行"的请求都通过一个 mpsc 通道交给编排器。立即请求直接
//! 入队；防抖请求按行标识合并：同一行在等待期间再次触发时，取消旧定时器
//! 并重新计时，到期后只入队一次。
//!
//! 定时器用 `tokio::task::spawn_local` 启动，必须在 `LocalSet` 中调用。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::translation::storage::registry::{Registry, RowId};

/// 队列统计
#[derive(Debug, Default)]
pub struct QueueStats {
    /// 立即入队的请求数
    pub immediate: AtomicUsize,
    /// 防抖请求数
    pub scheduled: AtomicUsize,
    /// 被后续触发合并掉的请求数
    pub coalesced: AtomicUsize,
    /// 防抖到期后入队的请求数
    pub fired: AtomicUsize,
}

impl QueueStats {
    pub fn get_immediate(&self) -> usize {
        self.immediate.load(Ordering::Relaxed)
    }

    pub fn get_scheduled(&self) -> usize {
        self.scheduled.load(Ordering::Relaxed)
    }

    pub fn get_coalesced(&self) -> usize {
        self.coalesced.load(Ordering::Relaxed)
    }

    pub fn get_fired(&self) -> usize {
        self.fired.load(Ordering::Relaxed)
    }
}

/// 队列发送端，可克隆
#[derive(Clone)]
pub struct ReconcileQueue {
    sender: mpsc::UnboundedSender<Handle>,
    registry: Rc<RefCell<Registry>>,
    timers: Rc<RefCell<HashMap<RowId, JoinHandle<()>>>>,
    debounce: Duration,
    stats: Rc<QueueStats>,
}

/// 队列接收端，由编排器独占
pub struct ReconcileReceiver {
    receiver: mpsc::UnboundedReceiver<Handle>,
}

impl ReconcileReceiver {
    /// 等待下一行；所有发送端都释放后返回 `None`
    pub async fn recv(&mut self) -> Option<Handle> {
        self.receiver.recv().await
    }

    /// 取出当前已入队的全部行，不等待
    pub fn drain(&mut self) -> Vec<Handle> {
        let mut rows = Vec::new();
        while let Ok(row) = self.receiver.try_recv() {
            rows.push(row);
        }
        rows
    }
}

impl ReconcileQueue {
    pub fn channel(registry: Rc<RefCell<Registry>>, debounce: Duration) -> (Self, ReconcileReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            sender,
            registry,
            timers: Rc::new(RefCell::new(HashMap::new())),
            debounce,
            stats: Rc::new(QueueStats::default()),
        };
        (queue, ReconcileReceiver { receiver })
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// 等待中的防抖定时器数量
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// 立即入队
    pub fn reconcile_now(&self, row: Handle) {
        self.stats.immediate.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(row).is_err() {
            tracing::debug!("处理队列已关闭，丢弃请求");
        }
    }

    /// 防抖入队：取消该行尚未到期的定时器并重新计时
    pub fn schedule(&self, row: Handle) {
        let row_id = self.registry.borrow_mut().row_id(&row);
        self.stats.scheduled.fetch_add(1, Ordering::Relaxed);

        if let Some(previous) = self.timers.borrow_mut().remove(&row_id) {
            previous.abort();
            self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
        }

        let sender = self.sender.clone();
        let timers = Rc::clone(&self.timers);
        let stats = Rc::clone(&self.stats);
        let debounce = self.debounce;

        let timer = tokio::task::spawn_local(async move {
            tokio::time::sleep(debounce).await;
            timers.borrow_mut().remove(&row_id);
            stats.fired.fetch_add(1, Ordering::Relaxed);
            if sender.send(row).is_err() {
                tracing::debug!("处理队列已关闭，丢弃行 {}", row_id);
            }
        });

        self.timers.borrow_mut().insert(row_id, timer);
    }

    /// 取消所有等待中的定时器
    pub fn cancel_all(&self) {
        for (_, timer) in self.timers.borrow_mut().drain() {
            timer.abort();
        }
    }
}
