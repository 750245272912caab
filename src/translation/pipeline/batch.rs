//! 并发请求限流模块
//!
//! 所有对翻译后端的调用都要先从同一个信号量取得许可，保证任意时刻
//! 进行中的请求不超过上限。tokio 的信号量按 FIFO 顺序发放许可，
//! 因此请求按提交顺序获准执行。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use row_translator::translation::pipeline::batch::RequestLimiter;
//!
//! let limiter = RequestLimiter::new(16);
//! let body = limiter.run(oracle.translate(text, "auto", "en")).await?;
//! ```

use std::future::Future;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::Semaphore;

use crate::translation::error::{TranslationError, TranslationResult};

/// 限流统计
#[derive(Debug, Default)]
pub struct LimiterStats {
    /// 当前持有许可的请求数
    pub in_flight: AtomicUsize,
    /// 观察到的最大并发数
    pub peak_in_flight: AtomicUsize,
    /// 已完成的请求数
    pub completed: AtomicUsize,
}

impl LimiterStats {
    pub fn get_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn get_peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn get_completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// 全局并发限流器
///
/// 克隆后共享同一个信号量与统计。
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    stats: Arc<LimiterStats>,
}

impl RequestLimiter {
    /// 创建限流器，`max_concurrent` 为 0 时按 1 处理
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            stats: Arc::new(LimiterStats::default()),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn stats(&self) -> &LimiterStats {
        &self.stats
    }

    /// 取得许可后执行 `task`，完成后归还许可
    pub async fn run<F, T>(&self, task: F) -> TranslationResult<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self.semaphore.acquire().await.map_err(|e| {
            TranslationError::InternalError(format!("获取并发许可失败: {}", e))
        })?;

        self.stats.enter();
        let output = task.await;
        self.stats.leave();

        Ok(output)
    }
}
