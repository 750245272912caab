//! 编排器
//!
//! 持有文档与全部运行期状态，把扫描、变更监听、处理队列和启动重试
//! 连接起来。所有状态都是单线程共享的，编排器本身以 `Rc` 传递，
//! 后台任务通过 `spawn_local` 运行在 `LocalSet` 中。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let orchestrator = Rc::new(Orchestrator::new(dom, service, config)?);
//! let tasks = orchestrator.start();
//! orchestrator.handle_mutation(Mutation::ChildList { added: vec![row] });
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use futures::future::join_all;
use markup5ever_rcdom::{Handle, RcDom};
use regex::Regex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::translation::{
    config::{constants, TranslationConfig},
    core::{
        engine::{ReconcileEngine, RowReport},
        service::TranslationService,
    },
    error::{helpers::log_isolated, TranslationResult},
    feed::{
        outermost_rows, ChangeFeed, HrefRowPredicate, Mutation, ReconcileQueue,
        ReconcileReceiver, RowPredicate,
    },
    storage::registry::Registry,
};

/// 一次完整扫描的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// 站点规则不匹配，未执行
    pub blocked: bool,
    pub rows: usize,
    pub fragments_translated: usize,
    pub fragments_reasserted: usize,
    pub fragments_unchanged: usize,
    pub fragment_failures: usize,
    pub row_failures: usize,
    /// 本次清理掉的失效记录
    pub swept: usize,
}

impl ScanSummary {
    fn absorb(&mut self, result: TranslationResult<RowReport>) {
        match result {
            Ok(report) if report.skipped => {}
            Ok(report) => {
                self.rows += 1;
                self.fragments_translated += report.translated;
                self.fragments_reasserted += report.reasserted;
                self.fragments_unchanged += report.unchanged;
                self.fragment_failures += report.failed;
            }
            Err(e) => {
                self.row_failures += 1;
                log_isolated("行处理", &e);
            }
        }
    }
}

/// 重扫请求的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescanOutcome {
    /// 立即执行
    Immediate,
    /// 节流窗口内，安排在窗口结束时执行
    Deferred,
    /// 窗口结束时已有一次待执行，本次合并
    Coalesced,
}

#[derive(Default)]
struct RescanThrottle {
    last: Option<Instant>,
    trailing: Option<JoinHandle<()>>,
}

/// 编排器
pub struct Orchestrator {
    dom: RcDom,
    config: TranslationConfig,
    document_url: Option<String>,
    site_pattern: Option<Regex>,
    predicate: Rc<dyn RowPredicate>,
    registry: Rc<RefCell<Registry>>,
    engine: Rc<ReconcileEngine>,
    queue: ReconcileQueue,
    feed: ChangeFeed,
    receiver: RefCell<Option<ReconcileReceiver>>,
    rescan: RefCell<RescanThrottle>,
    stopped: Cell<bool>,
    stop: Notify,
}

impl Orchestrator {
    /// 使用默认行判定创建编排器
    pub fn new(
        dom: RcDom,
        service: TranslationService,
        config: TranslationConfig,
    ) -> TranslationResult<Self> {
        let predicate: Rc<dyn RowPredicate> = Rc::new(HrefRowPredicate::from_config(&config));
        Self::with_predicate(dom, service, config, predicate)
    }

    /// 使用自定义行判定创建编排器
    pub fn with_predicate(
        dom: RcDom,
        service: TranslationService,
        config: TranslationConfig,
        predicate: Rc<dyn RowPredicate>,
    ) -> TranslationResult<Self> {
        config.validate()?;

        let site_pattern = config
            .site_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()?;

        let registry = Rc::new(RefCell::new(Registry::new()));
        let engine = Rc::new(ReconcileEngine::new(service, Rc::clone(&registry), &config));
        let (queue, receiver) = ReconcileQueue::channel(Rc::clone(&registry), config.debounce());
        let feed = ChangeFeed::new(
            Rc::clone(&predicate),
            Rc::clone(&engine),
            queue.clone(),
            config.watched_attributes.clone(),
        );

        Ok(Self {
            dom,
            config,
            document_url: None,
            site_pattern,
            predicate,
            registry,
            engine,
            queue,
            feed,
            receiver: RefCell::new(Some(receiver)),
            rescan: RefCell::new(RescanThrottle::default()),
            stopped: Cell::new(false),
            stop: Notify::new(),
        })
    }

    /// 设置文档地址，供站点规则匹配
    pub fn with_document_url(mut self, url: &str) -> Self {
        self.document_url = Some(url.to_string());
        self
    }

    pub fn dom(&self) -> &RcDom {
        &self.dom
    }

    pub fn document(&self) -> &Handle {
        &self.dom.document
    }

    pub fn into_dom(self) -> RcDom {
        self.dom
    }

    pub fn engine(&self) -> &Rc<ReconcileEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Rc<RefCell<Registry>> {
        &self.registry
    }

    pub fn queue(&self) -> &ReconcileQueue {
        &self.queue
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 站点规则；没有规则或不知道文档地址时放行
    pub fn site_allowed(&self) -> bool {
        match (&self.site_pattern, &self.document_url) {
            (Some(pattern), Some(url)) => pattern.is_match(url),
            _ => true,
        }
    }

    /// 注入一次高亮样式表
    pub fn ensure_highlight_style(&self) -> bool {
        self.engine.highlight().ensure_style_element(&self.dom)
    }

    /// 文档中最外层的行
    pub fn find_rows(&self) -> Vec<Handle> {
        outermost_rows(self.predicate.as_ref(), &self.dom.document)
    }

    /// 转交一条文档改动
    pub fn handle_mutation(&self, mutation: Mutation) {
        self.feed.handle(mutation);
    }

    /// 扫描整个文档，把找到的行立即入队；返回入队的行数
    pub fn initial_scan(&self) -> usize {
        if !self.site_allowed() {
            tracing::info!("站点规则不匹配，跳过扫描: {:?}", self.document_url);
            return 0;
        }

        let swept = self.registry.borrow_mut().sweep();
        let rows = self.find_rows();
        let count = rows.len();
        for row in rows {
            self.queue.reconcile_now(row);
        }

        tracing::info!("扫描完成: {} 行入队, 清理 {} 条失效记录", count, swept);
        count
    }

    /// 扫描整个文档并等待每一行处理完成
    pub async fn reconcile_all_once(&self) -> ScanSummary {
        if !self.site_allowed() {
            tracing::info!("站点规则不匹配，跳过处理: {:?}", self.document_url);
            return ScanSummary {
                blocked: true,
                ..ScanSummary::default()
            };
        }

        self.ensure_highlight_style();
        let mut summary = ScanSummary {
            swept: self.registry.borrow_mut().sweep(),
            ..ScanSummary::default()
        };

        let rows = self.find_rows();
        let results = join_all(rows.iter().map(|row| self.engine.reconcile_row(row))).await;
        for result in results {
            summary.absorb(result);
        }

        tracing::info!(
            "处理完成: {} 行, 翻译 {} 个片段, 失败 {}",
            summary.rows,
            summary.fragments_translated,
            summary.fragment_failures + summary.row_failures
        );
        summary
    }

    /// 处理当前已入队的行并等待完成；`run` 运行期间返回空汇总
    pub async fn process_pending(&self) -> ScanSummary {
        let rows = match self.receiver.borrow_mut().as_mut() {
            Some(receiver) => receiver.drain(),
            None => Vec::new(),
        };

        let mut summary = ScanSummary::default();
        let results = join_all(rows.iter().map(|row| self.engine.reconcile_row(row))).await;
        for result in results {
            summary.absorb(result);
        }
        summary
    }

    /// 节流重扫：窗口开始时立即执行，窗口内的后续请求合并到窗口结束时执行一次
    pub fn request_rescan(self: &Rc<Self>) -> RescanOutcome {
        let wait = self.config.rescan_throttle();
        let now = Instant::now();
        let mut throttle = self.rescan.borrow_mut();

        let remaining = throttle
            .last
            .map(|last| wait.saturating_sub(now.duration_since(last)))
            .unwrap_or(Duration::ZERO);

        if remaining.is_zero() {
            if let Some(trailing) = throttle.trailing.take() {
                trailing.abort();
            }
            throttle.last = Some(now);
            drop(throttle);
            self.initial_scan();
            return RescanOutcome::Immediate;
        }

        if throttle.trailing.is_some() {
            return RescanOutcome::Coalesced;
        }

        let this = Rc::clone(self);
        throttle.trailing = Some(tokio::task::spawn_local(async move {
            tokio::time::sleep(remaining).await;
            {
                let mut throttle = this.rescan.borrow_mut();
                throttle.last = Some(Instant::now());
                throttle.trailing = None;
            }
            tracing::debug!("节流重扫");
            this.initial_scan();
        }));
        RescanOutcome::Deferred
    }

    /// 启动重试：首次延迟后按固定间隔重扫若干次
    pub async fn run_startup_retries(self: Rc<Self>) {
        let attempts = self.config.startup_retry_attempts;
        tokio::time::sleep(constants::STARTUP_RETRY_DELAY).await;

        for attempt in 1..=attempts {
            if self.stopped.get() {
                return;
            }
            tracing::debug!("启动重扫 {}/{}", attempt, attempts);
            self.initial_scan();
            if attempt < attempts {
                tokio::time::sleep(constants::STARTUP_RETRY_INTERVAL).await;
            }
        }
    }

    /// 从队列取行，每行处理一次启动一个本地任务
    ///
    /// `shutdown()` 之后或队列关闭后返回，接收端交还给 `process_pending` 使用。
    pub async fn run(self: Rc<Self>) {
        let Some(mut receiver) = self.receiver.borrow_mut().take() else {
            tracing::warn!("处理循环已在运行");
            return;
        };

        let stop = self.stop.notified();
        tokio::pin!(stop);

        tracing::info!("处理循环启动");
        while !self.stopped.get() {
            let row = tokio::select! {
                _ = &mut stop => break,
                row = receiver.recv() => row,
            };
            let Some(row) = row else {
                break;
            };

            let engine = Rc::clone(&self.engine);
            tokio::task::spawn_local(async move {
                match engine.reconcile_row(&row).await {
                    Ok(report) if report.translated > 0 => {
                        tracing::info!(
                            "行 {:?} 写入 {} 个译文",
                            report.row_id.map(|id| id.to_string()),
                            report.translated
                        );
                    }
                    Ok(_) => {}
                    Err(e) => log_isolated("行处理", &e),
                }
            });
        }

        *self.receiver.borrow_mut() = Some(receiver);
        tracing::info!("处理循环结束");
    }

    /// 注入样式、首次扫描，并启动处理循环与启动重试
    ///
    /// 站点规则不匹配时什么也不做，返回空列表。
    pub fn start(self: &Rc<Self>) -> Vec<JoinHandle<()>> {
        if !self.site_allowed() {
            tracing::info!("站点规则不匹配，不启动: {:?}", self.document_url);
            return Vec::new();
        }

        tracing::info!(
            "启动: 目标语言={}, 测试模式={}, 并发上限={}",
            self.config.target_lang,
            self.config.test_mode,
            self.config.max_concurrent_requests
        );

        self.ensure_highlight_style();
        self.initial_scan();

        vec![
            tokio::task::spawn_local(Rc::clone(self).run()),
            tokio::task::spawn_local(Rc::clone(self).run_startup_retries()),
        ]
    }

    /// 取消所有等待中的防抖与节流定时器，并让处理循环与启动重试退出
    pub fn shutdown(&self) {
        self.stopped.set(true);
        self.stop.notify_waiters();
        self.queue.cancel_all();
        if let Some(trailing) = self.rescan.borrow_mut().trailing.take() {
            trailing.abort();
        }
    }
}
