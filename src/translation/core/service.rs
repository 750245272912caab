//! 翻译服务核心实现
//!
//! 缓存、请求去重、并发限流与失败回退都在这一层完成，调用方永远拿到
//! 一个字符串：译文，或者原文。
//!
//! ## 主要组件
//!
//! - `TranslationService`: 对外的翻译入口，可廉价克隆
//! - `ServiceStats`: 线程安全的统计信息收集器
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use row_translator::translation::core::service::TranslationService;
//!
//! let service = TranslationService::from_config(&config)?;
//! let name = service.translate_one("中文名称", "en").await;
//! let map = service.translate_many_unique(["中文名称", "TICK"], "en").await;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;

use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;

use super::oracle::{GoogleGtxOracle, TranslationOracle};
use crate::translation::{
    config::TranslationConfig,
    error::{helpers::log_isolated, TranslationError, TranslationResult},
    pipeline::{batch::RequestLimiter, filters::is_foreign_script},
    storage::cache::{CacheKey, TranslationCache},
};

type InFlight = Shared<BoxFuture<'static, String>>;

/// 翻译服务
///
/// 克隆后共享缓存、进行中的请求表、限流器和统计。
#[derive(Clone)]
pub struct TranslationService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    oracle: Arc<dyn TranslationOracle>,
    cache: TranslationCache,
    /// 正在请求中的键，后来者直接等待同一个 future
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    limiter: RequestLimiter,
    request_timeout: Option<Duration>,
    source_lang: String,
    stats: ServiceStats,
}

impl TranslationService {
    /// 使用指定后端创建服务
    pub fn new(oracle: Arc<dyn TranslationOracle>, config: &TranslationConfig) -> Self {
        tracing::debug!(
            "创建翻译服务: 后端={}, 并发上限={}, 超时={:?}",
            oracle.name(),
            config.max_concurrent_requests,
            config.request_timeout()
        );

        Self {
            inner: Arc::new(ServiceInner {
                oracle,
                cache: TranslationCache::with_capacity(config.cache_capacity()),
                in_flight: Mutex::new(HashMap::new()),
                limiter: RequestLimiter::new(config.max_concurrent_requests),
                request_timeout: config.request_timeout(),
                source_lang: config.source_lang.clone(),
                stats: ServiceStats::default(),
            }),
        }
    }

    /// 使用默认的 gtx 后端创建服务
    pub fn from_config(config: &TranslationConfig) -> TranslationResult<Self> {
        let oracle = GoogleGtxOracle::from_config(config)?;
        Ok(Self::new(Arc::new(oracle), config))
    }

    /// 翻译单个文本，从不失败
    ///
    /// - 缓存命中直接返回
    /// - 不含外文的文本原样返回并缓存
    /// - 同一个键已有请求在途时等待它的结果
    /// - 请求失败、超时或返回空译文时缓存并返回原文，之后不再重试
    pub async fn translate_one(&self, text: &str, target_lang: &str) -> String {
        let key = CacheKey::new(target_lang, text);

        if let Some(cached) = self.inner.cache.get(&key) {
            self.inner.stats.inc_cache_hits();
            return cached;
        }

        if !is_foreign_script(text) {
            self.inner.stats.inc_passthrough();
            return self.inner.cache.get_or_insert(key, text.to_string());
        }

        let pending = {
            let mut in_flight = self.inner.lock_in_flight();
            if let Some(pending) = in_flight.get(&key) {
                self.inner.stats.inc_joined_in_flight();
                pending.clone()
            } else if let Some(cached) = self.inner.cache.get(&key) {
                // 请求在两次检查之间刚好完成
                self.inner.stats.inc_cache_hits();
                return cached;
            } else {
                let inner = Arc::clone(&self.inner);
                let request_key = key.clone();
                let pending = async move { inner.fetch(request_key).await }.boxed().shared();
                in_flight.insert(key, pending.clone());
                pending
            }
        };

        pending.await
    }

    /// 批量翻译，只覆盖其中不重复的外文文本
    ///
    /// 去重保留首次出现的顺序，每个文本各自走 `translate_one`，
    /// 单个文本的失败不影响其他文本。
    pub async fn translate_many_unique<'a, I>(
        &self,
        texts: I,
        target_lang: &str,
    ) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = texts
            .into_iter()
            .filter(|text| is_foreign_script(text))
            .filter(|text| seen.insert(*text))
            .collect();

        if unique.is_empty() {
            return HashMap::new();
        }

        tracing::debug!("批量翻译 {} 个文本 -> {}", unique.len(), target_lang);

        let translations =
            join_all(unique.iter().map(|text| self.translate_one(text, target_lang))).await;

        unique
            .into_iter()
            .map(str::to_string)
            .zip(translations)
            .collect()
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.inner.cache
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.inner.limiter
    }

    pub fn stats(&self) -> &ServiceStats {
        &self.inner.stats
    }

    pub fn source_lang(&self) -> &str {
        &self.inner.source_lang
    }
}

impl ServiceInner {
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<CacheKey, InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 对一个键发起唯一的一次请求，写入缓存后移出在途表
    async fn fetch(&self, key: CacheKey) -> String {
        let result = self
            .limiter
            .run(self.call_oracle(&key))
            .await
            .and_then(|inner| inner);

        let value = match result {
            Ok(translated) if !translated.trim().is_empty() => translated,
            Ok(_) => {
                self.stats.inc_fallbacks();
                tracing::warn!("译文为空，保留原文: {:?}", key.text);
                key.text.clone()
            }
            Err(e) => {
                self.stats.inc_fallbacks();
                log_isolated(&format!("翻译 {:?} ", key.text), &e);
                key.text.clone()
            }
        };

        let stored = self.cache.get_or_insert(key.clone(), value);
        self.lock_in_flight().remove(&key);
        stored
    }

    async fn call_oracle(&self, key: &CacheKey) -> TranslationResult<String> {
        self.stats.inc_requests();
        let request = self
            .oracle
            .translate(&key.text, &self.source_lang, &key.target_lang);

        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|elapsed| {
                    TranslationError::from(elapsed)
                        .with_context(format!("{:.1}秒内未返回", limit.as_secs_f32()))
                })?,
            None => request.await,
        }
    }
}

/// 服务统计信息
#[derive(Debug, Default)]
pub struct ServiceStats {
    /// 实际发给后端的请求数
    pub requests_issued: AtomicUsize,
    pub cache_hits: AtomicUsize,
    /// 不含外文、原样返回的文本数
    pub passthrough: AtomicUsize,
    /// 请求失败后回退为原文的次数
    pub fallbacks: AtomicUsize,
    /// 等待已在途请求的次数
    pub joined_in_flight: AtomicUsize,
}

impl ServiceStats {
    pub fn inc_requests(&self) {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_passthrough(&self) {
        self.passthrough.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fallbacks(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_joined_in_flight(&self) {
        self.joined_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            requests_issued: self.requests_issued.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            joined_in_flight: self.joined_in_flight.load(Ordering::Relaxed),
        }
    }
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub requests_issued: usize,
    pub cache_hits: usize,
    pub passthrough: usize,
    pub fallbacks: usize,
    pub joined_in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 记录调用次数，按固定规则"翻译"
    struct CountingOracle {
        calls: AtomicUsize,
        delay: Duration,
        fail_on: Option<&'static str>,
    }

    impl CountingOracle {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(20),
                fail_on: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TranslationOracle for CountingOracle {
        fn translate<'a>(
            &'a self,
            text: &'a str,
            _source_lang: &'a str,
            target_lang: &'a str,
        ) -> BoxFuture<'a, TranslationResult<String>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                if self.fail_on == Some(text) {
                    return Err(TranslationError::HttpStatus(500));
                }
                Ok(format!("{}:{}", target_lang, text.chars().count()))
            }
            .boxed()
        }
    }

    fn service(oracle: Arc<CountingOracle>) -> TranslationService {
        TranslationService::new(oracle, &TranslationConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_after_first_request() {
        let oracle = Arc::new(CountingOracle::new());
        let service = service(Arc::clone(&oracle));

        let first = service.translate_one("中文名称", "en").await;
        let second = service.translate_one("中文名称", "en").await;

        assert_eq!(first, "en:4");
        assert_eq!(first, second);
        assert_eq!(oracle.calls(), 1);
        assert_eq!(service.stats().snapshot().cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_foreign_text_skips_backend() {
        let oracle = Arc::new(CountingOracle::new());
        let service = service(Arc::clone(&oracle));

        assert_eq!(service.translate_one("TICK", "en").await, "TICK");
        assert_eq!(oracle.calls(), 0);
        assert!(service.cache().contains(&CacheKey::new("en", "TICK")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_falls_back_and_is_not_retried() {
        let oracle = Arc::new(CountingOracle {
            fail_on: Some("错误文本"),
            ..CountingOracle::new()
        });
        let service = service(Arc::clone(&oracle));

        assert_eq!(service.translate_one("错误文本", "en").await, "错误文本");
        assert_eq!(service.translate_one("错误文本", "en").await, "错误文本");
        assert_eq!(oracle.calls(), 1);
        assert_eq!(service.stats().snapshot().fallbacks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_request() {
        let oracle = Arc::new(CountingOracle::new());
        let service = service(Arc::clone(&oracle));

        let results = join_all((0..5).map(|_| service.translate_one("同名", "en"))).await;

        assert!(results.iter().all(|r| r == "en:2"));
        assert_eq!(oracle.calls(), 1);
        assert_eq!(service.stats().snapshot().joined_in_flight, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_unique_dedups_and_filters() {
        let oracle = Arc::new(CountingOracle::new());
        let service = service(Arc::clone(&oracle));

        let map = service
            .translate_many_unique(["名称", "名称", "TICK", "名称", "代币"], "en")
            .await;

        assert_eq!(map.len(), 2);
        assert_eq!(map["名称"], "en:2");
        assert!(!map.contains_key("TICK"));
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_cached_fallback() {
        let oracle = Arc::new(CountingOracle {
            delay: Duration::from_secs(30),
            ..CountingOracle::new()
        });
        let config = TranslationConfig {
            request_timeout_secs: 1,
            ..TranslationConfig::default()
        };
        let service = TranslationService::new(oracle.clone(), &config);

        assert_eq!(service.translate_one("很慢", "en").await, "很慢");
        assert_eq!(service.cache().get(&CacheKey::new("en", "很慢")).as_deref(), Some("很慢"));
        assert_eq!(oracle.calls(), 1);
    }
}
