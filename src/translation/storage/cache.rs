//! 翻译缓存模块
//!
//! 以 `(目标语言, 原文)` 为键保存译文。条目只写一次：同一个键在进程
//! 生命周期内不会被覆盖，失败回退的原文也照常缓存，之后不再重试。
//! 默认不限容量；配置容量后改为 LRU 淘汰，被淘汰的键可以重新写入。

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, MutexGuard,
};

use lru::LruCache;

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub target_lang: String,
    pub text: String,
}

impl CacheKey {
    pub fn new(target_lang: &str, text: &str) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            text: text.to_string(),
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub inserts: AtomicU64,
    /// 因键已存在而被忽略的写入
    pub rejected_writes: AtomicU64,
}

impl CacheStats {
    pub fn get_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn get_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn get_inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    pub fn get_rejected_writes(&self) -> u64 {
        self.rejected_writes.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.get_hits();
        let total = hits + self.get_misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

enum Entries {
    Unbounded(HashMap<CacheKey, String>),
    Bounded(LruCache<CacheKey, String>),
}

impl Entries {
    fn get(&mut self, key: &CacheKey) -> Option<String> {
        match self {
            Entries::Unbounded(map) => map.get(key).cloned(),
            Entries::Bounded(lru) => lru.get(key).cloned(),
        }
    }

    fn contains(&self, key: &CacheKey) -> bool {
        match self {
            Entries::Unbounded(map) => map.contains_key(key),
            Entries::Bounded(lru) => lru.contains(key),
        }
    }

    fn insert(&mut self, key: CacheKey, value: String) {
        match self {
            Entries::Unbounded(map) => {
                map.insert(key, value);
            }
            Entries::Bounded(lru) => {
                lru.put(key, value);
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Entries::Unbounded(map) => map.len(),
            Entries::Bounded(lru) => lru.len(),
        }
    }
}

/// 翻译缓存
///
/// 锁只在同步的读写期间持有，从不跨越 `.await`。
pub struct TranslationCache {
    entries: Mutex<Entries>,
    capacity: Option<NonZeroUsize>,
    stats: CacheStats,
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl TranslationCache {
    /// 不限容量的缓存
    pub fn unbounded() -> Self {
        Self {
            entries: Mutex::new(Entries::Unbounded(HashMap::new())),
            capacity: None,
            stats: CacheStats::default(),
        }
    }

    /// 按容量创建，`None` 或 0 表示不限容量
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity.and_then(NonZeroUsize::new) {
            Some(cap) => Self {
                entries: Mutex::new(Entries::Bounded(LruCache::new(cap))),
                capacity: Some(cap),
                stats: CacheStats::default(),
            },
            None => Self::unbounded(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // 持锁期间不会 panic，中毒时直接取回数据
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let value = self.lock().get(key);
        if value.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains(key)
    }

    /// 写入译文；键已存在时保留旧值并返回 `false`
    pub fn insert(&self, key: CacheKey, value: String) -> bool {
        let mut entries = self.lock();
        if entries.contains(&key) {
            self.stats.rejected_writes.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("缓存键已存在，忽略写入: {:?}", key.text);
            return false;
        }
        entries.insert(key, value);
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// 写入后返回该键最终保存的值
    pub fn get_or_insert(&self, key: CacheKey, value: String) -> String {
        let mut entries = self.lock();
        if let Some(existing) = entries.get(&key) {
            self.stats.rejected_writes.fetch_add(1, Ordering::Relaxed);
            return existing;
        }
        entries.insert(key, value.clone());
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        value
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
