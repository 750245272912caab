//! 缓存系统集成测试
//!
//! 测试写入一次的译文缓存、容量限制，以及服务层对缓存的使用

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use row_translator::translation::{CacheKey, TranslationCache, TranslationService};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{MockOracle, TestConfigBuilder};

/// 测试基本缓存操作
#[test]
fn test_basic_cache_operations() {
    let cache = TranslationCache::unbounded();
    let key = CacheKey::new("en", "狗狗币");

    assert!(cache.get(&key).is_none(), "Cache should be empty initially");
    assert!(cache.insert(key.clone(), "Dogecoin".to_string()));
    assert_eq!(cache.get(&key).as_deref(), Some("Dogecoin"));

    // 同一个键不会被覆盖
    assert!(!cache.insert(key.clone(), "Doge".to_string()));
    assert_eq!(
        cache.get_or_insert(key.clone(), "Doge".to_string()),
        "Dogecoin"
    );
    assert_eq!(cache.get(&key).as_deref(), Some("Dogecoin"));

    // 目标语言不同是不同的键
    let other = CacheKey::new("ja", "狗狗币");
    assert!(!cache.contains(&other));

    let stats = cache.stats();
    assert_eq!(stats.get_inserts(), 1);
    assert_eq!(stats.get_rejected_writes(), 2);
    assert_eq!(stats.get_hits(), 2);
    assert_eq!(stats.get_misses(), 1);

    println!("✅ Basic cache operations test passed");
}

/// 测试有容量上限的缓存
#[test]
fn test_bounded_cache_evicts_least_recent() {
    let cache = TranslationCache::with_capacity(Some(2));
    assert_eq!(cache.capacity(), Some(2));

    cache.insert(CacheKey::new("en", "一"), "one".to_string());
    cache.insert(CacheKey::new("en", "二"), "two".to_string());
    // 访问"一"，让"二"成为最久未用
    assert!(cache.get(&CacheKey::new("en", "一")).is_some());
    cache.insert(CacheKey::new("en", "三"), "three".to_string());

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&CacheKey::new("en", "一")));
    assert!(!cache.contains(&CacheKey::new("en", "二")));
    assert!(cache.contains(&CacheKey::new("en", "三")));

    assert_eq!(TranslationCache::with_capacity(Some(0)).capacity(), None);

    println!("✅ Bounded cache test passed");
}

/// 测试多线程并发写入同一个键
#[test]
fn test_concurrent_writers_agree_on_one_value() {
    let cache = Arc::new(TranslationCache::unbounded());
    let key = CacheKey::new("en", "月亮");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            thread::spawn(move || cache.get_or_insert(key, format!("moon-{}", i)))
        })
        .collect();

    let results: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let stored = cache.get(&key).unwrap();

    assert!(results.iter().all(|r| *r == stored));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().get_inserts(), 1);

    println!("✅ Concurrent writer test passed - stored {:?}", stored);
}

/// 测试服务层：命中、直通和失败回退都写入缓存
#[tokio::test]
async fn test_service_populates_cache() {
    let oracle = Arc::new(
        MockOracle::new()
            .with_entry("狗狗币", "Dogecoin")
            .failing_on("月亮"),
    );
    let config = TestConfigBuilder::new().build();
    let service = TranslationService::new(Arc::<MockOracle>::clone(&oracle), &config);

    assert_eq!(service.translate_one("狗狗币", "en").await, "Dogecoin");
    assert_eq!(service.translate_one("狗狗币", "en").await, "Dogecoin");
    assert_eq!(service.translate_one("DOGE", "en").await, "DOGE");
    assert_eq!(service.translate_one("月亮", "en").await, "月亮");
    assert_eq!(service.translate_one("月亮", "en").await, "月亮");

    let cache = service.cache();
    assert_eq!(cache.get(&CacheKey::new("en", "狗狗币")).as_deref(), Some("Dogecoin"));
    assert_eq!(cache.get(&CacheKey::new("en", "DOGE")).as_deref(), Some("DOGE"));
    assert_eq!(cache.get(&CacheKey::new("en", "月亮")).as_deref(), Some("月亮"));

    assert_eq!(oracle.calls(), 2);
    let stats = service.stats().snapshot();
    assert_eq!(stats.requests_issued, 2);
    assert_eq!(stats.passthrough, 1);
    assert_eq!(stats.fallbacks, 1);
    assert!(stats.cache_hits >= 2);

    println!("✅ Service cache test passed");
}

/// 测试超时同样回退为原文并缓存
#[tokio::test(start_paused = true)]
async fn test_timeout_falls_back_to_original() {
    let oracle = Arc::new(MockOracle::new().with_delay(Duration::from_secs(30)));
    let config = TestConfigBuilder::new().with_timeout_secs(1).build();
    let service = TranslationService::new(Arc::<MockOracle>::clone(&oracle), &config);

    assert_eq!(service.translate_one("狗狗币", "en").await, "狗狗币");
    assert_eq!(service.translate_one("狗狗币", "en").await, "狗狗币");
    assert_eq!(oracle.calls(), 1);
    assert_eq!(service.stats().snapshot().fallbacks, 1);

    println!("✅ Timeout fallback test passed");
}
