//! 翻译模块
//!
//! 对持续变化的行列表做增量翻译，采用清晰的模块化架构：
//! - **core**: 翻译后端、翻译服务和行协调引擎
//! - **pipeline**: 候选片段处理（过滤、排序、并发限流）
//! - **storage**: 译文缓存和节点登记表
//! - **feed**: 文档变更适配与行处理队列
//! - **orchestrator**: 扫描、监听与处理循环的编排
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use row_translator::parsers::html_to_dom;
//! use row_translator::translation::{
//!     GoogleGtxOracle, Orchestrator, TranslationConfig, TranslationService,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TranslationConfig::default_with_lang("en");
//! let oracle = Arc::new(GoogleGtxOracle::from_config(&config)?);
//! let service = TranslationService::new(oracle, &config);
//!
//! let dom = html_to_dom(b"<div href=\"/token/1\"><span>\xe4\xb8\xad\xe6\x96\x87</span></div>", "utf-8")?;
//! let orchestrator = Orchestrator::new(dom, service, config)?;
//! let summary = orchestrator.reconcile_all_once().await;
//! println!("翻译了 {} 个片段", summary.fragments_translated);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
///
/// 目标语言、接口地址、并发与超时、候选与防抖参数
pub mod config;

/// 核心模块
///
/// 翻译后端接口、带缓存与去重的翻译服务、行协调引擎
pub mod core;

/// 错误处理模块
pub mod error;

/// 文档变更适配模块
///
/// 把文档改动转换为立即或防抖的行处理请求
pub mod feed;

/// 编排模块
pub mod orchestrator;

/// 候选片段处理模块
///
/// 负责过滤明显不是名称的片段、给候选排序、限制并发请求
pub mod pipeline;

/// 存储模块
///
/// 写入一次的译文缓存，以及行与片段的登记表
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use config::{constants, ConfigManager, TranslationConfig};
pub use core::{
    EngineConfig, FragmentOutcome, GoogleGtxOracle, ReconcileEngine, RowReport, ServiceStats,
    ServiceStatsSnapshot, TranslationOracle, TranslationService,
};
pub use error::{ErrorCategory, TranslationError, TranslationResult};
pub use feed::{ChangeFeed, HrefRowPredicate, Mutation, ReconcileQueue, RowPredicate};
pub use orchestrator::{Orchestrator, RescanOutcome, ScanSummary};

// ============================================================================
// 高级API导出
// ============================================================================

pub use pipeline::{Candidate, CandidateFilter, CandidateRanker, RankerConfig, RequestLimiter};
pub use storage::{CacheKey, CacheStats, Fingerprint, Registry, RowId, TranslationCache};
