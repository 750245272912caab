//! 翻译系统核心模块
//!
//! ## 架构设计
//!
//! - **后端层** (`oracle.rs`): 翻译后端接口与默认的 HTTP 实现
//! - **服务层** (`service.rs`): 缓存、请求去重、并发限流与失败回退
//! - **引擎层** (`engine.rs`): 行级处理与片段状态机
//!
//! ## 模块依赖关系
//!
//! ```text
//! ReconcileEngine (engine.rs)
//!     ├── CandidateRanker (pipeline/ranker.rs)
//!     ├── Registry (storage/registry.rs)
//!     └── TranslationService (service.rs)
//!             ├── TranslationCache (storage/cache.rs)
//!             ├── RequestLimiter (pipeline/batch.rs)
//!             └── TranslationOracle (oracle.rs)
//! ```

pub mod engine;
pub mod oracle;
pub mod service;

pub use engine::{EngineConfig, EngineStats, FragmentOutcome, ReconcileEngine, RowReport};
pub use oracle::{GoogleGtxOracle, TranslationOracle};
pub use service::{ServiceStats, ServiceStatsSnapshot, TranslationService};
