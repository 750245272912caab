//! 存储模块
//!
//! 翻译缓存与行/片段登记表。

pub mod cache;
pub mod registry;

pub use cache::{CacheKey, CacheStats, TranslationCache};
pub use registry::{Fingerprint, FragmentId, FragmentState, Registry, RowId};
