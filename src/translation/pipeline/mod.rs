//! 候选选择与请求调度
//!
//! - `filters`: 外文脚本判定与非名称文本过滤
//! - `ranker`: 行内候选片段打分排序
//! - `batch`: 翻译请求的全局并发限流

pub mod batch;
pub mod filters;
pub mod ranker;

pub use batch::{LimiterStats, RequestLimiter};
pub use filters::{is_foreign_script, looks_like_ticker, CandidateFilter, Rejection};
pub use ranker::{Candidate, CandidateRanker, RankerConfig};
