//! # Row Translator Library
//!
//! 对实时更新的行列表做增量翻译：找出每行里最像名称的中日文短片段，
//! 翻译后原位写回并高亮，同时保证重复处理不会反复请求或反复改写。
//!
//! ## 模块组织
//!
//! - `env` - 环境变量定义
//! - `parsers` - HTML解析、DOM操作、高亮与序列化
//! - `translation` - 翻译管道

pub mod env;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use parsers::*;
