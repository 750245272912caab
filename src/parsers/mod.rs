//! # 解析器模块
//!
//! 这个模块包含宿主文档的解析和操作功能：
//!
//! - `html` - HTML文档解析、DOM操作、高亮标记、序列化

pub mod html;

// Re-export commonly used items for convenience
pub use html::{html_to_dom, serialize_document, HighlightStyle};
