//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作（属性、文本、类名、内联样式、父子关系）
//! - `highlight`: 译文高亮标记
//! - `serializer`: 序列化功能

pub mod dom;
pub mod highlight;
pub mod serializer;

pub use dom::{
    ancestors_inclusive, descendant_elements, element_children, find_element_by_id,
    get_child_node_by_name, get_node_attr, get_node_name, get_parent_node, has_element_children,
    html_to_dom, is_element, set_node_attr, set_text_content, text_content,
};
pub use highlight::HighlightStyle;
pub use serializer::serialize_document;
