//! 译文高亮标记
//!
//! 高亮只做两件事：给元素加上类名，并写入带 `!important` 的内联颜色，
//! 以免宿主页面的样式覆盖。两个操作都是幂等的。

use html5ever::interface::{Attribute, QualName};
use html5ever::tendril::format_tendril;
use html5ever::tree_builder::create_element;
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, RcDom};

use super::dom::{
    add_class, append_child, find_element_by_id, get_child_node_by_name, get_style_property,
    has_class, remove_class, remove_style_property, set_style_property, set_text_content,
};
use crate::translation::config::constants;

/// 高亮样式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightStyle {
    pub class_name: String,
    pub color: String,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            class_name: constants::HIGHLIGHT_CLASS.to_string(),
            color: constants::HIGHLIGHT_COLOR.to_string(),
        }
    }
}

impl HighlightStyle {
    pub fn new(class_name: &str, color: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            color: color.to_string(),
        }
    }

    fn inline_color(&self) -> String {
        format!("{} !important", self.color)
    }

    /// 标记元素为已翻译
    pub fn paint(&self, node: &Handle) {
        add_class(node, &self.class_name);
        set_style_property(node, "color", &self.inline_color());
    }

    /// 移除高亮；只移除本模块写入的颜色
    pub fn clear(&self, node: &Handle) {
        remove_class(node, &self.class_name);
        if get_style_property(node, "color").as_deref() == Some(self.inline_color().as_str()) {
            remove_style_property(node, "color");
        }
    }

    pub fn is_painted(&self, node: &Handle) -> bool {
        has_class(node, &self.class_name)
            && get_style_property(node, "color").as_deref() == Some(self.inline_color().as_str())
    }

    /// 向文档注入一次高亮样式表；已存在时返回 false
    pub fn ensure_style_element(&self, dom: &RcDom) -> bool {
        if find_element_by_id(&dom.document, constants::HIGHLIGHT_STYLE_ID).is_some() {
            return false;
        }
        let Some(html) = get_child_node_by_name(&dom.document, "html") else {
            return false;
        };
        let parent = get_child_node_by_name(&html, "head").unwrap_or(html);

        let style = create_element(
            dom,
            QualName::new(None, ns!(html), LocalName::from("style")),
            vec![Attribute {
                name: QualName::new(None, ns!(), LocalName::from("id")),
                value: format_tendril!("{}", constants::HIGHLIGHT_STYLE_ID),
            }],
        );
        set_text_content(
            &style,
            &format!(".{} {{ color: {} !important; }}", self.class_name, self.color),
        );
        append_child(&parent, &style);
        tracing::info!(
            "已注入高亮样式 .{} ({})",
            self.class_name,
            self.color
        );
        true
    }
}
