//! 文档变更适配
//!
//! 外部渲染器每次改动文档后以 `Mutation` 报告改动。这里把改动翻译成
//! 行处理请求：新插入的行立即处理，文本与属性变化按行防抖。
//!
//! - `queue`: 行处理队列与防抖

pub mod queue;

use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use crate::parsers::html::dom::{
    ancestors_inclusive, element_children, get_node_attr, get_node_name, get_parent_node,
    is_element,
};
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::core::engine::ReconcileEngine;

pub use queue::{QueueStats, ReconcileQueue, ReconcileReceiver};

/// 文档改动
#[derive(Debug, Clone)]
pub enum Mutation {
    /// 插入了子节点
    ChildList { added: Vec<Handle> },
    /// 文本节点内容变化
    CharacterData { target: Handle },
    /// 元素属性变化
    Attributes { target: Handle, name: String },
    /// 节点被移除
    Removed { node: Handle },
}

/// 判断元素是否是一行
pub trait RowPredicate {
    fn is_row(&self, node: &Handle) -> bool;
}

impl<F> RowPredicate for F
where
    F: Fn(&Handle) -> bool,
{
    fn is_row(&self, node: &Handle) -> bool {
        self(node)
    }
}

/// 默认的行判定
///
/// `div` 自身的 `href` 含有代币详情路径，或者恰好有一个直接子 `div`
/// 满足这一点。有多个这样子元素的是列表容器，不算行。
#[derive(Debug, Clone)]
pub struct HrefRowPredicate {
    tag: String,
    patterns: Vec<String>,
}

impl Default for HrefRowPredicate {
    fn default() -> Self {
        Self {
            tag: constants::ROW_TAG.to_string(),
            patterns: constants::ROW_HREF_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl HrefRowPredicate {
    pub fn new(tag: &str, patterns: Vec<String>) -> Self {
        Self {
            tag: tag.to_string(),
            patterns,
        }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(constants::ROW_TAG, config.row_href_patterns.clone())
    }

    fn href_matches(&self, node: &Handle) -> bool {
        get_node_attr(node, "href")
            .map(|href| self.patterns.iter().any(|p| href.contains(p.as_str())))
            .unwrap_or(false)
    }
}

impl RowPredicate for HrefRowPredicate {
    fn is_row(&self, node: &Handle) -> bool {
        if get_node_name(node) != Some(self.tag.as_str()) {
            return false;
        }
        if self.href_matches(node) {
            return true;
        }
        let linked_children = element_children(node)
            .iter()
            .filter(|child| get_node_name(child) == Some(self.tag.as_str()))
            .filter(|child| self.href_matches(child))
            .count();
        linked_children == 1
    }
}

/// 自身也算在内的最外层行祖先，与 `outermost_rows` 找到的行一致
pub fn owning_row(predicate: &dyn RowPredicate, node: &Handle) -> Option<Handle> {
    ancestors_inclusive(node)
        .into_iter()
        .rev()
        .find(|ancestor| is_element(ancestor) && predicate.is_row(ancestor))
}

/// `root` 下最外层的行（含 `root` 自身），找到行后不再向下
pub fn outermost_rows(predicate: &dyn RowPredicate, root: &Handle) -> Vec<Handle> {
    let mut rows = Vec::new();
    collect_outermost(predicate, root, &mut rows);
    rows
}

fn collect_outermost(predicate: &dyn RowPredicate, node: &Handle, rows: &mut Vec<Handle>) {
    if is_element(node) && predicate.is_row(node) {
        rows.push(node.clone());
        return;
    }
    let children = match node.data {
        NodeData::Document => node.children.borrow().clone(),
        _ => element_children(node),
    };
    for child in children {
        collect_outermost(predicate, &child, rows);
    }
}

/// 变更适配器
pub struct ChangeFeed {
    predicate: Rc<dyn RowPredicate>,
    engine: Rc<ReconcileEngine>,
    queue: ReconcileQueue,
    watched_attributes: Vec<String>,
}

impl ChangeFeed {
    pub fn new(
        predicate: Rc<dyn RowPredicate>,
        engine: Rc<ReconcileEngine>,
        queue: ReconcileQueue,
        watched_attributes: Vec<String>,
    ) -> Self {
        Self {
            predicate,
            engine,
            queue,
            watched_attributes,
        }
    }

    pub fn queue(&self) -> &ReconcileQueue {
        &self.queue
    }

    pub fn predicate(&self) -> &Rc<dyn RowPredicate> {
        &self.predicate
    }

    /// 处理一条改动
    pub fn handle(&self, mutation: Mutation) {
        match mutation {
            Mutation::ChildList { added } => {
                for node in added.iter().filter(|node| is_element(node)) {
                    for row in outermost_rows(self.predicate.as_ref(), node) {
                        self.queue.reconcile_now(row);
                    }
                }
            }
            Mutation::CharacterData { target } => {
                let element = if is_element(&target) {
                    Some(target)
                } else {
                    get_parent_node(&target).filter(is_element)
                };
                let Some(element) = element else {
                    return;
                };

                if self.engine.invalidate_fragment(&element) {
                    tracing::debug!("文本被改写，已清除片段标记");
                }
                if let Some(row) = owning_row(self.predicate.as_ref(), &element) {
                    self.queue.schedule(row);
                }
            }
            Mutation::Attributes { target, name } => {
                if !self.watched_attributes.iter().any(|watched| *watched == name) {
                    return;
                }
                if let Some(row) = owning_row(self.predicate.as_ref(), &target) {
                    self.queue.schedule(row);
                }
            }
            Mutation::Removed { node } => {
                tracing::trace!(
                    "节点被移除: {:?}",
                    get_node_name(&node).unwrap_or("#text")
                );
            }
        }
    }
}
