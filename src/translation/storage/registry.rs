//! 行与片段的身份登记
//!
//! 宿主文档里的节点随时可能被外部渲染器移除或替换。登记表只把节点
//! 指针当作查找键，记录里保存 `Weak` 引用；每次查找都校验节点仍然存活
//! 且就是原来那个，`sweep` 清理节点已释放的记录。

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

use crate::parsers::html::dom::{get_node_attr, set_node_attr};
use crate::translation::config::constants;

/// 行标识，分配后写入元素的 `data-ttt-rowid`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

impl RowId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// 片段标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(u64);

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// 文本指纹：blake3 摘要的前 8 字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        let hash = blake3::hash(text.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        Fingerprint(u64::from_le_bytes(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// 片段处理状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentState {
    /// 上次处理完成时的文本指纹
    pub fingerprint: Option<Fingerprint>,
    pub processed: bool,
    pub translated: bool,
    /// 首次处理前的原文
    pub provenance: Option<String>,
}

impl FragmentState {
    /// 当前文本是否与上次处理完成时一致
    pub fn is_current(&self, text: &str) -> bool {
        self.fingerprint == Some(Fingerprint::of(text))
    }

    /// 清除处理标记，保留原文快照
    pub fn reset_markers(&mut self) {
        self.fingerprint = None;
        self.processed = false;
        self.translated = false;
    }
}

/// 行记录
#[derive(Debug)]
pub struct RowRecord {
    pub id: RowId,
    node: Weak<Node>,
    /// 最近一次处理选中的片段
    pub candidate_fragments: Vec<FragmentId>,
}

impl RowRecord {
    pub fn node(&self) -> Option<Handle> {
        self.node.upgrade()
    }
}

/// 片段记录
#[derive(Debug)]
pub struct FragmentRecord {
    pub id: FragmentId,
    node: Weak<Node>,
    pub state: FragmentState,
}

impl FragmentRecord {
    pub fn node(&self) -> Option<Handle> {
        self.node.upgrade()
    }
}

fn node_key(node: &Handle) -> usize {
    Rc::as_ptr(node) as usize
}

fn same_node(weak: &Weak<Node>, node: &Handle) -> bool {
    weak.upgrade()
        .map(|live| Rc::ptr_eq(&live, node))
        .unwrap_or(false)
}

/// 登记表
#[derive(Debug, Default)]
pub struct Registry {
    next_row: u64,
    next_fragment: u64,
    rows: HashMap<usize, RowRecord>,
    row_index: HashMap<RowId, usize>,
    fragments: HashMap<usize, FragmentRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得行标识，首次见到时分配并写入元素属性
    pub fn row_id(&mut self, node: &Handle) -> RowId {
        if let Some(id) = self.lookup_row(node) {
            return id;
        }

        let key = node_key(node);
        // 地址被复用时旧记录已失效
        if let Some(stale) = self.rows.remove(&key) {
            self.row_index.remove(&stale.id);
        }

        self.next_row += 1;
        let id = RowId(self.next_row);
        self.rows.insert(
            key,
            RowRecord {
                id,
                node: Rc::downgrade(node),
                candidate_fragments: Vec::new(),
            },
        );
        self.row_index.insert(id, key);

        if get_node_attr(node, constants::ROW_ID_ATTR).as_deref() != Some(&id.to_string()) {
            set_node_attr(node, constants::ROW_ID_ATTR, Some(id.to_string()));
        }
        tracing::trace!("登记新行 {}", id);
        id
    }

    /// 查找已登记的行标识，不分配
    pub fn lookup_row(&self, node: &Handle) -> Option<RowId> {
        self.rows
            .get(&node_key(node))
            .filter(|record| same_node(&record.node, node))
            .map(|record| record.id)
    }

    /// 行标识对应的元素，元素已释放时返回 `None`
    pub fn row_node(&self, id: RowId) -> Option<Handle> {
        let key = self.row_index.get(&id)?;
        self.rows.get(key)?.node()
    }

    pub fn row(&self, id: RowId) -> Option<&RowRecord> {
        let key = self.row_index.get(&id)?;
        self.rows.get(key)
    }

    /// 记录本次处理选中的片段
    pub fn set_row_candidates(&mut self, id: RowId, fragments: Vec<FragmentId>) {
        if let Some(key) = self.row_index.get(&id) {
            if let Some(record) = self.rows.get_mut(key) {
                record.candidate_fragments = fragments;
            }
        }
    }

    fn fragment_record(&mut self, node: &Handle) -> &mut FragmentRecord {
        let next_fragment = &mut self.next_fragment;
        let mut fresh = || {
            *next_fragment += 1;
            FragmentRecord {
                id: FragmentId(*next_fragment),
                node: Rc::downgrade(node),
                state: FragmentState::default(),
            }
        };

        match self.fragments.entry(node_key(node)) {
            Entry::Occupied(mut entry) => {
                // 地址被复用时旧记录已失效
                if !same_node(&entry.get().node, node) {
                    entry.insert(fresh());
                }
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(fresh()),
        }
    }

    /// 取得片段标识，首次见到时分配
    pub fn fragment_id(&mut self, node: &Handle) -> FragmentId {
        self.fragment_record(node).id
    }

    /// 片段状态，不存在时返回 `None`
    pub fn fragment_state(&self, node: &Handle) -> Option<&FragmentState> {
        self.fragments
            .get(&node_key(node))
            .filter(|record| same_node(&record.node, node))
            .map(|record| &record.state)
    }

    /// 可写的片段状态，不存在时创建
    pub fn fragment_state_mut(&mut self, node: &Handle) -> &mut FragmentState {
        &mut self.fragment_record(node).state
    }

    /// 清除片段的处理标记；片段未登记时什么也不做
    pub fn invalidate_fragment(&mut self, node: &Handle) -> bool {
        let key = node_key(node);
        match self.fragments.get_mut(&key) {
            Some(record) if same_node(&record.node, node) => {
                record.state.reset_markers();
                true
            }
            _ => false,
        }
    }

    /// 删除元素已释放的记录，返回删除数量
    pub fn sweep(&mut self) -> usize {
        let rows_before = self.rows.len();
        let fragments_before = self.fragments.len();

        self.rows.retain(|_, record| record.node.strong_count() > 0);
        let rows = &self.rows;
        self.row_index.retain(|_, key| rows.contains_key(key));
        self.fragments
            .retain(|_, record| record.node.strong_count() > 0);

        let removed =
            (rows_before - self.rows.len()) + (fragments_before - self.fragments.len());
        if removed > 0 {
            tracing::debug!("清理失效记录 {} 条", removed);
        }
        removed
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }
}
