//! 候选片段排序
//!
//! 从一行中挑出值得翻译的短文本叶子节点。先宽后窄两步：
//! `rank_candidates` 取得分最高的前 K 个，`select_slots` 再按长度上限
//! 收窄到最终翻译的槽位（默认 2 个，通常是名称和交易代码）。

use markup5ever_rcdom::Handle;
use std::collections::HashSet;

use super::filters::{is_foreign_script, looks_like_ticker, CandidateFilter};
use crate::parsers::html::dom::{descendant_elements, get_node_name, has_element_children, text_content};
use crate::translation::config::{constants, TranslationConfig};

/// 排序后的候选片段
#[derive(Debug, Clone)]
pub struct Candidate {
    /// 叶子元素
    pub node: Handle,
    /// trim 后的文本
    pub text: String,
    pub score: i32,
    /// 在行内的文档顺序
    pub order: usize,
}

impl Candidate {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 排序器配置
#[derive(Debug, Clone)]
pub struct RankerConfig {
    pub top_k: usize,
    pub max_candidate_chars: usize,
    pub max_slots: usize,
    pub max_slot_chars: usize,
    pub leaf_tags: Vec<String>,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self::from(&TranslationConfig::default())
    }
}

impl From<&TranslationConfig> for RankerConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            top_k: config.top_k,
            max_candidate_chars: config.max_candidate_chars,
            max_slots: config.max_slots,
            max_slot_chars: config.max_slot_chars,
            leaf_tags: config.leaf_tags.clone(),
        }
    }
}

/// 候选排序器
#[derive(Debug, Clone)]
pub struct CandidateRanker {
    config: RankerConfig,
    filter: CandidateFilter,
}

impl Default for CandidateRanker {
    fn default() -> Self {
        Self::new(RankerConfig::default())
    }
}

impl CandidateRanker {
    pub fn new(config: RankerConfig) -> Self {
        let filter = CandidateFilter::new(config.max_candidate_chars);
        Self { config, filter }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// 打分：外文 +100，交易代码 +50，再加最多 20 分的短文本奖励
    pub fn score(text: &str) -> i32 {
        let mut score = 0;
        if is_foreign_script(text) {
            score += constants::FOREIGN_SCRIPT_SCORE;
        }
        if looks_like_ticker(text) {
            score += constants::TICKER_SCORE;
        }
        let len = text.chars().count().min(constants::SHORTNESS_CEILING);
        score + (constants::SHORTNESS_CEILING - len) as i32
    }

    /// 行内没有子元素的叶子元素，按文档顺序
    pub fn leaf_fragments(&self, row: &Handle) -> Vec<Handle> {
        descendant_elements(row)
            .into_iter()
            .filter(|node| {
                get_node_name(node)
                    .map(|name| self.config.leaf_tags.iter().any(|tag| tag == name))
                    .unwrap_or(false)
            })
            .filter(|node| !has_element_children(node))
            .collect()
    }

    /// 过滤、按文本去重、打分，稳定降序排序后取前 K 个
    ///
    /// 已处理过的片段不会被排除，身份记录需要它们继续出现在结果里。
    pub fn rank_candidates(&self, row: &Handle) -> Vec<Candidate> {
        let mut seen_text = HashSet::new();
        let mut items = Vec::new();

        for (order, node) in self.leaf_fragments(row).into_iter().enumerate() {
            let text = text_content(&node).trim().to_string();
            if let Some(reason) = self.filter.rejection(&text) {
                tracing::trace!("排除片段 {:?}: {:?}", text, reason);
                continue;
            }
            // 同一名称在行内出现两次时只占一个槽位
            if !seen_text.insert(text.clone()) {
                continue;
            }
            let score = Self::score(&text);
            items.push(Candidate {
                node,
                text,
                score,
                order,
            });
        }

        let total = items.len();
        items.sort_by(|a, b| b.score.cmp(&a.score));
        items.truncate(self.config.top_k);

        tracing::debug!(
            "候选排序: {} 个候选, 选中 {:?}",
            total,
            items.iter().map(|c| c.text.as_str()).collect::<Vec<_>>()
        );
        items
    }

    /// 从排序结果中取前 `max_slots` 个不超过槽位长度上限的候选
    pub fn select_slots(&self, ranked: Vec<Candidate>) -> Vec<Candidate> {
        ranked
            .into_iter()
            .filter(|candidate| candidate.char_count() <= self.config.max_slot_chars)
            .take(self.config.max_slots)
            .collect()
    }

    /// 排序并选出最终槽位
    pub fn select(&self, row: &Handle) -> Vec<Candidate> {
        self.select_slots(self.rank_candidates(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{find_element_by_id, html_to_dom};

    fn row(inner: &str) -> Handle {
        let html = format!("<div id=\"row\" href=\"/token/1\">{}</div>", inner);
        let dom = html_to_dom(html.as_bytes(), "utf-8").unwrap();
        find_element_by_id(&dom.document, "row").unwrap()
    }

    fn texts(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_foreign_script_then_ticker() {
        let row = row(
            "<span>日本語のトークン名</span><span>ABC123</span>\
             <span>0x1234abcd</span><span>$1.2K</span>",
        );
        let ranker = CandidateRanker::default();
        let ranked = ranker.rank_candidates(&row);

        assert_eq!(texts(&ranked), vec!["日本語のトークン名", "ABC123"]);
        assert_eq!(ranked[0].score, 100 + 11);
        assert_eq!(ranked[1].score, 50 + 14);
    }

    #[test]
    fn test_only_leaf_elements_are_considered() {
        let row = row("<div><span>中文</span><b>粗体</b></div><a>LINK</a>");
        let ranker = CandidateRanker::default();
        let leaves = ranker.leaf_fragments(&row);
        let leaf_texts: Vec<String> = leaves.iter().map(text_content).collect();

        // <div> 含子元素，<b> 不在叶子标签列表中
        assert_eq!(leaf_texts, vec!["中文", "LINK"]);
    }

    #[test]
    fn test_duplicate_text_takes_one_slot() {
        let row = row("<span>中文名称</span><span>中文名称</span><span>TICK</span>");
        let selected = CandidateRanker::default().select(&row);
        assert_eq!(texts(&selected), vec!["中文名称", "TICK"]);
    }

    #[test]
    fn test_ties_keep_document_order() {
        let row = row("<span>alpha</span><span>gamma</span><span>delta</span>");
        let ranked = CandidateRanker::default().rank_candidates(&row);
        assert_eq!(texts(&ranked), vec!["alpha", "gamma", "delta"]);
        assert!(ranked.windows(2).all(|w| w[0].order < w[1].order));
    }

    #[test]
    fn test_top_k_then_slot_length_ceiling() {
        let long_name = "这是一个非常非常长的代币名称已经超过二十个字符的限制了";
        let row = row(&format!(
            "<span>{}</span><span>短名</span><span>TICK</span><span>misc</span><span>other</span>",
            long_name
        ));
        let ranker = CandidateRanker::default();

        let ranked = ranker.rank_candidates(&row);
        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked[0].text, "短名");
        assert_eq!(ranked[1].text, long_name);

        let selected = ranker.select_slots(ranked);
        assert_eq!(texts(&selected), vec!["短名", "TICK"]);
    }

    #[test]
    fn test_row_without_candidates() {
        let row = row("<span>  </span><span>1,024</span><span>0xabcdef12</span>");
        assert!(CandidateRanker::default().select(&row).is_empty());
    }
}
