//! 行协调引擎
//!
//! 对一行执行一次处理：选出候选片段，等待它们的译文全部返回，然后逐个
//! 片段推进状态机。处理结果以指纹加处理标记的形式记在登记表里，内容不变
//! 的片段再次经过时只会重新上色。
//!
//! ## 片段状态机
//!
//! 1. 当前文本的指纹与记录不符（或没有记录）：清除标记与高亮，视为未处理
//! 2. 已处理：已翻译的重新上色，其余不动
//! 3. 未处理且含外文、译文与原文不同：写入译文、上色、标记已翻译
//! 4. 未处理的其他情况：保留文本；曾翻译过或原文含外文时重新上色
//!
//! 每次处理结束都记录最终文本的指纹，并标记为已处理。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let engine = ReconcileEngine::new(service, registry, &config);
//! let report = engine.reconcile_row(&row).await?;
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use markup5ever_rcdom::{Handle, NodeData};

use super::service::TranslationService;
use crate::parsers::html::dom::{
    ancestors_inclusive, get_node_attr, get_parent_node, is_element, set_node_attr,
    set_text_content, text_content,
};
use crate::parsers::html::HighlightStyle;
use crate::translation::{
    config::{constants, TranslationConfig},
    error::{helpers, TranslationError, TranslationResult},
    pipeline::{
        filters::is_foreign_script,
        ranker::{Candidate, CandidateRanker, RankerConfig},
    },
    storage::registry::{Fingerprint, FragmentState, Registry, RowId},
};

/// 片段在译文缺失时最多补译的轮数
const MAX_CATCH_UP_ROUNDS: usize = 2;

/// 单个片段一次处理的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// 写入了译文
    Translated,
    /// 已处理且内容未变，只重新上色
    Reasserted,
    /// 处理完成，文本保持原样
    Unchanged,
    /// 等待期间文本变成了尚未请求过译文的外文，留待下一轮
    Pending,
}

/// 一行处理的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowReport {
    pub row_id: Option<RowId>,
    pub candidates: usize,
    pub translated: usize,
    pub reasserted: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// 行已脱离文档，本次跳过
    pub skipped: bool,
}

impl RowReport {
    fn record(&mut self, outcome: FragmentOutcome) {
        match outcome {
            FragmentOutcome::Translated => self.translated += 1,
            FragmentOutcome::Reasserted => self.reasserted += 1,
            FragmentOutcome::Unchanged => self.unchanged += 1,
            FragmentOutcome::Pending => {}
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub target_lang: String,
    pub test_mode: bool,
    pub ranker: RankerConfig,
    pub highlight: HighlightStyle,
}

impl From<&TranslationConfig> for EngineConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            target_lang: config.target_lang.clone(),
            test_mode: config.test_mode,
            ranker: RankerConfig::from(config),
            highlight: HighlightStyle::new(&config.highlight_class, &config.highlight_color),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&TranslationConfig::default())
    }
}

/// 行协调引擎
///
/// 持有节点句柄，只能在单线程（`LocalSet`）中使用。登记表通过
/// `RefCell` 共享，借用从不跨越 `.await`。
pub struct ReconcileEngine {
    service: TranslationService,
    registry: Rc<RefCell<Registry>>,
    ranker: CandidateRanker,
    config: EngineConfig,
    stats: EngineStats,
}

impl ReconcileEngine {
    pub fn new(
        service: TranslationService,
        registry: Rc<RefCell<Registry>>,
        config: &TranslationConfig,
    ) -> Self {
        Self::with_config(service, registry, EngineConfig::from(config))
    }

    pub fn with_config(
        service: TranslationService,
        registry: Rc<RefCell<Registry>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            service,
            registry,
            ranker: CandidateRanker::new(config.ranker.clone()),
            config,
            stats: EngineStats::default(),
        }
    }

    pub fn registry(&self) -> &Rc<RefCell<Registry>> {
        &self.registry
    }

    pub fn service(&self) -> &TranslationService {
        &self.service
    }

    pub fn highlight(&self) -> &HighlightStyle {
        &self.config.highlight
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// 处理一行
    ///
    /// 单个片段的失败只记日志，不影响同一行的其他片段。
    pub async fn reconcile_row(&self, row: &Handle) -> TranslationResult<RowReport> {
        if !is_element(row) {
            return Err(TranslationError::InvalidInput("行节点不是元素".to_string()));
        }
        if !is_attached(row) {
            tracing::debug!("行已脱离文档，跳过");
            return Ok(RowReport {
                skipped: true,
                ..RowReport::default()
            });
        }

        self.stats.inc_passes();
        let row_id = self.registry.borrow_mut().row_id(row);
        let selected = self.ranker.select(row);

        let fragment_ids = {
            let mut registry = self.registry.borrow_mut();
            let ids: Vec<_> = selected
                .iter()
                .map(|candidate| registry.fragment_id(&candidate.node))
                .collect();
            registry.set_row_candidates(row_id, ids.clone());
            ids
        };

        let mut report = RowReport {
            row_id: Some(row_id),
            candidates: selected.len(),
            ..RowReport::default()
        };

        if self.config.test_mode {
            for candidate in &selected {
                let outcome = self.apply_test_marker(&candidate.node);
                report.record(outcome);
            }
            self.stats.absorb(&report);
            return Ok(report);
        }

        let mut pending: Vec<&Candidate> = selected.iter().collect();
        let mut texts: Vec<String> = selected.iter().map(|c| c.text.clone()).collect();

        for round in 0..=MAX_CATCH_UP_ROUNDS {
            if pending.is_empty() {
                break;
            }

            let translations = self
                .service
                .translate_many_unique(texts.iter().map(String::as_str), &self.config.target_lang)
                .await;

            let mut next = Vec::new();
            for candidate in pending {
                match self.reconcile_fragment(&candidate.node, &translations) {
                    Ok(FragmentOutcome::Pending) if round < MAX_CATCH_UP_ROUNDS => {
                        next.push(candidate)
                    }
                    Ok(outcome) => report.record(outcome),
                    Err(e) => {
                        report.failed += 1;
                        helpers::log_isolated(&format!("片段 {:?} 处理", candidate.text), &e);
                    }
                }
            }

            texts = next
                .iter()
                .map(|candidate| text_content(&candidate.node).trim().to_string())
                .collect();
            pending = next;
        }

        tracing::debug!(
            "行 {} 处理完成: 片段 {:?}, 翻译 {}, 重新上色 {}, 未变 {}, 失败 {}",
            row_id,
            fragment_ids,
            report.translated,
            report.reasserted,
            report.unchanged,
            report.failed
        );
        self.stats.absorb(&report);
        Ok(report)
    }

    /// 推进单个片段的状态机，不含 `.await`
    pub fn reconcile_fragment(
        &self,
        node: &Handle,
        translations: &HashMap<String, String>,
    ) -> TranslationResult<FragmentOutcome> {
        if get_parent_node(node).is_none() {
            return Err(helpers::detached_error("片段已从行中移除"));
        }

        let highlight = &self.config.highlight;
        let live = text_content(node).trim().to_string();

        let mut registry = self.registry.borrow_mut();
        let state = registry.fragment_state_mut(node);

        if !state.is_current(&live) {
            if state.processed {
                tracing::debug!("片段内容已变化，重新处理: {:?}", live);
            }
            state.reset_markers();
            highlight.clear(node);
        }

        if state.processed {
            if state.translated {
                highlight.paint(node);
                return Ok(FragmentOutcome::Reasserted);
            }
            return Ok(FragmentOutcome::Unchanged);
        }

        let foreign = is_foreign_script(&live);
        let translation = if foreign {
            match translations.get(&live) {
                Some(translation) => Some(translation),
                None => return Ok(FragmentOutcome::Pending),
            }
        } else {
            None
        };

        let (outcome, final_text) = match translation {
            Some(translated) if *translated != live => {
                set_text_content(node, translated);
                highlight.paint(node);
                state.translated = true;
                (FragmentOutcome::Translated, translated.clone())
            }
            _ => {
                let foreign_provenance = state
                    .provenance
                    .as_deref()
                    .map(is_foreign_script)
                    .unwrap_or(false);
                if state.translated || foreign_provenance {
                    highlight.paint(node);
                }
                (FragmentOutcome::Unchanged, live.clone())
            }
        };

        snapshot_provenance(node, state, &live);
        mark_processed(state, &final_text);
        Ok(outcome)
    }

    /// 测试模式：不请求译文，直接写入带前缀的原文
    fn apply_test_marker(&self, node: &Handle) -> FragmentOutcome {
        let highlight = &self.config.highlight;
        let live = text_content(node).trim().to_string();

        let mut registry = self.registry.borrow_mut();
        let state = registry.fragment_state_mut(node);

        if state.processed && state.is_current(&live) {
            highlight.paint(node);
            return FragmentOutcome::Reasserted;
        }

        state.reset_markers();
        snapshot_provenance(node, state, &live);

        let marked = if live.starts_with(constants::TEST_MODE_PREFIX) {
            live
        } else {
            format!("{}{}", constants::TEST_MODE_PREFIX, live)
        };
        set_text_content(node, &marked);
        highlight.paint(node);
        state.translated = true;
        mark_processed(state, &marked);

        FragmentOutcome::Translated
    }

    /// 文本节点被外部改写：立即清除所属元素的处理标记与高亮
    pub fn invalidate_fragment(&self, node: &Handle) -> bool {
        let cleared = self.registry.borrow_mut().invalidate_fragment(node);
        if cleared {
            self.config.highlight.clear(node);
        }
        cleared
    }
}

/// 一路向上能走到文档根节点
fn is_attached(node: &Handle) -> bool {
    ancestors_inclusive(node)
        .last()
        .map(|root| matches!(root.data, NodeData::Document))
        .unwrap_or(false)
}

/// 首次处理时记录原文，元素没有 `title` 时一并写入
fn snapshot_provenance(node: &Handle, state: &mut FragmentState, live: &str) {
    if state.provenance.is_some() {
        return;
    }
    state.provenance = Some(live.to_string());
    if get_node_attr(node, constants::PROVENANCE_ATTR).is_none() {
        set_node_attr(node, constants::PROVENANCE_ATTR, Some(live.to_string()));
    }
}

fn mark_processed(state: &mut FragmentState, final_text: &str) {
    state.fingerprint = Some(Fingerprint::of(final_text));
    state.processed = true;
}

/// 引擎统计信息
#[derive(Debug, Default)]
pub struct EngineStats {
    /// 行处理次数
    pub passes: AtomicUsize,
    pub fragments_translated: AtomicUsize,
    pub fragments_reasserted: AtomicUsize,
    pub fragments_unchanged: AtomicUsize,
    pub failures: AtomicUsize,
}

impl EngineStats {
    pub fn inc_passes(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    fn absorb(&self, report: &RowReport) {
        self.fragments_translated
            .fetch_add(report.translated, Ordering::Relaxed);
        self.fragments_reasserted
            .fetch_add(report.reasserted, Ordering::Relaxed);
        self.fragments_unchanged
            .fetch_add(report.unchanged, Ordering::Relaxed);
        self.failures.fetch_add(report.failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            fragments_translated: self.fragments_translated.load(Ordering::Relaxed),
            fragments_reasserted: self.fragments_reasserted.load(Ordering::Relaxed),
            fragments_unchanged: self.fragments_unchanged.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub passes: usize,
    pub fragments_translated: usize,
    pub fragments_reasserted: usize,
    pub fragments_unchanged: usize,
    pub failures: usize,
}
