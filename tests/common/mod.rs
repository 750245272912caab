// 集成测试公共模块
//
// 提供可控的翻译后端、测试配置和测试页面

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use markup5ever_rcdom::{Handle, RcDom};

use row_translator::parsers::html::dom::{find_element_by_id, get_node_attr, html_to_dom, text_content};
use row_translator::translation::{
    constants, Orchestrator, TranslationConfig, TranslationError, TranslationOracle,
    TranslationResult, TranslationService,
};

/// 可控的翻译后端
///
/// 按词表返回译文，词表外的文本返回 `EN(<原文>)`；记录调用次数和
/// 同时在途的最大请求数。
pub struct MockOracle {
    table: HashMap<String, String>,
    failing: Mutex<HashSet<String>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            failing: Mutex::new(HashSet::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_entry(mut self, source: &str, translated: &str) -> Self {
        self.table.insert(source.to_string(), translated.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(self, text: &str) -> Self {
        self.failing.lock().unwrap().insert(text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// 请求过的文本，按调用顺序
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|t| *t == text).count()
    }
}

impl TranslationOracle for MockOracle {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        _source_lang: &'a str,
        _target_lang: &'a str,
    ) -> BoxFuture<'a, TranslationResult<String>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.lock().unwrap().contains(text) {
                return Err(TranslationError::HttpStatus(503));
            }
            Ok(self
                .table
                .get(text)
                .cloned()
                .unwrap_or_else(|| format!("EN({})", text)))
        }
        .boxed()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// 测试配置构建器
pub struct TestConfigBuilder {
    config: TranslationConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TranslationConfig::default(),
        }
    }

    pub fn with_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrent_requests = max;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn with_test_mode(mut self) -> Self {
        self.config.test_mode = true;
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    pub fn with_site_pattern(mut self, pattern: &str) -> Self {
        self.config.site_pattern = Some(pattern.to_string());
        self
    }

    pub fn build(self) -> TranslationConfig {
        self.config
    }
}

/// HTML测试工具
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    pub fn create_test_dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").unwrap()
    }

    /// 单行标记：名称片段 id 为 `<row_id>-name`，代码片段 id 为 `<row_id>-ticker`
    pub fn token_row(row_id: &str, name: &str, ticker: &str) -> String {
        format!(
            r#"<div id="{row}" class="row"><div href="/sol/token/{row}"><span id="{row}-name">{name}</span><span id="{row}-ticker">{ticker}</span><span>$12.5K</span><span>0x9f3ab2c4</span></div></div>"#,
            row = row_id,
            name = name,
            ticker = ticker,
        )
    }

    /// 代币列表页面
    pub fn token_list_page(rows: &[(&str, &str, &str)]) -> String {
        let body: String = rows
            .iter()
            .map(|(id, name, ticker)| Self::token_row(id, name, ticker))
            .collect();
        format!(
            r#"<!DOCTYPE html><html><head><title>List</title></head><body><div id="list">{}</div></body></html>"#,
            body
        )
    }

    pub fn by_id(dom: &RcDom, id: &str) -> Handle {
        find_element_by_id(&dom.document, id).unwrap_or_else(|| panic!("元素 #{} 不存在", id))
    }

    pub fn text_of(dom: &RcDom, id: &str) -> String {
        text_content(&Self::by_id(dom, id)).trim().to_string()
    }

    pub fn is_highlighted(node: &Handle) -> bool {
        get_node_attr(node, "class")
            .map(|class| class.split_whitespace().any(|c| c == constants::HIGHLIGHT_CLASS))
            .unwrap_or(false)
    }
}

/// 组装编排器
pub fn orchestrator_for(
    html: &str,
    oracle: Arc<MockOracle>,
    config: TranslationConfig,
) -> Orchestrator {
    let dom = HtmlTestHelper::create_test_dom(html);
    let service = TranslationService::new(oracle, &config);
    Orchestrator::new(dom, service, config).expect("Orchestrator should build")
}
