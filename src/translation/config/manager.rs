//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、`.env`、环境变量和默认值。
//! 优先级从低到高：默认值 → 配置文件 → 环境变量。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 管道配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 基础配置
    pub target_lang: String,
    pub source_lang: String,
    pub api_url: String,
    pub test_mode: bool,

    // 性能配置
    pub max_concurrent_requests: usize,
    /// 0 表示不设超时
    pub request_timeout_secs: u64,

    // 缓存配置
    /// 0 表示不限容量
    pub cache_capacity: usize,

    // 候选配置
    pub top_k: usize,
    pub max_slots: usize,
    pub max_candidate_chars: usize,
    pub max_slot_chars: usize,
    pub leaf_tags: Vec<String>,

    // 变更监听配置
    pub debounce_ms: u64,
    pub watched_attributes: Vec<String>,
    pub row_href_patterns: Vec<String>,

    // 启动与重扫
    pub site_pattern: Option<String>,
    pub rescan_throttle_ms: u64,
    pub startup_retry_attempts: usize,

    // 高亮
    pub highlight_class: String,
    pub highlight_color: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            api_url: constants::DEFAULT_API_URL.to_string(),
            test_mode: false,

            max_concurrent_requests: constants::DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),

            cache_capacity: 0,

            top_k: constants::DEFAULT_TOP_K,
            max_slots: constants::DEFAULT_MAX_SLOTS,
            max_candidate_chars: constants::MAX_CANDIDATE_CHARS,
            max_slot_chars: constants::MAX_SLOT_CHARS,
            leaf_tags: to_strings(constants::LEAF_TAGS),

            debounce_ms: constants::DEFAULT_DEBOUNCE.as_millis() as u64,
            watched_attributes: to_strings(constants::WATCHED_ATTRIBUTES),
            row_href_patterns: to_strings(constants::ROW_HREF_PATTERNS),

            site_pattern: None,
            rescan_throttle_ms: constants::DEFAULT_RESCAN_THROTTLE.as_millis() as u64,
            startup_retry_attempts: constants::STARTUP_RETRY_ATTEMPTS,

            highlight_class: constants::HIGHLIGHT_CLASS.to_string(),
            highlight_color: constants::HIGHLIGHT_COLOR.to_string(),
        }
    }
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_lang: &str) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::ConfigError("目标语言不能为空".to_string()));
        }

        if self.max_concurrent_requests == 0 {
            return Err(TranslationError::ConfigError("最大并发数不能为0".to_string()));
        }

        if self.max_slots == 0 || self.top_k < self.max_slots {
            return Err(TranslationError::ConfigError(format!(
                "候选数量无效: top_k={} max_slots={}",
                self.top_k, self.max_slots
            )));
        }

        if self.max_slot_chars > self.max_candidate_chars {
            return Err(TranslationError::ConfigError(
                "槽位长度上限不能超过候选长度上限".to_string(),
            ));
        }

        if self.leaf_tags.is_empty() {
            return Err(TranslationError::ConfigError("叶子标签列表不能为空".to_string()));
        }

        if let Some(pattern) = &self.site_pattern {
            regex::Regex::new(pattern)?;
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        use crate::env::{cache, feed, translation, EnvVar};

        if let Some(target_lang) = translation::TargetLang::get_set()? {
            self.target_lang = target_lang;
        }

        if let Some(api_url) = translation::ApiUrl::get_set()? {
            tracing::info!("环境变量覆盖 API URL: {}", api_url);
            self.api_url = api_url;
        }

        if let Some(max_concurrent) = translation::MaxConcurrentRequests::get_set()? {
            self.max_concurrent_requests = max_concurrent;
        }

        if let Some(timeout) = translation::RequestTimeout::get_set()? {
            self.request_timeout_secs = timeout.as_secs();
        }

        if let Some(test_mode) = translation::TestMode::get_set()? {
            self.test_mode = test_mode;
        }

        if let Some(debounce) = feed::DebounceMs::get_set()? {
            self.debounce_ms = debounce;
        }

        if let Some(capacity) = cache::Capacity::get_set()? {
            self.cache_capacity = capacity;
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn rescan_throttle(&self) -> Duration {
        Duration::from_millis(self.rescan_throttle_ms)
    }

    pub fn cache_capacity(&self) -> Option<usize> {
        (self.cache_capacity > 0).then_some(self.cache_capacity)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// 按 默认值 → 配置文件 → `.env` → 环境变量 的顺序加载
    pub fn new() -> TranslationResult<Self> {
        let config = match super::find_config_file() {
            Some(path) => Self::load_from_file(&path)?,
            None => TranslationConfig::default(),
        };
        Self::finish(config)
    }

    /// 从指定文件加载，同样应用环境变量覆盖
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let config = Self::load_from_file(path.as_ref())?;
        Self::finish(config)
    }

    fn finish(mut config: TranslationConfig) -> TranslationResult<Self> {
        // .env 文件缺失不是错误
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!("未加载 .env 文件: {}", e);
        }
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(Self { config })
    }

    fn load_from_file(path: &Path) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::ConfigError(format!("读取配置文件失败 {}: {}", path.display(), e))
        })?;
        let config: TranslationConfig = toml::from_str(&content)?;
        tracing::info!("已加载配置文件: {}", path.display());
        Ok(config)
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
