//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持配置文件、环境变量和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 候选排序相关
    pub const DEFAULT_TOP_K: usize = 4;
    pub const DEFAULT_MAX_SLOTS: usize = 2;
    pub const MAX_CANDIDATE_CHARS: usize = 40;
    pub const MAX_SLOT_CHARS: usize = 20;
    pub const FOREIGN_SCRIPT_SCORE: i32 = 100;
    pub const TICKER_SCORE: i32 = 50;
    pub const SHORTNESS_CEILING: usize = 20;

    // 叶子元素
    pub const LEAF_TAGS: &[&str] = &["div", "span", "a"];

    // 默认API设置
    pub const DEFAULT_API_URL: &str = "https://translate.googleapis.com/translate_a/single";
    pub const DEFAULT_TARGET_LANG: &str = "en";
    pub const DEFAULT_SOURCE_LANG: &str = "auto";
    pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    // 变更监听
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(40);
    pub const WATCHED_ATTRIBUTES: &[&str] = &["class", "style", "href", "data-index"];
    pub const ROW_HREF_PATTERNS: &[&str] = &["/token/", "/bsc/token/", "/sol/token/", "/eth/token/"];
    pub const ROW_TAG: &str = "div";

    // 启动与重扫
    pub const DEFAULT_RESCAN_THROTTLE: Duration = Duration::from_millis(300);
    pub const STARTUP_RETRY_DELAY: Duration = Duration::from_millis(300);
    pub const STARTUP_RETRY_INTERVAL: Duration = Duration::from_millis(500);
    pub const STARTUP_RETRY_ATTEMPTS: usize = 10;

    // 元素标记
    pub const ROW_ID_ATTR: &str = "data-ttt-rowid";
    pub const PROVENANCE_ATTR: &str = "title";
    pub const HIGHLIGHT_CLASS: &str = "ttt-translated";
    pub const HIGHLIGHT_COLOR: &str = "#fbeb77";
    pub const HIGHLIGHT_STYLE_ID: &str = "ttt-highlight-style";
    pub const TEST_MODE_PREFIX: &str = "[TEST] ";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "row-translator.toml",
        ".row-translator.toml",
        "~/.config/row-translator/config.toml",
        "/etc/row-translator/config.toml",
    ];
}

/// 查找第一个存在的配置文件
pub fn find_config_file() -> Option<std::path::PathBuf> {
    constants::CONFIG_PATHS
        .iter()
        .map(|path| std::path::PathBuf::from(shellexpand::tilde(path).into_owned()))
        .find(|path| path.exists())
}

/// 加载配置，失败时回退到默认值
pub fn load_translation_config(target_lang: &str) -> TranslationConfig {
    match ConfigManager::new() {
        Ok(manager) => {
            let mut config = manager.into_config();
            config.target_lang = target_lang.to_string();
            config
        }
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslationConfig::default_with_lang(target_lang)
        }
    }
}
