//! 文本过滤器模块
//!
//! 外文脚本（CJK）判定，以及排除地址、金额、数字、超长文本等明显不是名称的片段。

use std::sync::OnceLock;

use regex::Regex;

/// 判断文本是否包含 CJK 字符（平假名/片假名及其语音扩展与半角形式、统一汉字及其扩展、兼容汉字与兼容形式）
pub fn is_foreign_script(text: &str) -> bool {
    text.chars().any(is_cjk_char)
}

fn is_cjk_char(c: char) -> bool {
    matches!(
        c,
        '\u{3040}'..='\u{30FF}'
            | '\u{31F0}'..='\u{31FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{FE30}'..='\u{FE4F}'
            | '\u{FF66}'..='\u{FF9F}'
            | '\u{20000}'..='\u{2FA1F}'
            | '\u{30000}'..='\u{323AF}'
    )
}

/// 正则表达式缓存
struct RegexCache {
    hex_address: OnceLock<Regex>,
    numeric_prefix: OnceLock<Regex>,
    magnitude_number: OnceLock<Regex>,
    ticker: OnceLock<Regex>,
}

static REGEX_CACHE: RegexCache = RegexCache {
    hex_address: OnceLock::new(),
    numeric_prefix: OnceLock::new(),
    magnitude_number: OnceLock::new(),
    ticker: OnceLock::new(),
};

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|_| Regex::new(r"[^\s\S]").unwrap()))
}

/// `0x` 开头的十六进制地址
pub fn is_hex_address(text: &str) -> bool {
    cached(&REGEX_CACHE.hex_address, r"^0x[0-9a-fA-F]{4,}$").is_match(text)
}

/// 金额或数字：`$` 前缀数字、数字开头，或带 K/M/B 量级的数字
pub fn is_numeric_like(text: &str) -> bool {
    cached(&REGEX_CACHE.numeric_prefix, r"^\$?\d").is_match(text)
        || cached(&REGEX_CACHE.magnitude_number, r"^\d+(\.\d+)?[KMB]?$").is_match(text)
}

/// 形似交易代码：2-12 个大写字母、数字或 `._-`
pub fn looks_like_ticker(text: &str) -> bool {
    cached(&REGEX_CACHE.ticker, r"^[A-Z0-9._-]{2,12}$").is_match(text)
}

/// 片段过滤器
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    max_chars: usize,
}

/// 片段被排除的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    HexAddress,
    Numeric,
    TooLong,
}

impl CandidateFilter {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// 对已 trim 的文本给出排除原因，`None` 表示可作为候选
    pub fn rejection(&self, text: &str) -> Option<Rejection> {
        if text.is_empty() {
            return Some(Rejection::Empty);
        }
        if is_hex_address(text) {
            return Some(Rejection::HexAddress);
        }
        if is_numeric_like(text) {
            return Some(Rejection::Numeric);
        }
        if text.chars().count() > self.max_chars {
            return Some(Rejection::TooLong);
        }
        None
    }

    pub fn accepts(&self, text: &str) -> bool {
        self.rejection(text).is_none()
    }
}
