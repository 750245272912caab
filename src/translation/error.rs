//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。管道内部的错误从不向外扩散：
//! 翻译失败回退为原文，单个片段或单行的失败只记录日志。

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 翻译接口返回非成功状态码
    #[error("翻译接口返回状态码 {0}")]
    HttpStatus(u16),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 节点已从文档中移除，或不再是元素
    #[error("节点已失效: {0}")]
    DetachedNode(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    ///
    /// 管道本身不会在进程生命周期内重试同一文本，这里只用于日志分级
    /// 以及自定义 oracle 的实现者。
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::HttpStatus(code) => *code == 429 || *code >= 500,
            TranslationError::ConfigError(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::DetachedNode(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::HttpStatus(_) => ErrorCategory::Network,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::DetachedNode(_) => ErrorCategory::Structure,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let new_msg = |msg: String| format!("{} (上下文: {})", msg, context);

        match self {
            TranslationError::ConfigError(msg) => TranslationError::ConfigError(new_msg(msg)),
            TranslationError::NetworkError(msg) => TranslationError::NetworkError(new_msg(msg)),
            TranslationError::ParseError(msg) => TranslationError::ParseError(new_msg(msg)),
            TranslationError::TimeoutError(msg) => TranslationError::TimeoutError(new_msg(msg)),
            TranslationError::DetachedNode(msg) => TranslationError::DetachedNode(new_msg(msg)),
            TranslationError::InvalidInput(msg) => TranslationError::InvalidInput(new_msg(msg)),
            TranslationError::InternalError(msg) => TranslationError::InternalError(new_msg(msg)),
            status @ TranslationError::HttpStatus(_) => status,
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Parsing,
    Timeout,
    Structure,
    Input,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::InternalError(format!("IO错误: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else if let Some(status) = error.status() {
            TranslationError::HttpStatus(status.as_u16())
        } else if error.is_decode() {
            TranslationError::ParseError(error.to_string())
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::ParseError(format!("JSON解析错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<regex::Error> for TranslationError {
    fn from(error: regex::Error) -> Self {
        TranslationError::ConfigError(format!("正则表达式无效: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<crate::env::EnvError> for TranslationError {
    fn from(error: crate::env::EnvError) -> Self {
        TranslationError::ConfigError(error.to_string())
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按可重试性分级记录错误，不改变控制流
    pub fn log_isolated(scope: &str, error: &TranslationError) {
        if error.is_retryable() {
            tracing::warn!("{}失败（已隔离）: {}", scope, error);
        } else {
            tracing::error!("{}失败（已隔离）: {}", scope, error);
        }
    }

    /// 创建节点失效错误
    pub fn detached_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::DetachedNode(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TranslationError::NetworkError("reset".into()).is_retryable());
        assert!(TranslationError::HttpStatus(503).is_retryable());
        assert!(TranslationError::HttpStatus(429).is_retryable());
        assert!(!TranslationError::HttpStatus(404).is_retryable());
        assert!(!TranslationError::ParseError("bad".into()).is_retryable());
    }

    #[test]
    fn test_with_context_keeps_variant() {
        let error = TranslationError::ParseError("empty body".into()).with_context("gtx");
        assert_eq!(error.category(), ErrorCategory::Parsing);
        assert!(error.to_string().contains("gtx"));

        let status = TranslationError::HttpStatus(500).with_context("ignored");
        assert_eq!(status, TranslationError::HttpStatus(500));
    }
}
