//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，所有变量以 `ROW_TRANSLATOR_` 为前缀。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 只在变量被显式设置时返回值，解析失败同样返回错误
    fn get_set() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "ROW_TRANSLATOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "ROW_TRANSLATOR_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Target language for translation (e.g. en, zh-TW)";

        fn parse(value: &str) -> EnvResult<String> {
            let lang = value.trim();
            let valid = !lang.is_empty()
                && lang.len() <= 8
                && lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid language code '{}'", value),
                });
            }
            Ok(lang.to_string())
        }
    }

    /// API URL
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "ROW_TRANSLATOR_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Translation API endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// 最大并发请求数
    pub struct MaxConcurrentRequests;
    impl EnvVar<usize> for MaxConcurrentRequests {
        const NAME: &'static str = "ROW_TRANSLATOR_MAX_CONCURRENT_REQUESTS";
        const DEFAULT: Option<usize> = Some(16);
        const DESCRIPTION: &'static str = "Maximum translation requests in flight at once";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 256)
        }
    }

    /// 单次请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "ROW_TRANSLATOR_REQUEST_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(10));
        const DESCRIPTION: &'static str = "Per-request timeout in seconds (0 disables it)";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds: u64 = value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of seconds".to_string(),
            })?;

            if seconds > 300 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Timeout too long (max 300 seconds)".to_string(),
                });
            }

            Ok(Duration::from_secs(seconds))
        }
    }

    /// 测试模式：不请求接口，写入 `[TEST]` 前缀
    pub struct TestMode;
    impl EnvVar<bool> for TestMode {
        const NAME: &'static str = "ROW_TRANSLATOR_TEST_MODE";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Write [TEST] markers instead of calling the API";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 变更监听相关环境变量
pub mod feed {
    use super::*;

    /// 行级去抖间隔
    pub struct DebounceMs;
    impl EnvVar<u64> for DebounceMs {
        const NAME: &'static str = "ROW_TRANSLATOR_DEBOUNCE_MS";
        const DEFAULT: Option<u64> = Some(40);
        const DESCRIPTION: &'static str = "Per-row debounce interval in milliseconds";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_positive_usize(value, Self::NAME, 1, 10_000).map(|ms| ms as u64)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存容量（0 表示不限）
    pub struct Capacity;
    impl EnvVar<usize> for Capacity {
        const NAME: &'static str = "ROW_TRANSLATOR_CACHE_CAPACITY";
        const DEFAULT: Option<usize> = Some(0);
        const DESCRIPTION: &'static str = "Translation cache capacity (0 = unbounded)";

        fn parse(value: &str) -> EnvResult<usize> {
            value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid non-negative number".to_string(),
            })
        }
    }
}

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}
