//! 翻译后端接口
//!
//! 管道只依赖 `TranslationOracle` 这一个异步接口；默认实现调用
//! Google 的公开 gtx 端点，测试中可以换成任意实现。

use std::fmt;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use url::Url;

use crate::translation::config::TranslationConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译后端
///
/// 一次调用对应一次网络请求。实现方不需要缓存或重试，
/// 返回的译文应已 trim，空译文按失败处理。
pub trait TranslationOracle: Send + Sync {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source_lang: &'a str,
        target_lang: &'a str,
    ) -> BoxFuture<'a, TranslationResult<String>>;

    /// 日志中使用的名称
    fn name(&self) -> &str {
        "oracle"
    }
}

/// 基于 gtx 端点的翻译后端
#[derive(Clone)]
pub struct GoogleGtxOracle {
    client: reqwest::Client,
    api_url: String,
}

impl fmt::Debug for GoogleGtxOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleGtxOracle")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl GoogleGtxOracle {
    pub fn new(api_url: &str) -> TranslationResult<Self> {
        Url::parse(api_url)
            .map_err(|e| TranslationError::ConfigError(format!("API URL 无效 {}: {}", api_url, e)))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("row-translator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
        })
    }

    pub fn from_config(config: &TranslationConfig) -> TranslationResult<Self> {
        Self::new(&config.api_url)
    }

    /// 拼接请求地址，查询参数由 `url` 负责编码
    pub fn request_url(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Url> {
        Url::parse_with_params(
            &self.api_url,
            &[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ],
        )
        .map_err(|e| TranslationError::ConfigError(format!("无法构造请求地址: {}", e)))
    }

    async fn fetch(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<String> {
        let url = self.request_url(text, source_lang, target_lang)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::HttpStatus(status.as_u16()));
        }

        let body: Value = response.json().await?;
        parse_gtx_response(&body)
    }
}

impl TranslationOracle for GoogleGtxOracle {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source_lang: &'a str,
        target_lang: &'a str,
    ) -> BoxFuture<'a, TranslationResult<String>> {
        self.fetch(text, source_lang, target_lang).boxed()
    }

    fn name(&self) -> &str {
        "google-gtx"
    }
}

/// 解析 gtx 响应：拼接 `data[0][i][0]` 的所有字符串片段并 trim
pub fn parse_gtx_response(body: &Value) -> TranslationResult<String> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::ParseError("响应缺少译文段落".to_string()))?;

    let joined: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    let translated = joined.trim();
    if translated.is_empty() {
        return Err(TranslationError::ParseError("译文为空".to_string()));
    }
    Ok(translated.to_string())
}
