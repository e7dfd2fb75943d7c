//! 免费网页翻译后端
//!
//! 使用 `translate_a/single` 接口 (client=gtx)，不需要密钥。
//! 网络错误、429 和 5xx 会按指数退避重试。

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{backoff, TextTranslator};
use crate::api_constants::{api_config, service_config};
use crate::error::{Result, VocabError};
use crate::vocab_error;

pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
    max_retries: usize,
}

impl GoogleTranslator {
    pub fn new(max_retries: usize) -> Result<Self> {
        Self::with_endpoint(api_config::GOOGLE_TRANSLATE_URL, max_retries)
    }

    pub fn with_endpoint(endpoint: &str, max_retries: usize) -> Result<Self> {
        if !crate::api_constants::is_valid_api_url(endpoint) {
            return Err(vocab_error!(config, "endpoint", format!("无效的API地址: {}", endpoint)));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(service_config::REQUEST_TIMEOUT_SECONDS))
            .build()
            .context("创建HTTP客户端失败")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            max_retries: max_retries.max(1),
        })
    }

    async fn request_once(&self, source: &str, target: &str, text: &str) -> Result<String> {
        let source = if source.trim().is_empty() { "auto" } else { source };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(vocab_error!(
                translation_api,
                status.as_u16(),
                snippet(&body),
                self.endpoint
            ));
        }

        parse_response(&body)
    }
}

#[async_trait]
impl TextTranslator for GoogleTranslator {
    async fn translate(&self, source: &str, target: &str, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let mut last_err = None;
        for attempt in 0..self.max_retries {
            match self.request_once(source, target, text).await {
                Ok(translated) => return Ok(translated),
                Err(e) => {
                    let retry = is_retryable(&e) && attempt + 1 < self.max_retries;
                    debug!("翻译请求失败 (第{}次): {}", attempt + 1, e);
                    last_err = Some(e);
                    if !retry {
                        break;
                    }
                    tokio::time::sleep(backoff(attempt)).await;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| vocab_error!(network, "翻译请求未执行")))
    }

    fn name(&self) -> &str {
        "google"
    }
}

fn is_retryable(error: &VocabError) -> bool {
    match error {
        VocabError::Network { .. } => true,
        VocabError::TranslationApi { status_code, .. } => StatusCode::from_u16(*status_code)
            .map(|s| s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error())
            .unwrap_or(false),
        _ => false,
    }
}

/// 响应形如 `[[["Hello ","Hola ",...],["world","mundo",...]],null,"es",...]`，
/// 译文是第一个数组中每段的第一个元素
pub fn parse_response(body: &str) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| vocab_error!(response, e))?;

    let segments = value
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| vocab_error!(response, "缺少译文段落"))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(|s| s.as_str()))
        .collect();

    if translated.is_empty() {
        return Err(vocab_error!(response, "译文为空"));
    }
    Ok(translated.trim().to_string())
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > 400 {
        format!("{}...", trimmed.chars().take(400).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
