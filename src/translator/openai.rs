//! OpenAI Chat Completions 客户端
//!
//! 用于分批翻译和注音。408/429/5xx 视为临时错误并重试。

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::debug;

use super::{backoff, LlmClient};
use crate::api_constants::{api_config, service_config};
use crate::error::{Result, VocabError};
use crate::vocab_error;

pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    max_retries: usize,
}

impl OpenAiClient {
    pub fn new(api_key: &str, max_retries: usize) -> Result<Self> {
        Self::with_endpoint(api_config::OPENAI_CHAT_URL, api_key, max_retries)
    }

    pub fn with_endpoint(endpoint: &str, api_key: &str, max_retries: usize) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(vocab_error!(config, "api_key", "OpenAI 需要 API 密钥"));
        }
        if !crate::api_constants::is_valid_api_url(endpoint) {
            return Err(vocab_error!(config, "endpoint", format!("无效的API地址: {}", endpoint)));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(service_config::LLM_TIMEOUT_SECONDS))
            .build()
            .context("创建HTTP客户端失败")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.trim().to_string(),
            max_retries: max_retries.max(1),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String> {
        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": "You are a precise translation assistant for language learners." },
                { "role": "user", "content": prompt }
            ]
        });

        let mut last_err: Option<VocabError> = None;

        for attempt in 0..self.max_retries {
            let has_next = attempt + 1 < self.max_retries;

            let resp = match self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_err = Some(e.into());
                    if has_next {
                        tokio::time::sleep(backoff(attempt)).await;
                    }
                    continue;
                }
            };

            let status = resp.status();
            // 先按文本读取，JSON 解析失败时也能保留错误信息
            let text = match resp.text().await {
                Ok(t) => t,
                Err(e) => {
                    last_err = Some(e.into());
                    if has_next {
                        tokio::time::sleep(backoff(attempt)).await;
                    }
                    continue;
                }
            };

            if !status.is_success() {
                last_err = Some(vocab_error!(
                    translation_api,
                    status.as_u16(),
                    extract_error_message(&text),
                    self.endpoint
                ));
                if should_retry_http(status) && has_next {
                    debug!("OpenAI 返回 {}，准备重试", status);
                    tokio::time::sleep(backoff(attempt)).await;
                    continue;
                }
                break;
            }

            match parse_content(&text) {
                Ok(content) => return Ok(content),
                Err(e) => {
                    last_err = Some(e);
                    if has_next {
                        tokio::time::sleep(backoff(attempt)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| vocab_error!(network, "OpenAI 请求未执行")))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// 取出 `choices[0].message.content`
pub fn parse_content(body: &str) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| vocab_error!(response, "Invalid JSON from AI"))?;

    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .ok_or_else(|| vocab_error!(response, "missing choices[0].message.content"))
}

fn should_retry_http(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// 常见格式 `{ "error": { "message": "..." } }` 或 `{ "message": "..." }`，否则取原始内容
fn extract_error_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > 400 {
        format!("{}...", trimmed.chars().take(400).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
