//! 翻译适配层
//!
//! 流水线只依赖 [`TranslatorAdapter::translate_batch`]：输入若干 [`TranslationRequest`]，
//! 返回同样数量、同样顺序的译文。各后端自行处理批量、上下文和失败回退，
//! 所有失败都会被吸收为 [`Warning`]，不会中断整个翻译任务。

pub mod batch;
pub mod cache;
pub mod context;
pub mod google;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::api_constants::service_config;
use crate::error::{Result, Warning};
use crate::utils::calculate_content_hash;

pub use cache::TranslationCache;
pub use google::GoogleTranslator;
pub use openai::OpenAiClient;

/// 免费文本翻译后端：一次翻译一条文本
#[async_trait]
pub trait TextTranslator: Send + Sync {
    /// 将 `text` 从 `source` 翻译为 `target`
    async fn translate(&self, source: &str, target: &str, text: &str) -> Result<String>;

    /// 后端名称（用于日志和缓存键）
    fn name(&self) -> &str;
}

/// 大模型后端：输入提示词，返回模型输出
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String>;

    fn name(&self) -> &str;
}

/// 一条翻译请求
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationRequest {
    pub source_lang: String,
    /// 要翻译的文本；带上下文时为整句
    pub text: String,
    /// 带上下文翻译时要提取的单词
    pub context_word: Option<String>,
}

impl TranslationRequest {
    pub fn plain(source_lang: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_lang: source_lang.into(),
            text: text.into(),
            context_word: None,
        }
    }

    pub fn with_context(
        source_lang: impl Into<String>,
        sentence: impl Into<String>,
        word: impl Into<String>,
    ) -> Self {
        Self {
            source_lang: source_lang.into(),
            text: sentence.into(),
            context_word: Some(word.into()),
        }
    }

    /// 真正需要翻译出来的内容：带上下文时是单词，否则是整段文本
    pub fn target_text(&self) -> &str {
        self.context_word.as_deref().unwrap_or(&self.text)
    }
}

/// 单条翻译的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub text: String,
    pub warnings: Vec<Warning>,
    /// 结果是原文回退，不应写入缓存
    pub degraded: bool,
}

impl ItemOutcome {
    pub fn translated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            warnings: Vec::new(),
            degraded: false,
        }
    }

    pub fn untranslated(text: impl Into<String>, warning: Warning) -> Self {
        Self {
            text: text.into(),
            warnings: vec![warning],
            degraded: true,
        }
    }

    pub fn with_warning(mut self, warning: Warning) -> Self {
        self.warnings.insert(0, warning);
        self
    }
}

/// 一批翻译的结果，`results` 与请求一一对应
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub results: Vec<String>,
    pub warnings: Vec<Warning>,
    pub cache_hits: usize,
}

/// 可选的翻译后端
#[derive(Clone)]
pub enum Backend {
    /// 免费文本翻译，每条单独请求
    Free(Arc<dyn TextTranslator>),
    /// 大模型分批翻译，失败的条目回退到免费后端
    Llm {
        client: Arc<dyn LlmClient>,
        model: String,
        fallback: Arc<dyn TextTranslator>,
    },
}

/// 翻译适配器
#[derive(Clone)]
pub struct TranslatorAdapter {
    backend: Backend,
    cache: Option<Arc<TranslationCache>>,
    concurrency: usize,
}

impl TranslatorAdapter {
    pub fn free(translator: Arc<dyn TextTranslator>) -> Self {
        Self {
            backend: Backend::Free(translator),
            cache: None,
            concurrency: service_config::DEFAULT_CONCURRENCY,
        }
    }

    pub fn llm(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        fallback: Arc<dyn TextTranslator>,
    ) -> Self {
        Self {
            backend: Backend::Llm {
                client,
                model: model.into(),
                fallback,
            },
            cache: None,
            concurrency: service_config::DEFAULT_CONCURRENCY,
        }
    }

    /// 注入会话级翻译缓存
    pub fn with_cache(mut self, cache: Arc<TranslationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 设置并发请求数量
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn is_llm(&self) -> bool {
        matches!(self.backend, Backend::Llm { .. })
    }

    pub fn backend_name(&self) -> String {
        match &self.backend {
            Backend::Free(t) => t.name().to_string(),
            Backend::Llm { client, model, .. } => format!("{}:{}", client.name(), model),
        }
    }

    /// 共享缓存和并发设置的免费后端适配器
    ///
    /// 整列翻译（词干、句子）总是走免费后端
    pub fn free_text(&self) -> TranslatorAdapter {
        let translator = match &self.backend {
            Backend::Free(t) => t.clone(),
            Backend::Llm { fallback, .. } => fallback.clone(),
        };
        TranslatorAdapter {
            backend: Backend::Free(translator),
            cache: self.cache.clone(),
            concurrency: self.concurrency,
        }
    }

    /// 批量翻译，输出与输入长度相同、顺序一致
    pub async fn translate_batch(
        &self,
        target: &str,
        requests: &[TranslationRequest],
    ) -> BatchOutcome {
        if requests.is_empty() {
            return BatchOutcome::default();
        }

        let backend_name = self.backend_name();
        let mut results: Vec<Option<String>> = vec![None; requests.len()];
        let mut cache_hits = 0usize;

        let keys: Vec<u64> = requests
            .iter()
            .map(|r| cache_key(&backend_name, target, r))
            .collect();

        if let Some(cache) = &self.cache {
            for (slot, key) in results.iter_mut().zip(&keys) {
                if let Some(hit) = cache.get(*key) {
                    *slot = Some(hit);
                    cache_hits += 1;
                }
            }
        }

        let pending: Vec<(usize, &TranslationRequest)> = requests
            .iter()
            .enumerate()
            .filter(|(i, _)| results[*i].is_none())
            .collect();

        info!(
            "🌐 翻译 {} 条 (后端: {}, 缓存命中: {})",
            requests.len(),
            backend_name,
            cache_hits
        );

        let outcomes = match &self.backend {
            Backend::Free(translator) => {
                self.translate_each(translator.as_ref(), target, &pending)
                    .await
            }
            Backend::Llm {
                client,
                model,
                fallback,
            } => {
                batch::translate_batched(
                    client.as_ref(),
                    model,
                    fallback.as_ref(),
                    target,
                    &pending,
                    self.concurrency,
                )
                .await
            }
        };

        let mut warnings = Vec::new();
        for ((row, _), outcome) in pending.iter().zip(outcomes) {
            if let Some(cache) = &self.cache {
                if !outcome.degraded {
                    cache.insert(keys[*row], outcome.text.clone());
                }
            }
            warnings.extend(outcome.warnings);
            results[*row] = Some(outcome.text);
        }

        if !warnings.is_empty() {
            warn!("⚠️  {} 条翻译出现问题，已回退", warnings.len());
        }

        BatchOutcome {
            // 每个槽位要么来自缓存，要么来自上面的回填
            results: results
                .into_iter()
                .zip(requests)
                .map(|(r, req)| r.unwrap_or_else(|| req.target_text().to_string()))
                .collect(),
            warnings,
            cache_hits,
        }
    }

    /// 免费后端逐条翻译，并发执行但保持输入顺序
    async fn translate_each(
        &self,
        translator: &dyn TextTranslator,
        target: &str,
        pending: &[(usize, &TranslationRequest)],
    ) -> Vec<ItemOutcome> {
        stream::iter(pending.iter().map(|(row, request)| async move {
            match &request.context_word {
                Some(_) => context::translate_with_context(translator, *row, request, target).await,
                None => {
                    translate_or_keep(
                        translator,
                        *row,
                        &request.source_lang,
                        target,
                        &request.text,
                    )
                    .await
                }
            }
        }))
        .buffered(self.concurrency)
        .collect()
        .await
    }
}

/// 单条免费翻译，失败时返回原文并附带警告
pub async fn translate_or_keep(
    translator: &dyn TextTranslator,
    row: usize,
    source: &str,
    target: &str,
    text: &str,
) -> ItemOutcome {
    match translator.translate(source, target, text).await {
        Ok(translated) => ItemOutcome::translated(translated),
        Err(e) => {
            warn!("❌ 第{}行翻译失败，保留原文: {}", row + 1, e);
            ItemOutcome::untranslated(text, Warning::item_failure(row, e.to_string()))
        }
    }
}

fn cache_key(backend: &str, target: &str, request: &TranslationRequest) -> u64 {
    let context = request.context_word.as_deref().unwrap_or("");
    calculate_content_hash(&format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
        backend, request.source_lang, target, request.text, context
    ))
}

/// 重试间隔：指数退避，不超过 `MAX_RETRY_DELAY_MS`
pub(crate) fn backoff(attempt: usize) -> Duration {
    let factor = u32::try_from(attempt)
        .ok()
        .and_then(|exp| 2_u64.checked_pow(exp))
        .unwrap_or(u64::MAX);
    let ms = service_config::RETRY_DELAY_BASE_MS
        .saturating_mul(factor)
        .min(service_config::MAX_RETRY_DELAY_MS);
    debug!("第{}次重试前等待 {}ms", attempt + 1, ms);
    Duration::from_millis(ms)
}
