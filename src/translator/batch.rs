//! 大模型分批翻译
//!
//! 每批最多 10 条，构造一个要求模型按 `序号. 译文` 逐行回答的提示词。
//! 缺失的序号、与原词相同的译文、以及整批失败的条目，都逐条回退到免费后端。

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, info, warn};

use super::{translate_or_keep, ItemOutcome, LlmClient, TextTranslator, TranslationRequest};
use crate::api_constants::service_config::LLM_BATCH_SIZE;
use crate::error::Warning;

/// 分批翻译，返回与 `items` 一一对应的结果
///
/// 最多 `concurrency` 个批次同时请求，结果按输入顺序拼回
pub async fn translate_batched(
    client: &dyn LlmClient,
    model: &str,
    fallback: &dyn TextTranslator,
    target: &str,
    items: &[(usize, &TranslationRequest)],
    concurrency: usize,
) -> Vec<ItemOutcome> {
    if items.is_empty() {
        return Vec::new();
    }

    let batches: Vec<_> = items.chunks(LLM_BATCH_SIZE).collect();
    info!(
        "🚀 大模型翻译: {} 条分成 {} 批 (模型: {}, 并发: {})",
        items.len(),
        batches.len(),
        model,
        concurrency
    );

    let tasks = batches.into_iter().enumerate().map(|(batch_idx, chunk)| async move {
        debug!("处理批次 {}: {} 条", batch_idx + 1, chunk.len());
        translate_one_batch(client, model, fallback, target, chunk).await
    });

    let outcomes: Vec<Vec<ItemOutcome>> = stream::iter(tasks)
        .buffered(concurrency.max(1))
        .collect()
        .await;
    outcomes.into_iter().flatten().collect()
}

async fn translate_one_batch(
    client: &dyn LlmClient,
    model: &str,
    fallback: &dyn TextTranslator,
    target: &str,
    chunk: &[(usize, &TranslationRequest)],
) -> Vec<ItemOutcome> {
    let prompt = build_prompt(target, chunk);

    let parsed = match client.complete(&prompt, model).await {
        Ok(response) => parse_numbered(&response),
        Err(e) => {
            let first_row = chunk.first().map(|(row, _)| *row).unwrap_or_default();
            warn!("❌ 批次(起始第{}行)翻译失败，逐条回退: {}", first_row + 1, e);
            let batch_warning = Warning::batch_failure(first_row, e.to_string());

            let mut outcomes = Vec::with_capacity(chunk.len());
            for (row, request) in chunk {
                outcomes.push(fallback_item(fallback, *row, request, target).await);
            }
            if let Some(first) = outcomes.first_mut() {
                first.warnings.insert(0, batch_warning);
            }
            return outcomes;
        }
    };

    let mut outcomes = Vec::with_capacity(chunk.len());
    for (position, (row, request)) in chunk.iter().enumerate() {
        let source_word = request.target_text();
        match parsed.get(&(position + 1)) {
            Some(translation) if !translation.is_empty() && translation != source_word => {
                outcomes.push(ItemOutcome::translated(translation.clone()));
            }
            Some(_) => {
                debug!("第{}行大模型返回原词，回退到免费后端", row + 1);
                outcomes.push(fallback_item(fallback, *row, request, target).await);
            }
            None => {
                let missing = Warning::item_failure(
                    *row,
                    format!("大模型响应中缺少序号 {}", position + 1),
                );
                outcomes.push(
                    fallback_item(fallback, *row, request, target)
                        .await
                        .with_warning(missing),
                );
            }
        }
    }
    outcomes
}

/// 回退：用免费后端单独翻译单词
async fn fallback_item(
    fallback: &dyn TextTranslator,
    row: usize,
    request: &TranslationRequest,
    target: &str,
) -> ItemOutcome {
    translate_or_keep(
        fallback,
        row,
        &request.source_lang,
        target,
        request.target_text(),
    )
    .await
}

/// 构造一批的提示词，序号从 1 开始
pub fn build_prompt(target: &str, chunk: &[(usize, &TranslationRequest)]) -> String {
    let mut p = String::new();

    p.push_str(&format!(
        "Translate each numbered item below into {}.\n",
        target
    ));
    p.push_str("Items with a context sentence are single words: use the sentence to pick the most relevant meaning.\n\n");
    p.push_str("Rules:\n");
    p.push_str("- Provide 1-3 most common translations per item, separated by comma\n");
    p.push_str("- Put the meaning that fits the context first\n");
    p.push_str("- For verbs, give the base/infinitive form\n");
    p.push_str("- Answer with exactly one line per item, formatted as `<number>. <translations>`\n");
    p.push_str("- Return only the numbered lines, nothing else\n\n");
    p.push_str("Items:\n");

    for (position, (_, request)) in chunk.iter().enumerate() {
        match &request.context_word {
            Some(word) => p.push_str(&format!(
                "{}. word: \"{}\" | context: \"{}\" | source language: {}\n",
                position + 1,
                word,
                request.text.trim(),
                request.source_lang
            )),
            None => p.push_str(&format!(
                "{}. text: \"{}\" | source language: {}\n",
                position + 1,
                request.text.trim(),
                request.source_lang
            )),
        }
    }

    p
}

/// 解析 `序号. 译文` 形式的逐行回答，同一序号只取第一次出现
pub fn parse_numbered(response: &str) -> HashMap<usize, String> {
    let line_regex = match Regex::new(r"^\s*(\d+)\s*[.)]\s*(.*?)\s*$") {
        Ok(regex) => regex,
        Err(e) => {
            warn!("无法编译序号正则表达式: {}", e);
            return HashMap::new();
        }
    };

    let mut parsed = HashMap::new();
    for line in response.lines() {
        if let Some(captures) = line_regex.captures(line) {
            if let (Some(index_str), Some(text)) = (captures.get(1), captures.get(2)) {
                if let Ok(index) = index_str.as_str().parse::<usize>() {
                    parsed
                        .entry(index)
                        .or_insert_with(|| clean_translation(text.as_str()));
                }
            }
        }
    }
    parsed
}

fn clean_translation(text: &str) -> String {
    text.replace('"', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, WarningKind};
    use crate::translator::tests::StubTranslator;
    use crate::translator::TranslatorAdapter;
    use crate::vocab_error;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 解析提示词里的条目，按 `<word>-en` 逐行作答
    struct EchoLlm {
        calls: AtomicUsize,
        /// 不回答的序号
        skip: Vec<usize>,
        /// 原样返回原词的序号
        echo_source: Vec<usize>,
        fail: bool,
    }

    impl EchoLlm {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                skip: Vec::new(),
                echo_source: Vec::new(),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, prompt: &str, _model: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(vocab_error!(network, "connection reset"));
            }
            let item = Regex::new(r#"^(\d+)\. (?:word|text): "([^"]*)""#).unwrap();
            let mut lines = Vec::new();
            for line in prompt.lines() {
                if let Some(c) = item.captures(line) {
                    let index: usize = c[1].parse().unwrap();
                    if self.skip.contains(&index) {
                        continue;
                    }
                    if self.echo_source.contains(&index) {
                        lines.push(format!("{}. {}", index, &c[2]));
                    } else {
                        lines.push(format!("{}. \"{}-en\"", index, &c[2]));
                    }
                }
            }
            Ok(lines.join("\n"))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    /// 记录同时进行中的请求数峰值
    struct SlowLlm {
        inner: EchoLlm,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for SlowLlm {
        async fn complete(&self, prompt: &str, model: &str) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let answer = self.inner.complete(prompt, model).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            answer
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn requests(n: usize) -> Vec<TranslationRequest> {
        (0..n)
            .map(|i| {
                TranslationRequest::with_context(
                    "es",
                    format!("una frase con w{}", i),
                    format!("w{}", i),
                )
            })
            .collect()
    }

    #[test]
    fn test_parse_numbered_lines() {
        let parsed = parse_numbered("1. hello, hi\n2) \"world\"\nnoise\n 3.  house \n1. ignored");
        assert_eq!(parsed.get(&1).unwrap(), "hello, hi");
        assert_eq!(parsed.get(&2).unwrap(), "world");
        assert_eq!(parsed.get(&3).unwrap(), "house");
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn test_prompt_numbers_items_from_one() {
        let reqs = requests(2);
        let items: Vec<_> = reqs.iter().enumerate().collect();
        let prompt = build_prompt("en", &items);
        assert!(prompt.contains("1. word: \"w0\" | context: \"una frase con w0\""));
        assert!(prompt.contains("2. word: \"w1\""));
        assert!(prompt.contains("into en"));
    }

    #[tokio::test]
    async fn test_output_length_matches_input_for_llm_backend() {
        let llm = Arc::new(EchoLlm::new());
        let fallback = Arc::new(StubTranslator::new(&[]));
        let adapter = TranslatorAdapter::llm(llm.clone(), "gpt-4o-mini", fallback.clone());

        for n in [0, 1, 9, 10, 11, 23] {
            let reqs = requests(n);
            let outcome = adapter.translate_batch("en", &reqs).await;
            assert_eq!(outcome.results.len(), n);
            for (i, result) in outcome.results.iter().enumerate() {
                assert_eq!(result, &format!("w{}-en", i));
            }
            assert!(outcome.warnings.is_empty());
        }
        // 0 + 1 + 1 + 1 + 2 + 3 批
        assert_eq!(llm.calls.load(Ordering::SeqCst), 8);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_and_unchanged_items_fall_back() {
        let llm = EchoLlm {
            skip: vec![2],
            echo_source: vec![3],
            ..EchoLlm::new()
        };
        let fallback = StubTranslator::new(&[("w1", "one"), ("w2", "two")]);
        let reqs = requests(3);
        let items: Vec<_> = reqs.iter().enumerate().collect();

        let outcomes = translate_batched(&llm, "m", &fallback, "en", &items, 4).await;
        let texts: Vec<_> = outcomes.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["w0-en", "one", "two"]);

        // 缺失序号要报告；返回原词只是质量问题，不算失败
        assert_eq!(outcomes[1].warnings.len(), 1);
        assert_eq!(outcomes[1].warnings[0].kind, WarningKind::TranslationItemFailure);
        assert!(outcomes[2].warnings.is_empty());
        assert_eq!(fallback.calls(), 2);
    }

    #[tokio::test]
    async fn test_batch_failure_falls_back_per_item() {
        let llm = EchoLlm {
            fail: true,
            ..EchoLlm::new()
        };
        let fallback = StubTranslator::new(&[]).failing_on(&["w12"]);
        let reqs = requests(13);
        let items: Vec<_> = reqs.iter().enumerate().collect();

        let outcomes = translate_batched(&llm, "m", &fallback, "en", &items, 4).await;
        assert_eq!(outcomes.len(), 13);
        assert_eq!(outcomes[0].text, "en:w0");
        assert_eq!(outcomes[12].text, "w12");
        assert!(outcomes[12].degraded);

        let batch_failures: Vec<_> = outcomes
            .iter()
            .flat_map(|o| &o.warnings)
            .filter(|w| w.kind == WarningKind::TranslationBatchFailure)
            .collect();
        assert_eq!(batch_failures.len(), 2);
        assert_eq!(batch_failures[1].row, Some(10));
    }

    #[tokio::test]
    async fn test_batches_respect_concurrency_limit() {
        for limit in [1, 2] {
            let llm = Arc::new(SlowLlm {
                inner: EchoLlm::new(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            });
            let fallback = Arc::new(StubTranslator::new(&[]));
            let adapter = TranslatorAdapter::llm(llm.clone(), "gpt-4o-mini", fallback)
                .with_concurrency(limit);

            // 45 条分成 5 批
            let reqs = requests(45);
            let outcome = adapter.translate_batch("en", &reqs).await;
            assert_eq!(outcome.results.len(), 45);
            assert_eq!(outcome.results[44], "w44-en");
            assert_eq!(llm.inner.calls.load(Ordering::SeqCst), 5);
            assert!(llm.peak.load(Ordering::SeqCst) <= limit);
        }
    }
}
