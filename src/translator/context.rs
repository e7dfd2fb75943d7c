//! 带上下文的单词翻译
//!
//! 在句子中用 `||单词|` 标出目标单词，翻译整句，再从译文中取出标记之间的部分。
//! 取不出来或取出的仍是原词时，退回到单独翻译这个单词。

use tracing::debug;

use super::{translate_or_keep, ItemOutcome, TextTranslator, TranslationRequest};
use crate::api_constants::context_markers::{CLOSE, OPEN};
use crate::error::Warning;

/// 标记句子中第一次出现的单词；单词不在句子中时返回 None
pub fn mark_word(sentence: &str, word: &str) -> Option<String> {
    if word.is_empty() || !sentence.contains(word) {
        return None;
    }
    Some(sentence.replacen(word, &format!("{}{}{}", OPEN, word, CLOSE), 1))
}

/// 取出译文中 `||` 与其后第一个 `|` 之间的内容
pub fn extract_marked(translated: &str) -> Option<String> {
    let start = translated.find(OPEN)? + OPEN.len();
    let rest = &translated[start..];
    let end = rest.find(CLOSE)?;
    let span = rest[..end].trim();
    if span.is_empty() {
        None
    } else {
        Some(span.to_string())
    }
}

/// 用句子作为上下文翻译单词，每个请求恰好产生一个结果，从不失败
pub async fn translate_with_context(
    translator: &dyn TextTranslator,
    row: usize,
    request: &TranslationRequest,
    target: &str,
) -> ItemOutcome {
    let word = request.target_text();
    let source = request.source_lang.as_str();
    let mut context_warning = None;

    match mark_word(&request.text, word) {
        Some(marked) => match translator.translate(source, target, &marked).await {
            Ok(translated) => match extract_marked(&translated) {
                Some(extracted) if extracted != word => {
                    return ItemOutcome::translated(extracted);
                }
                _ => debug!("第{}行上下文提取失败，改为单独翻译 '{}'", row + 1, word),
            },
            Err(e) => {
                context_warning = Some(Warning::item_failure(
                    row,
                    format!("上下文翻译失败: {}", e),
                ));
            }
        },
        None => debug!("第{}行句子中没有 '{}'，改为单独翻译", row + 1, word),
    }

    let outcome = translate_or_keep(translator, row, source, target, word).await;
    match context_warning {
        Some(warning) => outcome.with_warning(warning),
        None => outcome,
    }
}
