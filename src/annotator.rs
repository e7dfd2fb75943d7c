//! 句子标注
//!
//! 把句子中第一次出现的单词替换为高亮形式（下划线、括号、加粗、填空），
//! 以及可选的日语注音（振假名）。找不到单词时原句不变。

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::error::Warning;
use crate::records::{RecordSet, VocabularyRecord};
use crate::translator::LlmClient;

/// 高亮方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HighlightMode {
    #[default]
    None,
    /// `_`
    Underscore,
    /// `[word]`
    SquareBrackets,
    /// `{word}`
    CurlyBrackets,
    /// `<b>word</b>`
    Bold,
    /// `{{c1::译文::word}}`
    Cloze,
}

impl HighlightMode {
    fn replacement(&self, word: &str, translated_word: &str) -> Option<String> {
        match self {
            HighlightMode::None => None,
            HighlightMode::Underscore => Some("_".to_string()),
            HighlightMode::SquareBrackets => Some(format!("[{}]", word)),
            HighlightMode::CurlyBrackets => Some(format!("{{{}}}", word)),
            HighlightMode::Bold => Some(format!("<b>{}</b>", word)),
            HighlightMode::Cloze => Some(format!("{{{{c1::{}::{}}}}}", translated_word, word)),
        }
    }
}

/// 标注一条记录的句子
pub fn annotate(record: &VocabularyRecord, translated_word: &str, mode: HighlightMode) -> String {
    highlight(&record.sentence, &record.word, translated_word, mode)
}

/// 替换句子中第一次出现的 `word`；`word` 不在句子中时原样返回
pub fn highlight(sentence: &str, word: &str, translated_word: &str, mode: HighlightMode) -> String {
    annotate_checked(sentence, word, translated_word, mode).unwrap_or_else(|| sentence.to_string())
}

/// 与 [`highlight`] 相同，但找不到单词时返回 None，便于上层报告
pub fn annotate_checked(
    sentence: &str,
    word: &str,
    translated_word: &str,
    mode: HighlightMode,
) -> Option<String> {
    if word.is_empty() || !sentence.contains(word) {
        return None;
    }
    match mode.replacement(word, translated_word) {
        Some(replacement) => Some(sentence.replacen(word, &replacement, 1)),
        None => Some(sentence.to_string()),
    }
}

/// 对一整列句子做标注，返回新列和找不到单词的警告
///
/// `translated` 为 None 时填空使用原词
pub fn annotate_column(
    words: &[&str],
    sentences: &[&str],
    translated: Option<&[&str]>,
    mode: HighlightMode,
) -> (Vec<String>, Vec<Warning>) {
    let mut warnings = Vec::new();
    let column = words
        .iter()
        .zip(sentences)
        .enumerate()
        .map(|(row, (word, sentence))| {
            let translated_word = translated.and_then(|t| t.get(row)).copied().unwrap_or(word);
            match annotate_checked(sentence, word, translated_word, mode) {
                Some(annotated) => annotated,
                None => {
                    warn!("⚠️  第{}行句子中没有 '{}'，保留原句", row + 1, word);
                    warnings.push(Warning::annotation_mismatch(row, word));
                    sentence.to_string()
                }
            }
        })
        .collect();
    (column, warnings)
}

/// 是否需要注音：只处理日语记录
pub fn needs_furigana(record: &VocabularyRecord) -> bool {
    let lang = record.word_language.to_lowercase();
    lang == "ja" || lang.starts_with("ja-") || lang.starts_with("ja_")
}

/// 构造注音提示词
pub fn furigana_prompt(sentence: &str) -> String {
    let mut p = String::new();
    p.push_str("Add furigana readings to the kanji in this Japanese sentence for use in Anki.\n");
    p.push_str("Format: place the reading in square brackets immediately after each kanji or kanji compound.\n");
    p.push_str("Add a space before each word that gets furigana, this is required for Anki to render it correctly.\n\n");
    p.push_str("Rules:\n");
    p.push_str("- Only add furigana to kanji, never to hiragana, katakana, or punctuation\n");
    p.push_str("- Preserve the original sentence exactly, only inserting [reading] after kanji\n");
    p.push_str("- For kanji compounds (jukugo), give the full compound reading as one unit\n");
    p.push_str("- Always add a space before the kanji/compound that receives furigana\n\n");
    p.push_str("Examples:\n");
    p.push_str("- Input: 目を凝らしてよく見てみると、体に、何か網のようなものが絡まっているようだ。\n");
    p.push_str("  Output: 目[め]を 凝[こ]らしてよく 見[み]てみると、 体[からだ]に、 何[なに]か 網[あみ]のようなものが 絡[から]まっているようだ。\n");
    p.push_str("- Input: 「変身って…。俺は、戦隊ヒーローか。\n");
    p.push_str("  Output: 「 変身[へんしん]って…。 俺[おれ]は、 戦隊[せんたい]ヒーローか。\n\n");
    p.push_str(&format!("Sentence: {}\n", sentence));
    p.push_str("Return only the annotated sentence. If a word consists only of hiragana or katakana, do not add furigana to it.");
    p
}

/// 为日语句子添加注音，非日语句子原样返回
///
/// 单条失败时保留原句并记录警告
pub async fn add_furigana(
    client: &dyn LlmClient,
    model: &str,
    records: &RecordSet,
    concurrency: usize,
) -> (Vec<String>, Vec<Warning>) {
    let japanese = records.iter().filter(|r| needs_furigana(r)).count();
    info!("🈶 为 {} 条日语句子添加注音", japanese);

    let outcomes: Vec<(String, Option<Warning>)> =
        stream::iter(records.iter().enumerate().map(|(row, record)| async move {
            if !needs_furigana(record) || record.sentence.trim().is_empty() {
                return (record.sentence.clone(), None);
            }
            match client.complete(&furigana_prompt(&record.sentence), model).await {
                Ok(annotated) => {
                    let cleaned = annotated.replace('"', "").trim().to_string();
                    if cleaned.is_empty() {
                        (
                            record.sentence.clone(),
                            Some(Warning::furigana_failure(row, "注音结果为空")),
                        )
                    } else {
                        (cleaned, None)
                    }
                }
                Err(e) => {
                    warn!("❌ 第{}行注音失败，保留原句: {}", row + 1, e);
                    (
                        record.sentence.clone(),
                        Some(Warning::furigana_failure(row, e.to_string())),
                    )
                }
            }
        }))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut column = Vec::with_capacity(outcomes.len());
    let mut warnings = Vec::new();
    for (sentence, warning) in outcomes {
        column.push(sentence);
        warnings.extend(warning);
    }
    (column, warnings)
}
