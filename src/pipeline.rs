//! 转换流水线
//!
//! 记录集变换 → 建表 → 翻译 → 标注。每次调用都使用一份不可变配置，
//! 返回结果表格以及全部被吸收的警告。

use tracing::{debug, info};

use crate::annotator::{add_furigana, annotate_column, HighlightMode};
use crate::config::{PipelineConfig, TranslationMode};
use crate::error::{Result, Warning};
use crate::records::{Column, RecordSet};
use crate::table::Table;
use crate::translator::{LlmClient, TranslationRequest, TranslatorAdapter};
use crate::vocab_error;

/// 填空句所在的列
pub const CLOZE_COLUMN: &str = "sentence_with_cloze";
/// 注音句所在的列
pub const FURIGANA_COLUMN: &str = "sentence_with_furigana";

/// 一次流水线调用的结果
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// 变换之后的记录集，与表格逐行对应
    pub records: RecordSet,
    pub table: Table,
    pub warnings: Vec<Warning>,
    pub cache_hits: usize,
}

/// 运行流水线
///
/// 只有配置错误会返回 `Err`（例如开启注音却没有大模型客户端），
/// 翻译和标注中的失败都作为警告返回。
pub async fn run(
    records: &RecordSet,
    config: &PipelineConfig,
    translator: &TranslatorAdapter,
    llm: Option<&dyn LlmClient>,
) -> Result<PipelineOutput> {
    let options = config.translation();
    let furigana_client = match (options.furigana, llm) {
        (true, Some(client)) => Some(client),
        (true, None) => {
            return Err(vocab_error!(config, "furigana", "注音需要大模型客户端"));
        }
        (false, _) => None,
    };

    let records = config.transform().apply(records);
    info!("📋 变换后剩余 {} 条记录", records.len());

    let mut table = Table::from_records(&records);
    let mut warnings = Vec::new();
    let mut cache_hits = 0;
    let target = options.target_lang.as_str();

    let word_in_context = translator.is_llm() || options.mode == TranslationMode::Context;
    if word_in_context {
        let requests: Vec<TranslationRequest> = records
            .iter()
            .map(|r| TranslationRequest::with_context(&r.word_language, &r.sentence, &r.word))
            .collect();
        let outcome = translator.translate_batch(target, &requests).await;
        table.push_column(&Column::Word.translated_header(), outcome.results)?;
        warnings.extend(outcome.warnings);
        cache_hits += outcome.cache_hits;
    }

    let free = translator.free_text();
    for column in &options.columns {
        if *column == Column::Word && word_in_context {
            debug!("单词已按上下文翻译，跳过重复翻译");
            continue;
        }
        let requests: Vec<TranslationRequest> = records
            .iter()
            .map(|r| TranslationRequest::plain(&r.word_language, column.value(r)))
            .collect();
        let outcome = free.translate_batch(target, &requests).await;
        table.push_column(&column.translated_header(), outcome.results)?;
        warnings.extend(outcome.warnings);
        cache_hits += outcome.cache_hits;
    }

    let cloze = {
        let translated: Option<Vec<String>> = table
            .column(&Column::Word.translated_header())
            .map(|c| c.into_iter().map(str::to_string).collect());
        let translated_refs: Option<Vec<&str>> = translated
            .as_ref()
            .map(|c| c.iter().map(String::as_str).collect());
        let words: Vec<&str> = records.iter().map(|r| r.word.as_str()).collect();
        let sentences: Vec<&str> = records.iter().map(|r| r.sentence.as_str()).collect();

        let (column, mismatches) = annotate_column(
            &words,
            &sentences,
            translated_refs.as_deref(),
            HighlightMode::Cloze,
        );
        warnings.extend(mismatches);
        column
    };
    table.push_column(CLOZE_COLUMN, cloze)?;

    if let Some(client) = furigana_client {
        let (column, furigana_warnings) =
            add_furigana(client, &options.model, &records, config.concurrency()).await;
        table.push_column(FURIGANA_COLUMN, column)?;
        warnings.extend(furigana_warnings);
    }

    info!(
        "✅ 流水线完成: {} 行 {} 列, {} 条警告, 缓存命中 {} 次",
        table.len(),
        table.headers().len(),
        warnings.len(),
        cache_hits
    );

    Ok(PipelineOutput {
        records,
        table,
        warnings,
        cache_hits,
    })
}
