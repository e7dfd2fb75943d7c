//! 配置管理模块
//!
//! 提供CLI参数解析，以及流水线使用的不可变配置

// 标准库导入
use std::collections::BTreeMap;
use std::path::PathBuf;

// 第三方crate导入
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use tracing::warn;

// 本地模块导入
use crate::annotator::HighlightMode;
use crate::api_constants::{api_config, is_supported_language, service_config};
use crate::error::Result;
use crate::exporter::{Delimiter, ExportSpec};
use crate::records::{Column, SortKey, TransformOptions};
use crate::utils::parse_rename;
use crate::vocab_error;

/// 翻译后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// 免费网页翻译
    #[default]
    Google,
    /// OpenAI 大模型，分批翻译
    #[value(name = "openai")]
    OpenAi,
}

/// 单词翻译方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TranslationMode {
    /// 只翻译单词本身
    #[default]
    Word,
    /// 结合所在句子翻译单词
    Context,
}

/// 翻译相关配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOptions {
    /// 目标语言代码 (如: en, zh, de)
    pub target_lang: String,
    /// 要翻译的列，只接受 Word、Stem、Sentence
    pub columns: Vec<Column>,
    pub mode: TranslationMode,
    /// 为日语句子添加注音
    pub furigana: bool,
    /// 大模型名称
    pub model: String,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            target_lang: service_config::DEFAULT_TARGET_LANG.to_string(),
            columns: vec![Column::Word],
            mode: TranslationMode::Word,
            furigana: false,
            model: api_config::DEFAULT_OPENAI_MODEL.to_string(),
        }
    }
}

/// 一次流水线调用的配置
///
/// 构造后不可变，通过 Builder 模式链式设置。
///
/// # Examples
///
/// ```rust
/// use vocab_anki::config::{PipelineConfig, TranslationMode};
///
/// let config = PipelineConfig::new()
///     .with_target_language("de")
///     .with_mode(TranslationMode::Context)
///     .with_concurrency(8);
/// assert_eq!(config.translation().target_lang, "de");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    transform: TransformOptions,
    translation: TranslationOptions,
    concurrency: usize,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self {
            transform: TransformOptions::default(),
            translation: TranslationOptions::default(),
            concurrency: service_config::DEFAULT_CONCURRENCY,
        }
    }

    pub fn transform(&self) -> &TransformOptions {
        &self.transform
    }

    pub fn translation(&self) -> &TranslationOptions {
        &self.translation
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn with_transform(mut self, transform: TransformOptions) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_translation(mut self, translation: TranslationOptions) -> Self {
        self.translation = translation;
        self
    }

    /// 设置目标语言代码
    pub fn with_target_language(mut self, lang: &str) -> Self {
        self.translation.target_lang = lang.to_string();
        self
    }

    /// 设置要翻译的列
    pub fn with_translate_columns(mut self, columns: Vec<Column>) -> Self {
        self.translation.columns = columns;
        self
    }

    pub fn with_mode(mut self, mode: TranslationMode) -> Self {
        self.translation.mode = mode;
        self
    }

    pub fn with_furigana(mut self, enable: bool) -> Self {
        self.translation.furigana = enable;
        self
    }


    /// 设置并发请求数量
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// CLI参数结构
#[derive(Parser, Debug)]
#[command(author, version, about = "Kindle 生词本转 Anki 表格工具 - 支持翻译、高亮、填空和注音", long_about = None)]
pub struct Cli {
    /// Kindle 生词本数据库 (vocab.db)
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// 输出文件路径 (可选，默认为 anki_table_YYYY_MM_DD.csv)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// 目标语言代码 (如: en, zh, de)
    #[arg(short, long, default_value = service_config::DEFAULT_TARGET_LANG)]
    pub lang: String,

    /// 翻译后端
    #[arg(short, long, value_enum, default_value_t = BackendKind::Google)]
    pub backend: BackendKind,

    /// 单词翻译方式
    #[arg(short, long, value_enum, default_value_t = TranslationMode::Word)]
    pub mode: TranslationMode,

    /// 要翻译的列，逗号分隔 (Word, Stem, Sentence)
    #[arg(short, long, value_delimiter = ',', default_value = "Word")]
    pub translate: Vec<String>,

    /// 大模型名称
    #[arg(long, default_value = api_config::DEFAULT_OPENAI_MODEL)]
    pub model: String,

    /// OpenAI API 密钥，只在本次运行中使用
    #[arg(long, env = api_config::OPENAI_API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// 为日语句子添加注音 (需要 OpenAI)
    #[arg(long)]
    pub furigana: bool,

    /// 只保留最后 N 条记录
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// 排序字段
    #[arg(long, value_enum, default_value_t = SortKey::Timestamp)]
    pub sort_by: SortKey,

    /// 只保留该日期及之后的记录 (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub since: Option<NaiveDate>,

    /// 同一单词只保留最后一次查询
    #[arg(long)]
    pub dedup: bool,

    /// 只保留这些书 (可重复)
    #[arg(long = "book", value_name = "TITLE")]
    pub books: Vec<String>,

    /// 只保留这些作者 (可重复)
    #[arg(long = "author", value_name = "NAME")]
    pub authors: Vec<String>,

    /// 只保留这些语言 (可重复)
    #[arg(long = "language", value_name = "CODE")]
    pub languages: Vec<String>,

    /// 高亮方式，非 none 时额外导出 sentence_with_highlight 列
    #[arg(long, value_enum, default_value_t = HighlightMode::None)]
    pub highlight: HighlightMode,

    /// 导出列，逗号分隔 (默认: Word, Stem, Sentence 和所有翻译列)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// 重命名导出列 (格式: Old=New，可重复)
    #[arg(long = "rename", value_name = "OLD=NEW")]
    pub renames: Vec<String>,

    /// 字段分隔符
    #[arg(long, value_enum, default_value_t = Delimiter::Semicolon)]
    pub delimiter: Delimiter,

    /// 不输出表头
    #[arg(long)]
    pub no_header: bool,

    /// 并发请求数量
    #[arg(long, default_value_t = service_config::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// 最大重试次数
    #[arg(long, default_value_t = service_config::DEFAULT_MAX_RETRIES)]
    pub max_retries: usize,

    /// 禁用缓存
    #[arg(long)]
    pub no_cache: bool,

    /// 缓存存活时间（秒）
    #[arg(long, default_value_t = service_config::DEFAULT_CACHE_TTL_SECONDS)]
    pub cache_ttl: u64,

    /// 详细输出模式
    #[arg(short, long)]
    pub verbose: bool,

    /// 静默模式 (仅输出错误)
    #[arg(short, long)]
    pub quiet: bool,

    /// 显示生词统计和性能统计
    #[arg(long)]
    pub stats: bool,

    /// 以 JSON 格式输出生词统计
    #[arg(long)]
    pub stats_json: bool,
}

impl Cli {
    /// 检查参数之间的约束
    pub fn validate(&self) -> Result<()> {
        let needs_key = self.backend == BackendKind::OpenAi || self.furigana;
        let has_key = self
            .api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        if needs_key && !has_key {
            return Err(vocab_error!(
                config,
                "api_key",
                format!("OpenAI 后端和注音需要 --api-key 或 {}", api_config::OPENAI_API_KEY_ENV)
            ));
        }
        if self.limit == Some(0) {
            return Err(vocab_error!(config, "limit", "至少保留 1 条记录"));
        }
        if !api_config::OPENAI_MODELS.contains(&self.model.as_str()) {
            warn!("⚠️  未知模型 '{}'，费用估算按最高价格计算", self.model);
        }
        if !is_supported_language(&self.lang) {
            warn!("⚠️  目标语言 '{}' 不在已知列表中，仍会尝试翻译", self.lang);
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let columns = self
            .translate
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| translatable_column(c))
            .collect::<Result<Vec<_>>>()?;

        let transform = TransformOptions {
            sort_by: self.sort_by,
            take_last: self.limit,
            since: self.since,
            deduplicate: self.dedup,
            books: self.books.clone(),
            authors: self.authors.clone(),
            languages: self.languages.clone(),
        };

        let translation = TranslationOptions {
            target_lang: self.lang.clone(),
            columns,
            mode: self.mode,
            furigana: self.furigana,
            model: self.model.clone(),
        };

        Ok(PipelineConfig::new()
            .with_transform(transform)
            .with_translation(translation)
            .with_concurrency(self.concurrency))
    }

    pub fn export_spec(&self) -> Result<ExportSpec> {
        let mut spec = ExportSpec::new()
            .with_delimiter(self.delimiter)
            .with_header(!self.no_header)
            .with_highlight(self.highlight);

        if !self.columns.is_empty() {
            spec = spec.with_columns(self.columns.iter().map(|c| c.trim().to_string()));
        }
        let renames = self
            .renames
            .iter()
            .map(|r| parse_rename(r))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(spec.with_renames(renames))
    }
}

fn translatable_column(name: &str) -> Result<Column> {
    let column: Column = name.parse()?;
    match column {
        Column::Word | Column::Stem | Column::Sentence => Ok(column),
        other => Err(vocab_error!(
            config,
            "translate",
            format!("列 '{}' 不能翻译，只支持 Word、Stem、Sentence", other)
        )),
    }
}
