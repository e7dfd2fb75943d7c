//! 导出为 Anki 可导入的分隔文本
//!
//! 投影列 → 高亮列 → 重命名 → 序列化。相同输入总是得到逐字节相同的输出。

use std::collections::BTreeMap;

use anyhow::anyhow;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::debug;

use crate::annotator::{annotate_column, HighlightMode};
use crate::error::{Result, Warning};
use crate::pipeline::CLOZE_COLUMN;
use crate::records::Column;
use crate::table::Table;
use crate::vocab_error;

/// 高亮结果所在的列
pub const HIGHLIGHT_COLUMN: &str = "sentence_with_highlight";

/// 字段分隔符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Delimiter {
    #[default]
    Semicolon,
    Tab,
}

impl Delimiter {
    pub fn as_byte(&self) -> u8 {
        match self {
            Delimiter::Semicolon => b';',
            Delimiter::Tab => b'\t',
        }
    }
}

/// 一次导出的参数，每次导出时重新构造
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpec {
    /// None 时使用 [`default_columns`]
    columns: Option<Vec<String>>,
    renames: BTreeMap<String, String>,
    delimiter: Delimiter,
    include_header: bool,
    highlight: HighlightMode,
}

impl ExportSpec {
    pub fn new() -> Self {
        Self {
            columns: None,
            renames: BTreeMap::new(),
            delimiter: Delimiter::Semicolon,
            include_header: true,
            highlight: HighlightMode::None,
        }
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn renames(&self) -> &BTreeMap<String, String> {
        &self.renames
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    pub fn include_header(&self) -> bool {
        self.include_header
    }

    pub fn highlight(&self) -> HighlightMode {
        self.highlight
    }

    /// 设置导出列及其顺序
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_rename(mut self, from: &str, to: &str) -> Self {
        self.renames.insert(from.to_string(), to.to_string());
        self
    }

    pub fn with_renames(mut self, renames: BTreeMap<String, String>) -> Self {
        self.renames.extend(renames);
        self
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    pub fn with_highlight(mut self, mode: HighlightMode) -> Self {
        self.highlight = mode;
        self
    }
}

impl Default for ExportSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// 默认导出列：单词、词干、句子，以及所有翻译列
pub fn default_columns(table: &Table) -> Vec<String> {
    let base = [Column::Word, Column::Stem, Column::Sentence]
        .iter()
        .map(|c| c.header().to_string())
        .filter(|h| table.has_column(h));

    let translated = table
        .headers()
        .iter()
        .filter(|h| h.starts_with("translated_"))
        .cloned();

    base.chain(translated).collect()
}

/// 投影、高亮、重命名之后待序列化的表格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub table: Table,
    pub warnings: Vec<Warning>,
}

/// 按导出参数整理表格
///
/// 未知的列名是配置错误；句子中找不到单词只产生警告
pub fn prepare(table: &Table, spec: &ExportSpec) -> Result<Prepared> {
    let columns = match spec.columns() {
        Some(columns) => columns.to_vec(),
        None => default_columns(table),
    };
    debug!("导出列: {:?}", columns);

    let mut projected = table.select(&columns)?;
    let mut warnings = Vec::new();

    if spec.highlight() != HighlightMode::None {
        let words = table
            .column(Column::Word.header())
            .ok_or_else(|| vocab_error!(config, "highlight", "高亮需要 Word 列"))?;
        let sentences = table
            .column(Column::Sentence.header())
            .ok_or_else(|| vocab_error!(config, "highlight", "高亮需要 Sentence 列"))?;
        let translated = table.column(&Column::Word.translated_header());

        let (highlighted, mismatches) =
            annotate_column(&words, &sentences, translated.as_deref(), spec.highlight());
        projected.push_column(HIGHLIGHT_COLUMN, highlighted)?;
        // 流水线生成填空列时已对同样的行报告过
        if table.has_column(CLOZE_COLUMN) {
            debug!("填空列已报告 {} 条缺词警告，不再重复", mismatches.len());
        } else {
            warnings.extend(mismatches);
        }
    }

    Ok(Prepared {
        table: projected.renamed(spec.renames()),
        warnings,
    })
}

/// 序列化为分隔文本：必要时加引号，引号内的 `"` 双写，每行以 `\n` 结束
pub fn to_delimited(table: &Table, delimiter: Delimiter, include_header: bool) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter.as_byte())
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .has_headers(false)
        .from_writer(Vec::new());

    if include_header {
        writer.write_record(table.headers())?;
    }
    for row in table.rows() {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("刷新导出缓冲区失败: {}", e.error()))?;
    Ok(bytes)
}

/// 导出结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exported {
    pub bytes: Vec<u8>,
    pub warnings: Vec<Warning>,
}

pub fn export(table: &Table, spec: &ExportSpec) -> Result<Exported> {
    let prepared = prepare(table, spec)?;
    let bytes = to_delimited(&prepared.table, spec.delimiter(), spec.include_header())?;
    debug!("导出 {} 行, {} 字节", prepared.table.len(), bytes.len());
    Ok(Exported {
        bytes,
        warnings: prepared.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;
    use crate::records::tests::record;
    use crate::records::RecordSet;

    fn table() -> Table {
        let mut t = Table::from_records(&RecordSet::new(vec![
            record("hola", "hola amigo", "2023-01-15 10:00:00"),
            record("mundo", "El mundo; es \"grande\"", "2023-02-20 14:30:00"),
        ]));
        t.push_column("translated_word", vec!["hello".into(), "world".into()])
            .unwrap();
        t
    }

    #[test]
    fn test_default_columns() {
        assert_eq!(
            default_columns(&table()),
            vec!["Word", "Stem", "Sentence", "translated_word"]
        );
    }

    #[test]
    fn test_export_quotes_minimally() {
        let spec = ExportSpec::new().with_columns(["Word", "Sentence"]);
        let exported = export(&table(), &spec).unwrap();
        assert_eq!(
            String::from_utf8(exported.bytes).unwrap(),
            "Word;Sentence\nhola;hola amigo\nmundo;\"El mundo; es \"\"grande\"\"\"\n"
        );
    }

    #[test]
    fn test_tab_delimiter_without_header() {
        let spec = ExportSpec::new()
            .with_columns(["Sentence"])
            .with_delimiter(Delimiter::Tab)
            .with_header(false);
        let exported = export(&table(), &spec).unwrap();
        // 分号不再需要引号，引号字符仍然需要
        assert_eq!(
            String::from_utf8(exported.bytes).unwrap(),
            "hola amigo\n\"El mundo; es \"\"grande\"\"\"\n"
        );
    }

    #[test]
    fn test_export_is_byte_stable() {
        let spec = ExportSpec::new().with_highlight(HighlightMode::Cloze);
        let first = export(&table(), &spec).unwrap();
        let second = export(&table(), &spec).unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn test_highlight_column_follows_projection_and_can_be_renamed() {
        let spec = ExportSpec::new()
            .with_columns(["Word"])
            .with_highlight(HighlightMode::Cloze)
            .with_rename(HIGHLIGHT_COLUMN, "Back")
            .with_rename("Word", "Front");

        let prepared = prepare(&table(), &spec).unwrap();
        assert_eq!(prepared.table.headers(), &["Front".to_string(), "Back".to_string()]);
        assert_eq!(prepared.table.rows()[0][1], "{{c1::hello::hola}} amigo");
        assert!(prepared.warnings.is_empty());
    }

    #[test]
    fn test_highlight_mismatch_is_a_warning() {
        let mut t = Table::from_records(&RecordSet::new(vec![record(
            "casa",
            "El mundo",
            "2023-01-15 10:00:00",
        )]));
        t.push_column("translated_word", vec!["house".into()]).unwrap();

        let spec = ExportSpec::new().with_highlight(HighlightMode::Bold);
        let prepared = prepare(&t, &spec).unwrap();
        assert_eq!(prepared.warnings.len(), 1);
        assert_eq!(prepared.warnings[0].kind, WarningKind::AnnotationMismatch);
        assert_eq!(prepared.table.column(HIGHLIGHT_COLUMN).unwrap(), vec!["El mundo"]);
    }

    #[test]
    fn test_highlight_mismatch_already_reported_by_cloze_is_not_repeated() {
        let mut t = Table::from_records(&RecordSet::new(vec![record(
            "casa",
            "El mundo",
            "2023-01-15 10:00:00",
        )]));
        t.push_column("translated_word", vec!["house".into()]).unwrap();
        t.push_column(CLOZE_COLUMN, vec!["El mundo".into()]).unwrap();

        let spec = ExportSpec::new().with_highlight(HighlightMode::Bold);
        let prepared = prepare(&t, &spec).unwrap();
        assert!(prepared.warnings.is_empty());
        assert_eq!(prepared.table.column(HIGHLIGHT_COLUMN).unwrap(), vec!["El mundo"]);
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let spec = ExportSpec::new().with_columns(["Word", "Pages"]);
        assert!(export(&table(), &spec).is_err());
    }
}
