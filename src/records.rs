//! 生词记录与记录集
//!
//! 记录集上的所有变换都是纯函数：接收 `&RecordSet`，返回新的 `RecordSet`，从不原地修改。

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, VocabError};

/// 时间戳的输出格式（本地时间，精确到秒）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 一次查词事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyRecord {
    /// 查询时的原始单词
    pub word: String,
    /// 词典基本形式
    pub stem: String,
    pub word_language: String,
    /// 单词所在的句子
    pub sentence: String,
    pub book_title: String,
    pub authors: String,
    /// 本地时间，已截断到秒
    pub timestamp: NaiveDateTime,
}

impl VocabularyRecord {
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// 记录的基础列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Word,
    Stem,
    WordLanguage,
    Sentence,
    BookTitle,
    Authors,
    Timestamp,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::Word,
        Column::Stem,
        Column::WordLanguage,
        Column::Sentence,
        Column::BookTitle,
        Column::Authors,
        Column::Timestamp,
    ];

    /// 导出表格中使用的列名
    pub fn header(&self) -> &'static str {
        match self {
            Column::Word => "Word",
            Column::Stem => "Stem",
            Column::WordLanguage => "Word language",
            Column::Sentence => "Sentence",
            Column::BookTitle => "Book title",
            Column::Authors => "Authors",
            Column::Timestamp => "Timestamp",
        }
    }

    pub fn value<'a>(&self, record: &'a VocabularyRecord) -> Cow<'a, str> {
        match self {
            Column::Word => Cow::Borrowed(&record.word),
            Column::Stem => Cow::Borrowed(&record.stem),
            Column::WordLanguage => Cow::Borrowed(&record.word_language),
            Column::Sentence => Cow::Borrowed(&record.sentence),
            Column::BookTitle => Cow::Borrowed(&record.book_title),
            Column::Authors => Cow::Borrowed(&record.authors),
            Column::Timestamp => Cow::Owned(record.formatted_timestamp()),
        }
    }

    /// 翻译结果所在的派生列，例如 `translated_word`
    pub fn translated_header(&self) -> String {
        format!("translated_{}", self.header().to_lowercase().replace(' ', "_"))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Column {
    type Err = VocabError;

    /// 接受列名（`Book title`）或蛇形写法（`book_title`），不区分大小写
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.header().to_lowercase() == normalized)
            .ok_or_else(|| crate::vocab_error!(input_validation, s, "未知的列名"))
    }
}

/// 排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortKey {
    #[default]
    Timestamp,
    Word,
}

/// 有序的记录集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: Vec<VocabularyRecord>,
}

impl RecordSet {
    pub fn new(records: Vec<VocabularyRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VocabularyRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[VocabularyRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<VocabularyRecord> {
        self.records
    }

    /// 按指定字段升序排序（稳定排序）
    pub fn sorted_by(&self, key: SortKey) -> RecordSet {
        let mut records = self.records.clone();
        match key {
            SortKey::Timestamp => records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
            SortKey::Word => records.sort_by(|a, b| a.word.cmp(&b.word)),
        }
        RecordSet::new(records)
    }

    /// 保留最后 N 条，N 被限制在 `[1, len]`
    pub fn take_last(&self, n: usize) -> RecordSet {
        if self.records.is_empty() {
            return RecordSet::default();
        }
        let n = n.clamp(1, self.records.len());
        RecordSet::new(self.records[self.records.len() - n..].to_vec())
    }

    /// 丢弃日期早于 `date` 的记录
    pub fn since(&self, date: NaiveDate) -> RecordSet {
        self.records
            .iter()
            .filter(|r| r.date() >= date)
            .cloned()
            .collect()
    }

    /// 按单词去重，每个单词只保留时间戳最大的那一条（相同时保留靠后的）
    ///
    /// 保留下来的记录维持原有的相对顺序
    pub fn deduplicate(&self) -> RecordSet {
        let mut winners: HashMap<&str, usize> = HashMap::new();
        for (i, record) in self.records.iter().enumerate() {
            winners
                .entry(record.word.as_str())
                .and_modify(|best| {
                    if record.timestamp >= self.records[*best].timestamp {
                        *best = i;
                    }
                })
                .or_insert(i);
        }

        let keep: HashSet<usize> = winners.into_values().collect();
        self.records
            .iter()
            .enumerate()
            .filter(|(i, _)| keep.contains(i))
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// 只保留 `column` 取值在 `allowed` 中的记录
    ///
    /// `allowed` 为空时不做任何限制
    pub fn filter_in(&self, column: Column, allowed: &[String]) -> RecordSet {
        if allowed.is_empty() {
            return self.clone();
        }
        let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
        self.records
            .iter()
            .filter(|r| allowed.contains(column.value(r).as_ref()))
            .cloned()
            .collect()
    }

    /// 某一列的不同取值，按首次出现的顺序
    pub fn distinct(&self, column: Column) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for record in &self.records {
            let value = column.value(record).into_owned();
            if seen.insert(value.clone()) {
                values.push(value);
            }
        }
        values
    }

    /// 最早和最晚的日期
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(|r| r.date()).min()?;
        let max = self.records.iter().map(|r| r.date()).max()?;
        Some((min, max))
    }
}

impl FromIterator<VocabularyRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = VocabularyRecord>>(iter: I) -> Self {
        RecordSet::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a VocabularyRecord;
    type IntoIter = std::slice::Iter<'a, VocabularyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// 记录集变换参数
///
/// 各步骤按固定顺序执行：排序 → 取最后N条 → 起始日期 → 去重 → 分类过滤
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub sort_by: SortKey,
    /// None 表示保留全部
    pub take_last: Option<usize>,
    pub since: Option<NaiveDate>,
    pub deduplicate: bool,
    pub books: Vec<String>,
    pub authors: Vec<String>,
    pub languages: Vec<String>,
}

impl TransformOptions {
    pub fn apply(&self, records: &RecordSet) -> RecordSet {
        let mut out = records.sorted_by(self.sort_by);

        if let Some(n) = self.take_last {
            out = out.take_last(n);
        }
        if let Some(date) = self.since {
            out = out.since(date);
        }
        if self.deduplicate {
            out = out.deduplicate();
        }

        out.filter_in(Column::BookTitle, &self.books)
            .filter_in(Column::Authors, &self.authors)
            .filter_in(Column::WordLanguage, &self.languages)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(word: &str, sentence: &str, timestamp: &str) -> VocabularyRecord {
        VocabularyRecord {
            word: word.to_string(),
            stem: word.to_string(),
            word_language: "es".to_string(),
            sentence: sentence.to_string(),
            book_title: "Test Book".to_string(),
            authors: "Test Author".to_string(),
            timestamp: NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).unwrap(),
        }
    }

    fn words(set: &RecordSet) -> Vec<&str> {
        set.iter().map(|r| r.word.as_str()).collect()
    }

    fn sample() -> RecordSet {
        RecordSet::new(vec![
            record("hola", "Hola amigo", "2023-01-15 10:00:00"),
            record("mundo", "El mundo es grande", "2023-01-20 09:00:00"),
            record("casa", "Mi casa", "2023-02-01 08:00:00"),
            record("mundo", "Otro mundo", "2023-02-20 14:30:00"),
        ])
    }

    #[test]
    fn test_sort_by_word_is_stable() {
        let sorted = sample().sorted_by(SortKey::Word);
        assert_eq!(words(&sorted), vec!["casa", "hola", "mundo", "mundo"]);
        assert_eq!(sorted.records()[2].sentence, "El mundo es grande");
    }

    #[test]
    fn test_take_last_is_clamped() {
        let set = sample();
        assert_eq!(words(&set.take_last(2)), vec!["casa", "mundo"]);
        assert_eq!(set.take_last(0).len(), 1);
        assert_eq!(set.take_last(100).len(), 4);
        assert!(RecordSet::default().take_last(3).is_empty());
    }

    #[test]
    fn test_since_drops_earlier_dates() {
        let floor = NaiveDate::from_ymd_opt(2023, 1, 20).unwrap();
        assert_eq!(words(&sample().since(floor)), vec!["mundo", "casa", "mundo"]);
    }

    #[test]
    fn test_deduplicate_keeps_latest_occurrence() {
        let set = RecordSet::new(vec![
            record("mundo", "El mundo", "2023-01-01 10:00:00"),
            record("hola", "Hola", "2023-01-02 10:00:00"),
            record("mundo", "Otro mundo", "2023-01-03 10:00:00"),
        ]);
        let deduped = set.deduplicate();
        assert_eq!(words(&deduped), vec!["hola", "mundo"]);
        assert_eq!(deduped.records()[1].sentence, "Otro mundo");
    }

    #[test]
    fn test_deduplicate_prefers_timestamp_over_position() {
        // 按单词排序后，较新的记录不一定排在后面
        let set = RecordSet::new(vec![
            record("mundo", "Nuevo mundo", "2023-03-01 10:00:00"),
            record("mundo", "Viejo mundo", "2023-01-01 10:00:00"),
        ]);
        let deduped = set.deduplicate();
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped.records()[0].sentence, "Nuevo mundo");
    }

    #[test]
    fn test_empty_allowed_set_is_identity() {
        let mut set = sample().into_records();
        set[2].authors = "Author A".to_string();
        let set = RecordSet::new(set);

        assert_eq!(set.filter_in(Column::Authors, &[]), set);

        let only_a = set.filter_in(Column::Authors, &["Author A".to_string()]);
        assert_eq!(words(&only_a), vec!["casa"]);
    }

    #[test]
    fn test_transform_pipeline_order() {
        let options = TransformOptions {
            sort_by: SortKey::Timestamp,
            take_last: Some(3),
            since: NaiveDate::from_ymd_opt(2023, 1, 1),
            deduplicate: true,
            languages: vec!["es".to_string()],
            ..Default::default()
        };
        let out = options.apply(&sample());
        assert_eq!(words(&out), vec!["casa", "mundo"]);
    }

    #[test]
    fn test_column_parsing_and_headers() {
        assert_eq!("book_title".parse::<Column>().unwrap(), Column::BookTitle);
        assert_eq!("Word language".parse::<Column>().unwrap(), Column::WordLanguage);
        assert!("pages".parse::<Column>().is_err());
        assert_eq!(Column::Word.translated_header(), "translated_word");
        assert_eq!(Column::Sentence.translated_header(), "translated_sentence");
    }

    #[test]
    fn test_distinct_and_date_range() {
        let set = sample();
        assert_eq!(set.distinct(Column::Word), vec!["hola", "mundo", "casa"]);
        let (min, max) = set.date_range().unwrap();
        assert_eq!(min, NaiveDate::from_ymd_opt(2023, 1, 15).unwrap());
        assert_eq!(max, NaiveDate::from_ymd_opt(2023, 2, 20).unwrap());
        assert!(RecordSet::default().date_range().is_none());
    }
}
