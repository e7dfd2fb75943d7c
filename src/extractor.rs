//! 生词本数据库解析模块
//!
//! 此模块负责：
//! - 将上传的 vocab.db 字节写入临时文件，以只读方式打开
//! - 连接 LOOKUPS / WORDS / BOOK_INFO 三张表
//! - 把毫秒时间戳转换为本地时间并按时间排序
//!
//! 解析失败不会向调用方抛出错误，而是返回空记录集并附带一条警告。
//! 单条记录缺少时间戳或无法解码时跳过该条，每条附带一条警告。

use std::io::Write;

use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row};
use tracing::{debug, info, warn};

use crate::error::{Result, VocabError, Warning};
use crate::records::{RecordSet, SortKey, VocabularyRecord};
use crate::vocab_error;

const LOOKUPS_QUERY: &str = r#"
    SELECT WORDS.word AS word,
           WORDS.stem AS stem,
           WORDS.lang AS lang,
           LOOKUPS.usage AS usage,
           BOOK_INFO.title AS title,
           BOOK_INFO.authors AS authors,
           LOOKUPS.timestamp AS timestamp
      FROM LOOKUPS
      LEFT JOIN WORDS
        ON WORDS.id = LOOKUPS.word_key
      LEFT JOIN BOOK_INFO
        ON BOOK_INFO.id = LOOKUPS.book_key
     ORDER BY WORDS.stem, LOOKUPS.timestamp
"#;

/// 解析结果：记录集和解析过程中产生的警告
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: RecordSet,
    pub warnings: Vec<Warning>,
}

impl Extraction {
    /// 没有任何记录时流水线无法继续，需要用户重新提供文件
    pub fn is_blocking(&self) -> bool {
        self.records.is_empty()
    }
}

/// 从 vocab.db 的原始字节中提取记录
pub async fn extract(raw: &[u8]) -> Extraction {
    match try_extract(raw).await {
        Ok(extraction) => {
            info!(
                "📚 从生词本中提取到 {} 条记录，跳过 {} 条",
                extraction.records.len(),
                extraction.warnings.len()
            );
            extraction
        }
        Err(e) => {
            warn!("❌ 生词本解析失败: {}", e);
            Extraction {
                records: RecordSet::default(),
                warnings: vec![Warning::malformed_source(&e)],
            }
        }
    }
}

async fn try_extract(raw: &[u8]) -> Result<Extraction> {
    if raw.is_empty() {
        return Err(vocab_error!(malformed, "文件为空"));
    }

    // SQLite 只能从文件打开，先落盘到临时文件
    let mut staged = tempfile::Builder::new()
        .prefix("vocab")
        .suffix(".db")
        .tempfile()
        .map_err(|e| vocab_error!(file_op, "vocab.db", "创建临时", e))?;
    staged
        .write_all(raw)
        .and_then(|_| staged.flush())
        .map_err(|e| vocab_error!(file_op, staged.path().display(), "写入临时", e))?;
    debug!("暂存生词本: {} ({} 字节)", staged.path().display(), raw.len());

    let options = SqliteConnectOptions::new()
        .filename(staged.path())
        .read_only(true)
        .create_if_missing(false);

    let mut conn = options.connect().await?;
    let rows = sqlx::query(LOOKUPS_QUERY).fetch_all(&mut conn).await;
    // 连接关闭失败不影响已读取的数据
    if let Err(e) = conn.close().await {
        debug!("关闭数据库连接失败: {}", e);
    }
    let rows = rows?;

    let mut records = Vec::with_capacity(rows.len());
    let mut warnings = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match record_from_row(row) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {
                warn!("⚠️  跳过第{}条查词记录: 缺少时间戳", index + 1);
                warnings.push(Warning::skipped_lookup(index, "查词记录缺少时间戳"));
            }
            Err(e) => {
                warn!("⚠️  跳过第{}条查词记录: {}", index + 1, e);
                warnings.push(Warning::skipped_lookup(index, e.to_string()));
            }
        }
    }

    Ok(Extraction {
        records: RecordSet::new(records).sorted_by(SortKey::Timestamp),
        warnings,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<Option<VocabularyRecord>> {
    let text = |name: &str| -> Result<String> {
        Ok(row
            .try_get::<Option<String>, _>(name)
            .map_err(VocabError::from)?
            .unwrap_or_default())
    };

    let Some(millis) = row.try_get::<Option<i64>, _>("timestamp")? else {
        return Ok(None);
    };

    Ok(Some(VocabularyRecord {
        word: text("word")?,
        stem: text("stem")?,
        word_language: text("lang")?,
        sentence: text("usage")?,
        book_title: text("title")?,
        authors: text("authors")?,
        timestamp: local_timestamp(millis)?,
    }))
}

/// 毫秒时间戳 → 本地时间（截断到秒）
pub fn local_timestamp(millis: i64) -> Result<NaiveDateTime> {
    let utc = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| vocab_error!(malformed, format!("时间戳超出范围: {}", millis)))?;
    let local = utc.with_timezone(&Local).naive_local();
    Ok(local.with_nanosecond(0).unwrap_or(local))
}
