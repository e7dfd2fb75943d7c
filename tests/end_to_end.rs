use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

use vocab_anki::config::PipelineConfig;
use vocab_anki::error::Result;
use vocab_anki::exporter::{self, ExportSpec};
use vocab_anki::extractor;
use vocab_anki::pipeline;
use vocab_anki::translator::{TextTranslator, TranslatorAdapter};

struct DictionaryTranslator {
    answers: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl TextTranslator for DictionaryTranslator {
    async fn translate(&self, _source: &str, _target: &str, text: &str) -> Result<String> {
        Ok(self
            .answers
            .get(text)
            .map(|s| s.to_string())
            .unwrap_or_else(|| text.to_string()))
    }

    fn name(&self) -> &str {
        "dictionary"
    }
}

fn local_millis(y: i32, m: u32, d: u32, hh: u32) -> i64 {
    Local
        .with_ymd_and_hms(y, m, d, hh, 0, 0)
        .earliest()
        .unwrap()
        .timestamp_millis()
}

async fn two_row_db() -> Vec<u8> {
    let file = tempfile::Builder::new().suffix(".db").tempfile().unwrap();
    let mut conn = SqliteConnectOptions::new()
        .filename(file.path())
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();

    let statements = [
        "CREATE TABLE WORDS (id TEXT, word TEXT, stem TEXT, lang TEXT)".to_string(),
        "CREATE TABLE BOOK_INFO (id TEXT, title TEXT, authors TEXT)".to_string(),
        "CREATE TABLE LOOKUPS (word_key TEXT, book_key TEXT, usage TEXT, timestamp INTEGER)"
            .to_string(),
        "INSERT INTO WORDS VALUES ('es:hola', 'hola', 'hola', 'es')".to_string(),
        "INSERT INTO WORDS VALUES ('es:mundo', 'mundo', 'mundo', 'es')".to_string(),
        "INSERT INTO BOOK_INFO VALUES ('book', 'El Libro', 'Autor')".to_string(),
        // 故意让插入顺序与时间顺序相反
        format!(
            "INSERT INTO LOOKUPS VALUES ('es:mundo', 'book', 'El mundo es grande', {})",
            local_millis(2023, 2, 20, 14)
        ),
        format!(
            "INSERT INTO LOOKUPS VALUES ('es:hola', 'book', 'hola amigo', {})",
            local_millis(2023, 1, 15, 10)
        ),
    ];
    for statement in &statements {
        sqlx::query(statement).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();

    std::fs::read(file.path()).unwrap()
}

#[tokio::test]
async fn test_vocab_db_to_anki_table() {
    let raw = two_row_db().await;
    let extraction = extractor::extract(&raw).await;
    assert!(extraction.warnings.is_empty());
    assert_eq!(extraction.records.len(), 2);

    let translator = DictionaryTranslator {
        answers: HashMap::from([("hola", "hello"), ("mundo", "world")]),
    };
    let adapter = TranslatorAdapter::free(Arc::new(translator));
    let config = PipelineConfig::new().with_target_language("en");

    let output = pipeline::run(&extraction.records, &config, &adapter, None)
        .await
        .unwrap();
    assert!(output.warnings.is_empty());
    assert_eq!(
        output.table.column("sentence_with_cloze").unwrap(),
        vec!["{{c1::hello::hola}} amigo", "El {{c1::world::mundo}} es grande"]
    );

    let spec = ExportSpec::new().with_columns(["Word", "translated_word"]);
    let first = exporter::export(&output.table, &spec).unwrap();
    assert_eq!(
        String::from_utf8(first.bytes.clone()).unwrap(),
        "Word;translated_word\nhola;hello\nmundo;world\n"
    );

    // 同样的输入必须得到逐字节相同的输出
    let again = extractor::extract(&raw).await;
    let output = pipeline::run(&again.records, &config, &adapter, None)
        .await
        .unwrap();
    let second = exporter::export(&output.table, &spec).unwrap();
    assert_eq!(first.bytes, second.bytes);
}

#[tokio::test]
async fn test_garbage_input_is_blocking_but_not_an_error() {
    let extraction = extractor::extract(b"SQLite format 2\0garbage").await;
    assert!(extraction.is_blocking());
    assert_eq!(extraction.warnings.len(), 1);
}
