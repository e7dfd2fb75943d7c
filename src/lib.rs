//! vocab-anki - Kindle 生词本转 Anki 表格工具库
//!
//! 这个库提供了生词本解析、记录集变换、多后端翻译、句子标注、表格导出和统计等核心功能。

pub mod annotator;
pub mod api_constants;
pub mod config;
pub mod error;
pub mod exporter;
pub mod extractor;
pub mod pipeline;
pub mod records;
pub mod stats;
pub mod table;
pub mod translator;
pub mod utils;
