use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::warn;

use crate::error::Result;
use crate::vocab_error;

/// 初始化日志系统
pub fn init_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// 验证输入文件
pub fn validate_input_file(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("输入文件不存在: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("输入路径不是文件: {}", path.display());
    }

    if let Some(ext) = path.extension() {
        if ext != "db" && ext != "sqlite" {
            warn!("⚠️  文件扩展名不是数据库: {}", ext.to_string_lossy());
        }
    }

    Ok(())
}

/// 生成输出文件路径，默认 `anki_table_YYYY_MM_DD.csv`
pub fn generate_output_path(output: &Option<PathBuf>, today: NaiveDate) -> PathBuf {
    if let Some(output_path) = output {
        return output_path.clone();
    }
    PathBuf::from(format!("anki_table_{}.csv", today.format("%Y_%m_%d")))
}

/// 解析 `Old=New` 形式的列重命名
pub fn parse_rename(input: &str) -> Result<(String, String)> {
    let (from, to) = input
        .split_once('=')
        .ok_or_else(|| vocab_error!(input_validation, input, "重命名格式应为 Old=New"))?;

    let (from, to) = (from.trim(), to.trim());
    if from.is_empty() || to.is_empty() {
        return Err(vocab_error!(input_validation, input, "列名不能为空"));
    }
    Ok((from.to_string(), to.to_string()))
}

/// 计算内容哈希值
pub fn calculate_content_hash(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_output_path() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            generate_output_path(&None, today),
            PathBuf::from("anki_table_2024_03_07.csv")
        );
        let custom = Some(PathBuf::from("out/cards.txt"));
        assert_eq!(generate_output_path(&custom, today), PathBuf::from("out/cards.txt"));
    }

    #[test]
    fn test_parse_rename() {
        assert_eq!(
            parse_rename("Word = Front").unwrap(),
            ("Word".to_string(), "Front".to_string())
        );
        assert_eq!(
            parse_rename("Book title=Source").unwrap(),
            ("Book title".to_string(), "Source".to_string())
        );
        assert!(parse_rename("Word").is_err());
        assert!(parse_rename("=Front").is_err());
    }

    #[test]
    fn test_validate_input_file() {
        let file = tempfile::Builder::new().suffix(".db").tempfile().unwrap();
        assert!(validate_input_file(file.path()).is_ok());
        assert!(validate_input_file(Path::new("/definitely/missing/vocab.db")).is_err());
        assert!(validate_input_file(std::env::temp_dir().as_path()).is_err());
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(calculate_content_hash("hola"), calculate_content_hash("hola"));
        assert_ne!(calculate_content_hash("hola"), calculate_content_hash("mundo"));
    }
}
