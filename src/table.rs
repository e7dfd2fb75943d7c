//! 流水线输出的二维表格
//!
//! 基础列来自记录集，翻译与标注阶段在其后追加派生列。

use std::collections::BTreeMap;

use crate::error::Result;
use crate::records::{Column, RecordSet};
use crate::vocab_error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// 以记录集的七个基础列建表
    pub fn from_records(records: &RecordSet) -> Self {
        let headers = Column::ALL.iter().map(|c| c.header().to_string()).collect();
        let rows = records
            .iter()
            .map(|r| Column::ALL.iter().map(|c| c.value(r).into_owned()).collect())
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// 追加一列；同名列已存在时整列替换
    pub fn push_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(vocab_error!(
                input_validation,
                name,
                format!("列长度 {} 与表格行数 {} 不一致", values.len(), self.rows.len())
            ));
        }

        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// 按给定顺序投影列，未知列名返回错误
    pub fn select(&self, names: &[String]) -> Result<Table> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| vocab_error!(config, "columns", format!("表格中没有列 '{}'", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Table {
            headers: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// 重命名列，映射中没有的列保持原名
    pub fn renamed(mut self, renames: &BTreeMap<String, String>) -> Table {
        for header in self.headers.iter_mut() {
            if let Some(new_name) = renames.get(header.as_str()) {
                *header = new_name.clone();
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::record;

    fn table() -> Table {
        Table::from_records(&RecordSet::new(vec![
            record("hola", "Hola amigo", "2023-01-15 10:00:00"),
            record("mundo", "El mundo es grande", "2023-02-20 14:30:00"),
        ]))
    }

    #[test]
    fn test_from_records_uses_base_headers() {
        let t = table();
        assert_eq!(t.headers()[0], "Word");
        assert_eq!(t.headers()[6], "Timestamp");
        assert_eq!(t.column("Timestamp").unwrap(), vec!["2023-01-15 10:00:00", "2023-02-20 14:30:00"]);
    }

    #[test]
    fn test_push_column_appends_and_replaces() {
        let mut t = table();
        t.push_column("translated_word", vec!["hello".into(), "world".into()])
            .unwrap();
        assert_eq!(t.headers().len(), 8);

        t.push_column("translated_word", vec!["hi".into(), "world".into()])
            .unwrap();
        assert_eq!(t.headers().len(), 8);
        assert_eq!(t.column("translated_word").unwrap(), vec!["hi", "world"]);

        assert!(t.push_column("short", vec!["x".into()]).is_err());
    }

    #[test]
    fn test_select_and_rename() {
        let t = table();
        let selected = t
            .select(&["Sentence".to_string(), "Word".to_string()])
            .unwrap();
        assert_eq!(selected.rows()[0], vec!["Hola amigo", "hola"]);

        let mut renames = BTreeMap::new();
        renames.insert("Word".to_string(), "Front".to_string());
        let renamed = selected.renamed(&renames);
        assert_eq!(renamed.headers(), &["Sentence".to_string(), "Front".to_string()]);

        assert!(t.select(&["Pages".to_string()]).is_err());
    }
}
