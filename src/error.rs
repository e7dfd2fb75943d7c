//! 统一错误处理模块
//!
//! 提供 vocab-anki 的错误类型定义，以及流水线各阶段吸收错误后返回给调用方的警告类型

// 标准库导入
use std::fmt;

// 第三方crate导入
use anyhow::Error as AnyhowError;

/// vocab-anki 统一错误类型
///
/// 只在组件内部传播；到达组件边界时会被吸收并转换为 [`Warning`]
#[derive(Debug)]
pub enum VocabError {
    /// 输入不是可解析的数据库，或缺少所需的表/列
    MalformedSource {
        /// 具体错误信息
        details: String,
    },

    /// 网络请求相关错误
    Network {
        /// 错误消息
        message: String,
        /// HTTP状态码（如果适用）
        status_code: Option<u16>,
    },

    /// 翻译API返回了错误状态
    TranslationApi {
        /// API响应状态码
        status_code: u16,
        /// 错误消息
        message: String,
        /// API地址
        endpoint: String,
    },

    /// 翻译API的响应无法解析
    ResponseFormat {
        /// 具体错误信息
        details: String,
    },

    /// 文件操作相关错误
    FileOperation {
        /// 文件路径
        path: String,
        /// 操作类型（读取、写入、创建等）
        operation: String,
        /// 底层错误信息
        source: String,
    },

    /// 配置相关错误
    Configuration {
        /// 配置项名称
        field: String,
        /// 错误原因
        reason: String,
    },

    /// 输入验证错误
    InputValidation {
        /// 输入值
        input: String,
        /// 验证失败原因
        reason: String,
    },

    /// 内部处理错误（包装anyhow::Error）
    Internal {
        /// 包装的错误
        source: AnyhowError,
    },
}

impl fmt::Display for VocabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocabError::MalformedSource { details } => {
                write!(f, "生词本数据库无效: {}", details)
            }
            VocabError::Network {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "网络请求失败 [{}]: {}", code, message)
                } else {
                    write!(f, "网络请求失败: {}", message)
                }
            }
            VocabError::TranslationApi {
                status_code,
                message,
                endpoint,
            } => {
                write!(f, "翻译API错误 [{}] {}: {}", status_code, endpoint, message)
            }
            VocabError::ResponseFormat { details } => {
                write!(f, "翻译响应格式错误: {}", details)
            }
            VocabError::FileOperation {
                path,
                operation,
                source,
            } => {
                write!(f, "文件{}操作失败 [{}]: {}", operation, path, source)
            }
            VocabError::Configuration { field, reason } => {
                write!(f, "配置错误 [{}]: {}", field, reason)
            }
            VocabError::InputValidation { input, reason } => {
                write!(f, "输入验证失败 [{}]: {}", input, reason)
            }
            VocabError::Internal { source } => {
                write!(f, "内部处理错误: {}", source)
            }
        }
    }
}

impl std::error::Error for VocabError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VocabError::Internal { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// vocab-anki 结果类型别名
pub type Result<T> = std::result::Result<T, VocabError>;

/// 便捷的错误创建宏
#[macro_export]
macro_rules! vocab_error {
    (malformed, $details:expr) => {
        $crate::error::VocabError::MalformedSource {
            details: $details.to_string(),
        }
    };
    (network, $msg:expr) => {
        $crate::error::VocabError::Network {
            message: $msg.to_string(),
            status_code: None,
        }
    };
    (network, $msg:expr, $code:expr) => {
        $crate::error::VocabError::Network {
            message: $msg.to_string(),
            status_code: Some($code),
        }
    };
    (translation_api, $code:expr, $msg:expr, $url:expr) => {
        $crate::error::VocabError::TranslationApi {
            status_code: $code,
            message: $msg.to_string(),
            endpoint: $url.to_string(),
        }
    };
    (response, $details:expr) => {
        $crate::error::VocabError::ResponseFormat {
            details: $details.to_string(),
        }
    };
    (file_op, $path:expr, $op:expr, $source:expr) => {
        $crate::error::VocabError::FileOperation {
            path: $path.to_string(),
            operation: $op.to_string(),
            source: $source.to_string(),
        }
    };
    (config, $field:expr, $reason:expr) => {
        $crate::error::VocabError::Configuration {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
    (input_validation, $input:expr, $reason:expr) => {
        $crate::error::VocabError::InputValidation {
            input: $input.to_string(),
            reason: $reason.to_string(),
        }
    };
}

/// 从anyhow::Error转换为VocabError
impl From<AnyhowError> for VocabError {
    fn from(error: AnyhowError) -> Self {
        VocabError::Internal { source: error }
    }
}

/// 从reqwest::Error转换为VocabError
impl From<reqwest::Error> for VocabError {
    fn from(error: reqwest::Error) -> Self {
        let status_code = error.status().map(|s| s.as_u16());
        VocabError::Network {
            message: error.to_string(),
            status_code,
        }
    }
}

/// 从std::io::Error转换为VocabError
impl From<std::io::Error> for VocabError {
    fn from(error: std::io::Error) -> Self {
        VocabError::FileOperation {
            path: "unknown".to_string(),
            operation: "io".to_string(),
            source: error.to_string(),
        }
    }
}

/// 数据库层面的任何错误都意味着输入不可用
impl From<sqlx::Error> for VocabError {
    fn from(error: sqlx::Error) -> Self {
        VocabError::MalformedSource {
            details: error.to_string(),
        }
    }
}

impl From<csv::Error> for VocabError {
    fn from(error: csv::Error) -> Self {
        VocabError::Internal {
            source: AnyhowError::new(error),
        }
    }
}

/// 被吸收的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// 数据库无法解析，结果为空
    MalformedSource,
    /// 单条翻译失败，已回退
    TranslationItemFailure,
    /// 整批翻译失败，已逐条回退
    TranslationBatchFailure,
    /// 句子中找不到目标单词，标注未生效
    AnnotationMismatch,
    /// 注音请求失败，保留原句
    FuriganaFailure,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningKind::MalformedSource => "malformed_source",
            WarningKind::TranslationItemFailure => "translation_item_failure",
            WarningKind::TranslationBatchFailure => "translation_batch_failure",
            WarningKind::AnnotationMismatch => "annotation_mismatch",
            WarningKind::FuriganaFailure => "furigana_failure",
        };
        f.write_str(name)
    }
}

/// 附加在结果上的警告
///
/// 流水线从不因可恢复错误而中断，所有被吸收的失败都会以警告的形式返回
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// 对应的输入行（以0开始），与具体行无关时为 None
    pub row: Option<usize>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, row: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            row,
            message: message.into(),
        }
    }

    pub fn malformed_source(error: &VocabError) -> Self {
        Self::new(WarningKind::MalformedSource, None, error.to_string())
    }

    /// 数据库中单条查词记录无法使用，`row` 是查询结果中的位置
    pub fn skipped_lookup(row: usize, message: impl Into<String>) -> Self {
        Self::new(WarningKind::MalformedSource, Some(row), message)
    }

    pub fn item_failure(row: usize, message: impl Into<String>) -> Self {
        Self::new(WarningKind::TranslationItemFailure, Some(row), message)
    }

    pub fn batch_failure(first_row: usize, message: impl Into<String>) -> Self {
        Self::new(WarningKind::TranslationBatchFailure, Some(first_row), message)
    }

    pub fn furigana_failure(row: usize, message: impl Into<String>) -> Self {
        Self::new(WarningKind::FuriganaFailure, Some(row), message)
    }

    pub fn annotation_mismatch(row: usize, word: &str) -> Self {
        Self::new(
            WarningKind::AnnotationMismatch,
            Some(row),
            format!("句子中未找到单词 '{}'", word),
        )
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "[{}] 第{}行: {}", self.kind, row + 1, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}
