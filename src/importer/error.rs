// ==========================================
// 后厨出餐引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行号为文件中的物理行号(从 1 开始,表头为第 1 行)
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}(仅支持 .csv)")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("缺少列: {0}")]
    MissingColumn(String),

    #[error("必填字段为空 (行 {row}, 字段 {field})")]
    RequiredFieldMissing { row: u64, field: String },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: u64,
        field: String,
        message: String,
    },

    #[error("数值范围错误 (行 {row}, 字段 {field}): 值 {value} 超出范围 [{min}, {max}]")]
    ValueRangeError {
        row: u64,
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    // ===== 数据库错误 =====
    #[error("外键约束违反 (行 {row}): {message}")]
    ForeignKeyViolation { row: u64, message: String },

    #[error("写入失败 (行 {row}): {source}")]
    Repository {
        row: u64,
        #[source]
        source: RepositoryError,
    },
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl ImportError {
    /// 带行号包装仓储错误
    pub fn from_repository(row: u64, err: RepositoryError) -> Self {
        match err {
            RepositoryError::ForeignKeyViolation(message) => {
                ImportError::ForeignKeyViolation { row, message }
            }
            source => ImportError::Repository { row, source },
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
