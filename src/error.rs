//! # 统一错误处理模块
//!
//! 定义 xrdkit 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - `FormatError`: 文件无法解析出任何有效数据点
//! - `UnknownMethod`: 未知的算法名称（背景/Kα/寻峰）
//! - `DataStateError`: 前置步骤尚未执行
//! - `ConfigValueError`: 参数超出有效范围
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// xrdkit 统一错误类型
#[derive(Error, Debug)]
pub enum XrdError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}{}", layout_suffix(.layout))]
    FormatError {
        format: String,
        path: String,
        reason: String,
        /// 二进制文件尝试过的布局（offset/count/strategy）
        layout: Option<String>,
    },

    #[error("Invalid JSON in {path}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid XML in {path}")]
    XmlError {
        path: String,
        #[source]
        source: roxmltree::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // 算法与状态错误
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown {family} method '{name}'. Available: {}", .valid.join(", "))]
    UnknownMethod {
        family: String,
        name: String,
        valid: Vec<String>,
    },

    #[error("Cannot run {operation}: {requires} has not been performed yet")]
    DataStateError { operation: String, requires: String },

    #[error("Invalid value for {parameter}: {value} (expected {expected})")]
    ConfigValueError {
        parameter: String,
        value: String,
        expected: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 导出错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Plot error: {0}")]
    PlotError(String),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

fn layout_suffix(layout: &Option<String>) -> String {
    match layout {
        Some(l) => format!("\nAttempted layout: {}", l),
        None => String::new(),
    }
}

impl XrdError {
    /// 构造解析错误（无布局信息）
    pub fn format(format: &str, path: &str, reason: impl Into<String>) -> Self {
        XrdError::FormatError {
            format: format.to_string(),
            path: path.to_string(),
            reason: reason.into(),
            layout: None,
        }
    }

    /// 构造参数范围错误
    pub fn config(parameter: &str, value: impl ToString, expected: &str) -> Self {
        XrdError::ConfigValueError {
            parameter: parameter.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// 构造未知方法错误
    pub fn unknown_method(family: &str, name: &str, valid: &[&str]) -> Self {
        XrdError::UnknownMethod {
            family: family.to_string(),
            name: name.to_string(),
            valid: valid.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 构造状态错误
    pub fn data_state(operation: &str, requires: &str) -> Self {
        XrdError::DataStateError {
            operation: operation.to_string(),
            requires: requires.to_string(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, XrdError>;
