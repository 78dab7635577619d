//! # convert 子命令 CLI 定义
//!
//! 将任意支持的扫描格式转换为 CSV 或 XY。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/convert.rs`

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 转换输出格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ScanOutputFormat {
    /// Comma separated, with a header row
    Csv,
    /// Two columns with '#' comment header
    Xy,
}

impl ScanOutputFormat {
    /// 由扩展名推断
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(ScanOutputFormat::Csv),
            "xy" | "dat" | "txt" => Some(ScanOutputFormat::Xy),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanOutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanOutputFormat::Csv => write!(f, "csv"),
            ScanOutputFormat::Xy => write!(f, "xy"),
        }
    }
}

/// convert 子命令参数
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input scan file
    pub input: PathBuf,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Output format (default: from the output extension)
    #[arg(short, long, value_enum)]
    pub target: Option<ScanOutputFormat>,

    /// Input format: auto, xrdml, raw, dat, asc, txt
    #[arg(long, default_value = "auto")]
    pub format: String,

    /// Overwrite an existing output file
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_output_format_from_extension() {
        assert_eq!(
            ScanOutputFormat::from_path(Path::new("out.CSV")),
            Some(ScanOutputFormat::Csv)
        );
        assert_eq!(
            ScanOutputFormat::from_path(Path::new("out.xy")),
            Some(ScanOutputFormat::Xy)
        );
        assert_eq!(ScanOutputFormat::from_path(Path::new("out.png")), None);
    }
}
