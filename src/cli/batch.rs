//! # batch 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/batch.rs`

use super::analyze::ProcessingArgs;
use crate::batch::DEFAULT_SCAN_PATTERN;

use clap::Args;
use std::path::PathBuf;

/// batch 子命令参数
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory containing scan files
    pub input: PathBuf,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    /// Glob patterns for scan files, comma separated
    #[arg(long, default_value = DEFAULT_SCAN_PATTERN)]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Directory for <stem>_peaks.csv files (default: next to each scan)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Overwrite existing peak files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
