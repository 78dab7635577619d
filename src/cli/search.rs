//! # search 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/search.rs`

use clap::Args;
use std::path::PathBuf;

/// search 子命令参数
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text to look for in phase names and ids (case-insensitive)
    pub query: String,

    /// Reference database: JSON files or directories (repeatable)
    #[arg(short, long, required = true)]
    pub database: Vec<PathBuf>,

    /// Show the strongest peaks of each hit
    #[arg(long, default_value_t = false)]
    pub peaks: bool,
}
