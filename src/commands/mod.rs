//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `pipeline.rs`, `reference/`, `export/`, `utils/`
//! - 子模块: analyze, batch, search, convert, settings

pub mod analyze;
pub mod batch;
pub mod convert;
pub mod search;
pub mod settings;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Analyze(args) => analyze::execute(args),
        Commands::Batch(args) => batch::execute(args),
        Commands::Search(args) => search::execute(args),
        Commands::Convert(args) => convert::execute(args),
    }
}
