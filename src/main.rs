//! # xrdkit - XRD 扫描处理与物相匹配工具
//!
//! 读取衍射仪输出的扫描文件，完成背景扣除、Kα2 剥离、寻峰，
//! 并与参考图谱数据库匹配。
//!
//! ## 子命令
//! - `analyze` - 单个扫描文件的完整分析
//! - `batch`   - 目录内扫描文件的并行寻峰
//! - `search`  - 参考数据库检索
//! - `convert` - 扫描格式转换
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/         (命令行参数定义)
//!   ├── commands/    (命令执行逻辑)
//!   │     ├── pipeline.rs  (分析会话)
//!   │     ├── parsers/     (扫描格式解析)
//!   │     ├── processing/  (背景、Kα2、寻峰算法)
//!   │     ├── reference/   (参考图谱加载与匹配)
//!   │     ├── export/      (CSV / XY / JSON / 图表)
//!   │     └── batch/       (批量执行)
//!   ├── models/      (数据模型)
//!   ├── utils/       (输出与进度条)
//!   └── error.rs     (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod export;
mod models;
mod parsers;
mod pipeline;
mod processing;
mod reference;
mod utils;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

/// 日志过滤环境变量（未设置时读取 RUST_LOG）
const LOG_ENV: &str = "XRDKIT_LOG";

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("xrdkit=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// 错误及其来源链，逐层缩进
fn error_report(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }
    msg
}

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&error_report(&e));
        std::process::exit(1);
    }
}
