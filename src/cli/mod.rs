//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `analyze`: 单个扫描文件的完整分析（背景、Kα2、寻峰、匹配）
//! - `batch`: 目录内扫描文件的并行寻峰
//! - `search`: 在参考数据库中检索物相
//! - `convert`: 扫描文件格式转换（CSV / XY）
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: analyze, batch, search, convert

pub mod analyze;
pub mod batch;
pub mod convert;
pub mod search;

use clap::{Parser, Subcommand};

/// xrdkit - XRD 扫描处理与物相匹配工具
#[derive(Parser)]
#[command(name = "xrdkit")]
#[command(version)]
#[command(about = "X-ray diffraction scan processing and phase matching", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging (overrides XRDKIT_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Analyze one scan: background, Kα2 stripping, peak detection, reference matching
    Analyze(analyze::AnalyzeArgs),

    /// Detect peaks in every scan file of a directory, in parallel
    Batch(batch::BatchArgs),

    /// Search the reference database by phase name or id
    Search(search::SearchArgs),

    /// Convert a scan file (XRDML, RAW, DAT, ASC, TXT) to CSV or XY
    Convert(convert::ConvertArgs),
}
