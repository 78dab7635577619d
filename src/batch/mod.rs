//! # 批量处理模块
//!
//! 目录级的扫描文件批量分析。
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::{FileCollector, DEFAULT_SCAN_PATTERN};
pub use runner::{BatchRunner, ProcessResult};
