//! # 参考图谱模块
//!
//! 参考图谱的加载、检索与峰匹配。
//!
//! ## 子模块
//! - `record`: MP / ICDD JSON 记录解析
//! - `database`: 并行加载与检索
//! - `matcher`: 贪心峰匹配与评分
//!
//! ## 依赖关系
//! - 被 `pipeline.rs`, `commands/` 使用
//! - 使用 `models/reference.rs`, `models/matching.rs`

pub mod database;
pub mod matcher;
pub mod record;

pub use database::ReferenceDatabase;
pub use matcher::{match_peaks, DEFAULT_TOLERANCE};
