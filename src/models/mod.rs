//! # 数据模型模块
//!
//! 定义扫描谱、检测峰与参考图谱的统一数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `processing/`, `reference/` 和 `commands/` 使用
//! - 子模块: spectrum, peak, reference, matching

pub mod matching;
pub mod peak;
pub mod reference;
pub mod spectrum;

pub use matching::{MatchResult, PeakMatch, ReferencePeakRef};
pub use peak::DetectedPeak;
pub use reference::{linspace, ReferencePattern, ReferencePeak, ReferenceSource};
pub use spectrum::{max_value, Spectrum};
