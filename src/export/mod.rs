//! # 导出模块
//!
//! CLI 边界上的文件输出。核心处理流程本身不写文件。
//!
//! ## 子模块
//! - `data`: CSV / XY / JSON
//! - `plot`: PNG / SVG 图表
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/` 数据模型

pub mod data;
pub mod plot;

pub use data::{peaks_to_csv, spectrum_to_csv, spectrum_to_xy, to_json};
pub use plot::{plot_analysis, PlotOptions};
