//! # 谱处理模块
//!
//! 背景扣除、Kα2 剥离与寻峰。所有函数均为纯函数：输入谱不被修改，
//! 结果以新数组返回。
//!
//! ## 子模块
//! - `background`: 背景估计（5 种方法）
//! - `kalpha`: Rachinger Kα2 剥离
//! - `peaks`: 寻峰（4 种方法）与被过滤峰诊断
//! - `savgol`: Savitzky–Golay 平滑
//! - `morphology`: 灰度形态学与高斯滤波
//! - `numerics`: 多项式拟合与插值
//!
//! ## 依赖关系
//! - 被 `pipeline.rs` 使用
//! - 使用 `models/`

pub mod background;
pub mod kalpha;
pub mod morphology;
pub mod numerics;
pub mod peaks;
pub mod savgol;

pub use background::BackgroundMethod;
pub use kalpha::KalphaMethod;
pub use peaks::PeakMethod;
