//! # 峰匹配结果模型
//!
//! ## 依赖关系
//! - 由 `reference/matcher.rs` 创建
//! - 被 `pipeline.rs`, `commands/` 使用

use super::peak::DetectedPeak;
use serde::{Deserialize, Serialize};

/// 参考峰的位置快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePeakRef {
    /// 在参考图谱峰列表中的下标
    pub index: usize,
    pub two_theta: f64,
    pub intensity: f64,
}

/// 一对匹配上的峰
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakMatch {
    pub detected: DetectedPeak,
    pub reference: ReferencePeakRef,
    /// |Δ2θ|（度）
    pub delta: f64,
}

/// 匹配结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: Vec<PeakMatch>,
    pub unmatched_detected: Vec<DetectedPeak>,
    /// 按参考峰下标升序
    pub unmatched_reference: Vec<ReferencePeakRef>,
    /// 匹配上的参考峰占比 (0-100)
    pub score: f64,
}

impl MatchResult {
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }
}
