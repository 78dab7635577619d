//! # 峰匹配
//!
//! 按检测峰的输入顺序贪心匹配：每个检测峰取容差内最近、且尚未被占用的
//! 参考峰。先到者优先，结果依赖输入顺序，但对同一输入完全确定。
//!
//! 评分 = 匹配上的参考峰数 / 参考峰总数 × 100；参考图谱无峰时为 0。
//!
//! ## 依赖关系
//! - 被 `pipeline.rs`, `commands/` 使用
//! - 产出 `models/matching.rs` 中的 `MatchResult`

use crate::error::{Result, XrdError};
use crate::models::{DetectedPeak, MatchResult, PeakMatch, ReferencePattern, ReferencePeakRef};

/// 默认匹配容差（度）
pub const DEFAULT_TOLERANCE: f64 = 0.2;

/// 匹配检测峰与参考图谱
///
/// 距离必须严格小于容差；等距时取下标较小的参考峰。
pub fn match_peaks(
    detected: &[DetectedPeak],
    reference: &ReferencePattern,
    tolerance: f64,
) -> Result<MatchResult> {
    if !(tolerance >= 0.0) {
        return Err(XrdError::config("tolerance", tolerance, ">= 0 degrees"));
    }

    let mut used = vec![false; reference.peaks.len()];
    let mut matched = Vec::new();
    let mut unmatched_detected = Vec::new();

    for peak in detected {
        let mut best: Option<(usize, f64)> = None;
        let mut best_distance = tolerance;

        for (i, ref_peak) in reference.peaks.iter().enumerate() {
            if used[i] {
                continue;
            }
            let distance = (peak.two_theta - ref_peak.two_theta).abs();
            if distance < best_distance {
                best_distance = distance;
                best = Some((i, distance));
            }
        }

        match best {
            Some((i, delta)) => {
                used[i] = true;
                matched.push(PeakMatch {
                    detected: peak.clone(),
                    reference: reference_ref(reference, i),
                    delta,
                });
            }
            None => unmatched_detected.push(peak.clone()),
        }
    }

    let unmatched_reference = used
        .iter()
        .enumerate()
        .filter(|(_, &u)| !u)
        .map(|(i, _)| reference_ref(reference, i))
        .collect();

    let total = reference.peaks.len();
    let score = if total > 0 {
        matched.len() as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    Ok(MatchResult {
        matched,
        unmatched_detected,
        unmatched_reference,
        score,
    })
}

fn reference_ref(reference: &ReferencePattern, index: usize) -> ReferencePeakRef {
    let peak = &reference.peaks[index];
    ReferencePeakRef {
        index,
        two_theta: peak.two_theta,
        intensity: peak.intensity,
    }
}
