//! # 衍射峰数据模型
//!
//! 寻峰结果。`index` 指向产生该峰的谱中的位置，因此峰列表只对
//! 生成它的那条谱有意义。
//!
//! ## 依赖关系
//! - 由 `processing/peaks.rs` 创建
//! - 被 `reference/matcher.rs`, `pipeline.rs` 使用

use serde::{Deserialize, Serialize};

/// 检测到的衍射峰
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPeak {
    /// 衍射角 2θ（度）
    pub two_theta: f64,
    /// 峰高（原始强度单位）
    pub intensity: f64,
    /// 在源谱中的下标
    pub index: usize,
    /// 半突出度处的宽度（数据点数）
    pub width_points: Option<f64>,
    /// 突出度
    pub prominence: Option<f64>,
    /// 半高宽（度）
    pub fwhm_degrees: Option<f64>,
}

impl DetectedPeak {
    /// 仅含位置信息的峰（阈值法/导数法）
    pub fn bare(two_theta: f64, intensity: f64, index: usize) -> Self {
        Self {
            two_theta,
            intensity,
            index,
            width_points: None,
            prominence: None,
            fwhm_degrees: None,
        }
    }
}

impl std::fmt::Display for DetectedPeak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Peak(2θ={:.2}°, I={:.1})", self.two_theta, self.intensity)
    }
}
