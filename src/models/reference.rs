//! # 参考衍射图谱数据模型
//!
//! 一个候选物相的衍射指纹。加载后不再修改。
//!
//! ## 依赖关系
//! - 由 `reference/record.rs` 构建
//! - 被 `reference/database.rs`, `reference/matcher.rs` 使用

use serde::{Deserialize, Serialize};

/// 参考峰
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePeak {
    /// 衍射角 2θ（度）
    pub two_theta: f64,
    /// 相对强度（MP 记录归一化到 0-100）
    pub intensity: f64,
    /// d 间距（Å）
    pub d_spacing: Option<f64>,
    /// Miller 指数（文本形式）
    pub hkl: Option<String>,
}

/// 参考图谱来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceSource {
    /// Materials Project (`pattern` 数组)
    Mp,
    /// ICDD 风格 (`peaks` 对象数组)
    Icdd,
    /// 无法识别的记录（零峰）
    Unknown,
}

impl std::fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceSource::Mp => write!(f, "MP"),
            ReferenceSource::Icdd => write!(f, "ICDD"),
            ReferenceSource::Unknown => write!(f, "unknown"),
        }
    }
}

/// 参考衍射图谱
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePattern {
    pub id: String,
    pub name: String,
    pub source: ReferenceSource,
    /// 波长（Å）
    pub wavelength: Option<f64>,
    pub peaks: Vec<ReferencePeak>,
}

impl ReferencePattern {
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// 以高斯线形合成连续曲线，仅用于叠加显示
    ///
    /// 每个峰贡献 `I · exp(-0.5 ((x - 2θ) / width)²)`。
    pub fn continuous_pattern(
        &self,
        range: (f64, f64),
        num_points: usize,
        peak_width: f64,
    ) -> (Vec<f64>, Vec<f64>) {
        let two_theta = linspace(range.0, range.1, num_points);
        let mut intensity = vec![0.0; two_theta.len()];

        if peak_width > 0.0 {
            for peak in &self.peaks {
                for (x, y) in two_theta.iter().zip(intensity.iter_mut()) {
                    let z = (x - peak.two_theta) / peak_width;
                    *y += peak.intensity * (-0.5 * z * z).exp();
                }
            }
        }

        (two_theta, intensity)
    }
}

/// 等间距采样（含两端点）
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        end
                    } else {
                        start + i as f64 * step
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pattern(peaks: &[(f64, f64)]) -> ReferencePattern {
        ReferencePattern {
            id: "mp-1".to_string(),
            name: "Si".to_string(),
            source: ReferenceSource::Mp,
            wavelength: Some(1.54056),
            peaks: peaks
                .iter()
                .map(|&(two_theta, intensity)| ReferencePeak {
                    two_theta,
                    intensity,
                    d_spacing: None,
                    hkl: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_continuous_pattern_peaks_at_reference_positions() {
        let p = pattern(&[(28.44, 100.0), (47.30, 55.0)]);
        let (x, y) = p.continuous_pattern((20.0, 60.0), 4001, 0.1);
        assert_eq!(x.len(), 4001);

        let at = |angle: f64| {
            let idx = x
                .iter()
                .position(|v| (v - angle).abs() < 0.005)
                .unwrap();
            y[idx]
        };
        assert_abs_diff_eq!(at(28.44), 100.0, epsilon = 0.1);
        assert_abs_diff_eq!(at(47.30), 55.0, epsilon = 0.1);
        assert!(at(38.0) < 1e-6);
    }

    #[test]
    fn test_continuous_pattern_without_peaks_is_flat() {
        let p = pattern(&[]);
        let (_, y) = p.continuous_pattern((10.0, 20.0), 50, 0.1);
        assert!(y.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(5.0, 90.0, 4251);
        assert_eq!(v[0], 5.0);
        assert_eq!(*v.last().unwrap(), 90.0);
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
    }
}
