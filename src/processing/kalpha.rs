//! # Kα2 剥离
//!
//! Rachinger 校正：将谱按 Kα1→Kα2 的角度偏移平移并按强度比缩放，
//! 作为 Kα2 分量估计，从原谱中扣除。
//!
//! ## 公式
//! Δ(2θ) = 2·atan(tan θ · (λ₂/λ₁ − 1))
//!
//! Kα2(2θ) = I(2θ − Δ) · R，Kα1 = max(I − Kα2, 0)
//!
//! ## 依赖关系
//! - 被 `pipeline.rs` 调用
//! - 使用 `processing/numerics.rs` 的线性插值

use super::numerics::LinearInterpolator;
use crate::error::{Result, XrdError};
use crate::models::Spectrum;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 默认 λ(Kα2)/λ(Kα1)
pub const DEFAULT_WAVELENGTH_RATIO: f64 = 1.0025;

/// 已知特征波长 (Å) 对应的波长比
const KNOWN_RATIOS: [(f64, f64); 5] = [
    (1.54184, 1.0025), // Cu Kα
    (1.54056, 1.0025), // Cu Kα1
    (1.54439, 1.0025), // Cu Kα2
    (1.79026, 1.0023), // Co Kα
    (0.70932, 1.0018), // Mo Kα
];

/// Rachinger 参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RachingerParams {
    /// λ(Kα2)/λ(Kα1)；None 时按谱的波长查表，无波长则取 1.0025
    pub wavelength_ratio: Option<f64>,
    /// I(Kα2)/I(Kα1)
    pub intensity_ratio: f64,
    /// 迭代次数（仅迭代变体使用）
    pub iterations: usize,
}

impl Default for RachingerParams {
    fn default() -> Self {
        Self {
            wavelength_ratio: None,
            intensity_ratio: 0.5,
            iterations: 3,
        }
    }
}

/// Kα 剥离方法
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KalphaMethod {
    Rachinger(RachingerParams),
    IterativeRachinger(RachingerParams),
}

impl Default for KalphaMethod {
    fn default() -> Self {
        KalphaMethod::Rachinger(RachingerParams::default())
    }
}

impl KalphaMethod {
    pub const NAMES: [&'static str; 2] = ["rachinger", "iterative_rachinger"];

    pub fn name(&self) -> &'static str {
        match self {
            KalphaMethod::Rachinger(_) => "rachinger",
            KalphaMethod::IterativeRachinger(_) => "iterative_rachinger",
        }
    }

    pub fn params(&self) -> &RachingerParams {
        match self {
            KalphaMethod::Rachinger(p) | KalphaMethod::IterativeRachinger(p) => p,
        }
    }

    pub fn params_mut(&mut self) -> &mut RachingerParams {
        match self {
            KalphaMethod::Rachinger(p) | KalphaMethod::IterativeRachinger(p) => p,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let p = self.params();
        if let Some(ratio) = p.wavelength_ratio {
            if !(ratio > 0.0) {
                return Err(XrdError::config("wavelength_ratio", ratio, "> 0"));
            }
        }
        if !(p.intensity_ratio >= 0.0) {
            return Err(XrdError::config("intensity_ratio", p.intensity_ratio, ">= 0"));
        }
        Ok(())
    }
}

impl FromStr for KalphaMethod {
    type Err = XrdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rachinger" => Ok(KalphaMethod::Rachinger(Default::default())),
            "iterative_rachinger" => Ok(KalphaMethod::IterativeRachinger(Default::default())),
            _ => Err(XrdError::unknown_method("K-alpha stripping", s, &Self::NAMES)),
        }
    }
}

impl std::fmt::Display for KalphaMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Kα 剥离结果
#[derive(Debug, Clone, PartialEq)]
pub struct KalphaResult {
    pub kalpha1: Vec<f64>,
    pub kalpha2: Vec<f64>,
    /// 实际使用的波长比
    pub wavelength_ratio: f64,
}

/// 按波长查最接近的已知波长比
pub fn ratio_for_wavelength(wavelength: f64) -> f64 {
    KNOWN_RATIOS
        .iter()
        .min_by(|a, b| (a.0 - wavelength).abs().total_cmp(&(b.0 - wavelength).abs()))
        .map(|&(_, ratio)| ratio)
        .unwrap_or(DEFAULT_WAVELENGTH_RATIO)
}

/// 剥离 Kα2
///
/// 显式给出的波长比优先；否则有波长时查表，没有则用默认值。
pub fn strip(spectrum: &Spectrum, method: &KalphaMethod) -> Result<KalphaResult> {
    method.validate()?;
    let params = method.params();

    let wavelength_ratio = params
        .wavelength_ratio
        .or_else(|| spectrum.wavelength().map(ratio_for_wavelength))
        .unwrap_or(DEFAULT_WAVELENGTH_RATIO);

    let x = spectrum.two_theta();
    let y = spectrum.intensity();

    let (kalpha1, kalpha2) = match method {
        KalphaMethod::Rachinger(_) => rachinger(x, y, wavelength_ratio, params.intensity_ratio),
        KalphaMethod::IterativeRachinger(_) => {
            iterative_rachinger(x, y, wavelength_ratio, params.intensity_ratio, params.iterations)
        }
    };

    tracing::debug!(method = method.name(), wavelength_ratio, "K-alpha2 stripped");

    Ok(KalphaResult {
        kalpha1,
        kalpha2,
        wavelength_ratio,
    })
}

/// 单次 Rachinger 校正
pub fn rachinger(
    two_theta: &[f64],
    intensity: &[f64],
    wavelength_ratio: f64,
    intensity_ratio: f64,
) -> (Vec<f64>, Vec<f64>) {
    let interp = LinearInterpolator::new(two_theta, intensity, 0.0);

    let kalpha2: Vec<f64> = two_theta
        .iter()
        .map(|&tt| {
            let theta = (tt / 2.0).to_radians();
            let delta = 2.0 * (theta.tan() * (wavelength_ratio - 1.0)).atan().to_degrees();
            interp.eval(tt - delta) * intensity_ratio
        })
        .collect();

    let kalpha1 = intensity
        .iter()
        .zip(&kalpha2)
        .map(|(i, k2)| (i - k2).max(0.0))
        .collect();

    (kalpha1, kalpha2)
}

/// 迭代 Rachinger 校正
///
/// 迭代过程逐轮以 Kα1 估计作为输入，但返回值始终由原始谱重新计算一次。
pub fn iterative_rachinger(
    two_theta: &[f64],
    intensity: &[f64],
    wavelength_ratio: f64,
    intensity_ratio: f64,
    iterations: usize,
) -> (Vec<f64>, Vec<f64>) {
    let mut current = intensity.to_vec();
    for round in 0..iterations {
        let (kalpha1, _) = rachinger(two_theta, &current, wavelength_ratio, intensity_ratio);
        current = kalpha1;
        tracing::trace!(round, "rachinger iteration");
    }

    rachinger(two_theta, intensity, wavelength_ratio, intensity_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn doublet() -> Spectrum {
        let x: Vec<f64> = (0..3000).map(|i| 20.0 + i as f64 * 0.01).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&t| {
                1000.0 * (-((t - 40.0) / 0.05).powi(2)).exp()
                    + 500.0 * (-((t - 40.1) / 0.05).powi(2)).exp()
            })
            .collect();
        Spectrum::new(x, y).unwrap()
    }

    #[test]
    fn test_zero_intensity_ratio_is_identity() {
        let spectrum = doublet();
        for ratio in [1.0, 1.0018, 1.0025, 1.05] {
            for name in KalphaMethod::NAMES {
                let mut method: KalphaMethod = name.parse().unwrap();
                method.params_mut().wavelength_ratio = Some(ratio);
                method.params_mut().intensity_ratio = 0.0;

                let result = strip(&spectrum, &method).unwrap();
                assert_eq!(result.kalpha1, spectrum.intensity());
                assert!(result.kalpha2.iter().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn test_kalpha1_non_negative_and_reduces_shoulder() {
        let spectrum = doublet();
        let result = strip(&spectrum, &KalphaMethod::default()).unwrap();
        assert!(result.kalpha1.iter().all(|&v| v >= 0.0));

        let shoulder = spectrum
            .two_theta()
            .iter()
            .position(|&t| (t - 40.1).abs() < 0.005)
            .unwrap();
        assert!(result.kalpha1[shoulder] < spectrum.intensity()[shoulder]);
    }

    #[test]
    fn test_iterative_returns_recomputation_from_original() {
        let spectrum = doublet();
        let single = strip(&spectrum, &"rachinger".parse().unwrap()).unwrap();
        let iterative = strip(&spectrum, &"iterative_rachinger".parse().unwrap()).unwrap();
        assert_eq!(single, iterative);
    }

    #[test]
    fn test_ratio_lookup_nearest() {
        assert_eq!(ratio_for_wavelength(1.5406), 1.0025);
        assert_eq!(ratio_for_wavelength(1.78), 1.0023);
        assert_eq!(ratio_for_wavelength(0.71073), 1.0018);
        // 表外波长（Cr Kα）同样取最近项，不设距离上限
        assert_eq!(ratio_for_wavelength(2.2910), 1.0023);
    }

    #[test]
    fn test_explicit_ratio_overrides_wavelength_lookup() {
        let spectrum = doublet().with_wavelength(Some(0.70932));
        let auto = strip(&spectrum, &KalphaMethod::default()).unwrap();
        assert_abs_diff_eq!(auto.wavelength_ratio, 1.0018);

        let mut method = KalphaMethod::default();
        method.params_mut().wavelength_ratio = Some(1.0030);
        let explicit = strip(&spectrum, &method).unwrap();
        assert_abs_diff_eq!(explicit.wavelength_ratio, 1.0030);
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let mut method = KalphaMethod::default();
        method.params_mut().intensity_ratio = -0.1;
        assert!(matches!(
            strip(&doublet(), &method),
            Err(XrdError::ConfigValueError { .. })
        ));
    }
}
