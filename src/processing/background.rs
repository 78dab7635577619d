//! # 背景扣除
//!
//! 五种背景估计方法，统一返回 `(background, corrected)`，其中
//! `corrected[i] = intensity[i] - background[i]`（允许为负）。
//!
//! ## 方法
//! - `polynomial`: 全谱 d 次多项式最小二乘拟合
//! - `iterative_polynomial`: Sonneveld–Visser 迭代，逐轮剔除残差过大的点（峰）
//! - `rolling_ball`: 灰度开运算 + σ = radius/10 的高斯平滑
//! - `tophat`: 灰度开运算
//! - `snip`: 逐轮缩小窗口的最小值削峰
//!
//! ## 依赖关系
//! - 被 `pipeline.rs` 调用
//! - 使用 `processing/numerics.rs`, `processing/morphology.rs`

use super::morphology::{gaussian_filter1d, grey_opening};
use super::numerics::polyfit;
use crate::error::{Result, XrdError};
use crate::models::{max_value, Spectrum};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 多项式背景参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolynomialParams {
    pub degree: usize,
}

impl Default for PolynomialParams {
    fn default() -> Self {
        Self { degree: 6 }
    }
}

/// 迭代多项式背景参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterativePolynomialParams {
    pub degree: usize,
    pub iterations: usize,
    /// 剔除阈值（最大强度的分数）
    pub threshold: f64,
}

impl Default for IterativePolynomialParams {
    fn default() -> Self {
        Self {
            degree: 6,
            iterations: 10,
            threshold: 0.1,
        }
    }
}

/// 形态学方法参数（滚球半径 / 结构元宽度，单位: 数据点）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MorphologyParams {
    /// None 时取 max(50, 点数的 5%)
    pub size: Option<usize>,
}

impl MorphologyParams {
    /// 实际使用的宽度
    pub fn resolve(&self, n_points: usize) -> usize {
        self.size
            .unwrap_or_else(|| 50.max((n_points as f64 * 0.05) as usize))
    }
}

/// SNIP 参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnipParams {
    pub iterations: usize,
    /// 每轮窗口缩放因子
    pub reduction_factor: f64,
}

impl Default for SnipParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            reduction_factor: 0.5,
        }
    }
}

/// 背景估计方法
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundMethod {
    Polynomial(PolynomialParams),
    IterativePolynomial(IterativePolynomialParams),
    RollingBall(MorphologyParams),
    #[serde(rename = "tophat")]
    TopHat(MorphologyParams),
    Snip(SnipParams),
}

impl Default for BackgroundMethod {
    fn default() -> Self {
        BackgroundMethod::IterativePolynomial(IterativePolynomialParams::default())
    }
}

impl BackgroundMethod {
    pub const NAMES: [&'static str; 5] = [
        "polynomial",
        "iterative_polynomial",
        "rolling_ball",
        "tophat",
        "snip",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BackgroundMethod::Polynomial(_) => "polynomial",
            BackgroundMethod::IterativePolynomial(_) => "iterative_polynomial",
            BackgroundMethod::RollingBall(_) => "rolling_ball",
            BackgroundMethod::TopHat(_) => "tophat",
            BackgroundMethod::Snip(_) => "snip",
        }
    }

    /// 检查参数范围
    pub fn validate(&self) -> Result<()> {
        match self {
            BackgroundMethod::Polynomial(_) => Ok(()),
            BackgroundMethod::IterativePolynomial(p) => {
                if p.iterations == 0 {
                    return Err(XrdError::config("iterations", p.iterations, ">= 1"));
                }
                if !(p.threshold > 0.0) {
                    return Err(XrdError::config("threshold", p.threshold, "> 0"));
                }
                Ok(())
            }
            BackgroundMethod::RollingBall(p) | BackgroundMethod::TopHat(p) => match p.size {
                Some(0) => Err(XrdError::config("size", 0, ">= 1")),
                _ => Ok(()),
            },
            BackgroundMethod::Snip(p) => {
                if !(p.reduction_factor > 0.0 && p.reduction_factor < 1.0) {
                    return Err(XrdError::config(
                        "reduction_factor",
                        p.reduction_factor,
                        "in (0, 1)",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl FromStr for BackgroundMethod {
    type Err = XrdError;

    /// 按名称构造，参数取默认值
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "polynomial" => Ok(BackgroundMethod::Polynomial(Default::default())),
            "iterative_polynomial" => Ok(BackgroundMethod::IterativePolynomial(Default::default())),
            "rolling_ball" => Ok(BackgroundMethod::RollingBall(Default::default())),
            "tophat" => Ok(BackgroundMethod::TopHat(Default::default())),
            "snip" => Ok(BackgroundMethod::Snip(Default::default())),
            _ => Err(XrdError::unknown_method("background", s, &Self::NAMES)),
        }
    }
}

impl std::fmt::Display for BackgroundMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 背景估计结果
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundResult {
    pub background: Vec<f64>,
    pub corrected: Vec<f64>,
}

impl BackgroundResult {
    fn from_background(intensity: &[f64], background: Vec<f64>) -> Self {
        let corrected = intensity
            .iter()
            .zip(&background)
            .map(|(i, b)| i - b)
            .collect();
        Self {
            background,
            corrected,
        }
    }
}

/// 估计背景
pub fn estimate(spectrum: &Spectrum, method: &BackgroundMethod) -> Result<BackgroundResult> {
    method.validate()?;

    let x = spectrum.two_theta();
    let y = spectrum.intensity();

    let background = match method {
        BackgroundMethod::Polynomial(p) => polynomial(x, y, p.degree),
        BackgroundMethod::IterativePolynomial(p) => iterative_polynomial(x, y, p),
        BackgroundMethod::RollingBall(p) => rolling_ball(y, p.resolve(y.len())),
        BackgroundMethod::TopHat(p) => grey_opening(y, p.resolve(y.len())),
        BackgroundMethod::Snip(p) => snip(y, p),
    };

    tracing::debug!(method = method.name(), points = y.len(), "background estimated");

    Ok(BackgroundResult::from_background(y, background))
}

fn polynomial(x: &[f64], y: &[f64], degree: usize) -> Vec<f64> {
    polyfit(x, y, degree).eval_all(x)
}

fn iterative_polynomial(x: &[f64], y: &[f64], params: &IterativePolynomialParams) -> Vec<f64> {
    let cutoff = params.threshold * max_value(y);
    let mut mask = vec![true; y.len()];
    let mut background = vec![0.0; y.len()];

    for round in 0..params.iterations {
        let (xs, ys): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y)
            .zip(&mask)
            .filter(|(_, &keep)| keep)
            .map(|((&a, &b), _)| (a, b))
            .unzip();

        background = polyfit(&xs, &ys, params.degree).eval_all(x);

        if round + 1 < params.iterations {
            let next: Vec<bool> = y
                .iter()
                .zip(&background)
                .map(|(i, b)| i - b < cutoff)
                .collect();

            // 剩余点数不足以拟合时保留上一轮的掩码
            let kept = next.iter().filter(|&&k| k).count();
            if kept > params.degree {
                mask = next;
            } else {
                tracing::debug!(round, kept, "mask too sparse, keeping previous mask");
            }
        }
    }

    background
}

fn rolling_ball(y: &[f64], radius: usize) -> Vec<f64> {
    let opened = grey_opening(y, radius);
    gaussian_filter1d(&opened, radius as f64 / 10.0)
}

/// SNIP 削峰
///
/// 每轮以累积背景（而非原始强度）为输入，自左向右原地更新:
/// `acc[j] = min(acc[j - h ..= j + h])`，其中左侧已是本轮更新后的值。
/// 因左侧已更新值单调不增，窗口最小值等价于一个向右推进的前缀最小值。
fn snip(y: &[f64], params: &SnipParams) -> Vec<f64> {
    let n = y.len();

    (0..params.iterations)
        .map(|round| ((n as f64 * params.reduction_factor.powi(round as i32)) as usize).max(1))
        .take_while(|&window| window >= 3)
        .fold(y.to_vec(), |mut acc, window| {
            let half = window / 2;
            let mut running = f64::INFINITY;
            let mut reach = 0;
            for j in 0..n {
                let end = (j + half + 1).min(n);
                while reach < end {
                    running = running.min(acc[reach]);
                    reach += 1;
                }
                acc[j] = acc[j].min(running);
            }
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic() -> Spectrum {
        let x: Vec<f64> = (0..1500).map(|i| 10.0 + i as f64 * 0.04).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&t| {
                let baseline = 200.0 - 1.5 * t + 0.01 * t * t;
                let peak = |c: f64, a: f64| a * (-((t - c) / 0.15).powi(2)).exp();
                baseline + peak(28.4, 800.0) + peak(47.3, 500.0) + peak(56.1, 300.0)
            })
            .collect();
        Spectrum::new(x, y).unwrap()
    }

    fn all_methods() -> Vec<BackgroundMethod> {
        BackgroundMethod::NAMES
            .iter()
            .map(|n| n.parse().unwrap())
            .collect()
    }

    /// 逐点原地更新的直接实现
    fn snip_naive(y: &[f64], params: &SnipParams) -> Vec<f64> {
        let n = y.len();
        let mut bg = y.to_vec();
        for round in 0..params.iterations {
            let window =
                ((n as f64 * params.reduction_factor.powi(round as i32)) as usize).max(1);
            if window < 3 {
                break;
            }
            for j in 0..n {
                let start = j.saturating_sub(window / 2);
                let end = (j + window / 2 + 1).min(n);
                let m = bg[start..end].iter().copied().fold(f64::INFINITY, f64::min);
                bg[j] = bg[j].min(m);
            }
        }
        bg
    }

    #[test]
    fn test_corrected_is_exact_difference_for_all_methods() {
        let spectrum = synthetic();
        for method in all_methods() {
            let result = estimate(&spectrum, &method).unwrap();
            assert_eq!(result.background.len(), spectrum.len());
            for ((i, b), c) in spectrum
                .intensity()
                .iter()
                .zip(&result.background)
                .zip(&result.corrected)
            {
                assert_eq!(*c, i - b, "method {}", method);
            }
        }
    }

    #[test]
    fn test_iterative_with_one_round_equals_polynomial() {
        let spectrum = synthetic();
        let plain = estimate(
            &spectrum,
            &BackgroundMethod::Polynomial(PolynomialParams { degree: 4 }),
        )
        .unwrap();
        let iterative = estimate(
            &spectrum,
            &BackgroundMethod::IterativePolynomial(IterativePolynomialParams {
                degree: 4,
                iterations: 1,
                threshold: 0.1,
            }),
        )
        .unwrap();
        assert_eq!(plain, iterative);
    }

    #[test]
    fn test_iterative_excludes_peaks() {
        let spectrum = synthetic();
        let plain = estimate(&spectrum, &"polynomial".parse().unwrap()).unwrap();
        let iterative = estimate(&spectrum, &BackgroundMethod::default()).unwrap();
        let peak_index = spectrum
            .two_theta()
            .iter()
            .position(|&t| (t - 28.4).abs() < 0.02)
            .unwrap();
        // 剔除峰后背景不应被峰抬高
        assert!(iterative.background[peak_index] < plain.background[peak_index]);
        assert!(iterative.corrected[peak_index] > 700.0);
    }

    #[test]
    fn test_snip_matches_naive_clipping() {
        let spectrum = synthetic();
        for params in [
            SnipParams::default(),
            SnipParams {
                iterations: 3,
                reduction_factor: 0.5,
            },
            SnipParams {
                iterations: 20,
                reduction_factor: 0.8,
            },
        ] {
            let fast = snip(spectrum.intensity(), &params);
            let naive = snip_naive(spectrum.intensity(), &params);
            assert_eq!(fast, naive);
        }
    }

    #[test]
    fn test_snip_tightens_monotonically_across_rounds() {
        let spectrum = synthetic();
        let mut previous = spectrum.intensity().to_vec();
        for rounds in 1..8 {
            let current = snip(
                spectrum.intensity(),
                &SnipParams {
                    iterations: rounds,
                    reduction_factor: 0.5,
                },
            );
            for (c, p) in current.iter().zip(&previous) {
                assert!(c <= p);
            }
            previous = current;
        }
    }

    #[test]
    fn test_snip_stops_when_window_below_three() {
        let y = vec![5.0, 1.0, 5.0, 5.0];
        // n=4: 第一轮窗口 4，第二轮 2 (< 3) 即停止
        let bg = snip(&y, &SnipParams::default());
        assert_eq!(bg, snip(&y, &SnipParams { iterations: 1, reduction_factor: 0.5 }));
    }

    #[test]
    fn test_morphology_background_below_signal() {
        let spectrum = synthetic();
        let result = estimate(&spectrum, &"tophat".parse().unwrap()).unwrap();
        assert!(result.corrected.iter().all(|&c| c >= 0.0));
        assert_eq!(MorphologyParams::default().resolve(1500), 75);
        assert_eq!(MorphologyParams::default().resolve(400), 50);
    }

    #[test]
    fn test_unknown_method_and_bad_params() {
        let err = "spline".parse::<BackgroundMethod>().unwrap_err();
        match err {
            XrdError::UnknownMethod { valid, .. } => assert_eq!(valid.len(), 5),
            other => panic!("unexpected error: {other}"),
        }

        let bad = BackgroundMethod::Snip(SnipParams {
            iterations: 10,
            reduction_factor: 1.5,
        });
        assert!(matches!(
            estimate(&synthetic(), &bad),
            Err(XrdError::ConfigValueError { .. })
        ));
    }
}
