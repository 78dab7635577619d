//! # 寻峰
//!
//! 四种寻峰方法：
//! - `prominence`: 局部极大值 + 高度/间距/突出度/宽度过滤（主方法）
//! - `threshold`: 强度阈值 + ±min_distance 内严格极大
//! - `derivative`: 一阶差分由正变负的过零点
//! - `savgol`: Savitzky–Golay 平滑后走 prominence 方法
//!
//! 另提供"被过滤峰"诊断：去掉突出度下限重新寻峰，找出突出度仍达到
//! 阈值 30% 的落选候选，用于判断是否漏检。
//!
//! ## 过滤顺序 (prominence)
//! 高度 → 间距（高峰优先）→ 突出度 → 宽度
//!
//! ## 依赖关系
//! - 被 `pipeline.rs` 调用
//! - 使用 `processing/savgol.rs`, `models/peak.rs`

use super::savgol::savgol_filter;
use crate::error::{Result, XrdError};
use crate::models::{max_value, DetectedPeak, Spectrum};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// 诊断中保留的落选峰：突出度 ≥ 阈值 × 该比例
const FILTERED_PROMINENCE_FRACTION: f64 = 0.3;

/// 阈值法 / 导数法参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParams {
    /// 强度阈值；None 时取最大强度的 10%
    pub threshold: Option<f64>,
    /// 峰间最小间隔（数据点）
    pub min_distance: usize,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            threshold: None,
            min_distance: 5,
        }
    }
}

/// 突出度法参数
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProminenceParams {
    /// 最小突出度；None 时取最大强度的 5%
    pub prominence: Option<f64>,
    /// 最小峰高
    pub height: Option<f64>,
    /// 峰间最小间隔（数据点）；None 时取 round(0.1° / 步长)
    pub distance: Option<usize>,
    /// 最小宽度（数据点，半突出度处）
    pub width: Option<f64>,
}

/// Savitzky–Golay 寻峰参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavgolParams {
    pub window_length: usize,
    pub polyorder: usize,
    pub prominence: Option<f64>,
    pub distance: Option<usize>,
}

impl Default for SavgolParams {
    fn default() -> Self {
        Self {
            window_length: 11,
            polyorder: 3,
            prominence: None,
            distance: None,
        }
    }
}

/// 寻峰方法
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeakMethod {
    Prominence(ProminenceParams),
    Threshold(ThresholdParams),
    Derivative(ThresholdParams),
    Savgol(SavgolParams),
}

impl Default for PeakMethod {
    fn default() -> Self {
        PeakMethod::Prominence(ProminenceParams::default())
    }
}

impl PeakMethod {
    pub const NAMES: [&'static str; 4] = ["prominence", "threshold", "derivative", "savgol"];

    pub fn name(&self) -> &'static str {
        match self {
            PeakMethod::Prominence(_) => "prominence",
            PeakMethod::Threshold(_) => "threshold",
            PeakMethod::Derivative(_) => "derivative",
            PeakMethod::Savgol(_) => "savgol",
        }
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = |name: &str, value: Option<f64>| match value {
            Some(v) if !(v >= 0.0) => Err(XrdError::config(name, v, ">= 0")),
            _ => Ok(()),
        };
        let positive_distance = |value: Option<usize>| match value {
            Some(0) => Err(XrdError::config("distance", 0, ">= 1")),
            _ => Ok(()),
        };

        match self {
            PeakMethod::Prominence(p) => {
                non_negative("prominence", p.prominence)?;
                non_negative("height", p.height)?;
                non_negative("width", p.width)?;
                positive_distance(p.distance)
            }
            PeakMethod::Threshold(p) | PeakMethod::Derivative(p) => {
                if p.min_distance == 0 {
                    return Err(XrdError::config("min_distance", 0, ">= 1"));
                }
                Ok(())
            }
            PeakMethod::Savgol(p) => {
                non_negative("prominence", p.prominence)?;
                positive_distance(p.distance)?;
                if p.window_length == 0 {
                    return Err(XrdError::config("window_length", 0, ">= 1"));
                }
                Ok(())
            }
        }
    }
}

impl FromStr for PeakMethod {
    type Err = XrdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "prominence" => Ok(PeakMethod::Prominence(Default::default())),
            "threshold" => Ok(PeakMethod::Threshold(Default::default())),
            "derivative" => Ok(PeakMethod::Derivative(Default::default())),
            "savgol" => Ok(PeakMethod::Savgol(Default::default())),
            _ => Err(XrdError::unknown_method("peak detection", s, &Self::NAMES)),
        }
    }
}

impl std::fmt::Display for PeakMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 寻峰
pub fn detect(spectrum: &Spectrum, method: &PeakMethod) -> Result<Vec<DetectedPeak>> {
    method.validate()?;

    let x = spectrum.two_theta();
    let y = spectrum.intensity();

    let peaks = match method {
        PeakMethod::Prominence(p) => {
            let settings = ProminenceSettings::resolve(spectrum, y, p.prominence, p.distance);
            prominence_peaks(x, y, Some(settings.prominence), p.height, settings.distance, p.width)
        }
        PeakMethod::Threshold(p) => threshold_peaks(x, y, p),
        PeakMethod::Derivative(p) => derivative_peaks(x, y, p),
        PeakMethod::Savgol(p) => {
            let smoothed = savgol_filter(y, p.window_length, p.polyorder);
            let settings = ProminenceSettings::resolve(spectrum, &smoothed, p.prominence, p.distance);
            prominence_peaks(x, &smoothed, Some(settings.prominence), None, settings.distance, None)
        }
    };

    tracing::debug!(method = method.name(), count = peaks.len(), "peaks detected");
    Ok(peaks)
}

/// 被过滤峰诊断
///
/// 在寻峰所用的同一强度序列上去掉突出度下限（保留间距约束）重新寻峰，
/// 排除已接受的峰，返回突出度 ≥ 30% 阈值的候选。阈值为突出度方法的
/// 最小突出度，或阈值法/导数法的强度阈值。
pub fn filtered_peaks(
    spectrum: &Spectrum,
    method: &PeakMethod,
    accepted: &[DetectedPeak],
) -> Result<Vec<DetectedPeak>> {
    method.validate()?;

    let x = spectrum.two_theta();
    let y = spectrum.intensity();

    let (values, settings) = match method {
        PeakMethod::Prominence(p) => (
            y.to_vec(),
            ProminenceSettings::resolve(spectrum, y, p.prominence, p.distance),
        ),
        PeakMethod::Savgol(p) => {
            let smoothed = savgol_filter(y, p.window_length, p.polyorder);
            let settings = ProminenceSettings::resolve(spectrum, &smoothed, p.prominence, p.distance);
            (smoothed, settings)
        }
        PeakMethod::Threshold(p) | PeakMethod::Derivative(p) => {
            let mut settings = ProminenceSettings::resolve(spectrum, y, None, None);
            settings.prominence = p.threshold.unwrap_or(max_value(y) * 0.1);
            (y.to_vec(), settings)
        }
    };

    let accepted: HashSet<usize> = accepted.iter().map(|p| p.index).collect();
    let floor = settings.prominence * FILTERED_PROMINENCE_FRACTION;

    Ok(prominence_peaks(x, &values, None, None, settings.distance, None)
        .into_iter()
        .filter(|p| !accepted.contains(&p.index))
        .filter(|p| p.prominence.unwrap_or(0.0) >= floor)
        .collect())
}

/// 解析后的突出度与间距
#[derive(Debug, Clone, Copy)]
struct ProminenceSettings {
    prominence: f64,
    distance: usize,
}

impl ProminenceSettings {
    fn resolve(
        spectrum: &Spectrum,
        values: &[f64],
        prominence: Option<f64>,
        distance: Option<usize>,
    ) -> Self {
        Self {
            prominence: prominence.unwrap_or(max_value(values) * 0.05),
            distance: distance.unwrap_or_else(|| default_distance(spectrum)),
        }
    }
}

/// 约 0.1° 对应的点数
pub fn default_distance(spectrum: &Spectrum) -> usize {
    match spectrum.angular_step().map(f64::abs) {
        Some(step) if step > 0.0 => ((0.1 / step).round() as usize).max(1),
        Some(_) => 1,
        None => 5,
    }
}

// ─────────────────────────────────────────────────────────────
// 突出度法
// ─────────────────────────────────────────────────────────────

fn prominence_peaks(
    x: &[f64],
    y: &[f64],
    min_prominence: Option<f64>,
    min_height: Option<f64>,
    distance: usize,
    min_width: Option<f64>,
) -> Vec<DetectedPeak> {
    let mut candidates = local_maxima(y);

    if let Some(h) = min_height {
        candidates.retain(|&i| y[i] >= h);
    }

    let candidates = select_by_distance(&candidates, y, distance);

    candidates
        .into_iter()
        .filter_map(|index| {
            let (prominence, left_base, right_base) = peak_prominence(y, index);
            if min_prominence.is_some_and(|p| prominence < p) {
                return None;
            }

            let width = peak_width(y, index, prominence, left_base, right_base);
            if min_width.is_some_and(|w| width < w) {
                return None;
            }

            Some(DetectedPeak {
                two_theta: x[index],
                intensity: y[index],
                index,
                width_points: Some(width),
                prominence: Some(prominence),
                fwhm_degrees: fwhm_degrees(x, y, index),
            })
        })
        .collect()
}

/// 局部极大值（含平台，取平台中点）
fn local_maxima(y: &[f64]) -> Vec<usize> {
    let n = y.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let last = n - 1;
    let mut i = 1;
    while i < last {
        if y[i - 1] < y[i] {
            let mut ahead = i + 1;
            while ahead < last && y[ahead] == y[i] {
                ahead += 1;
            }
            if y[ahead] < y[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// 按间距筛选：高峰优先，等高时下标小者优先
fn select_by_distance(peaks: &[usize], y: &[f64], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| y[peaks[b]].total_cmp(&y[peaks[a]]));

    let mut keep = vec![true; peaks.len()];
    for j in order {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in (j + 1)..peaks.len() {
            if peaks[k] - peaks[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }

    peaks
        .iter()
        .zip(&keep)
        .filter(|(_, &k)| k)
        .map(|(&p, _)| p)
        .collect()
}

/// 突出度及左右基点
///
/// 向两侧搜索直到遇到严格更高的点或边界，两侧最低点中较高者为参考。
fn peak_prominence(y: &[f64], peak: usize) -> (f64, usize, usize) {
    let height = y[peak];

    let mut left_min = height;
    let mut left_base = peak;
    let mut i = peak as isize;
    while i >= 0 && y[i as usize] <= height {
        if y[i as usize] < left_min {
            left_min = y[i as usize];
            left_base = i as usize;
        }
        i -= 1;
    }

    let mut right_min = height;
    let mut right_base = peak;
    let mut i = peak;
    while i < y.len() && y[i] <= height {
        if y[i] < right_min {
            right_min = y[i];
            right_base = i;
        }
        i += 1;
    }

    (height - left_min.max(right_min), left_base, right_base)
}

/// 半突出度处的宽度（数据点，线性插值）
fn peak_width(y: &[f64], peak: usize, prominence: f64, left_base: usize, right_base: usize) -> f64 {
    let level = y[peak] - prominence * 0.5;

    let mut i = peak;
    while left_base < i && level < y[i] {
        i -= 1;
    }
    let mut left = i as f64;
    if y[i] < level {
        left += (level - y[i]) / (y[i + 1] - y[i]);
    }

    let mut i = peak;
    while i < right_base && level < y[i] {
        i += 1;
    }
    let mut right = i as f64;
    if y[i] < level {
        right -= (level - y[i]) / (y[i - 1] - y[i]);
    }

    right - left
}

/// 峰高一半处的全宽（度）
///
/// 两侧各找第一个不高于半高的点，与其内侧相邻点线性插值；
/// 到达边界仍未穿越时取边界点角度。
pub fn fwhm_degrees(x: &[f64], y: &[f64], peak: usize) -> Option<f64> {
    let height = y[peak];
    if height <= 0.0 {
        return None;
    }
    let half = height / 2.0;

    let left = match (0..peak).rev().find(|&i| y[i] <= half) {
        Some(i) => crossing(x, y, i, i + 1, half),
        None => x[0],
    };
    let right = match ((peak + 1)..y.len()).find(|&i| y[i] <= half) {
        Some(i) => crossing(x, y, i, i - 1, half),
        None => x[x.len() - 1],
    };

    let fwhm = right - left;
    (fwhm > 0.0).then_some(fwhm)
}

/// 在 outer（≤ level）与 inner（> level）之间插值 level 对应的角度
fn crossing(x: &[f64], y: &[f64], outer: usize, inner: usize, level: f64) -> f64 {
    let dy = y[inner] - y[outer];
    if dy == 0.0 {
        return x[outer];
    }
    x[outer] + (level - y[outer]) * (x[inner] - x[outer]) / dy
}

// ─────────────────────────────────────────────────────────────
// 阈值法与导数法
// ─────────────────────────────────────────────────────────────

fn threshold_peaks(x: &[f64], y: &[f64], params: &ThresholdParams) -> Vec<DetectedPeak> {
    let n = y.len();
    let md = params.min_distance;
    let threshold = params.threshold.unwrap_or(max_value(y) * 0.1);

    if n <= 2 * md {
        return Vec::new();
    }

    (md..n - md)
        .filter(|&i| y[i] > threshold)
        .filter(|&i| ((i - md)..=(i + md)).all(|j| j == i || y[j] < y[i]))
        .map(|i| DetectedPeak::bare(x[i], y[i], i))
        .collect()
}

fn derivative_peaks(x: &[f64], y: &[f64], params: &ThresholdParams) -> Vec<DetectedPeak> {
    let threshold = params.threshold.unwrap_or(max_value(y) * 0.1);
    let dy: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();

    let mut peaks: Vec<DetectedPeak> = Vec::new();
    for i in 1..dy.len() {
        if dy[i - 1] > 0.0 && dy[i] < 0.0 && y[i] > threshold {
            let far_enough = peaks
                .last()
                .map_or(true, |last| i - last.index >= params.min_distance);
            if far_enough {
                peaks.push(DetectedPeak::bare(x[i], y[i], i));
            }
        }
    }
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// 高斯峰：中心 center，半高宽 fwhm
    fn gaussian(x: f64, center: f64, fwhm: f64, amplitude: f64) -> f64 {
        let sigma = fwhm / (2.0 * (2.0 * 2f64.ln()).sqrt());
        amplitude * (-0.5 * ((x - center) / sigma).powi(2)).exp()
    }

    fn single_gaussian() -> Spectrum {
        let x: Vec<f64> = (0..2001).map(|i| 20.0 + i as f64 * 0.01).collect();
        let y: Vec<f64> = x.iter().map(|&t| gaussian(t, 30.0, 0.5, 1000.0)).collect();
        Spectrum::new(x, y).unwrap()
    }

    fn three_peaks() -> Spectrum {
        let x: Vec<f64> = (0..3000).map(|i| 10.0 + i as f64 * 0.02).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&t| {
                10.0 + gaussian(t, 25.0, 0.3, 1000.0)
                    + gaussian(t, 40.0, 0.3, 400.0)
                    + gaussian(t, 55.0, 0.3, 30.0)
            })
            .collect();
        Spectrum::new(x, y).unwrap()
    }

    #[test]
    fn test_single_gaussian_prominence_defaults() {
        let spectrum = single_gaussian();
        let peaks = detect(&spectrum, &PeakMethod::default()).unwrap();
        assert_eq!(peaks.len(), 1);

        let peak = &peaks[0];
        assert!((peak.two_theta - 30.0).abs() <= 0.01);
        let fwhm = peak.fwhm_degrees.unwrap();
        assert!((fwhm - 0.5).abs() / 0.5 < 0.05, "fwhm = {fwhm}");
        assert_abs_diff_eq!(peak.prominence.unwrap(), 1000.0, epsilon = 1e-6);
        // 半突出度宽度与 FWHM 一致 (0.5° / 0.01°)
        assert_abs_diff_eq!(peak.width_points.unwrap(), 50.0, epsilon = 1.0);
    }

    #[test]
    fn test_all_methods_find_strong_peaks() {
        let spectrum = three_peaks();
        for name in PeakMethod::NAMES {
            let method: PeakMethod = name.parse().unwrap();
            let peaks = detect(&spectrum, &method).unwrap();
            let angles: Vec<f64> = peaks.iter().map(|p| p.two_theta).collect();
            assert_eq!(peaks.len(), 2, "method {name}: {angles:?}");
            assert!((angles[0] - 25.0).abs() < 0.03);
            assert!((angles[1] - 40.0).abs() < 0.03);
        }
    }

    #[test]
    fn test_savgol_reports_smoothed_values() {
        let spectrum = three_peaks();
        let peaks = detect(&spectrum, &"savgol".parse().unwrap()).unwrap();
        let smoothed = savgol_filter(spectrum.intensity(), 11, 3);
        for p in &peaks {
            assert_eq!(p.intensity, smoothed[p.index]);
        }
    }

    #[test]
    fn test_filtered_peaks_reports_weak_candidate() {
        let spectrum = three_peaks();
        let method = PeakMethod::default();
        let accepted = detect(&spectrum, &method).unwrap();
        let filtered = filtered_peaks(&spectrum, &method, &accepted).unwrap();

        // 55° 峰突出度 30，低于阈值 ~50.5，但高于其 30%
        assert_eq!(filtered.len(), 1);
        assert!((filtered[0].two_theta - 55.0).abs() < 0.03);
    }

    #[test]
    fn test_local_maxima_plateau_midpoint() {
        let y = [0.0, 1.0, 3.0, 3.0, 3.0, 3.0, 1.0, 0.0, 2.0, 2.0];
        // 末尾平台触及边界，不算峰
        assert_eq!(local_maxima(&y), vec![3]);
    }

    #[test]
    fn test_distance_keeps_higher_peak() {
        let y = [0.0, 5.0, 0.0, 7.0, 0.0, 0.0, 0.0, 0.0, 4.0, 0.0];
        let candidates = local_maxima(&y);
        assert_eq!(candidates, vec![1, 3, 8]);
        assert_eq!(select_by_distance(&candidates, &y, 3), vec![3, 8]);
    }

    #[test]
    fn test_prominence_bounded_by_higher_neighbour() {
        let y = [0.0, 10.0, 2.0, 6.0, 1.0, 0.0];
        let (prominence, left, right) = peak_prominence(&y, 3);
        // 左侧止于 10.0，最低 2.0；右侧到边界，最低 0.0
        assert_eq!(prominence, 4.0);
        assert_eq!((left, right), (2, 5));
    }

    #[test]
    fn test_threshold_ties_disqualify() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let mut y = vec![0.0; 20];
        y[8] = 10.0;
        y[10] = 10.0;
        y[15] = 5.0;
        let peaks = threshold_peaks(&x, &y, &ThresholdParams::default());
        assert!(peaks.is_empty());

        let peaks = threshold_peaks(
            &x,
            &y,
            &ThresholdParams {
                threshold: None,
                min_distance: 1,
            },
        );
        let indices: Vec<usize> = peaks.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![8, 10, 15]);
    }

    #[test]
    fn test_derivative_respects_min_distance() {
        let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let y = [0.0, 5.0, 0.0, 6.0, 0.0, 0.0, 0.0, 0.0, 7.0, 0.0, 0.0, 0.0];
        let peaks = derivative_peaks(&x, &y, &ThresholdParams::default());
        let indices: Vec<usize> = peaks.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 8]);
    }

    #[test]
    fn test_fwhm_degenerate_cases() {
        let x = [0.0, 1.0, 2.0];
        assert_eq!(fwhm_degrees(&x, &[0.0, -1.0, 0.0], 1), None);
        // 无穿越时取边界角度
        assert_eq!(fwhm_degrees(&x, &[0.9, 1.0, 0.8], 1), Some(2.0));
    }

    #[test]
    fn test_default_distance_from_step() {
        assert_eq!(default_distance(&single_gaussian()), 10);
        assert_eq!(default_distance(&three_peaks()), 5);
    }

    #[test]
    fn test_unknown_peak_method() {
        assert!(matches!(
            "wavelet".parse::<PeakMethod>(),
            Err(XrdError::UnknownMethod { .. })
        ));
    }
}
