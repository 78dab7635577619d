//! # 一维形态学与高斯滤波
//!
//! 平坦结构元的灰度腐蚀/膨胀/开运算，以及一维高斯平滑。
//! 边界均采用镜像延拓 (`d c b a | a b c d | d c b a`)。
//!
//! 窗口约定：
//! - 腐蚀: `[i - n/2, i - n/2 + n - 1]`
//! - 膨胀: `[i - (n-1)/2, i + n/2]`
//!
//! 偶数宽度时两者互为镜像，开运算结果不偏移。
//!
//! ## 依赖关系
//! - 被 `processing/background.rs` 调用

use std::collections::VecDeque;

/// 镜像延拓下标
fn reflect_index(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - 1 - m) as usize
    } else {
        m as usize
    }
}

/// 滑动极值：输出 i 取 `[i - left, i + right]` 上的极值
///
/// `prefer(a, b)` 为真表示 a 比 b 更"极"（最小值滤波取 `a <= b`）。
fn sliding_extreme(
    values: &[f64],
    left: usize,
    right: usize,
    prefer: impl Fn(f64, f64) -> bool,
) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let padded: Vec<f64> = (0..n + left + right)
        .map(|k| values[reflect_index(k as isize - left as isize, n)])
        .collect();
    let width = left + right + 1;

    let mut out = Vec::with_capacity(n);
    let mut window: VecDeque<usize> = VecDeque::new();

    for (k, &v) in padded.iter().enumerate() {
        while let Some(&back) = window.back() {
            if prefer(v, padded[back]) {
                window.pop_back();
            } else {
                break;
            }
        }
        window.push_back(k);

        if let Some(&front) = window.front() {
            if front + width <= k {
                window.pop_front();
            }
        }

        if k + 1 >= width {
            if let Some(&front) = window.front() {
                out.push(padded[front]);
            }
        }
    }
    out
}

/// 灰度腐蚀（平坦结构元，宽度 size）
pub fn grey_erosion(values: &[f64], size: usize) -> Vec<f64> {
    let size = size.max(1);
    sliding_extreme(values, size / 2, (size - 1) / 2, |a, b| a <= b)
}

/// 灰度膨胀（平坦结构元，宽度 size）
pub fn grey_dilation(values: &[f64], size: usize) -> Vec<f64> {
    let size = size.max(1);
    sliding_extreme(values, (size - 1) / 2, size / 2, |a, b| a >= b)
}

/// 灰度开运算：先腐蚀后膨胀
pub fn grey_opening(values: &[f64], size: usize) -> Vec<f64> {
    grey_dilation(&grey_erosion(values, size), size)
}

/// 一维高斯滤波
///
/// 核半径 `round(4σ)`，权重归一化，镜像边界。σ ≤ 0 时原样返回。
pub fn gaussian_filter1d(values: &[f64], sigma: f64) -> Vec<f64> {
    let n = values.len();
    if n == 0 || sigma <= 0.0 {
        return values.to_vec();
    }

    let radius = (4.0 * sigma + 0.5) as isize;
    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }

    (0..n as isize)
        .map(|i| {
            weights
                .iter()
                .zip(-radius..=radius)
                .map(|(w, offset)| w * values[reflect_index(i + offset, n)])
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// 逐窗口直接求极值，用作对照
    fn naive(values: &[f64], left: usize, right: usize, min: bool) -> Vec<f64> {
        let n = values.len();
        (0..n as isize)
            .map(|i| {
                let window = (i - left as isize..=i + right as isize)
                    .map(|k| values[reflect_index(k, n)]);
                if min {
                    window.fold(f64::INFINITY, f64::min)
                } else {
                    window.fold(f64::NEG_INFINITY, f64::max)
                }
            })
            .collect()
    }

    fn sample() -> Vec<f64> {
        (0..97)
            .map(|i| ((i * 37) % 23) as f64 + (i as f64 * 0.3).sin() * 5.0)
            .collect()
    }

    #[test]
    fn test_reflect_index() {
        assert_eq!(reflect_index(-1, 4), 0);
        assert_eq!(reflect_index(-2, 4), 1);
        assert_eq!(reflect_index(4, 4), 3);
        assert_eq!(reflect_index(5, 4), 2);
        assert_eq!(reflect_index(8, 4), 0);
    }

    #[test]
    fn test_sliding_matches_naive() {
        let values = sample();
        for size in [1, 2, 3, 4, 7, 10, 50, 120] {
            let erosion = grey_erosion(&values, size);
            let dilation = grey_dilation(&values, size);
            assert_eq!(erosion, naive(&values, size / 2, (size - 1) / 2, true));
            assert_eq!(dilation, naive(&values, (size - 1) / 2, size / 2, false));
        }
    }

    #[test]
    fn test_opening_below_signal_and_flattens_spike() {
        let mut values = vec![10.0; 60];
        values[30] = 500.0;
        let opened = grey_opening(&values, 5);
        for (o, v) in opened.iter().zip(&values) {
            assert!(o <= v);
        }
        assert_eq!(opened[30], 10.0);
    }

    #[test]
    fn test_gaussian_preserves_constant_and_area() {
        let flat = vec![3.0; 40];
        for v in gaussian_filter1d(&flat, 2.5) {
            assert_abs_diff_eq!(v, 3.0, epsilon = 1e-12);
        }

        let mut impulse = vec![0.0; 101];
        impulse[50] = 1.0;
        let smoothed = gaussian_filter1d(&impulse, 3.0);
        assert_abs_diff_eq!(smoothed.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(smoothed[50] > smoothed[49] && smoothed[49] > smoothed[45]);
    }
}
