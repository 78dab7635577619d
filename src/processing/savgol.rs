//! # Savitzky–Golay 平滑
//!
//! 在长度为 w (奇数) 的滑动窗口内做 p 次多项式最小二乘拟合，取窗口中心的拟合值。
//! 两端各 w/2 个点用首/尾窗口的拟合多项式直接求值。
//!
//! ## 依赖关系
//! - 被 `processing/peaks.rs` 调用
//! - 使用 `processing/numerics.rs`

use super::numerics::polyfit;

/// 规范化窗口长度：强制为奇数，截断到数据长度，最小为 3
pub fn normalize_window(window: usize, n_points: usize) -> usize {
    let mut window = if window % 2 == 0 { window + 1 } else { window };
    if window > n_points {
        window = if n_points % 2 == 1 {
            n_points
        } else {
            n_points.saturating_sub(1)
        };
    }
    window.max(3)
}

/// 平滑
///
/// 数据点少于窗口长度时原样返回。
pub fn savgol_filter(values: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    let n = values.len();
    let window = normalize_window(window, n);
    if n < window {
        return values.to_vec();
    }
    let polyorder = polyorder.min(window - 1);
    let half = window / 2;

    let offsets: Vec<f64> = (0..window).map(|k| k as f64 - half as f64).collect();
    let coefficients: Vec<f64> = (0..window)
        .map(|k| {
            let mut unit = vec![0.0; window];
            unit[k] = 1.0;
            polyfit(&offsets, &unit, polyorder).eval(0.0)
        })
        .collect();

    let mut out: Vec<f64> = (0..n)
        .map(|i| {
            if i < half || i + half >= n {
                return 0.0;
            }
            coefficients
                .iter()
                .zip(&values[i - half..=i + half])
                .map(|(c, v)| c * v)
                .sum()
        })
        .collect();

    let positions: Vec<f64> = (0..window).map(|k| k as f64).collect();

    let head = polyfit(&positions, &values[..window], polyorder);
    for (i, slot) in out.iter_mut().enumerate().take(half) {
        *slot = head.eval(i as f64);
    }

    let tail_start = n - window;
    let tail = polyfit(&positions, &values[tail_start..], polyorder);
    for i in (n - half)..n {
        out[i] = tail.eval((i - tail_start) as f64);
    }

    out
}
