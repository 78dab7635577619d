//! # 数值工具
//!
//! 多项式最小二乘拟合（`faer` QR 分解）与线性插值。
//!
//! ## 依赖关系
//! - 被 `processing/background.rs`, `processing/savgol.rs`, `processing/kalpha.rs` 调用
//! - 使用 `faer` crate

use faer::linalg::solvers::SolveLstsq;
use faer::Mat;

/// 拟合得到的多项式
///
/// 拟合在归一化自变量 `u = (x - center) / half_range` 上进行，以改善
/// 高次 Vandermonde 矩阵的条件数。
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    /// 系数，按 u 的升幂排列
    pub coeffs: Vec<f64>,
    center: f64,
    half_range: f64,
}

impl Polynomial {
    /// 计算 p(x)
    pub fn eval(&self, x: f64) -> f64 {
        let u = (x - self.center) / self.half_range;
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * u + c)
    }

    /// 对一组自变量求值
    pub fn eval_all(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

/// 最小二乘拟合 degree 次多项式
///
/// 点数（按不同 x 计）不足时自动降阶为 `distinct - 1` 次。
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Polynomial {
    let n = x.len().min(y.len());
    let (lo, hi) = x[..n]
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let center = if n > 0 { (lo + hi) / 2.0 } else { 0.0 };
    let half_range = if n > 0 && hi > lo { (hi - lo) / 2.0 } else { 1.0 };

    if n == 0 {
        return Polynomial {
            coeffs: vec![0.0],
            center,
            half_range,
        };
    }

    let cols = degree.min(distinct_count(&x[..n]) - 1) + 1;
    let u: Vec<f64> = x[..n].iter().map(|&xi| (xi - center) / half_range).collect();

    // Vandermonde 矩阵，列 j 为 u^j
    let a = Mat::<f64>::from_fn(n, cols, |i, j| u[i].powi(j as i32));
    let b = Mat::<f64>::from_fn(n, 1, |i, _| y[i]);
    let solution = a.qr().solve_lstsq(&b);

    let mut coeffs: Vec<f64> = (0..cols).map(|j| solution[(j, 0)]).collect();
    if coeffs.iter().any(|c| !c.is_finite()) {
        // 病态时退化为常数拟合
        let mean = y[..n].iter().sum::<f64>() / n as f64;
        coeffs = vec![mean];
    }

    Polynomial {
        coeffs,
        center,
        half_range,
    }
}

/// 不同取值的个数（至少为 1）
fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len().max(1)
}

/// 线性插值器，区间外取 `fill`
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    xs: Vec<f64>,
    ys: Vec<f64>,
    fill: f64,
}

impl LinearInterpolator {
    /// 由采样点构建（自动按 x 排序）
    pub fn new(xs: &[f64], ys: &[f64], fill: f64) -> Self {
        let mut pairs: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (xs, ys) = pairs.into_iter().unzip();
        Self { xs, ys, fill }
    }

    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if n == 0 || x.is_nan() || x < self.xs[0] || x > self.xs[n - 1] {
            return self.fill;
        }

        // 第一个 > x 的位置
        let hi = self.xs.partition_point(|&v| v <= x);
        if hi == 0 {
            return self.ys[0];
        }
        if hi >= n {
            return self.ys[n - 1];
        }
        let lo = hi - 1;
        let (x0, x1) = (self.xs[lo], self.xs[hi]);
        let (y0, y1) = (self.ys[lo], self.ys[hi]);
        if x1 == x0 {
            return y0;
        }
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_polyfit_recovers_exact_polynomial() {
        let x: Vec<f64> = (0..200).map(|i| 5.0 + i as f64 * 0.4).collect();
        let truth = |v: f64| 3.0 - 0.5 * v + 0.01 * v * v - 1e-5 * v.powi(3);
        let y: Vec<f64> = x.iter().map(|&v| truth(v)).collect();

        let p = polyfit(&x, &y, 6);
        for &v in &x {
            assert_abs_diff_eq!(p.eval(v), truth(v), epsilon = 1e-7);
        }
    }

    #[test]
    fn test_polyfit_least_squares_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.5];
        let p = polyfit(&x, &y, 1);
        // 解析解: slope = 2.15, intercept = 0.9
        assert_abs_diff_eq!(p.eval(0.0), 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(p.eval(1.0) - p.eval(0.0), 2.15, epsilon = 1e-12);
    }

    #[test]
    fn test_polyfit_reduces_degree_for_few_points() {
        let p = polyfit(&[1.0, 2.0], &[4.0, 6.0], 6);
        assert_eq!(p.coeffs.len(), 2);
        assert_abs_diff_eq!(p.eval(3.0), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_polyfit_repeated_abscissa_stays_finite() {
        // 只有两个不同的 x，6 次拟合降为直线
        let x = [1.0, 1.0, 1.0, 3.0, 3.0];
        let y = [2.0, 2.0, 2.0, 6.0, 6.0];
        let p = polyfit(&x, &y, 6);
        assert_eq!(p.coeffs.len(), 2);
        assert_abs_diff_eq!(p.eval(2.0), 4.0, epsilon = 1e-10);
    }

    #[test]
    fn test_interpolator_inside_and_outside() {
        let interp = LinearInterpolator::new(&[2.0, 0.0, 1.0], &[20.0, 0.0, 10.0], -1.0);
        assert_abs_diff_eq!(interp.eval(0.5), 5.0);
        assert_abs_diff_eq!(interp.eval(2.0), 20.0);
        assert_eq!(interp.eval(-0.1), -1.0);
        assert_eq!(interp.eval(2.1), -1.0);
    }
}
