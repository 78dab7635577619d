//! # 谱图绘制
//!
//! 使用 `plotters` 绘制分析结果：工作谱曲线、检测峰标记，
//! 以及可选的参考图谱叠加曲线（高斯展宽，按谱最大强度缩放）。
//!
//! ## 依赖关系
//! - 被 `commands/analyze.rs` 调用
//! - 使用 `plotters` 渲染 PNG / SVG

use crate::error::{Result, XrdError};
use crate::models::{DetectedPeak, ReferencePattern, Spectrum};

use plotters::prelude::*;
use std::path::Path;

/// 参考叠加曲线的采样点数
const OVERLAY_POINTS: usize = 4000;
/// 参考叠加曲线的高斯宽度（度）
const OVERLAY_WIDTH: f64 = 0.1;

/// 绘图选项
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub use_svg: bool,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            title: "XRD pattern".to_string(),
            width: 1200,
            height: 800,
            use_svg: false,
        }
    }
}

/// 绘制分析结果
pub fn plot_analysis(
    spectrum: &Spectrum,
    peaks: &[DetectedPeak],
    reference: Option<&ReferencePattern>,
    output_path: &Path,
    options: &PlotOptions,
) -> Result<()> {
    let size = (options.width, options.height);
    if options.use_svg {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_chart(&root, spectrum, peaks, reference, &options.title)?;
        root.present()
            .map_err(|e| XrdError::PlotError(e.to_string()))?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_chart(&root, spectrum, peaks, reference, &options.title)?;
        root.present()
            .map_err(|e| XrdError::PlotError(e.to_string()))?;
    }
    Ok(())
}

/// 坐标轴范围：x 取谱的角度范围，y 留出 10% 顶部空白
fn axis_bounds(spectrum: &Spectrum) -> ((f64, f64), (f64, f64)) {
    let x_min = spectrum.two_theta().first().copied().unwrap_or(5.0);
    let x_max = spectrum.two_theta().last().copied().unwrap_or(90.0);
    let (x_min, x_max) = if x_max > x_min {
        (x_min, x_max)
    } else {
        (x_min - 1.0, x_min + 1.0)
    };

    let y_lo = spectrum
        .intensity()
        .iter()
        .copied()
        .fold(0.0_f64, f64::min);
    let y_hi = spectrum.max_intensity().max(0.0);
    let span = if y_hi > y_lo { y_hi - y_lo } else { 1.0 };

    ((x_min, x_max), (y_lo, y_hi + 0.1 * span))
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    spectrum: &Spectrum,
    peaks: &[DetectedPeak],
    reference: Option<&ReferencePattern>,
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let plot_err = |e: DrawingAreaErrorKind<DB::ErrorType>| XrdError::PlotError(format!("{:?}", e));

    root.fill(&WHITE).map_err(plot_err)?;

    let ((x_min, x_max), (y_min, y_max)) = axis_bounds(spectrum);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("2θ (°)")
        .y_desc("Intensity (counts)")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(plot_err)?;

    let line_color = RGBColor(0, 102, 204);
    chart
        .draw_series(LineSeries::new(spectrum.points(), line_color.stroke_width(1)))
        .map_err(plot_err)?;

    if let Some(reference) = reference.filter(|r| !r.is_empty()) {
        let (x, y) = reference.continuous_pattern((x_min, x_max), OVERLAY_POINTS, OVERLAY_WIDTH);
        // 叠加曲线缩放到与谱相同的最大强度
        let peak = y.iter().copied().fold(0.0_f64, f64::max);
        let scale = if peak > 0.0 {
            spectrum.max_intensity().max(0.0) / peak
        } else {
            0.0
        };
        let overlay_color = RGBColor(34, 139, 34);
        chart
            .draw_series(LineSeries::new(
                x.into_iter().zip(y).map(move |(a, b)| (a, b * scale)),
                overlay_color.stroke_width(1),
            ))
            .map_err(plot_err)?
            .label(format!("{} ({})", reference.name, reference.id))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], overlay_color));
    }

    let marker_color = RGBColor(220, 20, 60);
    chart
        .draw_series(
            peaks
                .iter()
                .map(|p| Circle::new((p.two_theta, p.intensity), 4, marker_color.filled())),
        )
        .map_err(plot_err)?;

    if reference.is_some_and(|r| !r.is_empty()) {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(plot_err)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_bounds_cover_spectrum() {
        let spectrum = Spectrum::new(vec![10.0, 20.0, 30.0], vec![-5.0, 100.0, 50.0]).unwrap();
        let ((x0, x1), (y0, y1)) = axis_bounds(&spectrum);
        assert_eq!((x0, x1), (10.0, 30.0));
        assert_eq!(y0, -5.0);
        assert!((y1 - 110.5).abs() < 1e-9);
    }

    #[test]
    fn test_axis_bounds_single_point() {
        let spectrum = Spectrum::new(vec![25.0], vec![0.0]).unwrap();
        let ((x0, x1), (y0, y1)) = axis_bounds(&spectrum);
        assert!(x1 > x0);
        assert!(y1 > y0);
    }
}
