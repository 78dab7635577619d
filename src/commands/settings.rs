//! # 处理配置
//!
//! 将命令行参数转换为强类型的方法配置，并按配置运行一遍分析流程。
//! 方法名先经 `FromStr` 得到带默认参数的方法，再用命令行给出的值覆盖；
//! 与所选方法无关的参数被忽略。
//!
//! ## 依赖关系
//! - 被 `commands/analyze.rs`, `commands/batch.rs` 使用
//! - 使用 `cli/analyze.rs` 的 `ProcessingArgs`
//! - 使用 `pipeline.rs` 执行流程

use crate::cli::analyze::ProcessingArgs;
use crate::error::Result;
use crate::parsers::{parse_scan_file_with, FileFormat, RawLayoutConfig};
use crate::pipeline::Analysis;
use crate::processing::{BackgroundMethod, KalphaMethod, PeakMethod};

use std::path::Path;

/// 表示跳过该步骤的方法名
const SKIP: &str = "none";

/// 一次分析的完整配置
#[derive(Debug, Clone)]
pub struct Settings {
    pub format: FileFormat,
    pub raw_layout: RawLayoutConfig,
    pub wavelength: Option<f64>,
    pub background: Option<BackgroundMethod>,
    pub kalpha: Option<KalphaMethod>,
    pub peaks: PeakMethod,
}

impl Settings {
    pub fn from_args(args: &ProcessingArgs) -> Result<Self> {
        let mut raw_layout = RawLayoutConfig::default();
        if let Some(sizes) = &args.raw_header_sizes {
            raw_layout.header_sizes = sizes.clone();
        }

        let settings = Self {
            format: args.format.parse()?,
            raw_layout,
            wavelength: args.wavelength,
            background: background_method(args)?,
            kalpha: kalpha_method(args)?,
            peaks: peak_method(args)?,
        };

        // 参数错误在读文件之前报告
        if let Some(bg) = &settings.background {
            bg.validate()?;
        }
        if let Some(ka) = &settings.kalpha {
            ka.validate()?;
        }
        settings.peaks.validate()?;

        Ok(settings)
    }

    /// 解析文件并依次执行背景扣除、Kα2 剥离和寻峰
    pub fn run(&self, path: &Path) -> Result<Analysis> {
        let mut spectrum = parse_scan_file_with(path, self.format, &self.raw_layout)?;
        if self.wavelength.is_some() {
            spectrum.set_wavelength(self.wavelength);
        }

        let mut analysis = Analysis::new(spectrum);
        if let Some(method) = self.background {
            analysis.subtract_background(method)?;
        }
        if let Some(method) = self.kalpha {
            analysis.strip_kalpha(method)?;
        }
        analysis.detect_peaks(self.peaks)?;

        tracing::debug!(
            path = %path.display(),
            peaks = analysis.peaks().map_or(0, |p| p.len()),
            "analysis finished"
        );
        Ok(analysis)
    }

    /// 单行描述，用于摘要输出
    pub fn describe(&self) -> String {
        let name = |m: Option<&str>| m.unwrap_or(SKIP).to_string();
        format!(
            "background={}, kalpha={}, peaks={}",
            name(self.background.as_ref().map(|m| m.name())),
            name(self.kalpha.as_ref().map(|m| m.name())),
            self.peaks.name()
        )
    }
}

fn is_skip(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(SKIP)
}

fn background_method(args: &ProcessingArgs) -> Result<Option<BackgroundMethod>> {
    if is_skip(&args.background) {
        return Ok(None);
    }

    let mut method: BackgroundMethod = args.background.parse()?;
    match &mut method {
        BackgroundMethod::Polynomial(p) => {
            if let Some(degree) = args.degree {
                p.degree = degree;
            }
        }
        BackgroundMethod::IterativePolynomial(p) => {
            if let Some(degree) = args.degree {
                p.degree = degree;
            }
            if let Some(iterations) = args.bg_iterations {
                p.iterations = iterations;
            }
            if let Some(threshold) = args.bg_threshold {
                p.threshold = threshold;
            }
        }
        BackgroundMethod::RollingBall(p) | BackgroundMethod::TopHat(p) => {
            p.size = args.size.or(p.size);
        }
        BackgroundMethod::Snip(p) => {
            if let Some(iterations) = args.bg_iterations {
                p.iterations = iterations;
            }
            if let Some(factor) = args.reduction_factor {
                p.reduction_factor = factor;
            }
        }
    }
    Ok(Some(method))
}

fn kalpha_method(args: &ProcessingArgs) -> Result<Option<KalphaMethod>> {
    if is_skip(&args.kalpha) {
        return Ok(None);
    }

    let mut method: KalphaMethod = args.kalpha.parse()?;
    let params = method.params_mut();
    params.wavelength_ratio = args.wavelength_ratio.or(params.wavelength_ratio);
    if let Some(ratio) = args.intensity_ratio {
        params.intensity_ratio = ratio;
    }
    if let Some(iterations) = args.kalpha_iterations {
        params.iterations = iterations;
    }
    Ok(Some(method))
}

fn peak_method(args: &ProcessingArgs) -> Result<PeakMethod> {
    let mut method: PeakMethod = args.peaks.parse()?;
    match &mut method {
        PeakMethod::Prominence(p) => {
            p.prominence = args.prominence.or(p.prominence);
            p.height = args.height.or(p.height);
            p.distance = args.distance.or(p.distance);
            p.width = args.width.or(p.width);
        }
        PeakMethod::Threshold(p) | PeakMethod::Derivative(p) => {
            p.threshold = args.threshold.or(p.threshold);
            if let Some(d) = args.min_distance.or(args.distance) {
                p.min_distance = d;
            }
        }
        PeakMethod::Savgol(p) => {
            if let Some(window) = args.window {
                p.window_length = window;
            }
            if let Some(order) = args.polyorder {
                p.polyorder = order;
            }
            p.prominence = args.prominence.or(p.prominence);
            p.distance = args.distance.or(p.distance);
        }
    }
    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::error::XrdError;
    use clap::Parser;

    fn processing(extra: &[&str]) -> ProcessingArgs {
        let mut argv = vec!["xrdkit", "analyze", "scan.xrdml"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            crate::cli::Commands::Analyze(a) => a.processing,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_args(&processing(&[])).unwrap();
        assert_eq!(settings.format, FileFormat::Auto);
        assert_eq!(settings.background, Some(BackgroundMethod::default()));
        assert_eq!(settings.kalpha, None);
        assert_eq!(settings.peaks, PeakMethod::default());
        assert_eq!(
            settings.describe(),
            "background=iterative_polynomial, kalpha=none, peaks=prominence"
        );
    }

    #[test]
    fn test_overrides_apply_to_selected_method() {
        let settings = Settings::from_args(&processing(&[
            "--background",
            "snip",
            "--bg-iterations",
            "40",
            "--kalpha",
            "iterative_rachinger",
            "--wavelength-ratio",
            "1.0021",
            "--peaks",
            "threshold",
            "--threshold",
            "250",
            "--raw-header-sizes",
            "512,256",
        ]))
        .unwrap();

        match settings.background {
            Some(BackgroundMethod::Snip(p)) => assert_eq!(p.iterations, 40),
            other => panic!("unexpected background {:?}", other),
        }
        let ka = settings.kalpha.unwrap();
        assert_eq!(ka.name(), "iterative_rachinger");
        assert_eq!(ka.params().wavelength_ratio, Some(1.0021));
        match settings.peaks {
            PeakMethod::Threshold(p) => assert_eq!(p.threshold, Some(250.0)),
            other => panic!("unexpected peaks {:?}", other),
        }
        assert_eq!(settings.raw_layout.header_sizes, vec![512, 256]);
    }

    #[test]
    fn test_skip_background() {
        let settings = Settings::from_args(&processing(&["--background", "None"])).unwrap();
        assert!(settings.background.is_none());
    }

    #[test]
    fn test_bad_names_and_values() {
        let err = Settings::from_args(&processing(&["--peaks", "wavelet"])).unwrap_err();
        assert!(matches!(err, XrdError::UnknownMethod { .. }));

        let err = Settings::from_args(&processing(&[
            "--background",
            "snip",
            "--reduction-factor",
            "1.5",
        ]))
        .unwrap_err();
        assert!(matches!(err, XrdError::ConfigValueError { .. }));
    }

    #[test]
    fn test_run_on_text_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.dat");
        let body: String = (0..1500)
            .map(|i| {
                let t = 20.0 + i as f64 * 0.02;
                let y = 50.0 + 800.0 * (-((t - 35.0) / 0.1_f64).powi(2)).exp();
                format!("{:.2} {:.3}\n", t, y)
            })
            .collect();
        std::fs::write(&path, body).unwrap();

        let settings = Settings::from_args(&processing(&["--wavelength", "cu-ka1"])).unwrap();
        let analysis = settings.run(&path).unwrap();
        assert_eq!(analysis.current().wavelength(), Some(1.54056));
        let peaks = analysis.peaks().unwrap();
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0].two_theta - 35.0).abs() < 0.03);
    }
}
