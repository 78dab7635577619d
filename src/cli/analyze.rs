//! # analyze 子命令 CLI 定义
//!
//! `ProcessingArgs` 是处理流程的公共参数（格式、背景、Kα2、寻峰），
//! 同时被 `analyze` 和 `batch` 展开使用。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs`, `cli/batch.rs` 使用
//! - 参数传递给 `commands/settings.rs` 转换为方法配置

use crate::reference::DEFAULT_TOLERANCE;

use clap::Args;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// 波长
// ─────────────────────────────────────────────────────────────

/// 预定义辐射源波长 (Å)
pub fn get_predefined_wavelength(name: &str) -> Option<f64> {
    match name.to_lowercase().as_str() {
        "cu-ka" | "cuka" => Some(1.5418),
        "cu-ka1" | "cuka1" => Some(1.54056),
        "cu-ka2" | "cuka2" => Some(1.54439),
        "cu-kb1" | "cukb1" => Some(1.3922),
        "mo-ka" | "moka" => Some(0.7107),
        "mo-ka1" | "moka1" => Some(0.70930),
        "co-ka" | "coka" => Some(1.7903),
        "co-ka1" | "coka1" => Some(1.78897),
        "fe-ka" | "feka" => Some(1.9373),
        "cr-ka" | "crka" => Some(2.2910),
        "ag-ka" | "agka" => Some(0.5609),
        _ => None,
    }
}

/// 解析波长输入（辐射源名称或 Å 数值）
pub fn parse_wavelength(input: &str) -> Result<f64, String> {
    if let Some(wl) = get_predefined_wavelength(input) {
        return Ok(wl);
    }
    match input.parse::<f64>() {
        Ok(wl) if wl > 0.0 => Ok(wl),
        _ => Err(format!(
            "Invalid wavelength '{}'. Use a positive number in Å (e.g., 1.5406) or a name: cu-ka, cu-ka1, mo-ka, co-ka, fe-ka, cr-ka, ag-ka",
            input
        )),
    }
}

// ─────────────────────────────────────────────────────────────
// 公共处理参数
// ─────────────────────────────────────────────────────────────

/// 处理流程参数
#[derive(Args, Debug, Clone)]
pub struct ProcessingArgs {
    /// Input format: auto, xrdml, raw, dat, asc, txt
    #[arg(long, default_value = "auto")]
    pub format: String,

    /// Candidate RAW header sizes in bytes, tried in order (e.g., "3238,2048,1024")
    #[arg(long, value_delimiter = ',')]
    pub raw_header_sizes: Option<Vec<usize>>,

    /// Override the scan wavelength: source name (cu-ka1, mo-ka, ...) or value in Å
    #[arg(short, long, value_parser = parse_wavelength)]
    pub wavelength: Option<f64>,

    // ── 背景 ──
    /// Background method: polynomial, iterative_polynomial, rolling_ball, tophat, snip, none
    #[arg(short, long, default_value = "iterative_polynomial")]
    pub background: String,

    /// Polynomial degree (polynomial / iterative_polynomial)
    #[arg(long)]
    pub degree: Option<usize>,

    /// Iteration count (iterative_polynomial / snip)
    #[arg(long)]
    pub bg_iterations: Option<usize>,

    /// Residual threshold for iterative_polynomial, as a fraction of the maximum intensity
    #[arg(long)]
    pub bg_threshold: Option<f64>,

    /// Structuring element size in points (rolling_ball / tophat)
    #[arg(long)]
    pub size: Option<usize>,

    /// SNIP window reduction factor, in (0, 1)
    #[arg(long)]
    pub reduction_factor: Option<f64>,

    // ── Kα2 ──
    /// Kα2 stripping: rachinger, iterative_rachinger, none
    #[arg(short, long, default_value = "none")]
    pub kalpha: String,

    /// Kα2/Kα1 wavelength ratio (default: looked up from the scan wavelength)
    #[arg(long)]
    pub wavelength_ratio: Option<f64>,

    /// Kα2/Kα1 intensity ratio
    #[arg(long)]
    pub intensity_ratio: Option<f64>,

    /// Iterations for iterative_rachinger
    #[arg(long)]
    pub kalpha_iterations: Option<usize>,

    // ── 寻峰 ──
    /// Peak detection: prominence, threshold, derivative, savgol
    #[arg(short, long, default_value = "prominence")]
    pub peaks: String,

    /// Minimum prominence (default: 5% of the maximum intensity)
    #[arg(long)]
    pub prominence: Option<f64>,

    /// Minimum peak height (prominence method)
    #[arg(long)]
    pub height: Option<f64>,

    /// Minimum peak separation in points (default: 0.1° worth of points)
    #[arg(long)]
    pub distance: Option<usize>,

    /// Minimum peak width in points (prominence method)
    #[arg(long)]
    pub width: Option<f64>,

    /// Intensity threshold (threshold / derivative; default: 10% of max)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Minimum separation in points (threshold / derivative)
    #[arg(long)]
    pub min_distance: Option<usize>,

    /// Savitzky-Golay window length (savgol)
    #[arg(long)]
    pub window: Option<usize>,

    /// Savitzky-Golay polynomial order (savgol)
    #[arg(long)]
    pub polyorder: Option<usize>,
}

// ─────────────────────────────────────────────────────────────
// analyze 命令
// ─────────────────────────────────────────────────────────────

/// analyze 子命令参数
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input scan file
    pub input: PathBuf,

    #[command(flatten)]
    pub processing: ProcessingArgs,

    /// Reference database: JSON files or directories (repeatable)
    #[arg(short, long)]
    pub database: Vec<PathBuf>,

    /// Match only references whose name or id contains this text
    #[arg(short, long)]
    pub reference: Option<String>,

    /// Matching tolerance in degrees 2θ
    #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Number of ranked references to show
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Also list candidates dropped by the detection threshold
    #[arg(long, default_value_t = false)]
    pub show_filtered: bool,

    /// Output file; the extension selects the content (.csv peaks, .xy spectrum, .json session, .png/.svg plot)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the processed spectrum as CSV, with the estimated background column when one was subtracted
    #[arg(long)]
    pub spectrum: Option<PathBuf>,

    /// Plot title (default: input file name)
    #[arg(long)]
    pub title: Option<String>,

    /// Print the full session as JSON instead of tables
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wavelength_names_and_numbers() {
        assert_eq!(parse_wavelength("Cu-Ka1"), Ok(1.54056));
        assert_eq!(parse_wavelength("moka"), Ok(0.7107));
        assert_eq!(parse_wavelength("1.2"), Ok(1.2));
        assert!(parse_wavelength("-1").is_err());
        assert!(parse_wavelength("unobtainium").is_err());
    }

    #[test]
    fn test_prominence_help_describes_default() {
        use crate::cli::Cli;
        use clap::CommandFactory;

        let cli = Cli::command();
        let analyze = cli.find_subcommand("analyze").unwrap();
        let help = analyze
            .get_arguments()
            .find(|a| a.get_id() == "prominence")
            .and_then(|a| a.get_help())
            .map(|h| h.to_string())
            .unwrap();
        assert!(help.contains("5% of the maximum intensity"));
    }
}
