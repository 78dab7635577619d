//! # analyze 命令实现
//!
//! 单个扫描文件的完整分析：解析 → 背景扣除 → Kα2 剥离 → 寻峰，
//! 给出数据库时再与参考图谱逐一匹配并按评分排序。
//!
//! ## 输出
//! - 终端表格（峰表、被过滤的候选峰、匹配排名）
//! - `--output` 按扩展名导出：`.csv` 峰表，`.xy` 处理后的谱，
//!   `.json` 会话快照，`.png` / `.svg` 图表
//! - `--spectrum` 写出处理后的谱 CSV（含背景列）
//! - `--json` 直接打印会话快照
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 AnalyzeArgs
//! - 使用 `commands/settings.rs` 执行流程
//! - 使用 `reference/`, `export/`

use super::settings::Settings;
use crate::cli::analyze::AnalyzeArgs;
use crate::error::{Result, XrdError};
use crate::export::{self, PlotOptions};
use crate::models::{DetectedPeak, ReferencePattern};
use crate::pipeline::{Analysis, MatchRecord};
use crate::reference::ReferenceDatabase;
use crate::utils::{output, progress};

use std::path::Path;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct PeakRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "2θ (°)")]
    two_theta: String,
    #[tabled(rename = "d (Å)")]
    d_spacing: String,
    #[tabled(rename = "Intensity")]
    intensity: String,
    #[tabled(rename = "Prominence")]
    prominence: String,
    #[tabled(rename = "FWHM (°)")]
    fwhm: String,
}

#[derive(Tabled)]
struct MatchRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Phase")]
    name: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Matched")]
    matched: String,
    #[tabled(rename = "Score (%)")]
    score: String,
}

#[derive(Tabled)]
struct PairRow {
    #[tabled(rename = "2θ obs (°)")]
    observed: String,
    #[tabled(rename = "2θ ref (°)")]
    reference: String,
    #[tabled(rename = "Δ (°)")]
    delta: String,
    #[tabled(rename = "I ref")]
    intensity: String,
}

/// 执行 analyze 命令
pub fn execute(args: AnalyzeArgs) -> Result<()> {
    let settings = Settings::from_args(&args.processing)?;
    let mut analysis = settings.run(&args.input)?;

    let database = load_database(&args.database, !args.json);
    if let Some(db) = &database {
        match_candidates(&mut analysis, db, args.reference.as_deref(), args.tolerance)?;
    }

    if args.json {
        let json = serde_json::to_string_pretty(&analysis.snapshot())
            .map_err(|e| XrdError::Other(format!("failed to serialize session: {}", e)))?;
        println!("{}", json);
    } else {
        print_summary(&args.input, &analysis, &settings);
        print_peak_table(&analysis);

        if args.show_filtered {
            print_filtered(&analysis)?;
        }
        if database.is_some() {
            print_ranking(&analysis, args.top);
        }
    }

    if let Some(path) = &args.output {
        let title = args.title.clone().unwrap_or_else(|| file_label(&args.input));
        write_output(&analysis, path, &title)?;
        if !args.json {
            output::print_written(&args.input.display().to_string(), &path.display().to_string());
        }
    }

    if let Some(path) = &args.spectrum {
        write_spectrum(&analysis, path)?;
        if !args.json {
            output::print_written(&args.input.display().to_string(), &path.display().to_string());
        }
    }

    Ok(())
}

/// 加载参考数据库；未给出路径时返回 None
fn load_database(paths: &[std::path::PathBuf], interactive: bool) -> Option<ReferenceDatabase> {
    if paths.is_empty() {
        return None;
    }

    let spinner = interactive.then(|| progress::create_spinner("Loading reference database"));
    let (db, report) = ReferenceDatabase::load(paths);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if interactive {
        for failure in &report.failures {
            output::print_warning(&format!(
                "Skipped '{}': {}",
                failure.path.display(),
                failure.reason
            ));
        }
        if db.is_empty() {
            output::print_warning("Reference database is empty; matching skipped");
        } else {
            output::print_info(&format!(
                "Loaded {} reference patterns from {} files",
                report.patterns_loaded, report.files_loaded
            ));
        }
    }
    Some(db)
}

/// 与候选参考图谱逐一匹配，结果记录在会话中
fn match_candidates(
    analysis: &mut Analysis,
    db: &ReferenceDatabase,
    query: Option<&str>,
    tolerance: f64,
) -> Result<()> {
    let candidates: Vec<&ReferencePattern> = match query {
        Some(q) => db.search(q),
        None => db.all().iter().collect(),
    };

    if candidates.is_empty() {
        tracing::warn!(query = query.unwrap_or(""), "no reference patterns to match");
    }

    for reference in candidates {
        analysis.match_reference(reference, tolerance)?;
    }
    Ok(())
}

/// 匹配记录按评分降序（同分保持加载顺序）
fn ranked_matches(analysis: &Analysis) -> Vec<&MatchRecord> {
    let mut ranked: Vec<&MatchRecord> = analysis.matches().iter().collect();
    ranked.sort_by(|a, b| b.result.score.total_cmp(&a.result.score));
    ranked
}

fn print_summary(input: &Path, analysis: &Analysis, settings: &Settings) {
    let spectrum = analysis.current();
    output::print_header("XRD Scan Analysis");
    output::print_field("File", input.display());
    output::print_field("Points", spectrum.len());
    if let (Some(first), Some(last)) = (spectrum.two_theta().first(), spectrum.two_theta().last()) {
        output::print_field("2θ range", format!("{:.3}° - {:.3}°", first, last));
    }
    match spectrum.wavelength() {
        Some(wl) => output::print_field("Wavelength", format!("{:.5} Å", wl)),
        None => output::print_field("Wavelength", "unknown"),
    }
    if let Some(record) = analysis.stripping() {
        output::print_field("Kα2/Kα1 ratio", format!("{:.5}", record.wavelength_ratio));
    }
    output::print_field("Pipeline", settings.describe());

    // 解析器记录的文件信息
    for (key, value) in analysis.original().metadata() {
        output::print_field(key, value);
    }
}

fn peak_rows(analysis: &Analysis, peaks: &[DetectedPeak]) -> Vec<PeakRow> {
    let d_spacing = analysis.current().d_spacing().ok();
    let optional = |v: Option<f64>, digits: usize| {
        v.map(|x| format!("{:.*}", digits, x))
            .unwrap_or_else(|| "-".to_string())
    };

    peaks
        .iter()
        .enumerate()
        .map(|(i, p)| PeakRow {
            rank: i + 1,
            two_theta: format!("{:.3}", p.two_theta),
            d_spacing: optional(d_spacing.as_ref().and_then(|d| d.get(p.index).copied()), 4),
            intensity: format!("{:.1}", p.intensity),
            prominence: optional(p.prominence, 1),
            fwhm: optional(p.fwhm_degrees, 3),
        })
        .collect()
}

fn print_peak_table(analysis: &Analysis) {
    let peaks = analysis.peaks().unwrap_or_default();
    if peaks.is_empty() {
        output::print_warning("No peaks detected");
        return;
    }

    let method = analysis.detection().map(|d| d.method.name()).unwrap_or("-");
    output::print_header(&format!("{} Detected Peaks ({})", peaks.len(), method));
    println!("{}", Table::new(peak_rows(analysis, peaks)));
}

fn print_filtered(analysis: &Analysis) -> Result<()> {
    let filtered = analysis.filtered_peaks()?;
    if filtered.is_empty() {
        output::print_info("No significant peaks were filtered out");
        return Ok(());
    }

    output::print_header(&format!("{} Filtered Candidates", filtered.len()));
    println!("{}", Table::new(peak_rows(analysis, &filtered)));
    Ok(())
}

fn print_ranking(analysis: &Analysis, top: usize) {
    let ranked = ranked_matches(analysis);
    let Some(best) = ranked.first() else {
        output::print_warning("No reference patterns matched");
        return;
    };

    let rows: Vec<MatchRow> = ranked
        .iter()
        .take(top.max(1))
        .enumerate()
        .map(|(i, m)| MatchRow {
            rank: i + 1,
            id: m.reference.id.clone(),
            name: m.reference.name.clone(),
            source: m.reference.source.to_string(),
            matched: format!("{}/{}", m.result.matched_count(), m.reference.peaks.len()),
            score: format!("{:.1}", m.result.score),
        })
        .collect();

    output::print_header(&format!(
        "Reference Ranking (tolerance {:.3}°)",
        best.tolerance
    ));
    println!("{}", Table::new(rows));

    if best.result.matched.is_empty() {
        return;
    }

    let pairs: Vec<PairRow> = best
        .result
        .matched
        .iter()
        .map(|m| PairRow {
            observed: format!("{:.3}", m.detected.two_theta),
            reference: format!("{:.3}", m.reference.two_theta),
            delta: format!("{:.3}", m.delta),
            intensity: format!("{:.1}", m.reference.intensity),
        })
        .collect();

    output::print_header(&format!("Best Match: {} ({})", best.reference.name, best.reference.id));
    println!("{}", Table::new(pairs));
}

/// 按扩展名写出结果
fn write_output(analysis: &Analysis, path: &Path, title: &str) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let peaks = analysis.peaks().unwrap_or_default();

    match ext.as_str() {
        "csv" => export::peaks_to_csv(peaks, path),
        "xy" => export::spectrum_to_xy(analysis.current(), title, path),
        "json" => export::to_json(&analysis.snapshot(), path),
        "png" | "svg" => {
            let best = ranked_matches(analysis).first().copied().map(|m| &m.reference);
            let options = PlotOptions {
                title: title.to_string(),
                use_svg: ext == "svg",
                ..PlotOptions::default()
            };
            export::plot_analysis(analysis.current(), peaks, best, path, &options)
        }
        _ => Err(XrdError::InvalidArgument(format!(
            "unsupported output extension '{}' (use .csv, .xy, .json, .png or .svg)",
            path.display()
        ))),
    }
}

/// 处理后的谱写为 CSV，扣除过背景时附带背景列
fn write_spectrum(analysis: &Analysis, path: &Path) -> Result<()> {
    let background = analysis.correction().map(|c| c.background.as_slice());
    export::spectrum_to_csv(analysis.current(), background, path)
}

/// 文件名（无文件名时用完整路径）
pub(super) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
