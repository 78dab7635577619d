//! # batch 命令实现
//!
//! 对目录内的扫描文件并行执行相同的处理流程，
//! 每个文件写出一个 `<stem>_peaks.csv`。单个文件失败不影响其他文件。
//!
//! ## 依赖关系
//! - 使用 `cli/batch.rs` 定义的参数
//! - 使用 `batch/` 收集文件与并行执行
//! - 使用 `commands/settings.rs` 执行流程

use super::analyze::file_label;
use super::settings::Settings;
use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::batch::BatchArgs;
use crate::error::{Result, XrdError};
use crate::export;
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

/// 失败详情最多列出的条数
const MAX_LISTED_FAILURES: usize = 10;

/// 执行 batch 命令
pub fn execute(args: BatchArgs) -> Result<()> {
    output::print_header("XRD Batch Peak Detection");

    let settings = Settings::from_args(&args.processing)?;

    let files = FileCollector::new(&args.input)
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect()?;

    if files.is_empty() {
        output::print_warning(&format!(
            "No scan files matched '{}' in '{}'",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    output::print_info(&format!("Found {} scan files", files.len()));
    output::print_info(&format!("Pipeline: {}", settings.describe()));

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir).map_err(|e| XrdError::FileWriteError {
            path: dir.display().to_string(),
            source: e,
        })?;
    }

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!("Using {} worker threads", runner.jobs()));

    let result = runner.run(&files, |file| {
        process_file(file, &settings, args.output_dir.as_deref(), args.overwrite)
    })?;

    if !result.analyzed.is_empty() {
        output::print_header("Peaks per File");
        for (path, peaks) in &result.analyzed {
            output::print_field(&file_label(path), peaks);
        }
    }
    for path in &result.skipped_files {
        output::print_skip(&format!(
            "{} (output exists, use --overwrite)",
            path.display()
        ));
    }

    output::print_done(&format!(
        "Batch complete: {} files, {} analyzed ({} peaks), {} skipped, {} failed",
        result.total(),
        result.success,
        result.total_peaks,
        result.skipped,
        result.failed
    ));

    if !result.failures.is_empty() {
        output::print_warning("Failed files:");
        for (path, err) in result.failures.iter().take(MAX_LISTED_FAILURES) {
            output::print_error(&format!("  {}: {}", path.display(), err));
        }
        if result.failures.len() > MAX_LISTED_FAILURES {
            output::print_warning(&format!(
                "  ... and {} more",
                result.failures.len() - MAX_LISTED_FAILURES
            ));
        }
    }

    Ok(())
}

/// `<stem>_peaks.csv`，位于输出目录或扫描文件旁
fn peaks_path(file: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "scan".to_string());
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| file.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{}_peaks.csv", stem))
}

fn process_file(
    file: &Path,
    settings: &Settings,
    output_dir: Option<&Path>,
    overwrite: bool,
) -> ProcessResult {
    let out = peaks_path(file, output_dir);
    if out.exists() && !overwrite {
        return ProcessResult::Skipped {
            file: file.to_path_buf(),
        };
    }

    let outcome = settings.run(file).and_then(|analysis| {
        let peaks = analysis.peaks().unwrap_or_default();
        export::peaks_to_csv(peaks, &out)?;
        Ok(peaks.len())
    });

    match outcome {
        Ok(peaks) => ProcessResult::Success {
            file: file.to_path_buf(),
            peaks,
        },
        Err(e) => {
            tracing::warn!(path = %file.display(), error = %e, "scan failed");
            ProcessResult::Failed {
                file: file.to_path_buf(),
                error: e.to_string(),
            }
        }
    }
}
