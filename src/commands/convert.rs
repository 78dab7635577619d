//! # convert 命令实现
//!
//! 读取任意支持的扫描格式，写出 CSV 或 XY。
//!
//! ## 依赖关系
//! - 使用 `cli/convert.rs` 定义的参数
//! - 使用 `parsers/` 读取，`export/` 写出

use crate::cli::convert::{ConvertArgs, ScanOutputFormat};
use crate::error::{Result, XrdError};
use crate::export;
use crate::parsers::{parse_scan_file, FileFormat};
use crate::utils::output;

/// 执行 convert 命令
pub fn execute(args: ConvertArgs) -> Result<()> {
    let target = match args.target.or_else(|| ScanOutputFormat::from_path(&args.output)) {
        Some(t) => t,
        None => {
            return Err(XrdError::InvalidArgument(format!(
                "cannot infer output format from '{}'; pass --target csv|xy",
                args.output.display()
            )))
        }
    };

    if args.output.exists() && !args.overwrite {
        output::print_skip(&format!(
            "'{}' exists (use --overwrite to replace it)",
            args.output.display()
        ));
        return Ok(());
    }

    let format: FileFormat = args.format.parse()?;
    let spectrum = parse_scan_file(&args.input, format)?;

    match target {
        ScanOutputFormat::Csv => export::spectrum_to_csv(&spectrum, None, &args.output)?,
        ScanOutputFormat::Xy => {
            let title = args
                .input
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            export::spectrum_to_xy(&spectrum, &title, &args.output)?
        }
    }

    output::print_written(
        &args.input.display().to_string(),
        &args.output.display().to_string(),
    );
    output::print_done(&format!("Converted {} points to {}", spectrum.len(), target));
    Ok(())
}
