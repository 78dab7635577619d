//! # 数据导出
//!
//! ## 支持格式
//! - CSV: 谱（2θ, 强度, 可选背景）或峰表
//! - XY: 两列文本，`#` 开头的注释头
//! - JSON: 任意可序列化记录（会话快照、匹配结果）
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `csv` 写 CSV，`serde_json` 写 JSON

use crate::error::{Result, XrdError};
use crate::models::{DetectedPeak, Spectrum};

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> XrdError + '_ {
    move |e| XrdError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    }
}

/// 导出谱为 CSV；给出背景时追加 background 列
pub fn spectrum_to_csv(spectrum: &Spectrum, background: Option<&[f64]>, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    match background {
        Some(_) => wtr.write_record(["2theta", "intensity", "background"])?,
        None => wtr.write_record(["2theta", "intensity"])?,
    }

    for (i, (two_theta, intensity)) in spectrum.points().enumerate() {
        let mut record = vec![format!("{:.4}", two_theta), format!("{:.4}", intensity)];
        if let Some(bg) = background.and_then(|b| b.get(i)) {
            record.push(format!("{:.4}", bg));
        }
        wtr.write_record(&record)?;
    }

    wtr.flush().map_err(write_error(path))?;
    Ok(())
}

/// 导出谱为 XY
pub fn spectrum_to_xy(spectrum: &Spectrum, title: &str, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(write_error(path))?;
    let mut out = BufWriter::new(file);

    let mut body = || -> std::io::Result<()> {
        writeln!(out, "# XRD scan: {}", title)?;
        if let Some(wl) = spectrum.wavelength() {
            writeln!(out, "# Wavelength: {:.6} Angstrom", wl)?;
        }
        writeln!(out, "# Columns: 2theta (degrees), Intensity")?;
        for (two_theta, intensity) in spectrum.points() {
            writeln!(out, "{:.4}\t{:.4}", two_theta, intensity)?;
        }
        out.flush()
    };

    body().map_err(write_error(path))
}

/// 导出峰表为 CSV
pub fn peaks_to_csv(peaks: &[DetectedPeak], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "2theta",
        "intensity",
        "index",
        "prominence",
        "width_points",
        "fwhm_degrees",
    ])?;

    let optional = |v: Option<f64>| v.map(|x| format!("{:.4}", x)).unwrap_or_default();

    for peak in peaks {
        wtr.write_record([
            format!("{:.4}", peak.two_theta),
            format!("{:.4}", peak.intensity),
            peak.index.to_string(),
            optional(peak.prominence),
            optional(peak.width_points),
            optional(peak.fwhm_degrees),
        ])?;
    }

    wtr.flush().map_err(write_error(path))?;
    Ok(())
}

/// 导出为格式化 JSON
pub fn to_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(write_error(path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|e| XrdError::JsonError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{parse_scan_file, FileFormat};

    fn spectrum() -> Spectrum {
        Spectrum::new(vec![10.0, 10.02, 10.04], vec![100.0, 250.5, 90.25])
            .unwrap()
            .with_wavelength(Some(1.5406))
    }

    #[test]
    fn test_xy_export_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.xy");
        spectrum_to_xy(&spectrum(), "quartz", &path).unwrap();

        let back = parse_scan_file(&path, FileFormat::Dat).unwrap();
        assert_eq!(back.two_theta(), spectrum().two_theta());
        assert_eq!(back.intensity(), spectrum().intensity());
    }

    #[test]
    fn test_spectrum_csv_with_background() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.csv");
        spectrum_to_csv(&spectrum(), Some(&[1.0, 2.0, 3.0]), &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.len(), 3);
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][2], "2.0000");
    }

    #[test]
    fn test_peaks_csv_blank_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.csv");
        let peaks = vec![DetectedPeak::bare(28.44, 1000.0, 42)];
        peaks_to_csv(&peaks, &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let row = rdr.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "28.4400");
        assert_eq!(&row[2], "42");
        assert_eq!(&row[5], "");
    }

    #[test]
    fn test_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.json");
        to_json(&vec![DetectedPeak::bare(28.44, 1000.0, 42)], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Vec<DetectedPeak> = serde_json::from_str(&text).unwrap();
        assert_eq!(back[0].index, 42);
    }
}
