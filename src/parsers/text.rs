//! # 分隔文本格式解析器 (DAT / ASC / TXT)
//!
//! 三种格式仅在分隔符集合与注释/表头处理上不同：
//!
//! | 格式 | 分隔符 | `#` 注释 | 表头检测 |
//! |------|--------|----------|----------|
//! | DAT  | 空白, `,` | 跳过 | 否 |
//! | ASC  | 空白, `,`, `;` | 不跳过 | 否 |
//! | TXT  | 空白, `,`, `;`, `|` | 跳过 | 前 10 行 |
//!
//! 每行取前两个字段作为 2θ 与强度，无法解析的行被跳过并计数。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 调用
//! - 使用 `regex` 切分字段

use crate::error::{Result, XrdError};
use crate::models::Spectrum;

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static DAT_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s,]+").unwrap());
static ASC_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s,;]+").unwrap());
static TXT_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s,;|]+").unwrap());

/// 以数字对开头的数据行
static DATA_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\d.]+\s+[\d.]").unwrap());

/// 表头检测扫描的行数
const HEADER_SCAN_LINES: usize = 10;

/// 分隔文本格式变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextVariant {
    Dat,
    Asc,
    Txt,
}

impl TextVariant {
    /// 格式名称（写入元数据）
    pub fn label(&self) -> &'static str {
        match self {
            TextVariant::Dat => "DAT",
            TextVariant::Asc => "ASC",
            TextVariant::Txt => "TXT",
        }
    }

    fn splitter(&self) -> &'static Regex {
        match self {
            TextVariant::Dat => &DAT_SPLIT,
            TextVariant::Asc => &ASC_SPLIT,
            TextVariant::Txt => &TXT_SPLIT,
        }
    }

    fn skips_comments(&self) -> bool {
        matches!(self, TextVariant::Dat | TextVariant::Txt)
    }

    fn detects_header(&self) -> bool {
        matches!(self, TextVariant::Txt)
    }
}

/// 解析分隔文本文件
pub fn parse_text_file(path: &Path, variant: TextVariant) -> Result<Spectrum> {
    let bytes = fs::read(path).map_err(|e| XrdError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let content = String::from_utf8_lossy(&bytes);

    parse_text_content(&content, variant, &path.display().to_string())
}

/// 从字符串内容解析分隔文本
pub fn parse_text_content(content: &str, variant: TextVariant, source: &str) -> Result<Spectrum> {
    let lines: Vec<&str> = content.lines().collect();

    let start = if variant.detects_header() {
        lines
            .iter()
            .take(HEADER_SCAN_LINES)
            .position(|line| DATA_LINE.is_match(line))
            .unwrap_or(0)
    } else {
        0
    };

    let mut two_theta = Vec::new();
    let mut intensity = Vec::new();
    let mut skipped = 0usize;

    for line in &lines[start..] {
        let line = line.trim();
        if line.is_empty() || (variant.skips_comments() && line.starts_with('#')) {
            continue;
        }

        match parse_pair(line, variant.splitter()) {
            Some((x, y)) => {
                two_theta.push(x);
                intensity.push(y);
            }
            None => skipped += 1,
        }
    }

    if two_theta.is_empty() {
        return Err(XrdError::format(
            variant.label(),
            source,
            format!("No valid data found ({} lines rejected)", skipped),
        ));
    }

    if skipped > 0 {
        tracing::debug!(source, skipped, "skipped non-numeric lines");
    }

    let mut spectrum = Spectrum::new(two_theta, intensity)?;
    spectrum.insert_meta("file_type", variant.label());
    spectrum.insert_meta("file_path", source);
    spectrum.insert_meta("skipped_lines", skipped);
    Ok(spectrum)
}

/// 解析一行的前两个字段
fn parse_pair(line: &str, splitter: &Regex) -> Option<(f64, f64)> {
    let mut parts = splitter.split(line);
    let x = parts.next()?.parse::<f64>().ok()?;
    let y = parts.next()?.parse::<f64>().ok()?;
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn write_with(delimiter: &str, angles: &[f64], counts: &[f64]) -> String {
        angles
            .iter()
            .zip(counts)
            .map(|(a, c)| format!("{:.12}{}{:.12}", a, delimiter, c))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_round_trip_with_each_delimiter() {
        let angles: Vec<f64> = (0..200).map(|i| 10.0 + i as f64 * 0.02).collect();
        let counts: Vec<f64> = (0..200).map(|i| 100.0 + (i as f64 * 0.3).sin() * 40.0).collect();

        let cases = [
            (TextVariant::Dat, " "),
            (TextVariant::Dat, ","),
            (TextVariant::Dat, "\t"),
            (TextVariant::Asc, ";"),
            (TextVariant::Asc, ", "),
            (TextVariant::Txt, "|"),
            (TextVariant::Txt, "  "),
        ];

        for (variant, delimiter) in cases {
            let content = write_with(delimiter, &angles, &counts);
            let spectrum = parse_text_content(&content, variant, "mem").unwrap();
            assert_eq!(spectrum.len(), angles.len());
            for (a, b) in spectrum.two_theta().iter().zip(&angles) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
            for (a, b) in spectrum.intensity().iter().zip(&counts) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_dat_skips_comments_and_counts_bad_lines() {
        let content = "# header\n10.0 5\nangle intensity\n\n10.02 6\n";
        let spectrum = parse_text_content(content, TextVariant::Dat, "mem").unwrap();
        assert_eq!(spectrum.len(), 2);
        assert_eq!(
            spectrum.metadata().get("skipped_lines"),
            Some(&crate::models::spectrum::MetaValue::Integer(1))
        );
    }

    #[test]
    fn test_txt_header_detection_skips_preamble() {
        let content = "Sample: quartz\nOperator 7 2\n5.00 120\n5.02 130\n";
        let spectrum = parse_text_content(content, TextVariant::Txt, "mem").unwrap();
        // "Operator 7 2" 不以数字开头，数据从第三行开始
        assert_eq!(spectrum.two_theta(), &[5.0, 5.02]);
    }

    #[test]
    fn test_asc_accepts_semicolons() {
        let content = "20.0;1000\n20.1;1100\n";
        let spectrum = parse_text_content(content, TextVariant::Asc, "mem").unwrap();
        assert_eq!(spectrum.intensity(), &[1000.0, 1100.0]);
    }

    #[test]
    fn test_no_numeric_pairs_is_format_error() {
        let err = parse_text_content("a b\nc d\n", TextVariant::Txt, "bad.txt").unwrap_err();
        assert!(matches!(err, XrdError::FormatError { .. }));
    }
}
