//! # RAW 二进制格式解析器（结构恢复）
//!
//! RAW 文件没有固定的格式说明，只能通过启发式规则推断数据布局。
//! 布局识别策略按顺序尝试，第一个成功者胜出：
//!
//! 1. `count-prefix`: 扫描前 10000 字节中的 u32 计数字段，计数后紧跟数据
//! 2. `angle-header`: 在文件头中寻找起始角/终止角/步长 (f32)，推算点数并探测常见头长度
//! 3. `remainder`: 以 `file_size % 4` 作为头长度寻找计数，再依次尝试常见头长度
//! 4. `size-estimate`: 头长度取 `min(4096, file_size / 4)`，其余全部视为数据
//!
//! 强度为小端 f32；2θ 由起始角与步长线性生成。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 调用
//! - 使用 `models/spectrum.rs`

use crate::error::{Result, XrdError};
use crate::models::{linspace, Spectrum};

use std::fs;
use std::path::Path;

const FORMAT: &str = "RAW";

/// 探测数据合理性时读取的最大值个数
const PROBE_VALUES: usize = 100;

/// 强度上限（超过视为损坏数据）
const INTENSITY_LIMIT: f32 = 1e10;

/// RAW 布局识别配置
#[derive(Debug, Clone, PartialEq)]
pub struct RawLayoutConfig {
    /// 候选文件头长度（字节），按顺序尝试
    pub header_sizes: Vec<usize>,
    /// 数据点数下限
    pub min_count: usize,
    /// 数据点数上限
    pub max_count: usize,
    /// 头部扫描范围（字节）
    pub scan_limit: usize,
    /// 默认起始角（度）
    pub default_start: f64,
    /// 默认步长（度）
    pub default_step: f64,
}

impl Default for RawLayoutConfig {
    fn default() -> Self {
        Self {
            header_sizes: vec![3238, 2048, 4096, 1024, 512, 256, 128],
            min_count: 100,
            max_count: 100_000,
            scan_limit: 10_000,
            default_start: 5.0,
            default_step: 0.02,
        }
    }
}

impl RawLayoutConfig {
    fn count_in_range(&self, count: usize) -> bool {
        (self.min_count..=self.max_count).contains(&count)
    }
}

/// 布局识别策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStrategy {
    CountPrefix,
    AngleHeader,
    Remainder,
    SizeEstimate,
}

impl std::fmt::Display for LayoutStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutStrategy::CountPrefix => write!(f, "count-prefix"),
            LayoutStrategy::AngleHeader => write!(f, "angle-header"),
            LayoutStrategy::Remainder => write!(f, "remainder"),
            LayoutStrategy::SizeEstimate => write!(f, "size-estimate"),
        }
    }
}

/// 文件头中发现的扫描角度参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleHints {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

/// 识别出的数据布局
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLayout {
    /// 数据起始偏移（字节）
    pub offset: usize,
    /// 数据点数
    pub count: usize,
    pub strategy: LayoutStrategy,
    pub hints: Option<AngleHints>,
}

impl std::fmt::Display for RawLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "offset={} count={} strategy={}",
            self.offset, self.count, self.strategy
        )
    }
}

type StrategyFn = fn(&[u8], &RawLayoutConfig) -> Option<RawLayout>;

/// 按优先级排列的策略链
const STRATEGIES: [StrategyFn; 4] = [count_prefix, angle_header, remainder_header, size_estimate];

/// 解析 RAW 文件
pub fn parse_raw_file(path: &Path, config: &RawLayoutConfig) -> Result<Spectrum> {
    let bytes = fs::read(path).map_err(|e| XrdError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_raw_bytes(&bytes, &path.display().to_string(), config)
}

/// 从字节缓冲解析 RAW 数据
pub fn parse_raw_bytes(bytes: &[u8], source: &str, config: &RawLayoutConfig) -> Result<Spectrum> {
    let layout = recover_layout(bytes, config).ok_or_else(|| XrdError::FormatError {
        format: FORMAT.to_string(),
        path: source.to_string(),
        reason: "RAW file too small or invalid structure".to_string(),
        layout: Some(format!(
            "no strategy matched (file size {} bytes)",
            bytes.len()
        )),
    })?;

    tracing::debug!(source, %layout, "recovered RAW layout");

    let end = layout.offset + layout.count * 4;
    if end > bytes.len() {
        return Err(XrdError::FormatError {
            format: FORMAT.to_string(),
            path: source.to_string(),
            reason: format!("data section exceeds file size {}", bytes.len()),
            layout: Some(layout.to_string()),
        });
    }

    // 仅剔除明显损坏的值，负值保留
    let intensity: Vec<f64> = read_f32s(bytes, layout.offset, layout.count)
        .filter(|v| v.is_finite() && *v < INTENSITY_LIMIT)
        .map(f64::from)
        .collect();

    if intensity.is_empty() {
        return Err(XrdError::FormatError {
            format: FORMAT.to_string(),
            path: source.to_string(),
            reason: "No valid data found in RAW file".to_string(),
            layout: Some(layout.to_string()),
        });
    }

    // 计数前缀布局不带角度信息；其余策略沿用文件头中扫描到的角度
    let hints = match layout.strategy {
        LayoutStrategy::CountPrefix => None,
        _ => layout.hints.or_else(|| scan_angle_hints(bytes, config)),
    };
    let axis = synthesize_axis(intensity.len(), hints, config);

    let mut spectrum = Spectrum::new(axis.two_theta, intensity)?;
    spectrum.insert_meta("file_type", FORMAT);
    spectrum.insert_meta("file_path", source);
    spectrum.insert_meta("data_offset", layout.offset);
    spectrum.insert_meta("data_count", spectrum.len());
    spectrum.insert_meta("start_angle", axis.start);
    spectrum.insert_meta("end_angle", axis.end);
    spectrum.insert_meta("step", axis.step);
    spectrum.insert_meta("strategy", layout.strategy.to_string());
    Ok(spectrum)
}

/// 依次尝试各策略，返回第一个成功的布局
pub fn recover_layout(bytes: &[u8], config: &RawLayoutConfig) -> Option<RawLayout> {
    STRATEGIES.iter().find_map(|strategy| strategy(bytes, config))
}

// ─────────────────────────────────────────────────────────────
// 布局识别策略
// ─────────────────────────────────────────────────────────────

/// 策略 1: u32 计数字段 + 紧随其后的数据
pub fn count_prefix(bytes: &[u8], config: &RawLayoutConfig) -> Option<RawLayout> {
    let size = bytes.len();

    for offset in scan_offsets(size, config) {
        let count = read_u32(bytes, offset)? as usize;
        if !config.count_in_range(count) {
            continue;
        }

        let data_end = offset + 4 + count * 4;
        let exact_fit = data_end == size;
        let probed =
            offset >= 100 && data_end <= size && looks_like_intensities(bytes, offset + 4, count);

        if exact_fit || probed {
            return Some(RawLayout {
                offset: offset + 4,
                count,
                strategy: LayoutStrategy::CountPrefix,
                hints: None,
            });
        }
    }

    None
}

/// 策略 2: 由文件头中的起止角与步长推算点数，再探测头长度
pub fn angle_header(bytes: &[u8], config: &RawLayoutConfig) -> Option<RawLayout> {
    let hints = scan_angle_hints(bytes, config)?;

    let span = ((hints.end - hints.start) / hints.step).round();
    if span < 0.0 {
        return None;
    }
    let count = span as usize + 1;

    config
        .header_sizes
        .iter()
        .copied()
        .find(|&header| {
            header + count * 4 <= bytes.len() && looks_like_intensities(bytes, header, count)
        })
        .map(|header| RawLayout {
            offset: header,
            count,
            strategy: LayoutStrategy::AngleHeader,
            hints: Some(hints),
        })
}

/// 策略 3: 余数头长度处的计数字段，或常见头长度 + 剩余数据
pub fn remainder_header(bytes: &[u8], config: &RawLayoutConfig) -> Option<RawLayout> {
    let size = bytes.len();
    let remainder = size % 4;

    if remainder > 0 {
        if let Some(count) = read_u32(bytes, remainder).map(|c| c as usize) {
            if config.count_in_range(count) && remainder + 4 + count * 4 == size {
                return Some(RawLayout {
                    offset: remainder + 4,
                    count,
                    strategy: LayoutStrategy::Remainder,
                    hints: None,
                });
            }
        }
    }

    config.header_sizes.iter().copied().find_map(|header| {
        if header > size {
            return None;
        }
        let count = (size - header) / 4;
        (config.count_in_range(count) && looks_like_intensities(bytes, header, count)).then_some(
            RawLayout {
                offset: header,
                count,
                strategy: LayoutStrategy::Remainder,
                hints: None,
            },
        )
    })
}

/// 策略 4: 按文件大小估计头长度
pub fn size_estimate(bytes: &[u8], config: &RawLayoutConfig) -> Option<RawLayout> {
    let size = bytes.len();
    let header = 4096.min(size / 4);
    let count = (size - header) / 4;

    (count >= config.min_count).then_some(RawLayout {
        offset: header,
        count,
        strategy: LayoutStrategy::SizeEstimate,
        hints: None,
    })
}

/// 在文件头中寻找第一个落在各自区间内的 f32：
/// 起始角 [4, 10]，终止角 [80, 100]，步长 [0.01, 0.1]
pub fn scan_angle_hints(bytes: &[u8], config: &RawLayoutConfig) -> Option<AngleHints> {
    let mut start = None;
    let mut end = None;
    let mut step = None;

    for offset in scan_offsets(bytes.len(), config) {
        let Some(value) = read_f32(bytes, offset).map(f64::from) else {
            continue;
        };
        if start.is_none() && (4.0..=10.0).contains(&value) {
            start = Some(value);
        }
        if end.is_none() && (80.0..=100.0).contains(&value) {
            end = Some(value);
        }
        if step.is_none() && (0.01..=0.1).contains(&value) {
            step = Some(value);
        }
    }

    Some(AngleHints {
        start: start?,
        end: end?,
        step: step?,
    })
}

// ─────────────────────────────────────────────────────────────
// 角度轴生成
// ─────────────────────────────────────────────────────────────

/// 生成的 2θ 轴
#[derive(Debug, Clone, PartialEq)]
pub struct AngleAxis {
    pub two_theta: Vec<f64>,
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

/// 由点数和文件头角度生成 2θ 轴
///
/// 文件头终止角仅在自洽时采用（推算点数误差 ≤ 1、位于 [5°, 120°]、
/// 与步长推算的终止角相差 < 5°）；否则由点数和步长重新推算，
/// 若结果超过 120° 且起始角在 [4°, 6°]，按 5°–90° 标准扫描重推步长。
pub fn synthesize_axis(count: usize, hints: Option<AngleHints>, config: &RawLayoutConfig) -> AngleAxis {
    let start = hints.map_or(config.default_start, |h| h.start);
    let mut step = hints.map_or(config.default_step, |h| h.step);
    let intervals = count.saturating_sub(1) as f64;
    let calculated_end = start + intervals * step;

    let header_end = hints.map(|h| h.end).filter(|&end| {
        let expected = ((end - start) / step).round() + 1.0;
        (expected - count as f64).abs() <= 1.0
            && (5.0..=120.0).contains(&end)
            && (calculated_end - end).abs() < 5.0
    });

    let end = match header_end {
        Some(end) => end,
        None if calculated_end > 120.0 && (4.0..=6.0).contains(&start) && count > 1 => {
            let inferred_step = (90.0 - start) / intervals;
            if (0.005..=0.1).contains(&inferred_step) {
                step = inferred_step;
                90.0
            } else {
                calculated_end.min(120.0)
            }
        }
        None => calculated_end.min(120.0),
    };

    AngleAxis {
        two_theta: linspace(start, end, count),
        start,
        end,
        step,
    }
}

// ─────────────────────────────────────────────────────────────
// 字节读取
// ─────────────────────────────────────────────────────────────

fn scan_offsets(size: usize, config: &RawLayoutConfig) -> impl Iterator<Item = usize> {
    (0..config.scan_limit.min(size.saturating_sub(4))).step_by(4)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let chunk = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

fn read_f32(bytes: &[u8], offset: usize) -> Option<f32> {
    read_u32(bytes, offset).map(f32::from_bits)
}

fn read_f32s(bytes: &[u8], offset: usize, count: usize) -> impl Iterator<Item = f32> + '_ {
    let end = (offset + count * 4).min(bytes.len());
    bytes[offset.min(end)..end]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

/// 数据区开头是否像强度值：至少一个正值，全部有限且 < 1e10
fn looks_like_intensities(bytes: &[u8], offset: usize, count: usize) -> bool {
    let probe: Vec<f32> = read_f32s(bytes, offset, count.min(PROBE_VALUES)).collect();
    !probe.is_empty()
        && probe.iter().any(|v| *v > 0.0)
        && probe.iter().all(|v| v.is_finite() && *v < INTENSITY_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::spectrum::MetaValue;
    use approx::assert_abs_diff_eq;

    fn push_f32s(buf: &mut Vec<u8>, values: &[f32]) {
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn put_f32(buf: &mut [u8], offset: usize, value: f32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn test_count_prefixed_buffer_parses_exactly() {
        let values: Vec<f32> = (0..500).map(|i| 10.0 + i as f32 * 1.5).collect();
        let mut buf = Vec::new();
        buf.extend_from_slice(&500u32.to_le_bytes());
        push_f32s(&mut buf, &values);

        let spectrum = parse_raw_bytes(&buf, "mem.raw", &RawLayoutConfig::default()).unwrap();
        assert_eq!(spectrum.len(), 500);
        for (got, want) in spectrum.intensity().iter().zip(&values) {
            assert_eq!(*got, f64::from(*want));
        }
        assert_eq!(spectrum.two_theta()[0], 5.0);
        assert_abs_diff_eq!(spectrum.two_theta()[499], 5.0 + 499.0 * 0.02, epsilon = 1e-9);
        assert_eq!(
            spectrum.metadata().get("strategy"),
            Some(&MetaValue::Text("count-prefix".to_string()))
        );
    }

    #[test]
    fn test_corrupt_values_dropped_negatives_kept() {
        let mut values: Vec<f32> = (0..300).map(|i| 50.0 + i as f32).collect();
        values[10] = f32::NAN;
        values[20] = 5e12;
        values[30] = -4.0;
        let mut buf = Vec::new();
        buf.extend_from_slice(&300u32.to_le_bytes());
        push_f32s(&mut buf, &values);

        let spectrum = parse_raw_bytes(&buf, "mem.raw", &RawLayoutConfig::default()).unwrap();
        assert_eq!(spectrum.len(), 298);
        assert!(spectrum.intensity().contains(&-4.0));
    }

    #[test]
    fn test_angle_header_layout_uses_header_angles() {
        let count = 4251;
        let mut buf = vec![0u8; 3238];
        put_f32(&mut buf, 100, 5.0);
        put_f32(&mut buf, 104, 90.0);
        put_f32(&mut buf, 108, 0.02);
        push_f32s(&mut buf, &vec![1000.0; count]);

        let config = RawLayoutConfig::default();
        assert_eq!(count_prefix(&buf, &config), None);

        let layout = recover_layout(&buf, &config).unwrap();
        assert_eq!(layout.strategy, LayoutStrategy::AngleHeader);
        assert_eq!(layout.offset, 3238);
        assert_eq!(layout.count, count);

        let spectrum = parse_raw_bytes(&buf, "mem.raw", &config).unwrap();
        assert_eq!(spectrum.len(), count);
        assert_abs_diff_eq!(spectrum.two_theta()[0], 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(spectrum.two_theta()[count - 1], 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_remainder_strategy_finds_count_after_odd_header() {
        let mut buf = vec![0xAB, 0xCD];
        buf.extend_from_slice(&150u32.to_le_bytes());
        push_f32s(&mut buf, &vec![1000.0; 150]);

        let config = RawLayoutConfig::default();
        let layout = remainder_header(&buf, &config).unwrap();
        assert_eq!(layout.offset, 6);
        assert_eq!(layout.count, 150);
        assert_eq!(
            recover_layout(&buf, &config).map(|l| l.strategy),
            Some(LayoutStrategy::Remainder)
        );
    }

    #[test]
    fn test_size_estimate_rejects_tiny_file() {
        let buf = vec![0u8; 200];
        let config = RawLayoutConfig::default();
        assert_eq!(size_estimate(&buf, &config), None);

        let err = parse_raw_bytes(&buf, "tiny.raw", &config).unwrap_err();
        match err {
            XrdError::FormatError { layout, .. } => assert!(layout.is_some()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_header_table() {
        let count = 200;
        let mut buf = vec![0u8; 600];
        push_f32s(&mut buf, &vec![250.0; count]);

        let default_cfg = RawLayoutConfig::default();
        let layout = recover_layout(&buf, &default_cfg).unwrap();
        assert_ne!(layout.offset, 600);

        let custom = RawLayoutConfig {
            header_sizes: vec![600],
            ..RawLayoutConfig::default()
        };
        let layout = remainder_header(&buf, &custom).unwrap();
        assert_eq!(layout.offset, 600);
        assert_eq!(layout.count, count);
    }

    #[test]
    fn test_axis_reinfers_step_for_standard_scan() {
        // 4251 点，默认步长 0.02 可得 90°；若步长错误为 0.05 则推算超过 120°
        let hints = AngleHints {
            start: 5.0,
            end: 95.0,
            step: 0.05,
        };
        let axis = synthesize_axis(4251, Some(hints), &RawLayoutConfig::default());
        assert_eq!(axis.end, 90.0);
        assert_abs_diff_eq!(axis.step, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_axis_caps_end_at_120() {
        let hints = AngleHints {
            start: 8.0,
            end: 85.0,
            step: 0.05,
        };
        let axis = synthesize_axis(5000, Some(hints), &RawLayoutConfig::default());
        assert_eq!(axis.end, 120.0);
        assert_eq!(axis.two_theta.len(), 5000);
    }
}
