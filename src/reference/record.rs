//! # 参考图谱记录解析
//!
//! 从 JSON 记录构建 `ReferencePattern`，支持两种结构：
//!
//! | 结构 | 判定键 | 峰格式 | 强度 |
//! |------|--------|--------|------|
//! | MP   | `pattern` | `[amplitude, hkl, two_theta, d_spacing]` | 归一化到最大值 100 |
//! | ICDD | `peaks` | `{d_spacing, two_theta, intensity, hkl}` | 原样 |
//!
//! 两个键都没有的记录得到零峰图谱（不是错误）。
//!
//! ## 依赖关系
//! - 被 `reference/database.rs` 调用
//! - 使用 `serde_json::Value` 读取松散结构

use crate::error::{Result, XrdError};
use crate::models::{ReferencePattern, ReferencePeak, ReferenceSource};

use serde_json::Value;

/// 记录未给出波长时使用 Cu Kα1
pub const DEFAULT_WAVELENGTH: f64 = 1.54056;

/// 解析一个 JSON 文件的内容（单条记录或记录数组）
///
/// `file_stem` 用于补全缺失的 id/name。
pub fn parse_records(content: &str, path: &str, file_stem: &str) -> Result<Vec<ReferencePattern>> {
    let value: Value = serde_json::from_str(content).map_err(|e| XrdError::JsonError {
        path: path.to_string(),
        source: e,
    })?;

    match value {
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| pattern_from_value(item, file_stem))
            .collect()),
        other => Ok(vec![pattern_from_value(&other, file_stem)]),
    }
}

/// 从单条记录构建图谱
pub fn pattern_from_value(value: &Value, file_stem: &str) -> ReferencePattern {
    let wavelength = extract_wavelength(value);

    let (source, peaks) = if let Some(pattern) = value.get("pattern") {
        (ReferenceSource::Mp, mp_peaks(pattern))
    } else if let Some(peaks) = value.get("peaks") {
        (ReferenceSource::Icdd, icdd_peaks(peaks, wavelength))
    } else {
        (ReferenceSource::Unknown, Vec::new())
    };

    let (id, name) = resolve_identity(value, file_stem);

    ReferencePattern {
        id,
        name,
        source,
        wavelength: Some(wavelength),
        peaks,
    }
}

/// id/name 补全
///
/// 只缺一个时互相复制；都缺时用 `mp-XXXX_...` 文件名的前缀或文件名本身。
fn resolve_identity(value: &Value, file_stem: &str) -> (String, String) {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match (text("id"), text("name")) {
        (Some(id), Some(name)) => (id, name),
        (Some(id), None) => (id.clone(), id),
        (None, Some(name)) => (name.clone(), name),
        (None, None) => {
            let fallback = if file_stem.starts_with("mp-") {
                file_stem.split('_').next().unwrap_or(file_stem)
            } else {
                file_stem
            };
            (fallback.to_string(), fallback.to_string())
        }
    }
}

/// 波长：数值或 `{in_angstroms}` 对象
fn extract_wavelength(value: &Value) -> f64 {
    match value.get("wavelength") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::Object(obj)) => obj.get("in_angstroms").and_then(Value::as_f64),
        _ => None,
    }
    .filter(|w| *w > 0.0)
    .unwrap_or(DEFAULT_WAVELENGTH)
}

/// MP 峰：不足 4 项或数值缺失的条目被跳过
fn mp_peaks(pattern: &Value) -> Vec<ReferencePeak> {
    let Some(entries) = pattern.as_array() else {
        return Vec::new();
    };

    let mut peaks: Vec<ReferencePeak> = entries
        .iter()
        .filter_map(Value::as_array)
        .filter(|entry| entry.len() >= 4)
        .filter_map(|entry| {
            Some(ReferencePeak {
                intensity: entry[0].as_f64()?,
                hkl: hkl_text(&entry[1]),
                two_theta: entry[2].as_f64()?,
                d_spacing: entry[3].as_f64(),
            })
        })
        .collect();

    let max = peaks.iter().map(|p| p.intensity).fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        for peak in &mut peaks {
            peak.intensity = peak.intensity / max * 100.0;
        }
    }
    peaks
}

/// ICDD 峰：缺 2θ 时由 d 间距按 Bragg 定律计算，无法计算时记为 0
fn icdd_peaks(peaks: &Value, wavelength: f64) -> Vec<ReferencePeak> {
    let Some(entries) = peaks.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| entry.is_object())
        .map(|entry| {
            let d_spacing = entry.get("d_spacing").and_then(Value::as_f64).unwrap_or(0.0);
            let two_theta = entry
                .get("two_theta")
                .and_then(Value::as_f64)
                .unwrap_or_else(|| bragg_two_theta(d_spacing, wavelength).unwrap_or(0.0));

            ReferencePeak {
                two_theta,
                intensity: entry.get("intensity").and_then(Value::as_f64).unwrap_or(0.0),
                d_spacing: Some(d_spacing),
                hkl: entry.get("hkl").and_then(hkl_text),
            }
        })
        .collect()
}

/// 2θ = 2·asin(λ / 2d)
pub fn bragg_two_theta(d_spacing: f64, wavelength: f64) -> Option<f64> {
    if d_spacing <= 0.0 {
        return None;
    }
    let s = wavelength / (2.0 * d_spacing);
    (s <= 1.0).then(|| 2.0 * s.asin().to_degrees())
}

/// hkl 文本化：字符串原样，整数列表以空格连接，`{hkl: [...]}` 列表以逗号连接
fn hkl_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) if items.iter().all(Value::is_number) => Some(join_indices(items)),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(obj) => obj
                        .get("hkl")
                        .and_then(Value::as_array)
                        .map(|indices| join_indices(indices)),
                    other => hkl_text(other),
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn join_indices(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
