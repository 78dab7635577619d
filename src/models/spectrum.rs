//! # XRD 扫描谱数据模型
//!
//! 统一的 (2θ, 强度) 序列表示，所有解析器输出此结构，下游各处理步骤
//! 均返回新的 `Spectrum`，不修改原始数据。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `processing/`, `pipeline.rs` 使用
//! - 无外部模块依赖

use crate::error::{Result, XrdError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 元数据值（标量或字符串）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Integer(i64),
    Number(f64),
    Text(String),
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaValue::Integer(v) => write!(f, "{}", v),
            MetaValue::Number(v) => write!(f, "{}", v),
            MetaValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Number(v)
    }
}

impl From<usize> for MetaValue {
    fn from(v: usize) -> Self {
        MetaValue::Integer(v as i64)
    }
}

/// XRD 扫描谱
///
/// 2θ 与强度数组长度始终相等，且至少包含一个点。反序列化同样经过
/// `Spectrum::new` 的检查。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpectrumRecord")]
pub struct Spectrum {
    two_theta: Vec<f64>,
    intensity: Vec<f64>,
    /// 波长（Å）
    wavelength: Option<f64>,
    metadata: BTreeMap<String, MetaValue>,
}

/// 未经检查的序列化形式
#[derive(Deserialize)]
struct SpectrumRecord {
    two_theta: Vec<f64>,
    intensity: Vec<f64>,
    wavelength: Option<f64>,
    #[serde(default)]
    metadata: BTreeMap<String, MetaValue>,
}

impl TryFrom<SpectrumRecord> for Spectrum {
    type Error = XrdError;

    fn try_from(record: SpectrumRecord) -> Result<Self> {
        let mut spectrum = Spectrum::new(record.two_theta, record.intensity)?
            .with_wavelength(record.wavelength);
        spectrum.metadata = record.metadata;
        Ok(spectrum)
    }
}

impl Spectrum {
    /// 由 2θ 和强度数组创建谱
    pub fn new(two_theta: Vec<f64>, intensity: Vec<f64>) -> Result<Self> {
        if two_theta.len() != intensity.len() {
            return Err(XrdError::InvalidArgument(format!(
                "angle and intensity lengths differ ({} vs {})",
                two_theta.len(),
                intensity.len()
            )));
        }
        if two_theta.is_empty() {
            return Err(XrdError::InvalidArgument(
                "spectrum must contain at least one point".to_string(),
            ));
        }
        Ok(Self {
            two_theta,
            intensity,
            wavelength: None,
            metadata: BTreeMap::new(),
        })
    }

    /// 设置波长
    pub fn with_wavelength(mut self, wavelength: Option<f64>) -> Self {
        self.wavelength = wavelength;
        self
    }

    /// 以新的强度数组派生一个谱（2θ、波长、元数据均复制）
    pub fn with_intensity(&self, intensity: Vec<f64>) -> Result<Self> {
        if intensity.len() != self.two_theta.len() {
            return Err(XrdError::InvalidArgument(format!(
                "derived intensity has {} points, spectrum has {}",
                intensity.len(),
                self.two_theta.len()
            )));
        }
        Ok(Self {
            two_theta: self.two_theta.clone(),
            intensity,
            wavelength: self.wavelength,
            metadata: self.metadata.clone(),
        })
    }

    pub fn two_theta(&self) -> &[f64] {
        &self.two_theta
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn wavelength(&self) -> Option<f64> {
        self.wavelength
    }

    pub fn set_wavelength(&mut self, wavelength: Option<f64>) {
        self.wavelength = wavelength;
    }

    pub fn metadata(&self) -> &BTreeMap<String, MetaValue> {
        &self.metadata
    }

    /// 写入一条元数据
    pub fn insert_meta(&mut self, key: &str, value: impl Into<MetaValue>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn len(&self) -> usize {
        self.two_theta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.two_theta.is_empty()
    }

    /// 最大强度
    pub fn max_intensity(&self) -> f64 {
        max_value(&self.intensity)
    }

    /// 前两点的角度间隔（单点谱返回 None）
    pub fn angular_step(&self) -> Option<f64> {
        if self.two_theta.len() > 1 {
            Some(self.two_theta[1] - self.two_theta[0])
        } else {
            None
        }
    }

    /// 由 Bragg 定律计算 d 间距: d = λ / (2 sin θ)
    pub fn d_spacing(&self) -> Result<Vec<f64>> {
        let wavelength = self
            .wavelength
            .ok_or_else(|| XrdError::data_state("d-spacing conversion", "wavelength assignment"))?;

        Ok(self
            .two_theta
            .iter()
            .map(|tt| wavelength / (2.0 * (tt / 2.0).to_radians().sin()))
            .collect())
    }

    /// 以 (2θ, 强度) 对的形式迭代
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.two_theta
            .iter()
            .copied()
            .zip(self.intensity.iter().copied())
    }
}

/// 数组最大值（空数组返回 0）
pub fn max_value(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(Spectrum::new(vec![1.0, 2.0], vec![1.0]).is_err());
        assert!(Spectrum::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_d_spacing_requires_wavelength() {
        let spectrum = Spectrum::new(vec![30.0], vec![1.0]).unwrap();
        assert!(matches!(
            spectrum.d_spacing(),
            Err(XrdError::DataStateError { .. })
        ));

        let spectrum = spectrum.with_wavelength(Some(1.5406));
        let d = spectrum.d_spacing().unwrap();
        assert_relative_eq!(d[0], 1.5406 / (2.0 * 15f64.to_radians().sin()), epsilon = 1e-12);
    }

    #[test]
    fn test_deserialize_checks_lengths() {
        let ok = r#"{"two_theta": [10.0, 10.02], "intensity": [5.0, 7.0], "wavelength": 1.54056, "metadata": {"file_type": "dat"}}"#;
        let spectrum: Spectrum = serde_json::from_str(ok).unwrap();
        assert_eq!(spectrum.len(), 2);
        assert_eq!(spectrum.metadata()["file_type"], MetaValue::from("dat"));

        let uneven = r#"{"two_theta": [10.0, 10.02], "intensity": [5.0], "wavelength": null}"#;
        assert!(serde_json::from_str::<Spectrum>(uneven).is_err());
        let empty = r#"{"two_theta": [], "intensity": [], "wavelength": null}"#;
        assert!(serde_json::from_str::<Spectrum>(empty).is_err());
    }

    #[test]
    fn test_with_intensity_does_not_alias() {
        let original = Spectrum::new(vec![1.0, 2.0], vec![5.0, 6.0]).unwrap();
        let derived = original.with_intensity(vec![0.0, 0.0]).unwrap();
        assert_eq!(original.intensity(), &[5.0, 6.0]);
        assert_eq!(derived.intensity(), &[0.0, 0.0]);
        assert_eq!(derived.two_theta(), original.two_theta());
    }
}
