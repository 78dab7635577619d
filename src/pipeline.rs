//! # 分析会话
//!
//! 串联 解析 → 背景扣除 → Kα2 剥离 → 寻峰 → 匹配 的调用序列。
//!
//! 会话保存原始谱与当前工作谱，从不修改原始谱。各步骤的输入固定为
//! 上游步骤的输出，重复调用同一步骤会替换其结果而不是叠加：
//!
//! - 背景扣除：输入为原始谱
//! - Kα2 剥离：输入为背景扣除结果（若无则为原始谱）
//! - 寻峰：输入为当前工作谱
//!
//! 各步骤的结果以可序列化记录保存，供外部持久化。
//!
//! ## 状态约束
//! - `match_reference`, `filtered_peaks` 需要先执行 `detect_peaks`
//! - 重新执行某一步骤会清除其下游的全部记录
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `processing/`, `reference/`, `models/`

use crate::error::{Result, XrdError};
use crate::models::{DetectedPeak, MatchResult, ReferencePattern, Spectrum};
use crate::processing::{background, kalpha, peaks, BackgroundMethod, KalphaMethod, PeakMethod};
use crate::reference::match_peaks;

use serde::{Deserialize, Serialize};

/// 背景扣除记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub method: BackgroundMethod,
    pub background: Vec<f64>,
    pub corrected: Vec<f64>,
}

/// Kα2 剥离记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrippingRecord {
    pub method: KalphaMethod,
    /// 实际使用的波长比
    pub wavelength_ratio: f64,
    pub kalpha1: Vec<f64>,
    pub kalpha2: Vec<f64>,
}

/// 寻峰记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDetectionRecord {
    pub method: PeakMethod,
    pub peaks: Vec<DetectedPeak>,
}

/// 匹配记录（含参考图谱快照）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub reference: ReferencePattern,
    pub tolerance: f64,
    pub result: MatchResult,
}

/// 会话快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub original: Spectrum,
    pub current: Spectrum,
    pub correction: Option<CorrectionRecord>,
    pub stripping: Option<StrippingRecord>,
    pub detection: Option<PeakDetectionRecord>,
    pub matches: Vec<MatchRecord>,
}

/// 分析会话
#[derive(Debug, Clone)]
pub struct Analysis {
    original: Spectrum,
    current: Spectrum,
    correction: Option<CorrectionRecord>,
    stripping: Option<StrippingRecord>,
    detection: Option<PeakDetectionRecord>,
    matches: Vec<MatchRecord>,
}

impl Analysis {
    pub fn new(spectrum: Spectrum) -> Self {
        Self {
            current: spectrum.clone(),
            original: spectrum,
            correction: None,
            stripping: None,
            detection: None,
            matches: Vec::new(),
        }
    }

    pub fn original(&self) -> &Spectrum {
        &self.original
    }

    /// 当前工作谱（最近一步的输出）
    pub fn current(&self) -> &Spectrum {
        &self.current
    }

    pub fn correction(&self) -> Option<&CorrectionRecord> {
        self.correction.as_ref()
    }

    pub fn stripping(&self) -> Option<&StrippingRecord> {
        self.stripping.as_ref()
    }

    pub fn detection(&self) -> Option<&PeakDetectionRecord> {
        self.detection.as_ref()
    }

    pub fn peaks(&self) -> Option<&[DetectedPeak]> {
        self.detection.as_ref().map(|d| d.peaks.as_slice())
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    /// 在原始谱上扣除背景，工作谱替换为扣除后的谱
    pub fn subtract_background(&mut self, method: BackgroundMethod) -> Result<&CorrectionRecord> {
        let result = background::estimate(&self.original, &method)?;
        self.current = self.original.with_intensity(result.corrected.clone())?;
        self.stripping = None;
        self.invalidate_detection();

        Ok(self.correction.insert(CorrectionRecord {
            method,
            background: result.background,
            corrected: result.corrected,
        }))
    }

    /// 在背景扣除结果上剥离 Kα2，工作谱替换为 Kα1 分量
    pub fn strip_kalpha(&mut self, method: KalphaMethod) -> Result<&StrippingRecord> {
        let input = self.corrected_spectrum()?;
        let result = kalpha::strip(&input, &method)?;
        self.current = input.with_intensity(result.kalpha1.clone())?;
        self.invalidate_detection();

        Ok(self.stripping.insert(StrippingRecord {
            method,
            wavelength_ratio: result.wavelength_ratio,
            kalpha1: result.kalpha1,
            kalpha2: result.kalpha2,
        }))
    }

    /// 在工作谱上寻峰
    pub fn detect_peaks(&mut self, method: PeakMethod) -> Result<&[DetectedPeak]> {
        let found = peaks::detect(&self.current, &method)?;
        self.matches.clear();

        let record = self.detection.insert(PeakDetectionRecord {
            method,
            peaks: found,
        });
        Ok(record.peaks.as_slice())
    }

    /// 寻峰时被阈值过滤掉、但仍较显著的候选峰
    pub fn filtered_peaks(&self) -> Result<Vec<DetectedPeak>> {
        let detection = self
            .detection
            .as_ref()
            .ok_or_else(|| XrdError::data_state("filtered peak listing", "peak detection"))?;

        peaks::filtered_peaks(&self.current, &detection.method, &detection.peaks)
    }

    /// 与参考图谱匹配，结果追加到会话
    pub fn match_reference(
        &mut self,
        reference: &ReferencePattern,
        tolerance: f64,
    ) -> Result<&MatchRecord> {
        let detection = self
            .detection
            .as_ref()
            .ok_or_else(|| XrdError::data_state("reference matching", "peak detection"))?;

        let result = match_peaks(&detection.peaks, reference, tolerance)?;
        self.matches.push(MatchRecord {
            reference: reference.clone(),
            tolerance,
            result,
        });

        self.matches
            .last()
            .ok_or_else(|| XrdError::Other("match record missing".to_string()))
    }

    /// 恢复到原始谱，清除所有结果
    pub fn reset(&mut self) {
        self.current = self.original.clone();
        self.correction = None;
        self.stripping = None;
        self.detection = None;
        self.matches.clear();
    }

    pub fn snapshot(&self) -> AnalysisSnapshot {
        AnalysisSnapshot {
            original: self.original.clone(),
            current: self.current.clone(),
            correction: self.correction.clone(),
            stripping: self.stripping.clone(),
            detection: self.detection.clone(),
            matches: self.matches.clone(),
        }
    }

    /// 剥离步骤的输入：背景扣除结果，或原始谱
    fn corrected_spectrum(&self) -> Result<Spectrum> {
        match &self.correction {
            Some(record) => self.original.with_intensity(record.corrected.clone()),
            None => Ok(self.original.clone()),
        }
    }

    fn invalidate_detection(&mut self) {
        self.detection = None;
        self.matches.clear();
    }
}
