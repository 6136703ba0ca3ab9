//! 分析结果模型

use crate::protocol::{EnvironmentalBenefit, ProcessingStep};
use crate::{DEFAULT_CO2_UNIT, DEFAULT_EFFICIENCY, DEFAULT_PROCESSING_METHOD, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 分析输入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    Image,
    Text,
}

impl AnalysisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMethod::Image => "image",
            AnalysisMethod::Text => "text",
        }
    }
}

impl Display for AnalysisMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 置信度（0–100 的整数百分比）
///
/// 界面与内部流转一律使用百分比；只有写入历史记录时才通过
/// [`Confidence::as_fraction`] 转成 0–1 的小数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(u8);

impl Confidence {
    pub const DEFAULT: Confidence = Confidence(85);

    /// 从百分比构建，超出范围时截断到 0–100
    pub fn from_percent(percent: f64) -> Self {
        if percent.is_nan() {
            return Self::DEFAULT;
        }
        Self(percent.round().clamp(0.0, 100.0) as u8)
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    /// 0–1 小数形式（持久化接口使用）
    pub fn as_fraction(&self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// 分类结果（结果页的输入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub waste_type: String,
    pub confidence: Confidence,
    pub quantity: f64,
    #[serde(default)]
    pub location: Option<String>,
}

/// 结果完整度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    /// 仅由系数估算的占位结果
    Placeholder,
    /// 占位结果已被部分后端数据更新
    Partial,
    /// 全部后端调用成功
    Complete,
}

/// 分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub waste_type: String,
    pub confidence: Confidence,
    pub quantity: f64,
    pub recommended_method: String,
    pub processing_steps: Vec<ProcessingStep>,
    pub processing_time: Option<String>,
    pub co2_saved: f64,
    pub co2_saved_unit: String,
    pub carbon_credits: f64,
    pub value: f64,
    pub energy_output: f64,
    pub efficiency: f64,
    pub environmental_benefits: Vec<EnvironmentalBenefit>,
    pub timestamp: Timestamp,
    pub user_id: Option<String>,
    pub completeness: Completeness,
}

impl AnalysisResult {
    /// 全零的空白结果，由调用方填入具体数值
    pub fn blank(classification: &Classification, user_id: Option<String>, now: Timestamp) -> Self {
        Self {
            waste_type: classification.waste_type.clone(),
            confidence: classification.confidence,
            quantity: classification.quantity,
            recommended_method: DEFAULT_PROCESSING_METHOD.to_string(),
            processing_steps: Vec::new(),
            processing_time: None,
            co2_saved: 0.0,
            co2_saved_unit: DEFAULT_CO2_UNIT.to_string(),
            carbon_credits: 0.0,
            value: 0.0,
            energy_output: 0.0,
            efficiency: DEFAULT_EFFICIENCY,
            environmental_benefits: Vec::new(),
            timestamp: now,
            user_id,
            completeness: Completeness::Placeholder,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completeness == Completeness::Complete
    }
}
