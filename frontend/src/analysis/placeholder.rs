//! 本地估算
//!
//! 后端结果到达前展示的数值，全部由固定系数算出。

use agriwaste_shared::{
    AnalysisResult, Classification, Confidence, DEFAULT_PROCESSING_METHOD, Timestamp, round2,
};

const CO2_PER_KG: f64 = 0.5;
const CREDITS_PER_KG: f64 = 0.3;
const VALUE_PER_KG: f64 = 15.0;

/// 乐观模式的占位结果
pub fn placeholder_result(
    classification: &Classification,
    user_id: Option<String>,
    now: Timestamp,
) -> AnalysisResult {
    let q = classification.quantity;
    let mut result = AnalysisResult::blank(classification, user_id, now);
    result.recommended_method = DEFAULT_PROCESSING_METHOD.to_string();
    result.co2_saved = round2(q * CO2_PER_KG);
    result.carbon_credits = round2(q * CREDITS_PER_KG);
    result.value = round2(q * VALUE_PER_KG);
    result
}

/// 按废弃物类型区分的估算系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WasteFactors {
    pub co2: f64,
    pub credits: f64,
    pub value: f64,
    pub method: &'static str,
}

const RICE_STRAW: WasteFactors = WasteFactors {
    co2: 0.6,
    credits: 0.4,
    value: 18.0,
    method: "Anaerobic Digestion",
};

/// 系数表；未知类型按稻草处理
pub fn factors_for(waste_type: &str) -> WasteFactors {
    match waste_type {
        "Wheat Straw" => WasteFactors {
            co2: 0.55,
            credits: 0.35,
            value: 16.0,
            method: "Gasification",
        },
        "Corn Stalks" => WasteFactors {
            co2: 0.7,
            credits: 0.45,
            value: 20.0,
            method: "Pyrolysis",
        },
        "Cotton Waste" => WasteFactors {
            co2: 0.5,
            credits: 0.3,
            value: 14.0,
            method: "Composting",
        },
        "Sugarcane Bagasse" => WasteFactors {
            co2: 0.8,
            credits: 0.5,
            value: 22.0,
            method: "Direct Combustion",
        },
        _ => RICE_STRAW,
    }
}

/// 估算处理时长（秒），随数量按对数增长
pub fn estimated_processing_secs(quantity: f64) -> f64 {
    let secs = ((quantity / 1000.0 + 1.0).log10() + 1.0) * 4.0;
    (secs * 10.0).round() / 10.0
}

/// 本地即时分析（输入页的预估）
pub fn local_analysis(waste_type: &str, quantity: f64, now: Timestamp) -> AnalysisResult {
    let factors = factors_for(waste_type);
    let classification = Classification {
        waste_type: waste_type.to_string(),
        confidence: Confidence::DEFAULT,
        quantity,
        location: None,
    };

    let mut result = AnalysisResult::blank(&classification, None, now);
    result.recommended_method = factors.method.to_string();
    result.co2_saved = round2(quantity * factors.co2);
    result.carbon_credits = round2(quantity * factors.credits);
    result.value = round2(quantity * factors.value);
    result.processing_time = Some(format!("{}s", estimated_processing_secs(quantity)));
    result
}

/// 根据文件名猜测废弃物类型
///
/// 图片分类失败时使用。
pub fn guess_from_filename(file_name: &str) -> (&'static str, Confidence) {
    let name = file_name.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| name.contains(k));

    let (waste_type, confidence) = if has(&["rice", "straw"]) {
        ("Rice Straw", 75.0)
    } else if has(&["wheat"]) {
        ("Wheat Straw", 75.0)
    } else if has(&["corn", "maize"]) {
        ("Corn Stalks", 70.0)
    } else if has(&["cotton"]) {
        ("Cotton Waste", 70.0)
    } else if has(&["sugarcane", "bagasse"]) {
        ("Sugarcane Bagasse", 70.0)
    } else {
        ("Agricultural Waste", 60.0)
    };
    (waste_type, Confidence::from_percent(confidence))
}
