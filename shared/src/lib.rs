//! AgriWaste 前后端共享模型
//!
//! - `protocol`: REST 接口定义（请求/响应 DTO 与 `ApiRequest` 元数据）
//! - `identity`: 带来源标记的用户身份
//! - `analysis`: 分析结果与置信度
//! - `date`: 可序列化的毫秒时间戳

pub mod analysis;
pub mod date;
pub mod identity;
pub mod protocol;

pub use analysis::{AnalysisMethod, AnalysisResult, Classification, Completeness, Confidence};
pub use date::Timestamp;
pub use identity::{BackendProfile, Identity, IdentitySnapshot, Provenance, Sourced};

// =========================================================
// 常量定义 (Constants)
// =========================================================

pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// 默认处理方式（后端未给出推荐时使用）
pub const DEFAULT_PROCESSING_METHOD: &str = "Anaerobic Digestion";
/// 默认 CO₂ 单位
pub const DEFAULT_CO2_UNIT: &str = "tons CO₂e";
/// 未提供数量时的默认值 (kg)
pub const DEFAULT_QUANTITY_KG: f64 = 1000.0;
/// 默认处理效率 (%)
pub const DEFAULT_EFFICIENCY: f64 = 75.0;

/// 保留两位小数（四舍五入）
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1000.0 * 0.5), 500.0);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(333.333), 333.33);
        assert_eq!(round2(0.0), 0.0);
    }
}
