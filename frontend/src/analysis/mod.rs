//! 废弃物分析
//!
//! - `placeholder`: 本地系数估算
//! - `intake`: 输入页的快速分类
//! - `orchestrator`: 结果页的乐观/完整两种加载方式

pub mod intake;
pub mod orchestrator;
pub mod placeholder;

pub use intake::{IntakeService, TextSubmission};
pub use orchestrator::{AnalysisInput, AnalysisRequest, Publisher, ResultOrchestrator, ResultView};
