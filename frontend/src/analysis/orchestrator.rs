//! 结果编排
//!
//! 两种模式：
//! - 乐观模式（已有分类）：立即发布占位结果，后台并发请求推荐和减排数据，成功的部分合并进结果
//! - 完整模式（无分类）：分类 -> 推荐 -> 减排 -> 碳信用 依次执行，每步限时，任何一步失败即整体失败
//!
//! 每次运行持有一个取消令牌；新的运行或离开结果页会取消上一次运行，
//! 被取消的运行不再发布任何结果。

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use agriwaste_shared::protocol::{
    CarbonCreditRequest, GhgRequest, GhgResponse, PredictTextRequest, PredictionResponse, RecommendRequest,
    RecommendResponse, SaveAnalysisRequest,
};
use agriwaste_shared::{
    AnalysisMethod, AnalysisResult, Classification, Completeness, Confidence, DEFAULT_EFFICIENCY,
    DEFAULT_PROCESSING_METHOD, DEFAULT_QUANTITY_KG,
};

use super::placeholder::placeholder_result;
use crate::api::ApiClient;
use crate::error::{AnalysisError, AnalysisStage, ApiResult};
use crate::runtime::{CancellationToken, SharedRuntime, with_timeout};
use crate::web::http::UploadFile;

/// 碳信用核证等级
const VERIFICATION_LEVEL: &str = "standard";
/// 历史记录缺少地点时的占位
const UNKNOWN_LOCATION: &str = "Unknown";

/// 原始输入
#[derive(Debug, Clone)]
pub enum AnalysisInput {
    Image(UploadFile),
    Text { waste_type: String, quantity: Option<f64> },
}

/// 结果页的输入
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub input: AnalysisInput,
    /// 输入页已得到的分类；为空时走完整模式
    pub classification: Option<Classification>,
    pub location: Option<String>,
}

impl AnalysisRequest {
    pub fn method(&self) -> AnalysisMethod {
        match self.input {
            AnalysisInput::Image(_) => AnalysisMethod::Image,
            AnalysisInput::Text { .. } => AnalysisMethod::Text,
        }
    }

    /// 丢弃已有分类，改为完整分析
    pub fn into_full(mut self) -> Self {
        self.classification = None;
        self
    }
}

/// 结果页展示状态
#[derive(Debug, Clone, PartialEq)]
pub enum ResultView {
    Loading,
    Ready(AnalysisResult),
    Failed(AnalysisError),
}

pub type Publisher = Rc<dyn Fn(ResultView)>;

// =========================================================
// 合并后端数据
// =========================================================

fn merge_recommendation(result: &mut AnalysisResult, rec: RecommendResponse) {
    if let Some(method) = rec.recommended_method.filter(|m| !m.is_empty()) {
        result.recommended_method = method;
    }
    result.processing_steps = rec.processing_steps;
    result.processing_time = rec.processing_time.or(result.processing_time.take());
    result.efficiency = rec.efficiency.unwrap_or(DEFAULT_EFFICIENCY);
}

fn merge_ghg(result: &mut AnalysisResult, ghg: GhgResponse) {
    if let Some(co2) = ghg.co2_saved {
        result.co2_saved = co2;
    }
    if let Some(unit) = ghg.co2_saved_unit {
        result.co2_saved_unit = unit;
    }
    result.energy_output = ghg.energy_generated.unwrap_or(0.0);
    result.environmental_benefits = ghg.environmental_benefits;
}

/// 分类响应 -> 分类结果，缺失字段用 `fallback_type` 与默认值补齐
fn classification_from(
    resp: PredictionResponse,
    fallback_type: Option<&str>,
    fallback_quantity: Option<f64>,
    location: Option<String>,
) -> Classification {
    let waste_type = resp
        .waste_type
        .filter(|t| !t.trim().is_empty())
        .or_else(|| fallback_type.map(String::from))
        .unwrap_or_else(|| "Unknown Waste".to_string());

    Classification {
        waste_type,
        confidence: resp.confidence.map(Confidence::from_percent).unwrap_or_default(),
        quantity: resp
            .quantity
            .or(fallback_quantity)
            .filter(|q| *q > 0.0)
            .unwrap_or(DEFAULT_QUANTITY_KG),
        location,
    }
}

// =========================================================
// 编排器
// =========================================================

#[derive(Clone)]
pub struct ResultOrchestrator {
    api: ApiClient,
    runtime: SharedRuntime,
    stage_timeout: Duration,
    current: Rc<RefCell<Option<CancellationToken>>>,
    /// 最近一次运行的输入，重试时按原模式再跑一次
    last_request: Rc<RefCell<Option<AnalysisRequest>>>,
}

impl ResultOrchestrator {
    pub fn new(api: ApiClient, runtime: SharedRuntime, stage_timeout: Duration) -> Self {
        Self {
            api,
            runtime,
            stage_timeout,
            current: Rc::new(RefCell::new(None)),
            last_request: Rc::new(RefCell::new(None)),
        }
    }

    /// 取消正在进行的运行
    pub fn cancel(&self) {
        if let Some(token) = self.current.borrow_mut().take() {
            token.cancel();
        }
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self.current.borrow_mut().replace(token.clone());
        if let Some(previous) = previous {
            log::debug!("[Analysis] Cancelling previous run");
            previous.cancel();
        }
        token
    }

    /// 开始一次分析；结果通过 `publish` 发布（可能多次）
    pub fn run(&self, request: AnalysisRequest, user_id: Option<String>, publish: Publisher) {
        let token = self.begin();
        *self.last_request.borrow_mut() = Some(request.clone());

        if let Some(classification) = request.classification.clone() {
            self.run_optimistic(classification, user_id, token, publish);
            return;
        }

        publish(ResultView::Loading);
        let this = self.clone();
        self.runtime.spawn(Box::pin(async move {
            let method = request.method();
            let location = request.location.clone();
            let outcome = this.full_analysis(request, user_id, &token).await;
            if token.is_cancelled() {
                return;
            }
            match outcome {
                Ok(result) => {
                    this.spawn_save(&result, method, location);
                    publish(ResultView::Ready(result));
                }
                Err(e) => {
                    log::error!("[Analysis] Full analysis failed: {}", e);
                    publish(ResultView::Failed(e));
                }
            }
        }));
    }

    /// 以上一次的输入和模式重新运行；没有运行过时返回 false
    pub fn retry(&self, user_id: Option<String>, publish: Publisher) -> bool {
        let Some(request) = self.last_request.borrow().clone() else {
            return false;
        };
        log::info!("[Analysis] Retrying last run");
        self.run(request, user_id, publish);
        true
    }

    fn run_optimistic(
        &self,
        classification: Classification,
        user_id: Option<String>,
        token: CancellationToken,
        publish: Publisher,
    ) {
        let placeholder = placeholder_result(&classification, user_id, self.runtime.now());
        publish(ResultView::Ready(placeholder.clone()));

        let api = self.api.clone();
        self.runtime.spawn(Box::pin(async move {
            let recommend = RecommendRequest {
                waste_type: placeholder.waste_type.clone(),
                quantity: placeholder.quantity,
            };
            let ghg_req = GhgRequest {
                waste_type: placeholder.waste_type.clone(),
                processing_method: placeholder.recommended_method.clone(),
                quantity: placeholder.quantity,
            };
            let (rec, ghg) = futures::join!(api.call(&recommend, &token), api.call(&ghg_req, &token));
            if token.is_cancelled() {
                return;
            }

            let mut result = placeholder;
            let mut merged = false;
            match rec {
                Ok(rec) => {
                    merge_recommendation(&mut result, rec);
                    merged = true;
                }
                Err(e) => log::debug!("[Analysis] Keeping placeholder recommendation: {}", e),
            }
            match ghg {
                Ok(ghg) => {
                    merge_ghg(&mut result, ghg);
                    merged = true;
                }
                Err(e) => log::debug!("[Analysis] Keeping placeholder GHG figures: {}", e),
            }

            if merged {
                result.completeness = Completeness::Partial;
                publish(ResultView::Ready(result));
            }
        }));
    }

    /// 单个阶段：使用子令牌，超时只中止该阶段的请求
    async fn stage<T, F>(
        &self,
        stage: AnalysisStage,
        token: &CancellationToken,
        call: impl FnOnce(CancellationToken) -> F,
    ) -> Result<T, AnalysisError>
    where
        F: Future<Output = ApiResult<T>>,
    {
        let child = token.child();
        let future = call(child.clone());
        with_timeout(self.runtime.as_ref(), self.stage_timeout, &child, future)
            .await
            .map_err(AnalysisError::stage(stage))
    }

    async fn classify(
        &self,
        request: &AnalysisRequest,
        user_id: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Classification, AnalysisError> {
        let location = request.location.clone();
        match &request.input {
            AnalysisInput::Image(file) => {
                let resp = self
                    .stage(AnalysisStage::Classification, token, |t| async move {
                        self.api.predict_image(file.clone(), user_id, &t).await
                    })
                    .await?;
                Ok(classification_from(resp, None, None, location))
            }
            AnalysisInput::Text { waste_type, quantity } => {
                if waste_type.trim().is_empty() {
                    return Err(AnalysisError::MissingInput);
                }
                let req = PredictTextRequest {
                    waste_type: waste_type.clone(),
                    quantity: *quantity,
                    location: location.clone(),
                    user_id: user_id.map(String::from),
                };
                let resp = self
                    .stage(AnalysisStage::Classification, token, |t| async move {
                        self.api.call(&req, &t).await
                    })
                    .await?;
                Ok(classification_from(resp, Some(waste_type.as_str()), *quantity, location))
            }
        }
    }

    /// 完整模式：任一阶段失败即返回错误，不产生部分结果
    pub async fn full_analysis(
        &self,
        request: AnalysisRequest,
        user_id: Option<String>,
        token: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let classification = self.classify(&request, user_id.as_deref(), token).await?;

        let recommend = RecommendRequest {
            waste_type: classification.waste_type.clone(),
            quantity: classification.quantity,
        };
        let rec = self
            .stage(AnalysisStage::Recommendation, token, |t| async move {
                self.api.call(&recommend, &t).await
            })
            .await?;
        let method = rec
            .recommended_method
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_PROCESSING_METHOD.to_string());

        let ghg_req = GhgRequest {
            waste_type: classification.waste_type.clone(),
            processing_method: method.clone(),
            quantity: classification.quantity,
        };
        let ghg = self
            .stage(AnalysisStage::GhgSavings, token, |t| async move {
                self.api.call(&ghg_req, &t).await
            })
            .await?;

        let credit_req = CarbonCreditRequest {
            co2_saved: ghg.co2_saved.unwrap_or(0.0),
            waste_type: classification.waste_type.clone(),
            processing_method: method,
            verification_level: VERIFICATION_LEVEL.to_string(),
        };
        let credits = self
            .stage(AnalysisStage::CarbonCredit, token, |t| async move {
                self.api.call(&credit_req, &t).await
            })
            .await?;

        let mut result = AnalysisResult::blank(&classification, user_id, self.runtime.now());
        merge_recommendation(&mut result, rec);
        merge_ghg(&mut result, ghg);
        result.carbon_credits = credits.credits_earned.unwrap_or(0.0);
        result.value = credits.market_value.unwrap_or(0.0);
        result.completeness = Completeness::Complete;
        Ok(result)
    }

    /// 写入历史记录；失败只记录日志
    fn spawn_save(&self, result: &AnalysisResult, method: AnalysisMethod, location: Option<String>) {
        let req = SaveAnalysisRequest {
            waste_type: result.waste_type.clone(),
            quantity: result.quantity,
            confidence: result.confidence.as_fraction(),
            method: method.to_string(),
            co2_saved: result.co2_saved,
            carbon_credits: result.carbon_credits,
            processing_method: result.recommended_method.clone(),
            location: location
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
        };
        let api = self.api.clone();
        self.runtime.spawn(Box::pin(async move {
            match api.call(&req, &CancellationToken::new()).await {
                Ok(_) => log::info!("[Analysis] Result saved to dashboard"),
                Err(e) => log::warn!("[Analysis] Failed to save result: {}", e),
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::ApiError;
    use crate::testing::{MockIdentityProvider, MockReply, MockTransport, TestRuntime, provider_user};
    use serde_json::json;

    struct Fixture {
        transport: Rc<MockTransport>,
        runtime: Rc<TestRuntime>,
        orchestrator: ResultOrchestrator,
        published: Rc<RefCell<Vec<ResultView>>>,
    }

    impl Fixture {
        fn publisher(&self) -> Publisher {
            let sink = self.published.clone();
            Rc::new(move |view: ResultView| sink.borrow_mut().push(view))
        }

        fn last(&self) -> ResultView {
            self.published.borrow().last().cloned().unwrap()
        }
    }

    fn fixture() -> Fixture {
        let transport = Rc::new(MockTransport::new());
        let runtime = Rc::new(TestRuntime::new());
        let identity = Rc::new(MockIdentityProvider::with_current(provider_user("u1", None)));
        let api = ApiClient::new(&AppConfig::default(), transport.clone(), identity, runtime.clone());
        let orchestrator = ResultOrchestrator::new(api, runtime.clone(), Duration::from_millis(3_000));
        Fixture {
            transport,
            runtime,
            orchestrator,
            published: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn text_request(classified: bool) -> AnalysisRequest {
        AnalysisRequest {
            input: AnalysisInput::Text {
                waste_type: "Rice Straw".into(),
                quantity: Some(1000.0),
            },
            classification: classified.then(|| Classification {
                waste_type: "Rice Straw".into(),
                confidence: Confidence::DEFAULT,
                quantity: 1000.0,
                location: None,
            }),
            location: Some("Punjab".into()),
        }
    }

    fn mock_full_chain(transport: &MockTransport) {
        transport.mock(
            "/api/predict-text",
            MockReply::json(200, json!({"waste_type": "Rice Straw", "confidence": 92.4, "quantity": 800.0})),
        );
        transport.mock(
            "/api/recommend",
            MockReply::json(
                200,
                json!({
                    "recommended_method": "Biogas Production",
                    "processing_steps": [{"step_number": 1, "title": "Collect", "description": "Bale the straw"}],
                    "processing_time": "30-45 days",
                    "efficiency": 82.0
                }),
            ),
        );
        transport.mock(
            "/api/ghg-savings",
            MockReply::json(200, json!({"co2_saved": 1.2, "unit": "tons CO₂e", "energy_output": 410.0})),
        );
        transport.mock(
            "/api/carbon-credit",
            MockReply::json(200, json!({"credits": 1.2, "estimated_value": 18.0})),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_publishes_placeholder_before_backend() {
        let f = fixture();
        f.transport.mock(
            "/api/recommend",
            MockReply::json(200, json!({"recommended_method": "Pyrolysis", "efficiency": 70.0}))
                .delayed(Duration::from_millis(200)),
        );
        f.transport.mock("/api/ghg-savings", MockReply::network_error("offline"));

        f.orchestrator.run(text_request(true), Some("u1".into()), f.publisher());
        let ResultView::Ready(first) = f.last() else {
            panic!("placeholder not published");
        };
        assert_eq!((first.co2_saved, first.carbon_credits, first.value), (500.0, 300.0, 15000.0));
        assert_eq!(first.completeness, Completeness::Placeholder);

        f.runtime.drain().await;
        let ResultView::Ready(merged) = f.last() else {
            panic!("merged result not published");
        };
        assert_eq!(merged.recommended_method, "Pyrolysis");
        assert_eq!(merged.efficiency, 70.0);
        // 减排请求失败，保留占位数值
        assert_eq!(merged.co2_saved, 500.0);
        assert_eq!(merged.completeness, Completeness::Partial);

        let ghg = f.transport.requests_to("/api/ghg-savings")[0].json_body().unwrap();
        assert_eq!(ghg["processing_method"], "Anaerobic Digestion");
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_failures_keep_placeholder_silently() {
        let f = fixture();
        f.orchestrator.run(text_request(true), None, f.publisher());
        f.runtime.drain().await;

        let published = f.published.borrow();
        assert_eq!(published.len(), 1);
        assert!(matches!(&published[0], ResultView::Ready(r) if r.completeness == Completeness::Placeholder));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_chain_combines_and_saves() {
        let f = fixture();
        mock_full_chain(&f.transport);
        f.transport.mock(
            "/api/dashboard/save-analysis",
            MockReply::json(200, json!({"status": "success"})),
        );

        f.orchestrator.run(text_request(false), Some("u1".into()), f.publisher());
        assert_eq!(f.published.borrow()[0], ResultView::Loading);
        f.runtime.drain().await;

        let ResultView::Ready(result) = f.last() else {
            panic!("expected result");
        };
        assert_eq!(result.confidence.percent(), 92);
        assert_eq!(result.quantity, 800.0);
        assert_eq!(result.recommended_method, "Biogas Production");
        assert_eq!(result.processing_steps.len(), 1);
        assert_eq!(result.energy_output, 410.0);
        assert_eq!((result.carbon_credits, result.value), (1.2, 18.0));
        assert!(result.is_complete());

        let ghg = f.transport.requests_to("/api/ghg-savings")[0].json_body().unwrap();
        assert_eq!(ghg["processing_method"], "Biogas Production");
        let credit = f.transport.requests_to("/api/carbon-credit")[0].json_body().unwrap();
        assert_eq!(credit["co2_saved"], 1.2);
        assert_eq!(credit["verification_level"], "standard");

        let saved = f.transport.requests_to("/api/dashboard/save-analysis")[0].json_body().unwrap();
        assert_eq!(saved["confidence"], 0.92);
        assert_eq!(saved["method"], "text");
        assert_eq!(saved["location"], "Punjab");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_still_publishes_complete_result() {
        let f = fixture();
        mock_full_chain(&f.transport);
        f.transport.mock("/api/dashboard/save-analysis", MockReply::json(500, json!({})));

        f.orchestrator.run(text_request(false), None, f.publisher());
        f.runtime.drain().await;

        assert!(matches!(f.last(), ResultView::Ready(r) if r.is_complete()));
        assert_eq!(f.transport.count("/api/dashboard/save-analysis"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_stage_fails_whole_chain() {
        let f = fixture();
        mock_full_chain(&f.transport);
        f.transport.mock(
            "/api/ghg-savings",
            MockReply::json(200, json!({"co2_saved": 1.0})).delayed(Duration::from_millis(3_001)),
        );

        f.orchestrator.run(text_request(false), None, f.publisher());
        f.runtime.drain().await;

        let ResultView::Failed(err) = f.last() else {
            panic!("expected failure");
        };
        assert_eq!(
            err,
            AnalysisError::Stage {
                stage: AnalysisStage::GhgSavings,
                source: ApiError::Timeout(Duration::from_millis(3_000)),
            }
        );
        assert_eq!(err.user_message(), "Analysis timeout");
        assert_eq!(f.transport.count("/api/carbon-credit"), 0);
        assert_eq!(f.transport.count("/api/dashboard/save-analysis"), 0);
        assert!(!f.published.borrow().iter().any(|v| matches!(v, ResultView::Ready(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_error_message_from_server() {
        let f = fixture();
        mock_full_chain(&f.transport);
        f.transport.mock(
            "/api/recommend",
            MockReply::json(422, json!({"detail": "Unsupported waste type"})),
        );

        f.orchestrator.run(text_request(false), None, f.publisher());
        f.runtime.drain().await;

        let ResultView::Failed(err) = f.last() else {
            panic!("expected failure");
        };
        assert_eq!(err.user_message(), "Unsupported waste type");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_run_cancels_previous() {
        let f = fixture();
        mock_full_chain(&f.transport);
        f.transport.mock(
            "/api/predict-text",
            MockReply::json(200, json!({"waste_type": "Rice Straw"})).delayed(Duration::from_millis(500)),
        );

        f.orchestrator.run(text_request(false), None, f.publisher());

        let second: Rc<RefCell<Vec<ResultView>>> = Rc::default();
        let sink = second.clone();
        let (_, ()) = tokio::join!(f.runtime.drain(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            f.orchestrator.run(
                text_request(true),
                None,
                Rc::new(move |v: ResultView| sink.borrow_mut().push(v)),
            );
        });
        f.runtime.drain().await;

        // 第一次运行只发布过 Loading
        assert_eq!(*f.published.borrow(), vec![ResultView::Loading]);
        assert!(f.transport.requests_to("/api/predict-text")[0].cancel.is_cancelled());
        assert!(matches!(second.borrow().last(), Some(ResultView::Ready(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_background_merge() {
        let f = fixture();
        f.transport.mock(
            "/api/recommend",
            MockReply::json(200, json!({"recommended_method": "Pyrolysis"})).delayed(Duration::from_millis(100)),
        );

        f.orchestrator.run(text_request(true), None, f.publisher());
        f.orchestrator.cancel();
        f.runtime.drain().await;

        assert_eq!(f.published.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_full_failure_stays_in_full_mode() {
        let f = fixture();
        f.transport.mock("/api/predict-text", MockReply::network_error("offline"));

        assert!(!f.orchestrator.retry(None, f.publisher()));

        f.orchestrator.run(text_request(true).into_full(), None, f.publisher());
        f.runtime.drain().await;
        assert!(matches!(f.last(), ResultView::Failed(_)));
        assert_eq!(f.transport.count("/api/predict-text"), 1);

        mock_full_chain(&f.transport);
        assert!(f.orchestrator.retry(None, f.publisher()));
        f.runtime.drain().await;

        assert_eq!(f.transport.count("/api/predict-text"), 2);
        assert!(matches!(f.last(), ResultView::Ready(r) if r.is_complete()));
        // 重试不会退回乐观模式的占位结果
        assert!(
            !f.published
                .borrow()
                .iter()
                .any(|v| matches!(v, ResultView::Ready(r) if r.completeness == Completeness::Placeholder))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_is_missing_input() {
        let f = fixture();
        let mut request = text_request(false);
        request.input = AnalysisInput::Text {
            waste_type: "  ".into(),
            quantity: None,
        };
        let err = f
            .orchestrator
            .full_analysis(request, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::MissingInput);
        assert_eq!(err.user_message(), "Invalid analysis method or missing data");
    }
}
