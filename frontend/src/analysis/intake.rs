//! 输入页的快速分类
//!
//! 输入页先拿到一个分类结果再跳转结果页（乐观模式），拿不到时用本地规则兜底：
//! - 文本：先查 5 分钟缓存，再限时调用分类接口，失败时直接采用用户输入的类型
//! - 图片：限时调用分类接口，失败时根据文件名猜测

use std::time::Duration;

use agriwaste_shared::protocol::PredictTextRequest;
use agriwaste_shared::{Classification, Confidence, DEFAULT_QUANTITY_KG};

use super::orchestrator::{AnalysisInput, AnalysisRequest};
use super::placeholder::guess_from_filename;
use crate::api::ApiClient;
use crate::cache::{CacheService, text_cache_key};
use crate::error::ApiResult;
use crate::runtime::{CancellationToken, with_timeout};
use crate::web::http::UploadFile;

/// 接口未返回置信度时的默认值
const TEXT_CONFIDENCE: f64 = 90.0;
const IMAGE_CONFIDENCE: f64 = 80.0;

/// 文本表单提交的内容
#[derive(Debug, Clone, PartialEq)]
pub struct TextSubmission {
    pub waste_type: String,
    pub quantity: f64,
    pub location: Option<String>,
}

#[derive(Clone)]
pub struct IntakeService {
    api: ApiClient,
    cache: CacheService,
    cache_ttl: Duration,
    stage_timeout: Duration,
}

impl IntakeService {
    pub fn new(api: ApiClient, cache: CacheService, cache_ttl: Duration, stage_timeout: Duration) -> Self {
        Self {
            api,
            cache,
            cache_ttl,
            stage_timeout,
        }
    }

    pub async fn submit_text(&self, form: TextSubmission, user_id: Option<String>) -> AnalysisRequest {
        let key = text_cache_key(&form.waste_type, form.quantity);
        let classification = match self.cache.get::<Classification>(&key, self.cache_ttl) {
            Some(cached) => {
                log::debug!("[Intake] Using cached classification for `{}`", key);
                cached
            }
            None => match self.classify_text(&form, user_id).await {
                Ok(classification) => {
                    self.cache.set(&key, &classification);
                    classification
                }
                Err(e) => {
                    log::warn!("[Intake] Text classification unavailable, using input as-is: {}", e);
                    Classification {
                        waste_type: form.waste_type.clone(),
                        confidence: Confidence::DEFAULT,
                        quantity: form.quantity,
                        location: form.location.clone(),
                    }
                }
            },
        };

        AnalysisRequest {
            input: AnalysisInput::Text {
                waste_type: form.waste_type,
                quantity: Some(form.quantity),
            },
            classification: Some(classification),
            location: form.location,
        }
    }

    async fn classify_text(&self, form: &TextSubmission, user_id: Option<String>) -> ApiResult<Classification> {
        let req = PredictTextRequest {
            waste_type: form.waste_type.clone(),
            quantity: Some(form.quantity),
            location: form.location.clone(),
            user_id,
        };
        let token = CancellationToken::new();
        let runtime = self.api.runtime().clone();
        let resp = with_timeout(runtime.as_ref(), self.stage_timeout, &token, self.api.call(&req, &token)).await?;

        Ok(Classification {
            waste_type: resp
                .waste_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| form.waste_type.clone()),
            confidence: Confidence::from_percent(resp.confidence.unwrap_or(TEXT_CONFIDENCE)),
            quantity: resp.quantity.filter(|q| *q > 0.0).unwrap_or(form.quantity),
            location: form.location.clone(),
        })
    }

    pub async fn submit_image(&self, file: UploadFile, user_id: Option<String>) -> AnalysisRequest {
        let token = CancellationToken::new();
        let runtime = self.api.runtime().clone();
        let call = self.api.predict_image(file.clone(), user_id.as_deref(), &token);

        let classification = match with_timeout(runtime.as_ref(), self.stage_timeout, &token, call).await {
            Ok(resp) => {
                let (guessed, _) = guess_from_filename(&file.name);
                Classification {
                    waste_type: resp
                        .waste_type
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| guessed.to_string()),
                    confidence: Confidence::from_percent(resp.confidence.unwrap_or(IMAGE_CONFIDENCE)),
                    quantity: resp.quantity.filter(|q| *q > 0.0).unwrap_or(DEFAULT_QUANTITY_KG),
                    location: None,
                }
            }
            Err(e) => {
                let (waste_type, confidence) = guess_from_filename(&file.name);
                log::warn!("[Intake] Image classification unavailable, guessed `{}`: {}", waste_type, e);
                Classification {
                    waste_type: waste_type.to_string(),
                    confidence,
                    quantity: DEFAULT_QUANTITY_KG,
                    location: None,
                }
            }
        };

        AnalysisRequest {
            input: AnalysisInput::Image(file),
            classification: Some(classification),
            location: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::testing::{MockIdentityProvider, MockReply, MockTransport, TestRuntime};
    use agriwaste_shared::AnalysisMethod;
    use serde_json::json;
    use std::rc::Rc;

    struct Fixture {
        transport: Rc<MockTransport>,
        runtime: Rc<TestRuntime>,
        intake: IntakeService,
    }

    fn fixture() -> Fixture {
        let transport = Rc::new(MockTransport::new());
        let runtime = Rc::new(TestRuntime::new());
        let api = ApiClient::new(
            &AppConfig::default(),
            transport.clone(),
            Rc::new(MockIdentityProvider::new()),
            runtime.clone(),
        );
        let cache = CacheService::in_memory(runtime.clone());
        let intake = IntakeService::new(api, cache, Duration::from_secs(300), Duration::from_millis(3_000));
        Fixture {
            transport,
            runtime,
            intake,
        }
    }

    fn form() -> TextSubmission {
        TextSubmission {
            waste_type: "Wheat Straw".into(),
            quantity: 500.0,
            location: Some("Haryana".into()),
        }
    }

    fn upload(name: &str) -> UploadFile {
        UploadFile {
            name: name.into(),
            content_type: "image/jpeg".into(),
            size: 1024,
            handle: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_submission_is_cached_for_five_minutes() {
        let f = fixture();
        f.transport.mock(
            "/api/predict-text",
            MockReply::json(200, json!({"waste_type": "Wheat Straw", "confidence": 88.0})),
        );

        let request = f.intake.submit_text(form(), None).await;
        assert_eq!(request.method(), AnalysisMethod::Text);
        let classification = request.classification.unwrap();
        assert_eq!(classification.confidence.percent(), 88);
        assert_eq!(classification.quantity, 500.0);

        f.runtime.advance_clock(Duration::from_secs(299));
        f.intake.submit_text(form(), None).await;
        assert_eq!(f.transport.count("/api/predict-text"), 1);

        f.runtime.advance_clock(Duration::from_secs(1));
        f.intake.submit_text(form(), None).await;
        assert_eq!(f.transport.count("/api/predict-text"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_falls_back_to_input_on_timeout() {
        let f = fixture();
        f.transport.mock("/api/predict-text", MockReply::pending());

        let request = f.intake.submit_text(form(), Some("u1".into())).await;
        let classification = request.classification.unwrap();
        assert_eq!(classification.waste_type, "Wheat Straw");
        assert_eq!(classification.confidence, Confidence::DEFAULT);
        assert_eq!(classification.location.as_deref(), Some("Haryana"));
        assert!(f.transport.requests()[0].cancel.is_cancelled());

        // 兜底结果不进缓存
        f.intake.submit_text(form(), None).await;
        assert_eq!(f.transport.count("/api/predict-text"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_uses_backend_classification() {
        let f = fixture();
        f.transport.mock(
            "/api/predict-image",
            MockReply::json(200, json!({"predicted_class": "Corn Stalks"})),
        );

        let request = f.intake.submit_image(upload("IMG_001.jpg"), None).await;
        assert_eq!(request.method(), AnalysisMethod::Image);
        let classification = request.classification.unwrap();
        assert_eq!(classification.waste_type, "Corn Stalks");
        assert_eq!(classification.confidence.percent(), 80);
        assert_eq!(classification.quantity, 1000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_failure_guesses_from_filename() {
        let f = fixture();
        f.transport.mock("/api/predict-image", MockReply::network_error("offline"));

        let request = f.intake.submit_image(upload("cotton_field.png"), None).await;
        let classification = request.classification.unwrap();
        assert_eq!(classification.waste_type, "Cotton Waste");
        assert_eq!(classification.confidence.percent(), 70);
    }
}
