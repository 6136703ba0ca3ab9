//! 减排证书下载

use agriwaste_shared::protocol::CertificateRequest;
use agriwaste_shared::{AnalysisResult, Identity, Timestamp};
use wasm_bindgen::JsCast;

use crate::api::ApiClient;
use crate::error::CertificateError;
use crate::runtime::CancellationToken;

const FALLBACK_USER_NAME: &str = "User";

/// 非有限数值按 0 发送
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// 证书对应的分析结果
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateSubject {
    pub waste_type: String,
    pub co2_saved: f64,
    pub carbon_credits: f64,
    pub processing_method: String,
}

impl CertificateSubject {
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            waste_type: result.waste_type.clone(),
            co2_saved: result.co2_saved,
            carbon_credits: result.carbon_credits,
            processing_method: result.recommended_method.clone(),
        }
    }
}

pub fn build_request(
    subject: &CertificateSubject,
    identity: Option<&Identity>,
) -> Result<CertificateRequest, CertificateError> {
    let identity = identity.ok_or(CertificateError::NotSignedIn)?;
    let user_name = Some(identity.display_name())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(FALLBACK_USER_NAME)
        .to_string();

    // 客户端不持有服务端分析 id
    Ok(CertificateRequest {
        analysis_id: None,
        user_name,
        waste_type: subject.waste_type.clone(),
        co2_saved: finite_or_zero(subject.co2_saved),
        carbon_credits: finite_or_zero(subject.carbon_credits),
        processing_method: subject.processing_method.clone(),
    })
}

pub fn file_name(now: Timestamp) -> String {
    format!("AgriWaste2Fuel_Certificate_{}.pdf", now.as_millis())
}

/// 生成的证书
#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    pub file_name: String,
    pub pdf: Vec<u8>,
}

/// 请求后端生成证书
pub async fn generate(
    api: &ApiClient,
    subject: &CertificateSubject,
    identity: Option<&Identity>,
    cancel: &CancellationToken,
) -> Result<Certificate, CertificateError> {
    let request = build_request(subject, identity)?;
    let pdf = api.generate_certificate(&request, cancel).await?;
    Ok(Certificate {
        file_name: file_name(api.runtime().now()),
        pdf,
    })
}

fn js_error(err: wasm_bindgen::JsValue) -> CertificateError {
    CertificateError::Download(format!("{:?}", err))
}

/// 通过临时链接触发浏览器下载
pub fn save_to_disk(certificate: &Certificate) -> Result<(), CertificateError> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| CertificateError::Download("no document".into()))?;
    let body = document
        .body()
        .ok_or_else(|| CertificateError::Download("no body".into()))?;

    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(certificate.pdf.as_slice()));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("application/pdf");
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options).map_err(js_error)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(js_error)?;

    let link = document
        .create_element("a")
        .map_err(js_error)?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(|_| CertificateError::Download("not an anchor".into()))?;
    link.set_href(&url);
    link.set_download(&certificate.file_name);

    body.append_child(&link).map_err(js_error)?;
    link.click();
    body.remove_child(&link).map_err(js_error)?;
    web_sys::Url::revoke_object_url(&url).map_err(js_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::testing::{MockIdentityProvider, MockReply, MockTransport, TestRuntime, provider_user};
    use agriwaste_shared::{Classification, Confidence};
    use std::rc::Rc;

    fn result() -> AnalysisResult {
        let classification = Classification {
            waste_type: "Corn Stalks".into(),
            confidence: Confidence::DEFAULT,
            quantity: 1000.0,
            location: None,
        };
        let mut result = AnalysisResult::blank(&classification, None, Timestamp::new(0));
        result.recommended_method = "Pyrolysis".into();
        result.co2_saved = 1250.5;
        result.carbon_credits = 3.25;
        result
    }

    #[test]
    fn test_build_request_requires_identity() {
        let subject = CertificateSubject::from_result(&result());
        assert_eq!(build_request(&subject, None), Err(CertificateError::NotSignedIn));

        let identity = provider_user("u1", Some("Asha")).to_identity();
        let req = build_request(&subject, Some(&identity)).unwrap();
        assert_eq!(req.user_name, "Asha");
        assert_eq!(req.co2_saved, 1250.5);
        assert_eq!(req.carbon_credits, 3.25);
        assert_eq!(req.processing_method, "Pyrolysis");
        assert_eq!(req.analysis_id, None);
    }

    #[test]
    fn test_unit_digits_do_not_leak_into_amount() {
        let mut result = result();
        result.co2_saved = 1.5;
        result.co2_saved_unit = "kg CO2e".into();
        let identity = provider_user("u1", None).to_identity();
        let req = build_request(&CertificateSubject::from_result(&result), Some(&identity)).unwrap();
        assert_eq!(req.co2_saved, 1.5);
    }

    #[test]
    fn test_non_finite_amounts_sent_as_zero() {
        let mut subject = CertificateSubject::from_result(&result());
        subject.co2_saved = f64::NAN;
        subject.carbon_credits = f64::INFINITY;
        let identity = provider_user("u1", None).to_identity();
        let req = build_request(&subject, Some(&identity)).unwrap();
        assert_eq!(req.co2_saved, 0.0);
        assert_eq!(req.carbon_credits, 0.0);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name(Timestamp::new(1_700_000_000_000)),
            "AgriWaste2Fuel_Certificate_1700000000000.pdf"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_returns_pdf() {
        let transport = Rc::new(MockTransport::new());
        let provider = Rc::new(MockIdentityProvider::with_current(provider_user("u1", None)));
        let api = ApiClient::new(&AppConfig::default(), transport.clone(), provider, Rc::new(TestRuntime::new()));
        transport.mock("/api/generate-certificate", MockReply::bytes(200, b"%PDF-1.7"));

        let mut result = result();
        result.co2_saved = 1.5;
        result.co2_saved_unit = "kg CO2e".into();
        let subject = CertificateSubject::from_result(&result);
        let identity = provider_user("u1", None).to_identity();
        let certificate = generate(&api, &subject, Some(&identity), &CancellationToken::new())
            .await
            .unwrap();
        assert!(certificate.file_name.starts_with("AgriWaste2Fuel_Certificate_"));
        assert_eq!(certificate.pdf, b"%PDF-1.7".to_vec());

        let body = transport.requests()[0].json_body().unwrap();
        assert_eq!(body["user_name"], "u1@farm.in");
        assert_eq!(body["co2_saved"], 1.5);
        assert_eq!(body["carbon_credits"], 3.25);
        assert!(body.get("analysis_id").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_maps_api_error() {
        let transport = Rc::new(MockTransport::new());
        let api = ApiClient::new(
            &AppConfig::default(),
            transport.clone(),
            Rc::new(MockIdentityProvider::new()),
            Rc::new(TestRuntime::new()),
        );
        transport.mock(
            "/api/generate-certificate",
            MockReply::json(500, serde_json::json!({"message": "PDF engine unavailable"})),
        );

        let identity = provider_user("u1", None).to_identity();
        let subject = CertificateSubject::from_result(&result());
        let err = generate(&api, &subject, Some(&identity), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CertificateError::Api(_)));
    }
}
