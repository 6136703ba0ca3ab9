use crate::BackendProfile;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// HTTP Methods for API Requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A trait that defines the request-response relationship and metadata for an API endpoint.
pub trait ApiRequest: Serialize {
    /// The response type returned by this request.
    type Response: DeserializeOwned;
    /// The URL path (or suffix).
    const PATH: &'static str;
    /// The HTTP method.
    const METHOD: HttpMethod;

    /// Query string appended to `PATH` (without the leading `?`).
    fn query(&self) -> Option<String> {
        None
    }
}

/// Image classification is a multipart upload and does not go through `ApiRequest`.
pub const PREDICT_IMAGE_PATH: &str = "/api/predict-image";

/// Backend envelope used by the dashboard and auth endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

// =========================================================
// Classification
// =========================================================

/// Classify a free-text waste description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictTextRequest {
    pub waste_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Classification response shared by text and image prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default, alias = "predicted_class", alias = "class")]
    pub waste_type: Option<String>,
    /// Percent, may be fractional
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub matched_category: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ApiRequest for PredictTextRequest {
    type Response = PredictionResponse;
    const PATH: &'static str = "/api/predict-text";
    const METHOD: HttpMethod = HttpMethod::Post;
}

// =========================================================
// Recommendation / GHG / Carbon credit
// =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub waste_type: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStep {
    #[serde(default)]
    pub step_number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tools_required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    #[serde(default)]
    pub recommended_method: Option<String>,
    #[serde(default)]
    pub processing_steps: Vec<ProcessingStep>,
    #[serde(default)]
    pub tools_required: Vec<String>,
    #[serde(default)]
    pub processing_time: Option<String>,
    #[serde(default)]
    pub efficiency: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl ApiRequest for RecommendRequest {
    type Response = RecommendResponse;
    const PATH: &'static str = "/api/recommend";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhgRequest {
    pub waste_type: String,
    pub processing_method: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalBenefit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub impact_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhgResponse {
    #[serde(default)]
    pub co2_saved: Option<f64>,
    #[serde(default, alias = "unit")]
    pub co2_saved_unit: Option<String>,
    #[serde(default)]
    pub methane_reduction: Option<f64>,
    #[serde(default, alias = "energy_output")]
    pub energy_generated: Option<f64>,
    #[serde(default)]
    pub environmental_benefits: Vec<EnvironmentalBenefit>,
}

impl ApiRequest for GhgRequest {
    type Response = GhgResponse;
    const PATH: &'static str = "/api/ghg-savings";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonCreditRequest {
    pub co2_saved: f64,
    pub waste_type: String,
    pub processing_method: String,
    pub verification_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonCreditResponse {
    #[serde(default, alias = "credits")]
    pub credits_earned: Option<f64>,
    #[serde(default, alias = "estimated_value")]
    pub market_value: Option<f64>,
    #[serde(default)]
    pub credits_unit: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl ApiRequest for CarbonCreditRequest {
    type Response = CarbonCreditResponse;
    const PATH: &'static str = "/api/carbon-credit";
    const METHOD: HttpMethod = HttpMethod::Post;
}

// =========================================================
// Certificate
// =========================================================

/// Response body is raw PDF bytes, fetched via `ApiClient::generate_certificate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    pub user_name: String,
    pub waste_type: String,
    pub co2_saved: f64,
    pub carbon_credits: f64,
    pub processing_method: String,
}

pub const GENERATE_CERTIFICATE_PATH: &str = "/api/generate-certificate";

// =========================================================
// Dashboard
// =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAnalysisRequest {
    pub waste_type: String,
    pub quantity: f64,
    /// 0–1 fraction
    pub confidence: f64,
    /// `image` or `text`
    pub method: String,
    pub co2_saved: f64,
    pub carbon_credits: f64,
    pub processing_method: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAnalysisResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiRequest for SaveAnalysisRequest {
    type Response = SaveAnalysisResponse;
    const PATH: &'static str = "/api/dashboard/save-analysis";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default)]
    pub total_analyses: u64,
    #[serde(default)]
    pub co2_saved: f64,
    #[serde(default)]
    pub carbon_credits: f64,
    #[serde(default)]
    pub estimated_earnings: f64,
    #[serde(default)]
    pub waste_processed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub waste_type: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub co2_saved: f64,
    #[serde(default)]
    pub carbon_credits: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    #[serde(default)]
    pub stats: DashboardStats,
    #[serde(default)]
    pub recent_activity: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardSummaryRequest;

impl ApiRequest for DashboardSummaryRequest {
    type Response = ApiEnvelope<DashboardSummary>;
    const PATH: &'static str = "/api/dashboard/summary";
    const METHOD: HttpMethod = HttpMethod::Get;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStatsRequest;

impl ApiRequest for DashboardStatsRequest {
    type Response = ApiEnvelope<DashboardStats>;
    const PATH: &'static str = "/api/dashboard/stats";
    const METHOD: HttpMethod = HttpMethod::Get;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRequest {
    #[serde(skip)]
    pub limit: u32,
}

impl ApiRequest for ActivityRequest {
    type Response = ApiEnvelope<Vec<ActivityEntry>>;
    const PATH: &'static str = "/api/dashboard/activity";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn query(&self) -> Option<String> {
        Some(format!("limit={}", self.limit))
    }
}

// =========================================================
// Auth
// =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStatusResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<BackendProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthStatusRequest;

impl ApiRequest for AuthStatusRequest {
    type Response = AuthStatusResponse;
    const PATH: &'static str = "/api/auth/status";
    const METHOD: HttpMethod = HttpMethod::Get;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub user: Option<BackendProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyTokenRequest;

impl ApiRequest for VerifyTokenRequest {
    type Response = VerifyTokenResponse;
    const PATH: &'static str = "/api/auth/verify-token";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutRequest;

impl ApiRequest for LogoutRequest {
    type Response = serde_json::Value;
    const PATH: &'static str = "/api/auth/logout";
    const METHOD: HttpMethod = HttpMethod::Delete;
}
