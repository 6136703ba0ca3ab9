use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

// =========================================================
// API 错误
// =========================================================

/// 后端请求失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 网络层失败（连接、CORS、浏览器拒绝等）
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// 请求被所属的取消令牌中止
    #[error("request cancelled")]
    Cancelled,
    /// 非 2xx 响应；`message` 取自响应体中的 `message`/`detail` 字段
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// 请求构建失败
    #[error("failed to build request: {0}")]
    Request(String),
}

impl ApiError {
    /// 给用户看的提示文本
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Timeout(_) => "Analysis timeout".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401, .. })
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// =========================================================
// 认证错误
// =========================================================

/// 身份提供方错误码（与具体提供方无关）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorCode {
    UserNotFound,
    WrongPassword,
    EmailInUse,
    WeakPassword,
    InvalidEmail,
    TooManyRequests,
    /// 没有已登录的提供方用户
    NoCurrentUser,
    Network,
    /// 其余错误码原样保留
    Other(String),
}

impl AuthErrorCode {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthErrorCode::UserNotFound => "No user found with this email address.",
            AuthErrorCode::WrongPassword => "Incorrect password.",
            AuthErrorCode::EmailInUse => "An account with this email already exists.",
            AuthErrorCode::WeakPassword => "Password should be at least 6 characters.",
            AuthErrorCode::InvalidEmail => "Please enter a valid email address.",
            AuthErrorCode::TooManyRequests => {
                "Too many failed login attempts. Please try again later."
            }
            AuthErrorCode::NoCurrentUser | AuthErrorCode::Network | AuthErrorCode::Other(_) => {
                "An error occurred. Please try again."
            }
        }
    }
}

/// 认证失败；`Display` 即用户提示
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", .code.user_message())]
pub struct AuthError {
    pub code: AuthErrorCode,
    /// 提供方原始信息，仅用于日志
    pub detail: Option<String>,
}

impl AuthError {
    pub fn new(code: AuthErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: AuthErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        let code = match err {
            ApiError::Network(_) | ApiError::Timeout(_) => AuthErrorCode::Network,
            _ => AuthErrorCode::Other("transport".to_string()),
        };
        AuthError::with_detail(code, err.to_string())
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

// =========================================================
// 分析错误
// =========================================================

/// 完整分析链路中的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Classification,
    Recommendation,
    GhgSavings,
    CarbonCredit,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisStage::Classification => "classification",
            AnalysisStage::Recommendation => "recommendation",
            AnalysisStage::GhgSavings => "ghg-savings",
            AnalysisStage::CarbonCredit => "carbon-credit",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("{stage} failed: {source}")]
    Stage {
        stage: AnalysisStage,
        #[source]
        source: ApiError,
    },
    #[error("Invalid analysis method or missing data")]
    MissingInput,
    #[error("No analysis data found")]
    NoData,
}

impl AnalysisError {
    pub fn stage(stage: AnalysisStage) -> impl FnOnce(ApiError) -> AnalysisError {
        move |source| AnalysisError::Stage { stage, source }
    }

    /// 结果页展示的错误文本（附带重试按钮）
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Stage { source, .. } => match source {
                ApiError::Status { .. } | ApiError::Timeout(_) => source.user_message(),
                _ => "Analysis failed".to_string(),
            },
            other => other.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            AnalysisError::Stage {
                source: ApiError::Cancelled,
                ..
            }
        )
    }
}

// =========================================================
// 证书错误
// =========================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CertificateError {
    #[error("Please log in to download certificates")]
    NotSignedIn,
    #[error("Failed to generate certificate: {0}")]
    Api(#[from] ApiError),
    #[error("Failed to start download: {0}")]
    Download(String),
}

// =========================================================
// 表单校验
// =========================================================

/// 字段 → 错误提示
#[derive(Error, Debug, Default, Clone, PartialEq)]
#[error("{} invalid field(s)", .0.len())]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}
