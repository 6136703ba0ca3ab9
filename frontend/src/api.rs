//! 后端 REST 客户端
//!
//! 每次请求：按需附加 Bearer Token -> 限时发送 -> 非 2xx 转换为 `ApiError::Status`。
//! 调用方传入的取消令牌会一直传到传输层（中止 fetch）。

use std::rc::Rc;
use std::time::Duration;

use agriwaste_shared::protocol::{
    ApiRequest, CertificateRequest, GENERATE_CERTIFICATE_PATH, PREDICT_IMAGE_PATH, PredictionResponse,
};
use agriwaste_shared::HEADER_AUTHORIZATION;

use crate::auth::provider::IdentityProvider;
use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::runtime::{CancellationToken, SharedRuntime, until_cancelled, with_timeout};
use crate::web::http::{FormPart, HttpMethod, HttpRequest, HttpResponse, HttpTransport, UploadFile};

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Rc<dyn HttpTransport>,
    identity: Rc<dyn IdentityProvider>,
    runtime: SharedRuntime,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(
        config: &AppConfig,
        transport: Rc<dyn HttpTransport>,
        identity: Rc<dyn IdentityProvider>,
        runtime: SharedRuntime,
    ) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            transport,
            identity,
            runtime,
            request_timeout: config.request_timeout,
        }
    }

    pub fn runtime(&self) -> &SharedRuntime {
        &self.runtime
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// 当前用户的 Bearer Token
    ///
    /// 没有提供方用户时不附带认证头；取 Token 失败只记录日志。
    async fn bearer(&self) -> Option<String> {
        self.identity.current_user()?;
        match self.identity.id_token().await {
            Ok(token) => Some(format!("Bearer {}", token)),
            Err(e) => {
                log::warn!("[Api] Failed to get auth token: {:?}", e.detail);
                None
            }
        }
    }

    /// 发送请求
    ///
    /// 请求使用 `cancel` 的子令牌：超时只中止本次请求，不影响调用方的其他请求。
    async fn execute(&self, request: HttpRequest, cancel: &CancellationToken) -> ApiResult<HttpResponse> {
        let mut request = request;
        if let Some(bearer) = self.bearer().await {
            request = request.with_header(HEADER_AUTHORIZATION, &bearer);
        }

        let token = cancel.child();
        let request = request.with_cancel(token.clone());
        log::debug!("[Api] {} {}", request.method.as_str(), request.url);

        let send = until_cancelled(&token, self.transport.send(request));
        let response = with_timeout(self.runtime.as_ref(), self.request_timeout, &token, send).await?;
        response.error_for_status()
    }

    /// 调用 JSON 接口
    pub async fn call<R: ApiRequest>(&self, req: &R, cancel: &CancellationToken) -> ApiResult<R::Response> {
        let url = match req.query() {
            Some(query) => format!("{}?{}", self.url(R::PATH), query),
            None => self.url(R::PATH),
        };

        let mut request = HttpRequest::new(url, R::METHOD);
        if R::METHOD != HttpMethod::Get {
            let body = serde_json::to_value(req)?;
            if !body.is_null() {
                request = request.with_json(&body)?;
            }
        }

        self.execute(request, cancel).await?.json::<R::Response>()
    }

    /// 图片分类（multipart 上传）
    pub async fn predict_image(
        &self,
        file: UploadFile,
        user_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> ApiResult<PredictionResponse> {
        let mut parts = vec![FormPart::File {
            name: "file".to_string(),
            file,
        }];
        if let Some(uid) = user_id {
            parts.push(FormPart::Text {
                name: "userId".to_string(),
                value: uid.to_string(),
            });
        }

        let request = HttpRequest::new(self.url(PREDICT_IMAGE_PATH), HttpMethod::Post).with_multipart(parts);
        self.execute(request, cancel).await?.json()
    }

    /// 生成证书，返回 PDF 字节
    pub async fn generate_certificate(
        &self,
        req: &CertificateRequest,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<u8>> {
        let request = HttpRequest::new(self.url(GENERATE_CERTIFICATE_PATH), HttpMethod::Post).with_json(req)?;
        Ok(self.execute(request, cancel).await?.body)
    }
}
