//! HTTP 传输层
//!
//! `HttpTransport` 把一次请求抽象为 `HttpRequest -> HttpResponse`，
//! 浏览器实现基于 `gloo-net`（fetch + AbortController），测试中替换为 `MockTransport`。

use async_trait::async_trait;
use gloo_net::http::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use agriwaste_shared::protocol::HttpMethod;

use crate::error::{ApiError, ApiResult};
use crate::runtime::CancellationToken;

/// 待上传的文件
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    /// 浏览器中的原始 `File` 对象；测试中为空
    pub handle: Option<web_sys::File>,
}

impl UploadFile {
    pub fn from_browser(file: web_sys::File) -> Self {
        Self {
            name: file.name(),
            content_type: file.type_(),
            size: file.size() as u64,
            handle: Some(file),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FormPart {
    Text { name: String, value: String },
    File { name: String, file: UploadFile },
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// 已序列化的 JSON 文本
    Json(String),
    Multipart(Vec<FormPart>),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub cancel: CancellationToken,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            body: RequestBody::Empty,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> ApiResult<Self> {
        let text = serde_json::to_string(body).map_err(|e| ApiError::Request(e.to_string()))?;
        self.body = RequestBody::Json(text);
        Ok(self)
    }

    pub fn with_multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// 非 2xx 响应转换为 `ApiError::Status`
    ///
    /// 后端错误体形如 `{"message": ...}` 或 FastAPI 的 `{"detail": ...}`。
    pub fn error_for_status(self) -> ApiResult<Self> {
        if self.ok() {
            return Ok(self);
        }
        let message = serde_json::from_slice::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| {
                ["message", "detail", "error"]
                    .iter()
                    .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(String::from))
            })
            .unwrap_or_default();
        Err(ApiError::Status {
            status: self.status,
            message,
        })
    }
}

#[async_trait(?Send)]
pub trait HttpTransport {
    async fn send(&self, req: HttpRequest) -> ApiResult<HttpResponse>;
}

// =========================================================
// 实现层: 浏览器 fetch
// =========================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct GlooTransport;

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn form_data(parts: &[FormPart]) -> ApiResult<web_sys::FormData> {
    let form = web_sys::FormData::new().map_err(|e| ApiError::Request(format!("{:?}", e)))?;
    for part in parts {
        let appended = match part {
            FormPart::Text { name, value } => form.append_with_str(name, value),
            FormPart::File { name, file } => match &file.handle {
                Some(handle) => form.append_with_blob_and_filename(name, handle, &file.name),
                None => return Err(ApiError::Request(format!("file part `{}` has no data", name))),
            },
        };
        appended.map_err(|e| ApiError::Request(format!("{:?}", e)))?;
    }
    Ok(form)
}

#[async_trait(?Send)]
impl HttpTransport for GlooTransport {
    async fn send(&self, req: HttpRequest) -> ApiResult<HttpResponse> {
        if req.cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let controller =
            web_sys::AbortController::new().map_err(|e| ApiError::Request(format!("{:?}", e)))?;
        let signal = controller.signal();
        req.cancel.on_cancel(move || controller.abort());

        let mut builder = RequestBuilder::new(&req.url)
            .method(to_method(req.method))
            .abort_signal(Some(&signal));
        for (key, value) in &req.headers {
            builder = builder.header(key, value);
        }

        let request = match &req.body {
            RequestBody::Empty => builder.build(),
            RequestBody::Json(text) => builder
                .header("Content-Type", "application/json")
                .body(text.as_str()),
            RequestBody::Multipart(parts) => builder.body(form_data(parts)?),
        }
        .map_err(|e| ApiError::Request(e.to_string()))?;

        let response = request.send().await.map_err(|e| {
            if req.cancel.is_cancelled() {
                ApiError::Cancelled
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .binary()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
