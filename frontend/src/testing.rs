//! 测试工具: TestRuntime / MockTransport / MockIdentityProvider

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use agriwaste_shared::Timestamp;
use async_trait::async_trait;
use futures::future::LocalBoxFuture;

use crate::auth::provider::{
    IdentityListener, IdentityProvider, ListenerRegistry, ProviderUser, Subscription,
};
use crate::error::{ApiError, ApiResult, AuthError, AuthErrorCode, AuthResult};
use crate::runtime::{CancellationToken, Runtime};
use crate::web::http::{FormPart, HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody};

// =========================================================
// TestRuntime
// =========================================================

/// 确定性运行时
///
/// - `now()` 由测试手动推进（`advance_clock`）
/// - `sleep()` 走 tokio 的暂停时钟（配合 `start_paused = true`）
/// - `spawn()` 只入队，由 `drain()` / `run_spawned()` 显式执行
pub struct TestRuntime {
    now_ms: Cell<i64>,
    queue: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
}

impl TestRuntime {
    pub const EPOCH_MS: i64 = 1_700_000_000_000;

    pub fn new() -> Self {
        Self {
            now_ms: Cell::new(Self::EPOCH_MS),
            queue: RefCell::new(Vec::new()),
        }
    }

    pub fn advance_clock(&self, by: Duration) {
        self.now_ms.set(self.now_ms.get() + by.as_millis() as i64);
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.borrow().len()
    }

    fn take_queue(&self) -> Vec<LocalBoxFuture<'static, ()>> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }

    /// 同步执行已派发的任务（仅适用于不依赖定时器的任务）
    pub fn run_spawned(&self) {
        loop {
            let tasks = self.take_queue();
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                futures::executor::block_on(task);
            }
        }
    }

    /// 并发执行所有已派发的任务，直到队列为空
    pub async fn drain(&self) {
        loop {
            let tasks = self.take_queue();
            if tasks.is_empty() {
                break;
            }
            futures::future::join_all(tasks).await;
        }
    }
}

impl Runtime for TestRuntime {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.now_ms.get())
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.queue.borrow_mut().push(task);
    }
}

// =========================================================
// MockTransport
// =========================================================

#[derive(Debug, Clone)]
enum ReplyKind {
    Body { status: u16, body: Vec<u8> },
    NetworkError(String),
    /// 永不返回（直到被取消）
    Pending,
}

#[derive(Debug, Clone)]
pub struct MockReply {
    kind: ReplyKind,
    delay: Duration,
}

impl MockReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            kind: ReplyKind::Body {
                status,
                body: body.to_string().into_bytes(),
            },
            delay: Duration::ZERO,
        }
    }

    pub fn bytes(status: u16, body: &[u8]) -> Self {
        Self {
            kind: ReplyKind::Body {
                status,
                body: body.to_vec(),
            },
            delay: Duration::ZERO,
        }
    }

    pub fn network_error(message: &str) -> Self {
        Self {
            kind: ReplyKind::NetworkError(message.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn pending() -> Self {
        Self {
            kind: ReplyKind::Pending,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// 记录下来的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub path: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub cancel: CancellationToken,
}

impl RecordedRequest {
    pub fn json_body(&self) -> Option<serde_json::Value> {
        match &self.body {
            RequestBody::Json(text) => serde_json::from_str(text).ok(),
            _ => None,
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn form_field_names(&self) -> Vec<String> {
        match &self.body {
            RequestBody::Multipart(parts) => parts
                .iter()
                .map(|p| match p {
                    FormPart::Text { name, .. } | FormPart::File { name, .. } => name.clone(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// 去掉协议、主机和查询串后的路径
fn path_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = without_scheme
        .find('/')
        .map(|i| &without_scheme[i..])
        .unwrap_or("/");
    path.split('?').next().unwrap_or(path).to_string()
}

/// 按 URL 或路径返回预设响应的传输层
///
/// 未配置的地址返回 404。
#[derive(Default)]
pub struct MockTransport {
    by_url: RefCell<HashMap<String, MockReply>>,
    by_path: RefCell<HashMap<String, MockReply>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mock(&self, path: &str, reply: MockReply) {
        self.by_path.borrow_mut().insert(path.to_string(), reply);
    }

    pub fn mock_url(&self, url: &str, reply: MockReply) {
        self.by_url.borrow_mut().insert(url.to_string(), reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    fn reply_for(&self, url: &str, path: &str) -> Option<MockReply> {
        if let Some(reply) = self.by_url.borrow().get(url) {
            return Some(reply.clone());
        }
        self.by_path.borrow().get(path).cloned()
    }
}

#[async_trait(?Send)]
impl HttpTransport for MockTransport {
    async fn send(&self, req: HttpRequest) -> ApiResult<HttpResponse> {
        let path = path_of(&req.url);
        let reply = self.reply_for(&req.url, &path);
        self.requests.borrow_mut().push(RecordedRequest {
            url: req.url.clone(),
            path: path.clone(),
            method: req.method,
            headers: req.headers.clone(),
            body: req.body.clone(),
            cancel: req.cancel.clone(),
        });

        let Some(reply) = reply else {
            return Ok(HttpResponse {
                status: 404,
                body: b"Not Found".to_vec(),
            });
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        // 模拟 AbortController：取消后的请求不返回数据
        if req.cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        match reply.kind {
            ReplyKind::Body { status, body } => Ok(HttpResponse { status, body }),
            ReplyKind::NetworkError(message) => Err(ApiError::Network(message)),
            ReplyKind::Pending => {
                req.cancel.cancelled().await;
                Err(ApiError::Cancelled)
            }
        }
    }
}

// =========================================================
// MockIdentityProvider
// =========================================================

pub fn provider_user(uid: &str, name: Option<&str>) -> ProviderUser {
    ProviderUser {
        uid: uid.to_string(),
        email: format!("{}@farm.in", uid),
        display_name: name.map(String::from),
        email_verified: true,
        photo_url: None,
    }
}

/// 内存中的身份提供方
#[derive(Default)]
pub struct MockIdentityProvider {
    current: RefCell<Option<ProviderUser>>,
    accounts: RefCell<HashMap<String, (String, ProviderUser)>>,
    listeners: ListenerRegistry,
    fail_token: Cell<bool>,
    fail_sign_out: Cell<bool>,
    pub token_requests: Cell<usize>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current(user: ProviderUser) -> Self {
        let provider = Self::new();
        *provider.current.borrow_mut() = Some(user);
        provider
    }

    pub fn add_account(&self, password: &str, user: ProviderUser) {
        self.accounts
            .borrow_mut()
            .insert(user.email.clone(), (password.to_string(), user));
    }

    /// 模拟提供方推送身份变化
    pub fn emit(&self, user: Option<ProviderUser>) {
        *self.current.borrow_mut() = user.clone();
        self.listeners.notify(user.as_ref());
    }

    pub fn fail_token(&self, fail: bool) {
        self.fail_token.set(fail);
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.set(fail);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait(?Send)]
impl IdentityProvider for MockIdentityProvider {
    fn current_user(&self) -> Option<ProviderUser> {
        self.current.borrow().clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderUser> {
        let account = self.accounts.borrow().get(email).cloned();
        let Some((expected, user)) = account else {
            return Err(AuthError::new(AuthErrorCode::UserNotFound));
        };
        if expected != password {
            return Err(AuthError::new(AuthErrorCode::WrongPassword));
        }
        self.emit(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<ProviderUser> {
        if self.accounts.borrow().contains_key(email) {
            return Err(AuthError::new(AuthErrorCode::EmailInUse));
        }
        if password.len() < 6 {
            return Err(AuthError::new(AuthErrorCode::WeakPassword));
        }
        let user = ProviderUser {
            uid: format!("uid-{}", self.accounts.borrow().len() + 1),
            email: email.to_string(),
            display_name: None,
            email_verified: false,
            photo_url: None,
        };
        self.add_account(password, user.clone());
        self.emit(Some(user.clone()));
        Ok(user)
    }

    async fn update_display_name(&self, name: &str) -> AuthResult<ProviderUser> {
        let mut current = self.current.borrow_mut();
        let user = current
            .as_mut()
            .ok_or_else(|| AuthError::new(AuthErrorCode::NoCurrentUser))?;
        user.display_name = Some(name.to_string());
        Ok(user.clone())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        if self.fail_sign_out.get() {
            return Err(AuthError::new(AuthErrorCode::Network));
        }
        self.emit(None);
        Ok(())
    }

    async fn id_token(&self) -> AuthResult<String> {
        self.token_requests.set(self.token_requests.get() + 1);
        let uid = self
            .current
            .borrow()
            .as_ref()
            .map(|u| u.uid.clone())
            .ok_or_else(|| AuthError::new(AuthErrorCode::NoCurrentUser))?;
        if self.fail_token.get() {
            return Err(AuthError::new(AuthErrorCode::Network));
        }
        Ok(format!("token-{}", uid))
    }

    fn subscribe(&self, listener: IdentityListener) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_of() {
        assert_eq!(path_of("http://localhost:8000/api/dashboard/activity?limit=10"), "/api/dashboard/activity");
        assert_eq!(path_of("https://host"), "/");
    }
}
