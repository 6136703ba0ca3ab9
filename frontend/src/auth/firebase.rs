//! Firebase Auth（REST）身份提供方
//!
//! 通过 Identity Toolkit 与 Secure Token 的公开 REST 接口完成登录注册，
//! refresh token 保存在 LocalStorage，页面加载后由 `restore` 异步恢复会话。

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use agriwaste_shared::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::provider::{IdentityListener, IdentityProvider, ListenerRegistry, ProviderUser, Subscription};
use crate::error::{AuthError, AuthErrorCode, AuthResult};
use crate::runtime::SharedRuntime;
use crate::web::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::web::storage::StorageBackend;

pub const PROVIDER_SESSION_KEY: &str = "agriWasteProviderSession";

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// ID Token 在到期前多久视为过期
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// 把 Firebase 的错误信息映射为错误码
///
/// 信息形如 `WEAK_PASSWORD : Password should be at least 6 characters`。
pub fn map_error_code(message: &str) -> AuthErrorCode {
    let code = message.split(" : ").next().unwrap_or(message).trim();
    match code {
        "EMAIL_NOT_FOUND" => AuthErrorCode::UserNotFound,
        "INVALID_PASSWORD" => AuthErrorCode::WrongPassword,
        "EMAIL_EXISTS" => AuthErrorCode::EmailInUse,
        "WEAK_PASSWORD" => AuthErrorCode::WeakPassword,
        "INVALID_EMAIL" | "MISSING_EMAIL" => AuthErrorCode::InvalidEmail,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthErrorCode::TooManyRequests,
        other => AuthErrorCode::Other(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorBody {
    error: FirebaseErrorDetail,
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorDetail {
    message: String,
}

/// signInWithPassword / signUp / update 的响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// 持久化的提供方会话
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    uid: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    photo_url: Option<String>,
    refresh_token: String,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    user: ProviderUser,
    id_token: String,
    refresh_token: String,
    expires_at: Timestamp,
}

impl ActiveSession {
    fn persisted(&self) -> PersistedSession {
        PersistedSession {
            uid: self.user.uid.clone(),
            email: self.user.email.clone(),
            display_name: self.user.display_name.clone(),
            email_verified: self.user.email_verified,
            photo_url: self.user.photo_url.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

fn parse_expires_in(value: Option<&str>) -> Duration {
    let secs = value.and_then(|v| v.parse::<u64>().ok()).unwrap_or(3600);
    Duration::from_secs(secs)
}

pub struct FirebaseProvider {
    api_key: String,
    transport: Rc<dyn HttpTransport>,
    storage: Rc<dyn StorageBackend>,
    runtime: SharedRuntime,
    session: RefCell<Option<ActiveSession>>,
    listeners: ListenerRegistry,
}

impl FirebaseProvider {
    pub fn new(
        api_key: impl Into<String>,
        transport: Rc<dyn HttpTransport>,
        storage: Rc<dyn StorageBackend>,
        runtime: SharedRuntime,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            transport,
            storage,
            runtime,
            session: RefCell::new(None),
            listeners: ListenerRegistry::default(),
        }
    }

    /// 从 LocalStorage 恢复会话并通知订阅者
    ///
    /// 无论结果如何都会通知一次，订阅者借此得知"确认无用户"。
    pub async fn restore(&self) {
        let persisted = self
            .storage
            .get(PROVIDER_SESSION_KEY)
            .and_then(|v| serde_json::from_value::<PersistedSession>(v).ok());

        let Some(persisted) = persisted else {
            self.listeners.notify(None);
            return;
        };

        let user = ProviderUser {
            uid: persisted.uid.clone(),
            email: persisted.email.clone(),
            display_name: persisted.display_name.clone(),
            email_verified: persisted.email_verified,
            photo_url: persisted.photo_url.clone(),
        };

        match self.refresh(&persisted.refresh_token).await {
            Ok(refreshed) => {
                let session = ActiveSession {
                    user,
                    id_token: refreshed.id_token,
                    refresh_token: refreshed.refresh_token,
                    expires_at: self.runtime.now() + parse_expires_in(Some(&refreshed.expires_in)),
                };
                self.install(session);
            }
            Err(e) => {
                log::warn!("[Auth] Stored session could not be restored: {}", e.code.user_message());
                self.storage.remove(PROVIDER_SESSION_KEY);
                self.listeners.notify(None);
            }
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}?key={}", IDENTITY_TOOLKIT_URL, method, self.api_key)
    }

    async fn post(&self, url: String, body: serde_json::Value) -> AuthResult<HttpResponse> {
        let request = HttpRequest::new(url, HttpMethod::Post).with_json(&body)?;
        let response = self.transport.send(request).await?;
        if response.ok() {
            return Ok(response);
        }

        let message = response
            .json::<FirebaseErrorBody>()
            .map(|b| b.error.message)
            .unwrap_or_else(|_| response.text());
        Err(AuthError::with_detail(map_error_code(&message), message))
    }

    async fn account_call(&self, method: &str, body: serde_json::Value) -> AuthResult<AccountResponse> {
        let response = self.post(self.endpoint(method), body).await?;
        response.json::<AccountResponse>().map_err(AuthError::from)
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshResponse> {
        let url = format!("{}?key={}", SECURE_TOKEN_URL, self.api_key);
        let body = json!({ "grant_type": "refresh_token", "refresh_token": refresh_token });
        let response = self.post(url, body).await?;
        response.json::<RefreshResponse>().map_err(AuthError::from)
    }

    /// 由账号接口响应建立会话
    fn session_from(&self, account: AccountResponse, previous: Option<&ActiveSession>) -> AuthResult<ActiveSession> {
        let id_token = account
            .id_token
            .or_else(|| previous.map(|p| p.id_token.clone()))
            .ok_or_else(|| AuthError::with_detail(AuthErrorCode::Other("MISSING_TOKEN".into()), "no idToken"))?;
        let refresh_token = account
            .refresh_token
            .or_else(|| previous.map(|p| p.refresh_token.clone()))
            .ok_or_else(|| AuthError::with_detail(AuthErrorCode::Other("MISSING_TOKEN".into()), "no refreshToken"))?;
        let expires_at = match (&account.expires_in, previous) {
            (None, Some(p)) => p.expires_at,
            (expires_in, _) => self.runtime.now() + parse_expires_in(expires_in.as_deref()),
        };

        let email = account
            .email
            .or_else(|| previous.map(|p| p.user.email.clone()))
            .unwrap_or_default();

        Ok(ActiveSession {
            user: ProviderUser {
                uid: account.local_id,
                email,
                display_name: account.display_name.filter(|n| !n.is_empty()),
                email_verified: account.email_verified.unwrap_or(false),
                photo_url: account.photo_url,
            },
            id_token,
            refresh_token,
            expires_at,
        })
    }

    /// 保存会话、持久化并通知订阅者
    fn install(&self, session: ActiveSession) -> ProviderUser {
        let user = session.user.clone();
        match serde_json::to_value(session.persisted()) {
            Ok(value) => {
                self.storage.set(PROVIDER_SESSION_KEY, &value);
            }
            Err(e) => log::warn!("[Auth] Failed to persist provider session: {}", e),
        }
        *self.session.borrow_mut() = Some(session);
        self.listeners.notify(Some(&user));
        user
    }

    fn active(&self) -> AuthResult<ActiveSession> {
        self.session
            .borrow()
            .clone()
            .ok_or_else(|| AuthError::new(AuthErrorCode::NoCurrentUser))
    }
}

#[async_trait(?Send)]
impl IdentityProvider for FirebaseProvider {
    fn current_user(&self) -> Option<ProviderUser> {
        self.session.borrow().as_ref().map(|s| s.user.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderUser> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let account = self.account_call("signInWithPassword", body).await?;
        let session = self.session_from(account, None)?;
        Ok(self.install(session))
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<ProviderUser> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let account = self.account_call("signUp", body).await?;
        let session = self.session_from(account, None)?;
        Ok(self.install(session))
    }

    async fn update_display_name(&self, name: &str) -> AuthResult<ProviderUser> {
        let current = self.active()?;
        let token = self.id_token().await?;
        let body = json!({ "idToken": token, "displayName": name, "returnSecureToken": true });
        let account = self.account_call("update", body).await?;

        let mut session = self.session_from(account, Some(&current))?;
        // update 接口不返回这两个字段
        session.user.email_verified = current.user.email_verified;
        session.user.photo_url = session.user.photo_url.or(current.user.photo_url);

        let user = session.user.clone();
        if let Ok(value) = serde_json::to_value(session.persisted()) {
            self.storage.set(PROVIDER_SESSION_KEY, &value);
        }
        *self.session.borrow_mut() = Some(session);
        Ok(user)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.session.borrow_mut().take();
        self.storage.remove(PROVIDER_SESSION_KEY);
        self.listeners.notify(None);
        Ok(())
    }

    async fn id_token(&self) -> AuthResult<String> {
        let session = self.active()?;
        if self.runtime.now() + TOKEN_REFRESH_MARGIN < session.expires_at {
            return Ok(session.id_token);
        }

        let refreshed = self.refresh(&session.refresh_token).await?;
        let expires_at = self.runtime.now() + parse_expires_in(Some(&refreshed.expires_in));
        let mut guard = self.session.borrow_mut();
        match guard.as_mut() {
            // 刷新期间用户未变化才写回
            Some(active) if active.user.uid == session.user.uid => {
                active.id_token = refreshed.id_token.clone();
                active.refresh_token = refreshed.refresh_token;
                active.expires_at = expires_at;
                Ok(refreshed.id_token)
            }
            _ => Err(AuthError::new(AuthErrorCode::NoCurrentUser)),
        }
    }

    fn subscribe(&self, listener: IdentityListener) -> Subscription {
        self.listeners.subscribe(listener)
    }
}
