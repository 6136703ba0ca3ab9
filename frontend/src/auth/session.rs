//! 认证会话
//!
//! 启动时按 提供方内存状态 -> 本地会话缓存 -> 无 的顺序确定身份，全程不阻塞界面；
//! 之后由提供方的身份变化通知驱动。后端资料在后台获取并按来源优先级合并。

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use agriwaste_shared::protocol::{AuthStatusRequest, LogoutRequest, VerifyTokenRequest};
use agriwaste_shared::{Identity, Provenance, Sourced};

use super::provider::{IdentityProvider, ProviderUser, Subscription};
use crate::api::ApiClient;
use crate::cache::SessionCache;
use crate::error::AuthResult;
use crate::runtime::{CancellationToken, SharedRuntime};

/// 对外可见的认证状态
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }
}

/// 注册表单中与账号相关的字段
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterProfile {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub type StateObserver = Rc<dyn Fn(&AuthState)>;

struct SessionInner {
    provider: Rc<dyn IdentityProvider>,
    api: ApiClient,
    cache: SessionCache,
    runtime: SharedRuntime,
    grace_delay: Duration,
    state: RefCell<AuthState>,
    observer: RefCell<Option<StateObserver>>,
    subscription: RefCell<Option<Subscription>>,
}

#[derive(Clone)]
pub struct AuthSession {
    inner: Rc<SessionInner>,
}

impl AuthSession {
    pub fn new(
        provider: Rc<dyn IdentityProvider>,
        api: ApiClient,
        cache: SessionCache,
        runtime: SharedRuntime,
        grace_delay: Duration,
    ) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                provider,
                api,
                cache,
                runtime,
                grace_delay,
                state: RefCell::new(AuthState::default()),
                observer: RefCell::new(None),
                subscription: RefCell::new(None),
            }),
        }
    }

    /// 状态变化时回调（UI 层据此更新信号）
    pub fn set_observer(&self, observer: StateObserver) {
        *self.inner.observer.borrow_mut() = Some(observer);
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// 初始化身份并订阅提供方通知
    pub fn start(&self) {
        let inner = &self.inner;

        if let Some(user) = inner.provider.current_user() {
            log::info!("[Auth] Provider session present for {}", user.uid);
            let identity = user.to_identity();
            inner.cache.save(&identity);
            self.update(|state| {
                state.identity = Some(identity);
                state.loading = false;
            });
        } else if let Some(cached) = inner.cache.fast_session_check() {
            log::info!("[Auth] Using cached session for {}", cached.id());
            self.update(|state| {
                state.identity = Some(cached);
                state.loading = false;
            });
        } else {
            let weak = Rc::downgrade(&self.inner);
            let sleep = inner.runtime.sleep(inner.grace_delay);
            inner.runtime.spawn(Box::pin(async move {
                sleep.await;
                if let Some(session) = Self::upgrade(&weak) {
                    if session.is_loading() {
                        session.update(|state| state.loading = false);
                    }
                }
            }));
        }

        let weak = Rc::downgrade(&self.inner);
        let subscription = inner.provider.subscribe(Rc::new(move |user: Option<ProviderUser>| {
            if let Some(session) = Self::upgrade(&weak) {
                session.on_identity_change(user);
            }
        }));
        *inner.subscription.borrow_mut() = Some(subscription);
    }

    fn upgrade(weak: &Weak<SessionInner>) -> Option<AuthSession> {
        weak.upgrade().map(|inner| AuthSession { inner })
    }

    fn update(&self, f: impl FnOnce(&mut AuthState)) {
        let snapshot = {
            let mut state = self.inner.state.borrow_mut();
            f(&mut state);
            state.clone()
        };
        let observer = self.inner.observer.borrow().clone();
        if let Some(observer) = observer {
            observer(&snapshot);
        }
    }

    fn on_identity_change(&self, user: Option<ProviderUser>) {
        match user {
            Some(user) => {
                let incoming = user.to_identity();
                let identity = match self.identity() {
                    Some(existing) if existing.id() == incoming.id() => incoming.merge(existing),
                    _ => incoming,
                };
                self.inner.cache.save(&identity);
                self.update(|state| {
                    state.identity = Some(identity);
                    state.loading = false;
                });
                self.spawn_profile_fetch(user.uid);
            }
            None => {
                self.inner.cache.clear();
                self.update(|state| {
                    state.identity = None;
                    state.loading = false;
                });
            }
        }
    }

    /// 后台获取后端资料；返回时用户已变化则丢弃
    fn spawn_profile_fetch(&self, uid: String) {
        let weak = Rc::downgrade(&self.inner);
        let api = self.inner.api.clone();
        self.inner.runtime.spawn(Box::pin(async move {
            let status = match api.call(&AuthStatusRequest, &CancellationToken::new()).await {
                Ok(status) => status,
                Err(e) => {
                    log::warn!("[Auth] Profile fetch failed: {}", e);
                    return;
                }
            };
            let Some(profile) = status.user else {
                return;
            };
            let Some(session) = Self::upgrade(&weak) else {
                return;
            };

            let merged = match session.identity() {
                Some(current) if current.id() == uid => current.merge_profile(&profile),
                _ => {
                    log::debug!("[Auth] Discarding stale profile for {}", uid);
                    return;
                }
            };
            session.inner.cache.save(&merged);
            session.update(|state| state.identity = Some(merged));
        }));
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<()> {
        self.update(|state| state.loading = true);
        let result = self.inner.provider.sign_in(email, password).await;
        self.update(|state| state.loading = false);

        let user = result.inspect_err(|e| {
            log::warn!("[Auth] Login failed: {}", e.detail.as_deref().unwrap_or("-"));
        })?;
        self.ensure_identity(user);
        self.spawn_backend_check();
        Ok(())
    }

    pub async fn register(&self, profile: &RegisterProfile) -> AuthResult<()> {
        self.update(|state| state.loading = true);
        let result = self.sign_up(profile).await;
        self.update(|state| state.loading = false);

        result.inspect_err(|e| {
            log::warn!("[Auth] Registration failed: {}", e.detail.as_deref().unwrap_or("-"));
        })
    }

    async fn sign_up(&self, profile: &RegisterProfile) -> AuthResult<()> {
        let provider = &self.inner.provider;
        let user = provider.sign_up(&profile.email, &profile.password).await?;
        self.ensure_identity(user);

        let name = profile.name.trim();
        if name.is_empty() {
            return Ok(());
        }
        let updated = provider.update_display_name(name).await?;
        // 资料更新不会触发身份通知，这里直接写入
        let identity = self.identity().filter(|i| i.id() == updated.uid).map(|mut identity| {
            identity.display_name = Sourced::new(name.to_string(), Provenance::Provider);
            identity
        });
        if let Some(identity) = identity {
            self.inner.cache.save(&identity);
            self.update(|state| state.identity = Some(identity));
        }
        Ok(())
    }

    /// 提供方未发出通知时补上身份
    fn ensure_identity(&self, user: ProviderUser) {
        let known = self.identity().is_some_and(|i| i.id() == user.uid);
        if !known {
            self.on_identity_change(Some(user));
        }
    }

    /// 登录后检查后端是否认可该 Token（仅记录日志）
    fn spawn_backend_check(&self) {
        let api = self.inner.api.clone();
        self.inner.runtime.spawn(Box::pin(async move {
            let cancel = CancellationToken::new();
            let (verify, status) = futures::join!(
                api.call(&VerifyTokenRequest, &cancel),
                api.call(&AuthStatusRequest, &cancel)
            );
            match verify {
                Ok(resp) => log::info!("[Auth] Token verified by backend: {}", resp.valid),
                Err(e) => log::warn!("[Auth] Token verification failed: {}", e),
            }
            match status {
                Ok(resp) => log::info!("[Auth] Backend auth status: {}", resp.authenticated),
                Err(e) => log::warn!("[Auth] Backend auth status check failed: {}", e),
            }
        }));
    }

    /// 登出；远端失败只记录日志，本地状态总会被清除
    pub async fn logout(&self) {
        if let Err(e) = self.inner.api.call(&LogoutRequest, &CancellationToken::new()).await {
            log::warn!("[Auth] Backend logout failed: {}", e);
        }
        if let Err(e) = self.inner.provider.sign_out().await {
            log::warn!("[Auth] Provider sign-out failed: {:?}", e.detail);
        }

        self.inner.cache.clear();
        self.update(|state| {
            state.identity = None;
            state.loading = false;
        });
    }

    pub async fn get_token(&self) -> Option<String> {
        self.inner.provider.current_user()?;
        match self.inner.provider.id_token().await {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("[Auth] Failed to get token: {:?}", e.detail);
                None
            }
        }
    }
}
