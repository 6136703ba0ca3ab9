//! 认证上下文
//!
//! 把 `AuthSession` 的状态镜像到 Leptos 信号，路由守卫与页面只读信号。

use std::rc::Rc;

use agriwaste_shared::Identity;
use leptos::prelude::*;

use super::guard::GuardState;
use super::session::{AuthSession, AuthState};

#[derive(Clone, Copy)]
pub struct AuthContext {
    /// 认证状态（只读）
    pub state: ReadSignal<AuthState>,
}

impl AuthContext {
    /// 创建上下文并订阅会话状态
    pub fn new(session: &AuthSession) -> Self {
        let (state, set_state) = signal(session.state());
        session.set_observer(Rc::new(move |next: &AuthState| {
            set_state.set(next.clone());
        }));
        Self { state }
    }

    /// 注入路由服务的守卫信号
    pub fn guard_signal(&self) -> Signal<GuardState> {
        let state = self.state;
        Signal::derive(move || GuardState::evaluate(&state.get()))
    }

    pub fn identity(&self) -> Signal<Option<Identity>> {
        let state = self.state;
        Signal::derive(move || state.get().identity)
    }

    pub fn user_id(&self) -> Option<String> {
        self.state
            .with_untracked(|s| s.identity.as_ref().map(|i| i.id().to_string()))
    }
}

/// 从 Context 获取认证上下文
pub fn use_auth() -> AuthContext {
    use_context::<AuthContext>().expect("AuthContext should be provided")
}
