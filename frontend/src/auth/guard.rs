//! 路由守卫

use super::session::AuthState;
use crate::web::route::{AppRoute, login_redirect, return_path};

/// 守卫状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// 仍在加载且尚无身份
    Pending,
    /// 加载结束，没有身份
    Denied,
    /// 已有身份（来自提供方或缓存）
    Allowed,
}

impl GuardState {
    /// 只要任一来源给出身份即放行，即使仍在加载
    pub fn evaluate(state: &AuthState) -> Self {
        match (&state.identity, state.loading) {
            (Some(_), _) => GuardState::Allowed,
            (None, true) => GuardState::Pending,
            (None, false) => GuardState::Denied,
        }
    }
}

/// 导航决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(AppRoute),
    /// 认证状态未定，显示加载中
    Wait(AppRoute),
    Redirect(String),
}

/// 决定如何处理一次导航
///
/// `requested` 为完整的站内地址（含查询串），拒绝时作为来源路径保留；
/// `search` 为当前地址的查询串，已登录用户离开登录页时从中取回来源路径。
pub fn decide(target: AppRoute, requested: &str, search: &str, guard: GuardState) -> Navigation {
    if target.requires_auth() {
        return match guard {
            GuardState::Allowed => Navigation::Render(target),
            GuardState::Pending => Navigation::Wait(target),
            GuardState::Denied => Navigation::Redirect(login_redirect(requested)),
        };
    }

    if target.should_redirect_when_authenticated() && guard == GuardState::Allowed {
        let to = return_path(search)
            .unwrap_or_else(|| AppRoute::auth_success_redirect().to_path().to_string());
        return Navigation::Redirect(to);
    }

    Navigation::Render(target)
}
