//! 路由服务模块 - 核心引擎
//!
//! 封装了 web_sys 的 History API，实现高内聚：
//! 所有对 window.history 的操作都集中在此模块。
//! 实现了"监听 -> 验证 -> 处理 -> 加载"的导航流程，验证规则见 `auth::guard`。

use leptos::prelude::*;
use wasm_bindgen::prelude::*;

use super::route::AppRoute;
use crate::auth::guard::{GuardState, Navigation, decide};

/// 获取当前浏览器地址（path + 查询串）
fn current_location() -> String {
    let Some(location) = web_sys::window().map(|w| w.location()) else {
        return "/".to_string();
    };
    let path = location.pathname().unwrap_or_else(|_| "/".to_string());
    let search = location.search().unwrap_or_default();
    format!("{}{}", path, search)
}

/// 当前地址的查询串（含 `?`）
pub fn current_search() -> String {
    web_sys::window()
        .and_then(|w| w.location().search().ok())
        .unwrap_or_default()
}

/// 写入 History 状态（内部工具函数）
///
/// `use_push` 为 false 时替换当前记录（用于重定向）。
fn write_history(url: &str, use_push: bool) {
    let Some(history) = web_sys::window().and_then(|w| w.history().ok()) else {
        return;
    };
    let result = if use_push {
        history.push_state_with_url(&JsValue::NULL, "", Some(url))
    } else {
        history.replace_state_with_url(&JsValue::NULL, "", Some(url))
    };
    if let Err(e) = result {
        log::warn!("[Router] History update failed: {:?}", e);
    }
}

/// 路由器服务
///
/// 封装所有路由操作，通过 Signal 驱动界面更新。
/// 守卫状态由外部注入，与认证系统解耦。
#[derive(Clone, Copy)]
pub struct RouterService {
    current_route: ReadSignal<AppRoute>,
    set_route: WriteSignal<AppRoute>,
    guard: Signal<GuardState>,
}

impl RouterService {
    fn new(guard: Signal<GuardState>) -> Self {
        let initial_route = AppRoute::from_path(&current_location());
        let (current_route, set_route) = signal(initial_route);

        Self {
            current_route,
            set_route,
            guard,
        }
    }

    pub fn current_route(&self) -> ReadSignal<AppRoute> {
        self.current_route
    }

    pub fn guard(&self) -> Signal<GuardState> {
        self.guard
    }

    /// **核心方法：导航与守卫**
    pub fn navigate(&self, url: &str) {
        self.resolve(url, true);
    }

    /// 按守卫决策处理一次导航
    fn resolve(&self, requested: &str, use_push: bool) {
        let target = AppRoute::from_path(requested);
        let search = requested.split_once('?').map(|(_, q)| q).unwrap_or("");

        match decide(target, requested, search, self.guard.get_untracked()) {
            Navigation::Render(route) | Navigation::Wait(route) => {
                write_history(requested, use_push);
                self.set_route.set(route);
            }
            Navigation::Redirect(to) => {
                log::info!("[Router] {} -> {}", requested, to);
                write_history(&to, use_push);
                self.set_route.set(AppRoute::from_path(&to));
            }
        }
    }

    /// 初始化浏览器后退/前进按钮监听
    fn init_popstate_listener(&self) {
        let router = *self;
        let closure = Closure::<dyn Fn()>::new(move || {
            router.resolve(&current_location(), false);
        });

        if let Some(window) = web_sys::window() {
            let _ = window
                .add_event_listener_with_callback("popstate", closure.as_ref().unchecked_ref());
        }

        // 泄漏闭包以保持监听器存活
        closure.forget();
    }

    /// 守卫状态变化时重新检查当前地址
    ///
    /// 登出后离开受保护页面，登录后离开登录页。
    fn setup_guard_redirect(&self) {
        let router = *self;
        Effect::new(move |_| {
            let guard = router.guard.get();
            log::debug!("[Router] Guard state: {:?}", guard);
            router.resolve(&current_location(), false);
        });
    }
}

fn provide_router(guard: Signal<GuardState>) -> RouterService {
    let router = RouterService::new(guard);

    router.init_popstate_listener();
    router.setup_guard_redirect();

    provide_context(router);
    router
}

/// 从 Context 获取路由服务
pub fn use_router() -> RouterService {
    use_context::<RouterService>()
        .expect("RouterService not found in context. Ensure Router is provided.")
}

/// 导航函数（返回一个可调用的闭包）
pub fn use_navigate() -> impl Fn(&str) + Clone {
    let router = use_router();
    move |to: &str| {
        router.navigate(to);
    }
}

// ============================================================================
// UI 组件
// ============================================================================

/// 路由器根组件
#[component]
pub fn Router(
    /// 守卫状态信号
    guard: Signal<GuardState>,
    children: Children,
) -> impl IntoView {
    provide_router(guard);

    children()
}

/// 路由出口组件
///
/// 受保护页面在认证状态未定时显示加载中，而不是先跳转登录页。
#[component]
pub fn RouterOutlet(
    /// 路由匹配函数：接收当前路由，返回对应视图
    matcher: fn(AppRoute) -> AnyView,
) -> impl IntoView {
    let router = use_router();

    move || {
        let current = router.current_route().get();
        if current.requires_auth() && router.guard().get() == GuardState::Pending {
            return view! {
                <div class="flex items-center justify-center min-h-screen">
                    <span class="loading loading-spinner loading-lg"></span>
                </div>
            }
            .into_any();
        }
        matcher(current)
    }
}

/// 站内链接，点击时走路由服务而不是整页刷新
#[component]
pub fn Link(
    #[prop(into)] to: String,
    #[prop(optional, into)] class: String,
    children: Children,
) -> impl IntoView {
    let router = use_router();

    let target = to.clone();
    let on_click = move |ev: web_sys::MouseEvent| {
        ev.prevent_default();
        router.navigate(&target);
    };

    view! {
        <a href=to class=class on:click=on_click>
            {children()}
        </a>
    }
}
