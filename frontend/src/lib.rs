//! AgriWaste2Fuel 前端应用
//!
//! 采用 Context-Driven 的高内聚低耦合架构：
//! - `web::route`: 路由定义（领域模型）
//! - `web::router`: 路由服务（核心引擎）
//! - `auth`: 身份提供方、会话与路由守卫
//! - `analysis`: 分类、结果编排与本地估算
//! - `components`: UI 组件层
//!
//! 服务层不依赖 Leptos，通过 `Runtime`、`HttpTransport`、`StorageBackend`
//! 和 `IdentityProvider` 注入浏览器能力，测试中替换为确定性实现。

pub mod analysis;
pub mod api;
pub mod auth;
pub mod cache;
pub mod certificate;
pub mod components;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod forms;
pub mod logging;
pub mod runtime;
pub mod services;
pub mod web;

#[cfg(test)]
pub mod testing;

use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::analysis::{IntakeService, ResultOrchestrator};
use crate::api::ApiClient;
use crate::auth::firebase::FirebaseProvider;
use crate::auth::{AuthContext, AuthSession};
use crate::cache::{CacheService, SessionCache};
use crate::components::dashboard::DashboardPage;
use crate::components::home::{AboutPage, HomePage, NotFoundPage};
use crate::components::input::InputPage;
use crate::components::login::LoginPage;
use crate::components::navbar::Navbar;
use crate::components::register::RegisterPage;
use crate::components::result::ResultPage;
use crate::config::AppConfig;
use crate::dashboard::DashboardLoader;
use crate::runtime::{BrowserRuntime, SharedRuntime};
use crate::services::{PendingAnalysis, Services, provide_services};
use crate::web::http::GlooTransport;
use crate::web::route::AppRoute;
use crate::web::router::{Router, RouterOutlet};
use crate::web::storage::StorageBackend;

/// 路由匹配函数
///
/// 根据 AppRoute 枚举返回对应的视图组件。
fn route_matcher(route: AppRoute) -> AnyView {
    match route {
        AppRoute::Home => view! { <HomePage /> }.into_any(),
        AppRoute::About => view! { <AboutPage /> }.into_any(),
        AppRoute::Login => view! { <LoginPage /> }.into_any(),
        AppRoute::Register => view! { <RegisterPage /> }.into_any(),
        AppRoute::Input => view! { <InputPage /> }.into_any(),
        AppRoute::Result => view! { <ResultPage /> }.into_any(),
        AppRoute::Dashboard => view! { <DashboardPage /> }.into_any(),
        AppRoute::NotFound => view! { <NotFoundPage /> }.into_any(),
    }
}

/// 组装浏览器环境下的服务
fn build_services(config: AppConfig) -> (Services, Rc<FirebaseProvider>) {
    let runtime: SharedRuntime = Rc::new(BrowserRuntime);
    let transport = Rc::new(GlooTransport);
    let storage: Rc<dyn StorageBackend> = Rc::new(web::storage::LocalStorage);

    let provider = Rc::new(FirebaseProvider::new(
        config.firebase_api_key.clone(),
        transport.clone(),
        storage.clone(),
        runtime.clone(),
    ));
    let api = ApiClient::new(&config, transport, provider.clone(), runtime.clone());

    let session = AuthSession::new(
        provider.clone(),
        api.clone(),
        SessionCache::new(storage, runtime.clone(), config.session_ttl),
        runtime.clone(),
        config.auth_grace_delay,
    );
    let intake = IntakeService::new(
        api.clone(),
        CacheService::in_memory(runtime.clone()),
        config.api_cache_ttl,
        config.stage_timeout,
    );
    let orchestrator = ResultOrchestrator::new(api.clone(), runtime, config.stage_timeout);
    let dashboard = DashboardLoader::new(api.clone(), config.dashboard_timeout, config.activity_limit);

    let services = Services {
        config,
        api,
        session,
        intake,
        orchestrator,
        dashboard,
    };
    (services, provider)
}

#[component]
pub fn App() -> impl IntoView {
    // 1. 配置与日志
    let config = AppConfig::from_build_env();
    logging::init(config.log_level);
    log::info!("[App] Starting, API at {}", config.api_base_url);

    // 2. 服务
    let (services, provider) = build_services(config);
    let session = services.session.clone();

    // 3. 认证上下文：镜像会话状态，再启动会话
    let auth_ctx = AuthContext::new(&session);
    provide_context(auth_ctx);
    session.start();

    // 4. 后台恢复提供方会话，完成后通过订阅通知会话
    spawn_local(async move {
        provider.restore().await;
    });

    provide_services(services);
    PendingAnalysis::provide();

    // 5. 守卫状态信号，注入路由服务（解耦）
    let guard = auth_ctx.guard_signal();

    view! {
        <Router guard=guard>
            <Navbar />
            <main>
                <RouterOutlet matcher=route_matcher />
            </main>
        </Router>
    }
}
