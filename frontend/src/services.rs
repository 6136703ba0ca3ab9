//! 应用服务上下文
//!
//! 服务内部使用 `Rc`，通过 `StoredValue<_, LocalStorage>` 放入 Leptos Context。

use leptos::prelude::*;

use crate::analysis::{AnalysisRequest, IntakeService, ResultOrchestrator};
use crate::api::ApiClient;
use crate::auth::AuthSession;
use crate::config::AppConfig;
use crate::dashboard::DashboardLoader;

#[derive(Clone)]
pub struct Services {
    pub config: AppConfig,
    pub api: ApiClient,
    pub session: AuthSession,
    pub intake: IntakeService,
    pub orchestrator: ResultOrchestrator,
    pub dashboard: DashboardLoader,
}

pub fn provide_services(services: Services) {
    provide_context(StoredValue::new_local(services));
}

/// Context 中的服务句柄（`Copy`，可放进任意闭包）
pub type ServicesHandle = StoredValue<Services, LocalStorage>;

/// 从 Context 获取服务句柄
pub fn use_services() -> ServicesHandle {
    use_context::<ServicesHandle>().expect("Services should be provided")
}

/// 输入页交给结果页的分析请求
#[derive(Clone, Copy)]
pub struct PendingAnalysis(pub RwSignal<Option<AnalysisRequest>, LocalStorage>);

impl PendingAnalysis {
    pub fn provide() {
        provide_context(PendingAnalysis(RwSignal::new_local(None)));
    }

    pub fn set(&self, request: AnalysisRequest) {
        self.0.set(Some(request));
    }

    pub fn get_untracked(&self) -> Option<AnalysisRequest> {
        self.0.get_untracked()
    }
}

pub fn use_pending_analysis() -> PendingAnalysis {
    use_context::<PendingAnalysis>().expect("PendingAnalysis should be provided")
}
