//! 仪表盘数据
//!
//! 先显示全零的占位数据，汇总接口在限定时间内返回才替换；
//! 手动刷新则分别请求统计和最近活动，错误会交给界面展示。

use std::time::Duration;

use agriwaste_shared::protocol::{ActivityRequest, DashboardStatsRequest, DashboardSummary, DashboardSummaryRequest};

use crate::api::ApiClient;
use crate::error::ApiResult;
use crate::runtime::{CancellationToken, with_timeout};

#[derive(Clone)]
pub struct DashboardLoader {
    api: ApiClient,
    timeout: Duration,
    activity_limit: u32,
}

impl DashboardLoader {
    pub fn new(api: ApiClient, timeout: Duration, activity_limit: u32) -> Self {
        Self {
            api,
            timeout,
            activity_limit,
        }
    }

    pub fn placeholder() -> DashboardSummary {
        DashboardSummary::default()
    }

    /// 汇总数据；超时或失败时返回占位数据
    pub async fn load(&self, cancel: &CancellationToken) -> DashboardSummary {
        let token = cancel.child();
        let runtime = self.api.runtime().clone();
        let call = self.api.call(&DashboardSummaryRequest, &token);

        match with_timeout(runtime.as_ref(), self.timeout, &token, call).await {
            Ok(envelope) => envelope.data,
            Err(e) => {
                log::info!("[Dashboard] Summary unavailable, keeping placeholder: {}", e);
                Self::placeholder()
            }
        }
    }

    /// 并发请求统计与最近活动
    pub async fn refresh(&self, cancel: &CancellationToken) -> ApiResult<DashboardSummary> {
        let activity = ActivityRequest {
            limit: self.activity_limit,
        };
        let (stats, recent) = futures::join!(
            self.api.call(&DashboardStatsRequest, cancel),
            self.api.call(&activity, cancel)
        );

        Ok(DashboardSummary {
            stats: stats?.data,
            recent_activity: recent?.data,
        })
    }
}
