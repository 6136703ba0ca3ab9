use agriwaste_shared::protocol::{ActivityEntry, DashboardSummary};
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::auth::use_auth;
use crate::dashboard::DashboardLoader;
use crate::runtime::CancellationToken;
use crate::services::use_services;
use crate::web::route::AppRoute;
use crate::web::router::Link;

#[component]
pub fn DashboardPage() -> impl IntoView {
    let services = use_services();
    let auth = use_auth();

    let (summary, set_summary) = signal(DashboardLoader::placeholder());
    let (refreshing, set_refreshing) = signal(false);
    let (notification, set_notification) = signal(Option::<String>::None);
    let cancel = StoredValue::new_local(CancellationToken::new());

    // 初始加载：先显示占位数据
    {
        let loader = services.with_value(|s| s.dashboard.clone());
        let token = cancel.get_value();
        spawn_local(async move {
            let loaded = loader.load(&token).await;
            if !token.is_cancelled() {
                set_summary.set(loaded);
            }
        });
    }

    on_cleanup(move || {
        cancel.try_with_value(|token| token.cancel());
    });

    let refresh = move |_| {
        set_refreshing.set(true);
        let loader = services.with_value(|s| s.dashboard.clone());
        let token = cancel.get_value();
        spawn_local(async move {
            let outcome = loader.refresh(&token).await;
            if token.is_cancelled() {
                return;
            }
            match outcome {
                Ok(fresh) => set_summary.set(fresh),
                Err(e) => set_notification.set(Some(format!("Failed to refresh dashboard: {}", e.user_message()))),
            }
            set_refreshing.set(false);
        });
    };

    // 3秒后清除通知
    Effect::new(move |_| {
        if notification.get().is_some() {
            set_timeout(move || set_notification.set(None), std::time::Duration::from_secs(3));
        }
    });

    let greeting = move || {
        auth.state
            .with(|s| s.identity.as_ref().map(|user| format!("Welcome, {}", user.display_name())))
            .unwrap_or_default()
    };
    let stats = move || summary.with(|s: &DashboardSummary| s.stats.clone());

    view! {
        <div class="min-h-screen bg-base-200 p-4 md:p-8">
            <div class="max-w-7xl mx-auto space-y-8">
                <Show when=move || notification.get().is_some()>
                    <div class="toast toast-top toast-end z-50">
                        <div class="alert alert-error shadow-lg">
                            <span>{move || notification.get().unwrap_or_default()}</span>
                        </div>
                    </div>
                </Show>

                <div class="flex items-center justify-between">
                    <h1 class="text-3xl font-bold">{greeting}</h1>
                    <div class="flex gap-2">
                        <Link to=AppRoute::Input.to_path() class="btn btn-primary">"New analysis"</Link>
                        <button on:click=refresh disabled=move || refreshing.get() class="btn btn-ghost">
                            {move || if refreshing.get() { "Refreshing..." } else { "Refresh" }}
                        </button>
                    </div>
                </div>

                <div class="stats shadow w-full stats-vertical md:stats-horizontal bg-base-100">
                    <div class="stat">
                        <div class="stat-title">"Total analyses"</div>
                        <div class="stat-value text-primary">{move || stats().total_analyses}</div>
                    </div>
                    <div class="stat">
                        <div class="stat-title">"CO₂ saved"</div>
                        <div class="stat-value text-success">{move || stats().co2_saved}</div>
                        <div class="stat-desc">"tons CO₂e"</div>
                    </div>
                    <div class="stat">
                        <div class="stat-title">"Carbon credits"</div>
                        <div class="stat-value">{move || stats().carbon_credits}</div>
                    </div>
                    <div class="stat">
                        <div class="stat-title">"Estimated earnings"</div>
                        <div class="stat-value text-secondary">{move || format!("₹{}", stats().estimated_earnings)}</div>
                    </div>
                </div>

                <div class="card bg-base-100 shadow-xl">
                    <div class="card-body p-0">
                        <div class="p-6 pb-2">
                            <h3 class="card-title">"Recent activity"</h3>
                        </div>
                        <div class="overflow-x-auto w-full">
                            <table class="table table-zebra w-full">
                                <thead>
                                    <tr>
                                        <th>"Waste type"</th>
                                        <th>"Quantity"</th>
                                        <th class="hidden md:table-cell">"CO₂ saved"</th>
                                        <th class="hidden md:table-cell">"Credits"</th>
                                        <th class="hidden md:table-cell">"Date"</th>
                                    </tr>
                                </thead>
                                <tbody>
                                    <Show when=move || summary.with(|s| s.recent_activity.is_empty())>
                                        <tr>
                                            <td colspan="5" class="text-center py-8 text-base-content/50">
                                                "No analyses yet."
                                            </td>
                                        </tr>
                                    </Show>
                                    <For
                                        each=move || summary.get().recent_activity
                                        key=|entry: &ActivityEntry| entry.id.clone()
                                        children=move |entry: ActivityEntry| view! {
                                            <tr>
                                                <td class="font-medium">{entry.waste_type}</td>
                                                <td>{format!("{} kg", entry.quantity)}</td>
                                                <td class="hidden md:table-cell">{entry.co2_saved}</td>
                                                <td class="hidden md:table-cell">{entry.carbon_credits}</td>
                                                <td class="hidden md:table-cell">{entry.timestamp.unwrap_or_default()}</td>
                                            </tr>
                                        }
                                    />
                                </tbody>
                            </table>
                        </div>
                    </div>
                </div>
            </div>
        </div>
    }
}
