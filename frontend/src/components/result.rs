use std::rc::Rc;

use agriwaste_shared::{AnalysisResult, Completeness};
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::analysis::{AnalysisRequest, Publisher, ResultView};
use crate::auth::use_auth;
use crate::certificate::{self, CertificateSubject};
use crate::components::Spinner;
use crate::error::AnalysisError;
use crate::runtime::CancellationToken;
use crate::services::{ServicesHandle, use_pending_analysis, use_services};
use crate::web::route::AppRoute;
use crate::web::router::Link;

fn publisher(view: RwSignal<ResultView, LocalStorage>) -> Publisher {
    Rc::new(move |next: ResultView| {
        let _ = view.try_set(next);
    })
}

/// 启动一次分析，结果写入 `view`
fn start_run(services: ServicesHandle, request: AnalysisRequest, user_id: Option<String>, view: RwSignal<ResultView, LocalStorage>) {
    services.with_value(|s| s.orchestrator.run(request, user_id, publisher(view)));
}

#[component]
pub fn ResultPage() -> impl IntoView {
    let services = use_services();
    let auth = use_auth();
    let pending = use_pending_analysis();

    let result_view = RwSignal::new_local(ResultView::Loading);
    let (notice, set_notice) = signal(Option::<(String, bool)>::None); // 消息内容, 是否出错
    let (downloading, set_downloading) = signal(false);

    match pending.get_untracked() {
        Some(request) => start_run(services, request, auth.user_id(), result_view),
        None => result_view.set(ResultView::Failed(AnalysisError::NoData)),
    }

    // 离开结果页时取消仍在进行的分析
    on_cleanup(move || {
        services.try_with_value(|s| s.orchestrator.cancel());
    });

    let run_full = move || {
        if let Some(request) = pending.get_untracked() {
            start_run(services, request.into_full(), auth.user_id(), result_view);
        }
    };

    // 按失败那次运行的模式重试
    let retry = move || {
        services.with_value(|s| s.orchestrator.retry(auth.user_id(), publisher(result_view)));
    };

    let on_download = move |result: AnalysisResult| {
        set_downloading.set(true);
        set_notice.set(None);
        let api = services.with_value(|s| s.api.clone());
        let identity = auth.state.with_untracked(|s| s.identity.clone());
        spawn_local(async move {
            let subject = CertificateSubject::from_result(&result);
            let outcome = certificate::generate(&api, &subject, identity.as_ref(), &CancellationToken::new())
                .await
                .and_then(|cert| certificate::save_to_disk(&cert));
            match outcome {
                Ok(()) => set_notice.set(Some(("Certificate downloaded".to_string(), false))),
                Err(e) => {
                    log::error!("[Certificate] {}", e);
                    set_notice.set(Some((e.to_string(), true)));
                }
            }
            set_downloading.set(false);
        });
    };

    let body = move || match result_view.get() {
        ResultView::Loading => view! { <Spinner /> }.into_any(),
        ResultView::Failed(AnalysisError::NoData) => view! {
            <div class="alert alert-warning">
                <span>"No analysis data found. Start a new analysis first."</span>
                <Link to=AppRoute::Input.to_path() class="btn btn-sm">"Analyse waste"</Link>
            </div>
        }
        .into_any(),
        ResultView::Failed(err) => view! {
            <div role="alert" class="alert alert-error">
                <span>{err.user_message()}</span>
                <button class="btn btn-sm" on:click=move |_| retry()>"Retry"</button>
            </div>
        }
        .into_any(),
        ResultView::Ready(result) => {
            let provisional = result.completeness != Completeness::Complete;
            let for_download = result.clone();
            view! {
                <ResultCard result=result />
                <div class="flex flex-wrap gap-3">
                    <Show when=move || provisional>
                        <button class="btn btn-outline" on:click=move |_| run_full()>"Run full analysis"</button>
                    </Show>
                    <button
                        class="btn btn-primary"
                        disabled=move || downloading.get()
                        on:click=move |_| on_download(for_download.clone())
                    >
                        {move || if downloading.get() { "Generating..." } else { "Download certificate" }}
                    </button>
                </div>
            }
            .into_any()
        }
    };

    view! {
        <div class="max-w-4xl mx-auto p-4 md:p-8 space-y-6">
            <h1 class="text-3xl font-bold">"Analysis result"</h1>
            <Show when=move || notice.get().is_some()>
                <div class="toast toast-top toast-end z-50">
                    <div class=move || match notice.get() {
                        Some((_, true)) => "alert alert-error shadow-lg",
                        _ => "alert alert-success shadow-lg",
                    }>
                        <span>{move || notice.get().map(|(msg, _)| msg).unwrap_or_default()}</span>
                    </div>
                </div>
            </Show>
            {body}
        </div>
    }
}

#[component]
fn ResultCard(result: AnalysisResult) -> impl IntoView {
    let badge = match result.completeness {
        Completeness::Placeholder => Some("Estimate"),
        Completeness::Partial => Some("Partially updated"),
        Completeness::Complete => None,
    };

    view! {
        <div class="card bg-base-100 shadow-xl">
            <div class="card-body space-y-4">
                <div class="flex items-center gap-3">
                    <h2 class="card-title text-2xl">{result.waste_type.clone()}</h2>
                    <span class="badge badge-primary">{format!("{} confidence", result.confidence)}</span>
                    {badge.map(|b| view! { <span class="badge badge-ghost">{b}</span> })}
                </div>
                <p class="opacity-70">{format!("{} kg", result.quantity)}</p>

                <div class="stats stats-vertical md:stats-horizontal shadow">
                    <div class="stat">
                        <div class="stat-title">"Recommended method"</div>
                        <div class="stat-value text-lg">{result.recommended_method.clone()}</div>
                        <div class="stat-desc">{format!("Efficiency {}%", result.efficiency)}</div>
                    </div>
                    <div class="stat">
                        <div class="stat-title">"CO₂ saved"</div>
                        <div class="stat-value text-lg text-success">{format!("{} {}", result.co2_saved, result.co2_saved_unit)}</div>
                    </div>
                    <div class="stat">
                        <div class="stat-title">"Carbon credits"</div>
                        <div class="stat-value text-lg">{result.carbon_credits}</div>
                        <div class="stat-desc">{format!("Value ₹{}", result.value)}</div>
                    </div>
                </div>

                {(!result.processing_steps.is_empty()).then(|| view! {
                    <div>
                        <h3 class="font-semibold mb-2">
                            "Processing steps "
                            {result.processing_time.clone().map(|t| format!("({})", t))}
                        </h3>
                        <ol class="list-decimal pl-6 space-y-1">
                            {result.processing_steps.iter().map(|step| view! {
                                <li><span class="font-medium">{step.title.clone()}</span> " " {step.description.clone()}</li>
                            }).collect_view()}
                        </ol>
                    </div>
                })}

                {(!result.environmental_benefits.is_empty()).then(|| view! {
                    <div>
                        <h3 class="font-semibold mb-2">"Environmental benefits"</h3>
                        <ul class="list-disc pl-6 space-y-1">
                            {result.environmental_benefits.iter().map(|b| view! {
                                <li><span class="font-medium">{b.title.clone()}</span> " " {b.description.clone()}</li>
                            }).collect_view()}
                        </ul>
                    </div>
                })}
            </div>
        </div>
    }
}
