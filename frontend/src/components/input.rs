use agriwaste_shared::Timestamp;
use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::JsCast;

use crate::analysis::TextSubmission;
use crate::analysis::placeholder::local_analysis;
use crate::auth::use_auth;
use crate::components::FieldError;
use crate::error::FieldErrors;
use crate::forms::{TextForm, validate_image};
use crate::services::{use_pending_analysis, use_services};
use crate::web::http::UploadFile;
use crate::web::route::AppRoute;
use crate::web::router::use_navigate;

const WASTE_TYPES: [&str; 5] = [
    "Rice Straw",
    "Wheat Straw",
    "Corn Stalks",
    "Cotton Waste",
    "Sugarcane Bagasse",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Image,
    Text,
}

fn selected_file(ev: &web_sys::Event) -> Option<UploadFile> {
    let input = ev.target()?.dyn_into::<web_sys::HtmlInputElement>().ok()?;
    let file = input.files()?.get(0)?;
    Some(UploadFile::from_browser(file))
}

#[component]
pub fn InputPage() -> impl IntoView {
    let services = use_services();
    let auth = use_auth();
    let pending = use_pending_analysis();
    let navigate = use_navigate();

    let (mode, set_mode) = signal(Mode::Image);
    let text_form = RwSignal::new(TextForm {
        waste_type: WASTE_TYPES[0].to_string(),
        ..TextForm::default()
    });
    let upload = RwSignal::new_local(Option::<UploadFile>::None);
    let (field_errors, set_field_errors) = signal(FieldErrors::new());
    let (is_submitting, set_is_submitting) = signal(false);

    // 本地即时预估，不请求后端
    let preview = move || {
        text_form.with(|f| {
            let quantity = f.validate().ok()?;
            Some(local_analysis(&f.waste_type, quantity, Timestamp::from(chrono::Utc::now())))
        })
    };

    let go_to_result = {
        let navigate = navigate.clone();
        move || navigate(AppRoute::Result.to_path())
    };

    let on_text_submit = {
        let go_to_result = go_to_result.clone();
        move |ev: web_sys::SubmitEvent| {
            ev.prevent_default();
            let form = text_form.get_untracked();
            let quantity = match form.validate() {
                Ok(q) => q,
                Err(errors) => {
                    set_field_errors.set(errors);
                    return;
                }
            };
            set_field_errors.set(FieldErrors::new());
            set_is_submitting.set(true);

            let submission = TextSubmission {
                waste_type: form.waste_type.trim().to_string(),
                quantity,
                location: form.location(),
            };
            let intake = services.with_value(|s| s.intake.clone());
            let user_id = auth.user_id();
            let go_to_result = go_to_result.clone();
            spawn_local(async move {
                let request = intake.submit_text(submission, user_id).await;
                pending.set(request);
                set_is_submitting.set(false);
                go_to_result();
            });
        }
    };

    let on_file_change = move |ev: web_sys::Event| {
        let file = selected_file(&ev);
        match file.as_ref().map(validate_image) {
            Some(Err(errors)) => {
                set_field_errors.set(errors);
                upload.set(None);
            }
            _ => {
                set_field_errors.set(FieldErrors::new());
                upload.set(file);
            }
        }
    };

    let on_image_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        let Some(file) = upload.get_untracked() else {
            let mut errors = FieldErrors::new();
            errors.insert("image", "Please choose an image");
            set_field_errors.set(errors);
            return;
        };
        set_is_submitting.set(true);

        let intake = services.with_value(|s| s.intake.clone());
        let user_id = auth.user_id();
        let go_to_result = go_to_result.clone();
        spawn_local(async move {
            let request = intake.submit_image(file, user_id).await;
            pending.set(request);
            set_is_submitting.set(false);
            go_to_result();
        });
    };

    let tab_class = move |m: Mode| {
        if mode.get() == m { "tab tab-active" } else { "tab" }
    };

    let submit_label = move |idle: &'static str| {
        move || {
            if is_submitting.get() {
                view! { <span class="loading loading-spinner"></span> "Analysing..." }.into_any()
            } else {
                idle.into_any()
            }
        }
    };

    view! {
        <div class="max-w-3xl mx-auto p-4 md:p-8 space-y-6">
            <h1 class="text-3xl font-bold">"Analyse agricultural waste"</h1>

            <div role="tablist" class="tabs tabs-boxed">
                <a role="tab" class=move || tab_class(Mode::Image) on:click=move |_| set_mode.set(Mode::Image)>"Upload image"</a>
                <a role="tab" class=move || tab_class(Mode::Text) on:click=move |_| set_mode.set(Mode::Text)>"Describe waste"</a>
            </div>

            <Show when=move || mode.get() == Mode::Image>
                <form class="card bg-base-100 shadow-xl card-body" on:submit=on_image_submit.clone() novalidate>
                    <div class="form-control">
                        <label class="label" for="image">
                            <span class="label-text">"Photo of the residue (max 10MB)"</span>
                        </label>
                        <input
                            id="image"
                            name="image"
                            type="file"
                            accept="image/*"
                            class="file-input file-input-bordered w-full"
                            on:change=on_file_change
                        />
                        <FieldError errors=field_errors field="image" />
                    </div>
                    {move || upload.with(|f| f.as_ref().map(|f| format!("{} ({} KB)", f.name, f.size / 1024)))
                        .map(|label| view! { <p class="text-sm opacity-70">{label}</p> })}
                    <button class="btn btn-primary mt-4" disabled=move || is_submitting.get()>
                        {submit_label("Analyse image")}
                    </button>
                </form>
            </Show>

            <Show when=move || mode.get() == Mode::Text>
                <form class="card bg-base-100 shadow-xl card-body" on:submit=on_text_submit.clone() novalidate>
                    <div class="form-control">
                        <label class="label" for="waste_type">
                            <span class="label-text">"Waste type"</span>
                        </label>
                        <select
                            id="waste_type"
                            name="waste_type"
                            class="select select-bordered"
                            on:change=move |ev| text_form.update(|f| f.waste_type = event_target_value(&ev))
                        >
                            {WASTE_TYPES
                                .iter()
                                .map(|t| view! { <option value=*t selected=move || text_form.with(|f| f.waste_type == *t)>{*t}</option> })
                                .collect_view()}
                        </select>
                        <FieldError errors=field_errors field="waste_type" />
                    </div>
                    <div class="form-control">
                        <label class="label" for="quantity">
                            <span class="label-text">"Quantity (kg)"</span>
                        </label>
                        <input
                            id="quantity"
                            name="quantity"
                            type="number"
                            min="0"
                            class="input input-bordered"
                            prop:value=move || text_form.with(|f| f.quantity.clone())
                            on:input=move |ev| text_form.update(|f| f.quantity = event_target_value(&ev))
                        />
                        <FieldError errors=field_errors field="quantity" />
                    </div>
                    <div class="form-control">
                        <label class="label" for="location">
                            <span class="label-text">"Location (optional)"</span>
                        </label>
                        <input
                            id="location"
                            name="location"
                            type="text"
                            class="input input-bordered"
                            prop:value=move || text_form.with(|f| f.location.clone())
                            on:input=move |ev| text_form.update(|f| f.location = event_target_value(&ev))
                        />
                    </div>

                    {move || preview().map(|estimate| view! {
                        <div class="stats stats-vertical md:stats-horizontal shadow mt-2">
                            <div class="stat">
                                <div class="stat-title">"Estimated CO₂ saved"</div>
                                <div class="stat-value text-lg">{format!("{} {}", estimate.co2_saved, estimate.co2_saved_unit)}</div>
                            </div>
                            <div class="stat">
                                <div class="stat-title">"Carbon credits"</div>
                                <div class="stat-value text-lg">{estimate.carbon_credits}</div>
                            </div>
                            <div class="stat">
                                <div class="stat-title">"Suggested method"</div>
                                <div class="stat-value text-lg">{estimate.recommended_method.clone()}</div>
                                <div class="stat-desc">{estimate.processing_time.clone().unwrap_or_default()}</div>
                            </div>
                        </div>
                    })}

                    <button class="btn btn-primary mt-4" disabled=move || is_submitting.get()>
                        {submit_label("Analyse")}
                    </button>
                </form>
            </Show>
        </div>
    }
}
