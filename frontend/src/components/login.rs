use crate::components::FieldError;
use crate::error::FieldErrors;
use crate::forms::LoginForm;
use crate::services::use_services;
use crate::web::route::{AppRoute, return_path};
use crate::web::router::{Link, current_search, use_navigate};
use leptos::prelude::*;
use leptos::task::spawn_local;

#[component]
pub fn LoginPage() -> impl IntoView {
    let services = use_services();
    let navigate = use_navigate();

    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (field_errors, set_field_errors) = signal(FieldErrors::new());
    let (is_submitting, set_is_submitting) = signal(false);
    let (error_msg, set_error_msg) = signal(Option::<String>::None);

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        let form = LoginForm {
            email: email.get_untracked().trim().to_string(),
            password: password.get_untracked(),
        };
        if let Err(errors) = form.validate() {
            set_field_errors.set(errors);
            return;
        }

        set_field_errors.set(FieldErrors::new());
        set_is_submitting.set(true);
        set_error_msg.set(None);

        let session = services.with_value(|s| s.session.clone());
        let navigate = navigate.clone();
        spawn_local(async move {
            match session.login(&form.email, &form.password).await {
                Ok(()) => {
                    set_is_submitting.set(false);
                    let to = return_path(&current_search())
                        .unwrap_or_else(|| AppRoute::auth_success_redirect().to_path().to_string());
                    navigate(&to);
                }
                Err(e) => {
                    set_error_msg.set(Some(e.to_string()));
                    set_is_submitting.set(false);
                }
            }
        });
    };

    view! {
        <div class="hero min-h-screen bg-base-200">
            <div class="hero-content flex-col w-full max-w-md">
                <div class="text-center mb-4">
                    <h1 class="text-3xl font-bold">"Welcome back"</h1>
                    <p class="text-base-content/70">"Sign in to analyse your agricultural waste"</p>
                </div>

                <div class="card shrink-0 w-full shadow-2xl bg-base-100">
                    <form class="card-body" on:submit=on_submit novalidate>
                        <Show when=move || error_msg.get().is_some()>
                            <div role="alert" class="alert alert-error text-sm py-2">
                                <span>{move || error_msg.get().unwrap_or_default()}</span>
                            </div>
                        </Show>

                        <div class="form-control">
                            <label class="label" for="email">
                                <span class="label-text">"Email"</span>
                            </label>
                            <input
                                id="email"
                                name="email"
                                type="email"
                                placeholder="farmer@example.com"
                                on:input=move |ev| set_email.set(event_target_value(&ev))
                                prop:value=email
                                class="input input-bordered"
                            />
                            <FieldError errors=field_errors field="email" />
                        </div>
                        <div class="form-control">
                            <label class="label" for="password">
                                <span class="label-text">"Password"</span>
                            </label>
                            <input
                                id="password"
                                name="password"
                                type="password"
                                placeholder="••••••••"
                                on:input=move |ev| set_password.set(event_target_value(&ev))
                                prop:value=password
                                class="input input-bordered"
                            />
                            <FieldError errors=field_errors field="password" />
                        </div>
                        <div class="form-control mt-6">
                            <button class="btn btn-primary" disabled=move || is_submitting.get()>
                                {move || if is_submitting.get() {
                                    view! { <span class="loading loading-spinner"></span> "Signing in..." }.into_any()
                                } else {
                                    "Sign in".into_any()
                                }}
                            </button>
                        </div>
                        <p class="text-sm text-center mt-2">
                            "No account yet? "
                            <Link to=AppRoute::Register.to_path() class="link link-primary">"Create one"</Link>
                        </p>
                    </form>
                </div>
            </div>
        </div>
    }
}
