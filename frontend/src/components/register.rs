use crate::auth::RegisterProfile;
use crate::components::FieldError;
use crate::error::FieldErrors;
use crate::forms::RegisterForm;
use crate::services::use_services;
use crate::web::route::AppRoute;
use crate::web::router::{Link, use_navigate};
use leptos::prelude::*;
use leptos::task::spawn_local;

/// 文本输入框：读取与写入分别对应表单中的一个字段
fn text_input(
    form: RwSignal<RegisterForm>,
    errors: ReadSignal<FieldErrors>,
    label: &'static str,
    field: &'static str,
    input_type: &'static str,
    read: fn(&RegisterForm) -> String,
    write: fn(&mut RegisterForm, String),
) -> impl IntoView {
    view! {
        <div class="form-control">
            <label class="label" for=field>
                <span class="label-text">{label}</span>
            </label>
            <input
                id=field
                name=field
                type=input_type
                class="input input-bordered"
                prop:value=move || form.with(read)
                on:input=move |ev| form.update(|f| write(f, event_target_value(&ev)))
            />
            <FieldError errors=errors field=field />
        </div>
    }
}

#[component]
pub fn RegisterPage() -> impl IntoView {
    let services = use_services();
    let navigate = use_navigate();

    let form = RwSignal::new(RegisterForm::default());
    let (field_errors, set_field_errors) = signal(FieldErrors::new());
    let (is_submitting, set_is_submitting) = signal(false);
    let (error_msg, set_error_msg) = signal(Option::<String>::None);

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        let current = form.get_untracked();
        if let Err(errors) = current.validate() {
            set_field_errors.set(errors);
            return;
        }

        set_field_errors.set(FieldErrors::new());
        set_is_submitting.set(true);
        set_error_msg.set(None);

        let profile = RegisterProfile {
            name: current.name.trim().to_string(),
            email: current.email.trim().to_string(),
            password: current.password,
        };
        let session = services.with_value(|s| s.session.clone());
        let navigate = navigate.clone();
        spawn_local(async move {
            match session.register(&profile).await {
                Ok(()) => {
                    set_is_submitting.set(false);
                    navigate(AppRoute::auth_success_redirect().to_path());
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
            <div class="hero-content flex-col w-full max-w-lg">
                <div class="text-center mb-4">
                    <h1 class="text-3xl font-bold">"Create your account"</h1>
                    <p class="text-base-content/70">"Turn crop residue into fuel and carbon credits"</p>
                </div>

                <div class="card shrink-0 w-full shadow-2xl bg-base-100">
                    <form class="card-body" on:submit=on_submit novalidate>
                        <Show when=move || error_msg.get().is_some()>
                            <div role="alert" class="alert alert-error text-sm py-2">
                                <span>{move || error_msg.get().unwrap_or_default()}</span>
                            </div>
                        </Show>

                        {text_input(form, field_errors, "Full name", "name", "text", |f| f.name.clone(), |f, v| f.name = v)}
                        {text_input(form, field_errors, "Email", "email", "email", |f| f.email.clone(), |f, v| f.email = v)}
                        {text_input(form, field_errors, "Password", "password", "password", |f| f.password.clone(), |f, v| f.password = v)}
                        {text_input(
                            form,
                            field_errors,
                            "Confirm password",
                            "confirm_password",
                            "password",
                            |f| f.confirm_password.clone(),
                            |f, v| f.confirm_password = v,
                        )}
                        {text_input(form, field_errors, "Phone", "phone", "tel", |f| f.phone.clone(), |f, v| f.phone = v)}
                        {text_input(form, field_errors, "Location", "location", "text", |f| f.location.clone(), |f, v| f.location = v)}

                        <div class="form-control">
                            <label class="label cursor-pointer justify-start gap-3">
                                <input
                                    type="checkbox"
                                    class="checkbox checkbox-primary"
                                    prop:checked=move || form.with(|f| f.accept_terms)
                                    on:change=move |ev| form.update(|f| f.accept_terms = event_target_checked(&ev))
                                />
                                <span class="label-text">"I accept the terms and conditions"</span>
                            </label>
                            <FieldError errors=field_errors field="accept_terms" />
                        </div>

                        <div class="form-control mt-6">
                            <button class="btn btn-primary" disabled=move || is_submitting.get()>
                                {move || if is_submitting.get() {
                                    view! { <span class="loading loading-spinner"></span> "Creating account..." }.into_any()
                                } else {
                                    "Create account".into_any()
                                }}
                            </button>
                        </div>
                        <p class="text-sm text-center mt-2">
                            "Already registered? "
                            <Link to=AppRoute::Login.to_path() class="link link-primary">"Sign in"</Link>
                        </p>
                    </form>
                </div>
            </div>
        </div>
    }
}
