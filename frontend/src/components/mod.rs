//! UI 组件层

pub mod dashboard;
pub mod home;
pub mod input;
pub mod login;
pub mod navbar;
pub mod register;
pub mod result;

use crate::error::FieldErrors;
use leptos::prelude::*;

/// 表单字段下方的错误提示
#[component]
pub fn FieldError(errors: ReadSignal<FieldErrors>, field: &'static str) -> impl IntoView {
    move || {
        errors.with(|e| e.get(field).map(String::from)).map(|msg| {
            view! {
                <label class="label">
                    <span class="label-text-alt text-error">{msg}</span>
                </label>
            }
        })
    }
}

#[component]
pub fn Spinner() -> impl IntoView {
    view! {
        <div class="flex items-center justify-center py-16">
            <span class="loading loading-spinner loading-lg text-primary"></span>
        </div>
    }
}
