use crate::auth::use_auth;
use crate::services::use_services;
use crate::web::route::AppRoute;
use crate::web::router::{Link, use_router};
use leptos::prelude::*;
use leptos::task::spawn_local;

#[component]
pub fn Navbar() -> impl IntoView {
    let auth = use_auth();
    let services = use_services();
    let router = use_router();
    let identity = auth.identity();

    let on_logout = move |_| {
        let session = services.with_value(|s| s.session.clone());
        spawn_local(async move {
            session.logout().await;
        });
        // 守卫状态变化后路由服务会自动离开受保护页面
    };

    let nav_class = move |route: AppRoute| {
        if router.current_route().get() == route {
            "btn btn-ghost btn-sm btn-active"
        } else {
            "btn btn-ghost btn-sm"
        }
    };

    view! {
        <div class="navbar bg-base-100 shadow">
            <div class="flex-1">
                <Link to=AppRoute::Home.to_path() class="btn btn-ghost text-xl">"AgriWaste2Fuel"</Link>
            </div>
            <div class="flex-none gap-1">
                <a href=AppRoute::About.to_path() class=move || nav_class(AppRoute::About)
                    on:click=move |ev: web_sys::MouseEvent| { ev.prevent_default(); router.navigate(AppRoute::About.to_path()); }>
                    "About"
                </a>
                {move || match identity.get() {
                    Some(user) => view! {
                        <a href=AppRoute::Input.to_path() class=move || nav_class(AppRoute::Input)
                            on:click=move |ev: web_sys::MouseEvent| { ev.prevent_default(); router.navigate(AppRoute::Input.to_path()); }>
                            "Analyse"
                        </a>
                        <a href=AppRoute::Dashboard.to_path() class=move || nav_class(AppRoute::Dashboard)
                            on:click=move |ev: web_sys::MouseEvent| { ev.prevent_default(); router.navigate(AppRoute::Dashboard.to_path()); }>
                            "Dashboard"
                        </a>
                        <span class="badge badge-neutral hidden md:inline-flex">{user.display_name().to_string()}</span>
                        <button on:click=on_logout class="btn btn-outline btn-error btn-sm">"Log out"</button>
                    }
                    .into_any(),
                    None => view! {
                        <Link to=AppRoute::Login.to_path() class="btn btn-ghost btn-sm">"Sign in"</Link>
                        <Link to=AppRoute::Register.to_path() class="btn btn-primary btn-sm">"Register"</Link>
                    }
                    .into_any(),
                }}
            </div>
        </div>
    }
}
