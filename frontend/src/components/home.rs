use crate::auth::use_auth;
use crate::web::route::AppRoute;
use crate::web::router::Link;
use leptos::prelude::*;

#[component]
pub fn HomePage() -> impl IntoView {
    let auth = use_auth();
    let signed_in = move || auth.state.with(|s| s.identity.is_some());

    view! {
        <div class="hero min-h-[70vh] bg-base-200">
            <div class="hero-content text-center">
                <div class="max-w-2xl space-y-6">
                    <h1 class="text-5xl font-bold">"AgriWaste2Fuel"</h1>
                    <p class="text-lg text-base-content/70">
                        "Identify crop residue from a photo or a description, get the best conversion method, "
                        "and see the CO₂ savings and carbon credits it can earn."
                    </p>
                    <Show
                        when=signed_in
                        fallback=|| view! {
                            <div class="flex justify-center gap-3">
                                <Link to=AppRoute::Register.to_path() class="btn btn-primary">"Get started"</Link>
                                <Link to=AppRoute::Login.to_path() class="btn btn-outline">"Sign in"</Link>
                            </div>
                        }
                    >
                        <Link to=AppRoute::Input.to_path() class="btn btn-primary">"Analyse waste"</Link>
                    </Show>
                </div>
            </div>
        </div>
    }
}

#[component]
pub fn AboutPage() -> impl IntoView {
    view! {
        <div class="max-w-3xl mx-auto p-8 space-y-4">
            <h1 class="text-3xl font-bold">"About AgriWaste2Fuel"</h1>
            <p>
                "Burning stubble releases millions of tonnes of CO₂ every season. "
                "AgriWaste2Fuel helps farmers find a better use for their residue."
            </p>
            <ul class="list-disc pl-6 space-y-1">
                <li>"Waste classification from images or text"</li>
                <li>"Processing recommendations such as anaerobic digestion, gasification or pyrolysis"</li>
                <li>"Greenhouse-gas savings and carbon-credit estimates"</li>
                <li>"Downloadable reduction certificates"</li>
            </ul>
        </div>
    }
}

#[component]
pub fn NotFoundPage() -> impl IntoView {
    view! {
        <div class="flex items-center justify-center min-h-[60vh]">
            <div class="text-center">
                <h1 class="text-6xl font-bold text-error">"404"</h1>
                <p class="text-xl mt-4">"Page not found"</p>
                <Link to=AppRoute::Home.to_path() class="btn btn-link mt-2">"Back home"</Link>
            </div>
        </div>
    }
}
