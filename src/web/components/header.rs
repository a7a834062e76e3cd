use leptos::prelude::*;
use log::debug;

use crate::config::SiteConfig;
use crate::content::{fragment_href, NAV_LINKS, SITE_TITLE};
use crate::nav::Navigator;
use crate::web::scroll_host::DomScrollHost;

/// In-page link that smooth-scrolls to `target` and closes the mobile menu.
#[component]
pub fn ScrollLink(
    target: &'static str,
    #[prop(optional)] class: &'static str,
    children: Children,
) -> impl IntoView {
    let navigator = expect_context::<RwSignal<Navigator>>();
    let selector = expect_context::<SiteConfig>().nav.container_selector;

    let on_click = move |ev: leptos::ev::MouseEvent| {
        ev.prevent_default();
        let Some(host) = DomScrollHost::current(&selector) else {
            return;
        };
        let plan = navigator
            .try_update(|nav| nav.scroll_to(&host, target))
            .flatten();
        if plan.is_none() {
            debug!("no section called {target}");
        }
    };

    view! {
        <a class=class href=fragment_href(target) on:click=on_click>
            {children()}
        </a>
    }
}

/// Discord call to action; `extra_class` adds a placement modifier.
#[component]
pub fn DiscordButton(label: &'static str, #[prop(optional)] extra_class: &'static str) -> impl IntoView {
    let href = expect_context::<SiteConfig>().discord_url;
    view! {
        <a
            class=format!("btn btn-discord {extra_class}")
            href=href
            target="_blank"
            rel="noopener noreferrer"
        >
            {label}
        </a>
    }
}

#[component]
pub fn SiteHeader() -> impl IntoView {
    let navigator = expect_context::<RwSignal<Navigator>>();
    let menu_open = move || navigator.with(Navigator::is_menu_open);

    view! {
        <header class="site-header" role="banner">
            <div class="container header-inner">
                <ScrollLink target="hero" class="logo-title">{SITE_TITLE}</ScrollLink>
                <button
                    class="menu-toggle"
                    type="button"
                    aria-label="Toggle navigation"
                    aria-expanded=move || navigator.with(Navigator::aria_expanded)
                    on:click=move |_| navigator.update(|nav| {
                        nav.toggle_menu();
                    })
                >
                    <span class="bar"></span>
                </button>
                <nav class="site-nav" class:open=menu_open aria-label="Main">
                    {NAV_LINKS
                        .iter()
                        .map(|link| view! { <ScrollLink target=link.target>{link.label}</ScrollLink> })
                        .collect_view()}
                    <DiscordButton label="Discord" extra_class="nav-discord"/>
                </nav>
            </div>
        </header>
    }
}
