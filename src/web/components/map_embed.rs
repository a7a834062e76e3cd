use leptos::prelude::*;
use log::warn;

use crate::config::SiteConfig;
use crate::map::{MapEmbed, MAP_COLLAPSED_LABEL, MAP_EXPAND_ARIA_LABEL};
use crate::web::page_origin;

/// Collapsed map placeholder. The iframe only exists once the visitor
/// expands it, and it stays mounted from then on.
#[component]
pub fn MapEmbedPanel() -> impl IntoView {
    let config = expect_context::<SiteConfig>();
    let embed = match web_sys::window().map(|window| page_origin(&window)) {
        Some(Ok(origin)) => MapEmbed::from_config(&config.map, &origin),
        Some(Err(err)) => {
            warn!("page origin unavailable, using the default map path: {err:#}");
            MapEmbed::new(config.map.default_url.clone())
        }
        None => MapEmbed::new(config.map.default_url.clone()),
    };
    let embed = RwSignal::new(embed);

    let expanded = move || embed.with(MapEmbed::is_expanded);
    let on_open = move |_| {
        embed.update(|embed| {
            embed.expand();
        })
    };

    view! {
        <div class=move || format!("map-embed {}", embed.with(MapEmbed::state_class))>
            <Show
                when=expanded
                fallback=move || {
                    view! {
                        <button
                            type="button"
                            class="map-collapsed"
                            aria-label=MAP_EXPAND_ARIA_LABEL
                            on:click=on_open
                        >
                            <span class="label">{MAP_COLLAPSED_LABEL}</span>
                        </button>
                    }
                }
            >
                {move || {
                    embed.with(|embed| {
                        embed.frame().map(|frame| {
                            let src = frame.src.to_string();
                            view! {
                                <iframe
                                    class="map-frame"
                                    src=src.clone()
                                    title=frame.title
                                    loading=frame.loading
                                    referrerpolicy=frame.referrer_policy
                                ></iframe>
                                <div class="map-open">
                                    <a href=src target="_blank" rel="noreferrer">
                                        {frame.open_label}
                                    </a>
                                </div>
                            }
                        })
                    })
                }}
            </Show>
        </div>
    }
}
