use std::time::Duration;

use gloo_timers::future::sleep;
use leptos::prelude::*;
use log::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::SiteConfig;
use crate::status::{HttpTransport, StatusBoard, StatusPoller, StatusSnapshot, MAX_BARS};

/// Server status card. Polls for as long as it is mounted; a result that
/// lands after unmount is dropped.
#[component]
pub fn StatusCard() -> impl IntoView {
    let config = expect_context::<SiteConfig>();
    let status = RwSignal::new(StatusSnapshot::default());
    start_polling(&config, status);

    let unknown_latency_bars = config.status.unknown_latency_bars;
    let online = move || status.with(|snapshot| snapshot.online);
    let lit = move || status.with(|snapshot| snapshot.lit_bars(unknown_latency_bars));

    let icon = RwSignal::new(config.server.icon.clone());
    let fallback_icon = config.server.fallback_icon.clone();
    let on_icon_error = move |_| {
        if icon.with_untracked(|src| *src != fallback_icon) {
            debug!("status icon failed, using {fallback_icon}");
            icon.set(fallback_icon.clone());
        }
    };

    view! {
        <div class="status-card" class:online=online class:offline=move || !online() aria-live="polite">
            <img class="status-icon" src=move || icon.get() alt="server icon" on:error=on_icon_error />
            <div class="status-main">
                <div class="status-name">{config.server.name.clone()}</div>
                <div class="status-sub">{config.server.address()}</div>
            </div>
            <div class="status-right">
                <div class="status-count">{move || status.with(StatusSnapshot::player_label)}</div>
                <div class="status-bars" aria-label="signal strength">
                    {(0..usize::from(MAX_BARS))
                        .map(|index| view! { <span class="bar" class:on=move || lit()[index]></span> })
                        .collect_view()}
                </div>
            </div>
        </div>
    }
}

fn start_polling(config: &SiteConfig, status: RwSignal<StatusSnapshot>) {
    let transport = match HttpTransport::new() {
        Ok(transport) => transport,
        Err(err) => {
            warn!("status card disabled: {err:#}");
            return;
        }
    };
    let cancel = CancelToken::new();
    let poller = StatusPoller::new(transport, config, StatusBoard::new(), cancel.clone());
    let period = Duration::from_secs(config.status.poll_interval_secs.max(1));

    leptos::task::spawn_local(async move {
        loop {
            let Some(snapshot) = poller.poll_once().await.snapshot() else {
                break;
            };
            if status.try_set(snapshot).is_some() {
                break;
            }
            sleep(period).await;
            if poller.cancel_token().is_cancelled() {
                break;
            }
        }
        debug!("status loop finished");
    });
    info!("status card polling every {}s", period.as_secs());

    on_cleanup(move || cancel.cancel());
}
