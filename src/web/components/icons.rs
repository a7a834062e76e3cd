use leptos::prelude::*;
use leptos::tachys::view::any_view::IntoAny;

use crate::content::{FeatureIcon, RuleKind};

#[component]
pub fn FeatureGlyph(icon: FeatureIcon) -> impl IntoView {
    let shape = match icon {
        FeatureIcon::Sword => view! {
            <g fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round">
                <line x1="12" y1="2" x2="12" y2="14" />
                <line x1="9" y1="12" x2="15" y2="12" />
                <path d="M7 16 l5 -2 l5 2 l-5 6 z" />
            </g>
        }
        .into_any(),
        FeatureIcon::Shield => view! {
            <path
                fill="none"
                stroke="currentColor"
                stroke-width="2"
                stroke-linecap="round"
                stroke-linejoin="round"
                d="M12 2l7 4v6c0 5-4 8-7 10C9 20 5 17 5 12V6l7-4z"
            />
        }
        .into_any(),
        FeatureIcon::Globe => view! {
            <g fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round">
                <circle cx="12" cy="12" r="9" />
                <path d="M3 12h18" />
                <path d="M12 3c3 4 3 14 0 18c-3 -4 -3 -14 0 -18z" />
            </g>
        }
        .into_any(),
        FeatureIcon::Crown => view! {
            <g fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round">
                <polyline points="2,16 6,8 12,13 18,8 22,16" />
                <rect x="3" y="16" width="18" height="4" rx="1" ry="1" />
            </g>
        }
        .into_any(),
        FeatureIcon::World => view! {
            <g fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round">
                <path d="M3 6l6-2l6 2l6-2v12l-6 2l-6-2l-6 2z" />
                <path d="M9 4v12m6-10v12" />
            </g>
        }
        .into_any(),
        FeatureIcon::Bolt => view! {
            <path fill="currentColor" d="M13 2L3 14h7l-1 8l12-12h-7l1-8z" />
        }
        .into_any(),
    };

    view! {
        <svg class="feature-icon" viewBox="0 0 24 24" aria-hidden="true">
            {shape}
        </svg>
    }
}

#[component]
pub fn RuleGlyph(kind: RuleKind) -> impl IntoView {
    let shape = match kind {
        RuleKind::Allowed => view! {
            <path
                fill="#2ecc71"
                d="M12 2l8 4v6c0 5.25-3.75 9-8 10C7.75 21 4 17.25 4 12V6l8-4Zm-1.2 13.2l6-6l-1.4-1.4l-4.6 4.58l-2.2-2.2l-1.4 1.42l3.6 3.6Z"
            />
        }
        .into_any(),
        RuleKind::Banned => view! {
            <path
                fill="#ff6b6b"
                d="M12 2C6.48 2 2 6.48 2 12s4.48 10 10 10s10-4.48 10-10S17.52 2 12 2Zm5 11H7v-2h10v2Z"
            />
        }
        .into_any(),
    };

    view! {
        <svg viewBox="0 0 24 24" aria-hidden="true">
            {shape}
        </svg>
    }
}
