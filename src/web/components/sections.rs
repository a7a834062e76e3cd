use leptos::prelude::*;

use super::header::{DiscordButton, ScrollLink};
use super::icons::{FeatureGlyph, RuleGlyph};
use super::map_embed::MapEmbedPanel;
use super::status_card::StatusCard;
use crate::content::{
    footer_text, section, section_class, ABOUT_HEADING, ABOUT_ITEMS, ABOUT_LEAD, DISCORD_BLURB,
    DISCORD_HEADING, DISCORD_LOGO, FEATURES, FEATURES_HEADING, JOIN_DISCORD, RULE_LISTS,
    SITE_TITLE, TAGLINE, VIEW_STATUS,
};

/// `<section>` carrying the id, class and label registered for `id`.
#[component]
pub fn PageSection(id: &'static str, children: Children) -> impl IntoView {
    let section = section(id);
    view! {
        <section
            id=id
            class=section.map(section_class)
            aria-label=section.map(|section| section.aria_label)
        >
            <div class="container">{children()}</div>
        </section>
    }
}

#[component]
pub fn Hero() -> impl IntoView {
    view! {
        <PageSection id="hero">
            <h1 class="site-title">{SITE_TITLE}</h1>
            <p>{TAGLINE}</p>
            <div class="hero-ctas">
                <DiscordButton label=JOIN_DISCORD/>
                <ScrollLink target="status" class="btn btn-outline">{VIEW_STATUS}</ScrollLink>
            </div>
        </PageSection>
    }
}

#[component]
pub fn ServerStatus() -> impl IntoView {
    view! {
        <PageSection id="status">
            <div class="status-grid">
                <div class="grid-item"><MapEmbedPanel/></div>
                <div class="grid-item"><StatusCard/></div>
            </div>
        </PageSection>
    }
}

#[component]
pub fn Discord() -> impl IntoView {
    view! {
        <PageSection id="discord">
            <div class="glass-panel discord-card">
                <img class="discord-logo" src=DISCORD_LOGO alt="" />
                <div class="discord-content">
                    <h2>{DISCORD_HEADING}</h2>
                    <p>{DISCORD_BLURB}</p>
                    <DiscordButton label=JOIN_DISCORD/>
                </div>
            </div>
        </PageSection>
    }
}

#[component]
pub fn Features() -> impl IntoView {
    view! {
        <PageSection id="features">
            <h2>{FEATURES_HEADING}</h2>
            <div class="features-grid">
                {FEATURES
                    .iter()
                    .map(|feature| {
                        view! {
                            <div class=format!("feature-card {}", feature.icon.class())>
                                <FeatureGlyph icon=feature.icon/>
                                <div class="feature-title">{feature.title}</div>
                                <div class="feature-sub">{feature.blurb}</div>
                            </div>
                        }
                    })
                    .collect_view()}
            </div>
        </PageSection>
    }
}

#[component]
pub fn Rules() -> impl IntoView {
    view! {
        <PageSection id="rules">
            <div class="rules-grid">
                {RULE_LISTS
                    .iter()
                    .map(|list| {
                        view! {
                            <div class=format!("glass-panel rule-card {}", list.class())>
                                <div class="rule-title">
                                    <RuleGlyph kind=list.kind/>
                                    <h3>{list.title}</h3>
                                </div>
                                <ul>
                                    {list.items.iter().map(|item| view! { <li>{*item}</li> }).collect_view()}
                                </ul>
                            </div>
                        }
                    })
                    .collect_view()}
            </div>
        </PageSection>
    }
}

#[component]
pub fn About() -> impl IntoView {
    view! {
        <PageSection id="about">
            <div class="glass-panel about-card">
                <h2>{ABOUT_HEADING}</h2>
                <p class="about-lead">{ABOUT_LEAD}</p>
                <ul class="about-list">
                    {ABOUT_ITEMS.iter().map(|item| view! { <li>{*item}</li> }).collect_view()}
                </ul>
            </div>
        </PageSection>
    }
}

#[component]
pub fn SiteFooter(year: i32) -> impl IntoView {
    view! {
        <footer class="site-footer" role="contentinfo">
            <div class="container">
                <p>{footer_text(year)}</p>
            </div>
        </footer>
    }
}
