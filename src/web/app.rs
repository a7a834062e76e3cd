use leptos::prelude::*;

use super::components::header::SiteHeader;
use super::components::sections::{About, Discord, Features, Hero, Rules, ServerStatus, SiteFooter};
use crate::config::SiteConfig;
use crate::nav::Navigator;

/// The landing page. Provides the config and the shared navigator to every
/// component below it.
#[component]
pub fn App(config: SiteConfig, year: i32) -> impl IntoView {
    provide_context(RwSignal::new(Navigator::new(config.nav.header_offset)));
    provide_context(config);

    view! {
        <SiteHeader/>
        <Hero/>
        <ServerStatus/>
        <Discord/>
        <Features/>
        <Rules/>
        <About/>
        <SiteFooter year=year/>
    }
}
