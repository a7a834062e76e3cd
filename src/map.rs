use url::Url;

use crate::config::{MapConfig, ProxyRule};

pub const MAP_FRAME_TITLE: &str = "VatraMC Live Map (Pl3xMap)";
pub const MAP_COLLAPSED_LABEL: &str = "Interactive map";
pub const MAP_EXPAND_ARIA_LABEL: &str = "Open interactive map";
pub const MAP_OPEN_LINK_LABEL: &str = "Відкрити мапу у новій вкладці";

/// Resolves the URL the map iframe should load.
///
/// Order: explicit URL, then the environment URL, then the default proxy
/// path. An insecure environment URL on a secure page is routed through the
/// same-origin proxy so the browser does not block it as mixed content.
pub fn resolve_map_url(config: &MapConfig, page_origin: &Url) -> String {
    if let Some(url) = non_empty(config.url.as_deref()) {
        return url.to_string();
    }
    let Some(configured) = non_empty(config.configured_url.as_deref()) else {
        return config.default_url.clone();
    };
    match page_origin.join(configured) {
        Ok(target) if page_origin.scheme() == "https" && target.scheme() == "http" => {
            let query = target
                .query()
                .filter(|query| !query.is_empty())
                .map(|query| format!("?{query}"))
                .unwrap_or_default();
            format!("{}{}{}", config.proxy_prefix, target.path(), query)
        }
        _ => configured.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Two-state map toggle. Nothing is loaded until the visitor expands it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEmbed {
    url: String,
    expanded: bool,
}

/// Attributes of the iframe rendered once the embed is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapFrame<'a> {
    pub src: &'a str,
    pub title: &'static str,
    pub loading: &'static str,
    pub referrer_policy: &'static str,
    pub open_label: &'static str,
}

impl MapEmbed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expanded: false,
        }
    }

    pub fn from_config(config: &MapConfig, page_origin: &Url) -> Self {
        Self::new(resolve_map_url(config, page_origin))
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn state_class(&self) -> &'static str {
        if self.expanded {
            "expanded"
        } else {
            "collapsed"
        }
    }

    /// Expands the embed; returns `false` if it already was.
    pub fn expand(&mut self) -> bool {
        !std::mem::replace(&mut self.expanded, true)
    }

    /// The iframe to mount, or `None` while collapsed.
    pub fn frame(&self) -> Option<MapFrame<'_>> {
        self.expanded.then(|| MapFrame {
            src: &self.url,
            title: MAP_FRAME_TITLE,
            loading: "lazy",
            referrer_policy: "no-referrer",
            open_label: MAP_OPEN_LINK_LABEL,
        })
    }
}

impl ProxyRule {
    /// Upstream URL for `path`, if this rule handles it.
    pub fn forward(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(&self.prefix)?;
        let upstream_path = if self.strip_prefix { rest } else { path };
        Some(format!(
            "{}{}",
            self.target.trim_end_matches('/'),
            upstream_path
        ))
    }
}

/// First matching rule wins.
pub fn route_proxy(rules: &[ProxyRule], path: &str) -> Option<String> {
    rules.iter().find_map(|rule| rule.forward(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn default_proxy_path_without_overrides() {
        let config = MapConfig::default();
        let url = resolve_map_url(&config, &origin("https://vatra.example"));
        assert_eq!(
            url,
            "/pl3xmap/?world=world&renderer=vintage_story&zoom=1&x=-66&z=-171"
        );
    }

    #[test]
    fn insecure_env_url_is_proxied_on_secure_page() {
        let config = MapConfig {
            configured_url: Some("http://10.0.0.5:8123/map/?world=end".into()),
            ..MapConfig::default()
        };
        let url = resolve_map_url(&config, &origin("https://vatra.example"));
        assert_eq!(url, "/pl3xmap/map/?world=end");
    }

    #[test]
    fn env_url_verbatim_on_insecure_page() {
        let configured = "http://10.0.0.5:8123/map/?world=end";
        let config = MapConfig {
            configured_url: Some(configured.into()),
            ..MapConfig::default()
        };
        let url = resolve_map_url(&config, &origin("http://localhost:3000"));
        assert_eq!(url, configured);
    }

    #[test]
    fn relative_env_url_stays_verbatim() {
        let config = MapConfig {
            configured_url: Some("/livemap/".into()),
            ..MapConfig::default()
        };
        let url = resolve_map_url(&config, &origin("https://vatra.example"));
        assert_eq!(url, "/livemap/");
    }

    #[test]
    fn explicit_url_wins() {
        let config = MapConfig {
            url: Some("https://maps.example/".into()),
            configured_url: Some("http://10.0.0.5:8123/".into()),
            ..MapConfig::default()
        };
        let url = resolve_map_url(&config, &origin("https://vatra.example"));
        assert_eq!(url, "https://maps.example/");
    }

    #[test]
    fn embed_is_lazy_until_expanded() {
        let mut embed = MapEmbed::new("/pl3xmap/");
        assert!(embed.frame().is_none());
        assert_eq!(embed.state_class(), "collapsed");
        assert!(embed.expand());
        assert_eq!(embed.state_class(), "expanded");
        assert!(!embed.expand());
        let frame = embed.frame().unwrap();
        assert_eq!(frame.src, "/pl3xmap/");
        assert_eq!(frame.loading, "lazy");
    }

    #[test]
    fn proxy_rules_strip_only_where_configured() {
        let rules = MapConfig::default().proxy_rules;
        assert_eq!(
            route_proxy(&rules, "/pl3xmap/tiles/world/0/0_0.png").as_deref(),
            Some("http://134.249.64.192:8123/tiles/world/0/0_0.png")
        );
        assert_eq!(
            route_proxy(&rules, "/tiles/world/1/2_3.png").as_deref(),
            Some("http://134.249.64.192:8123/tiles/world/1/2_3.png")
        );
        assert_eq!(route_proxy(&rules, "/index.html"), None);
    }
}
