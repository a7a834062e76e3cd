use serde::{Deserialize, Serialize};

use crate::model::MaterialStyle;

/// Environment variables that may carry an override for the map origin.
pub const MAP_URL_ENV_KEYS: &[&str] = &["VATRA_MAP_URL", "PL3XMAP_URL"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub server: ServerConfig,
    pub status: StatusConfig,
    pub map: MapConfig,
    pub nav: NavConfig,
    pub background: BackgroundConfig,
    pub discord_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            status: StatusConfig::default(),
            map: MapConfig::default(),
            nav: NavConfig::default(),
            background: BackgroundConfig::default(),
            discord_url: "https://discord.gg/4VuAhzK6".to_string(),
        }
    }
}

impl SiteConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Picks up the optional map override. Native builds read the process
    /// environment; wasm builds only see values baked in at compile time.
    pub fn apply_env(&mut self) {
        if let Some(url) = configured_map_url() {
            self.map.configured_url = Some(url);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn configured_map_url() -> Option<String> {
    MAP_URL_ENV_KEYS
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(target_arch = "wasm32")]
fn configured_map_url() -> Option<String> {
    [option_env!("VATRA_MAP_URL"), option_env!("PL3XMAP_URL")]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub subtitle: String,
    pub host: String,
    pub port: u16,
    pub icon: String,
    pub fallback_icon: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "VATRA".to_string(),
            subtitle: "Vatra".to_string(),
            host: "134.249.64.192".to_string(),
            port: 25565,
            icon: "/icon.webp".to_string(),
            fallback_icon: "/VatraMC.png".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What happens to the player counts when every status source fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OfflinePolicy {
    /// Flip the online flag and keep whatever counts were last seen.
    #[default]
    RetainCounts,
    /// Flip the online flag and zero the counts.
    ResetCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub poll_interval_secs: u64,
    pub unknown_latency_bars: u8,
    pub offline_policy: OfflinePolicy,
    pub default_max_players: u32,
    pub primary_endpoint: String,
    pub fallback_endpoint: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            unknown_latency_bars: 4,
            offline_policy: OfflinePolicy::RetainCounts,
            default_max_players: 100,
            primary_endpoint: "https://api.mcsrvstat.us/3/{host}:{port}".to_string(),
            fallback_endpoint: "https://api.mcstatus.io/v2/status/java/{host}:{port}".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Explicit URL; wins over everything else.
    pub url: Option<String>,
    /// URL provided by the environment.
    pub configured_url: Option<String>,
    pub default_url: String,
    pub proxy_prefix: String,
    pub proxy_rules: Vec<ProxyRule>,
}

impl Default for MapConfig {
    fn default() -> Self {
        let origin = "http://134.249.64.192:8123";
        Self {
            url: None,
            configured_url: None,
            default_url: "/pl3xmap/?world=world&renderer=vintage_story&zoom=1&x=-66&z=-171"
                .to_string(),
            proxy_prefix: "/pl3xmap".to_string(),
            proxy_rules: vec![
                ProxyRule {
                    prefix: "/pl3xmap".to_string(),
                    target: origin.to_string(),
                    strip_prefix: true,
                },
                ProxyRule {
                    prefix: "/tiles".to_string(),
                    target: origin.to_string(),
                    strip_prefix: false,
                },
            ],
        }
    }
}

/// Same-origin path forwarded by the hosting layer to another origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRule {
    pub prefix: String,
    pub target: String,
    pub strip_prefix: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub header_offset: f64,
    pub container_selector: String,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            header_offset: 12.0,
            container_selector: ".app".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub frame_duration_ms: u32,
    pub max_pixel_ratio: f64,
    pub material_style: MaterialStyle,
    pub chunk_model: String,
    pub fireplace_model: String,
    pub fire_texture: String,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            frame_duration_ms: 50,
            max_pixel_ratio: 1.5,
            material_style: MaterialStyle::Diffuse,
            chunk_model: "/chunk.glb".to_string(),
            fireplace_model: "/fireplace.glb".to_string(),
            fire_texture: "/fire.gif".to_string(),
        }
    }
}

impl BackgroundConfig {
    pub fn frame_duration_secs(&self) -> f32 {
        self.frame_duration_ms as f32 / 1000.0
    }

    /// Clamps the device pixel ratio into `[1, max_pixel_ratio]`.
    pub fn pixel_ratio(&self, device_ratio: f64) -> f64 {
        device_ratio.clamp(1.0, self.max_pixel_ratio.max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_live_site() {
        let config = SiteConfig::default();
        assert_eq!(config.server.address(), "134.249.64.192:25565");
        assert_eq!(config.status.poll_interval_secs, 60);
        assert_eq!(config.status.unknown_latency_bars, 4);
        assert_eq!(config.background.frame_duration_secs(), 0.05);
        assert_eq!(config.map.proxy_rules.len(), 2);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SiteConfig =
            serde_json::from_str(r#"{"status": {"unknown_latency_bars": 3}}"#).unwrap();
        assert_eq!(config.status.unknown_latency_bars, 3);
        assert_eq!(config.status.poll_interval_secs, 60);
        assert_eq!(config.nav.header_offset, 12.0);
    }

    #[test]
    fn pixel_ratio_is_clamped() {
        let background = BackgroundConfig::default();
        assert_eq!(background.pixel_ratio(0.5), 1.0);
        assert_eq!(background.pixel_ratio(1.25), 1.25);
        assert_eq!(background.pixel_ratio(3.0), 1.5);
    }
}
