mod http;

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::config::{OfflinePolicy, SiteConfig};

pub use http::HttpTransport;

pub const MAX_BARS: u8 = 5;

/// Result of one status query, replaced wholesale on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StatusSnapshot {
    pub online: bool,
    pub online_players: u32,
    pub max_players: u32,
    pub latency_ms: Option<f64>,
}

impl StatusSnapshot {
    /// Signal strength in `0..=5`. Offline is always zero.
    pub fn bars(&self, unknown_latency_bars: u8) -> u8 {
        if !self.online {
            return 0;
        }
        match self.latency_ms {
            Some(ms) => bars_for_latency(ms),
            None => unknown_latency_bars.min(MAX_BARS),
        }
    }

    /// Which of the card's bars are lit, left to right.
    pub fn lit_bars(&self, unknown_latency_bars: u8) -> [bool; MAX_BARS as usize] {
        let lit = self.bars(unknown_latency_bars);
        std::array::from_fn(|index| (index as u8) < lit)
    }

    /// `online/max` while online, `Offline` otherwise.
    pub fn player_label(&self) -> String {
        if self.online {
            format!("{}/{}", self.online_players, self.max_players)
        } else {
            "Offline".to_string()
        }
    }
}

/// Maps round-trip latency onto 1..=5 bars. Lower bounds are inclusive.
pub fn bars_for_latency(ms: f64) -> u8 {
    if ms < 75.0 {
        5
    } else if ms < 150.0 {
        4
    } else if ms < 250.0 {
        3
    } else if ms < 400.0 {
        2
    } else {
        1
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatusError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("endpoint answered with HTTP {0}")]
    Http(u16),
    #[error("invalid JSON body: {0}")]
    Json(String),
}

#[allow(async_fn_in_trait)]
pub trait StatusTransport {
    async fn get_json(&self, url: &str) -> Result<Value, StatusError>;
}

/// Shape of the JSON returned by a query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusApi {
    /// `api.mcsrvstat.us`: latency lives under `debug.ping`.
    McSrvStat,
    /// `api.mcstatus.io`: latency is `latency` or `roundTripLatency`.
    McStatus,
}

impl StatusApi {
    pub fn name(self) -> &'static str {
        match self {
            Self::McSrvStat => "mcsrvstat",
            Self::McStatus => "mcstatus",
        }
    }

    /// Reads a snapshot out of the service's JSON, tolerating missing fields.
    pub fn parse(self, json: &Value, default_max_players: u32) -> StatusSnapshot {
        let players = json.get("players");
        let count = |field: &str| {
            players
                .and_then(|players| players.get(field))
                .and_then(Value::as_f64)
                .filter(|value| value.is_finite() && *value >= 0.0)
                .map(|value| value as u32)
        };
        let latency = match self {
            Self::McSrvStat => json.get("debug").and_then(|debug| number(debug.get("ping"))),
            Self::McStatus => {
                number(json.get("latency")).or_else(|| number(json.get("roundTripLatency")))
            }
        };
        StatusSnapshot {
            online: json.get("online").is_some_and(truthy),
            online_players: count("online").unwrap_or(0),
            max_players: count("max").unwrap_or(default_max_players),
            latency_ms: latency,
        }
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|value| value.is_finite())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEndpoint {
    pub api: StatusApi,
    pub url: String,
}

impl StatusEndpoint {
    /// Expands `{host}` and `{port}` in a URL template.
    pub fn from_template(api: StatusApi, template: &str, host: &str, port: u16) -> Self {
        let url = template
            .replace("{host}", host)
            .replace("{port}", &port.to_string());
        Self { api, url }
    }

    pub async fn fetch<T: StatusTransport>(
        &self,
        transport: &T,
        default_max_players: u32,
    ) -> Result<StatusSnapshot, StatusError> {
        let json = transport.get_json(&self.url).await?;
        Ok(self.api.parse(&json, default_max_players))
    }
}

pub fn default_endpoints(config: &SiteConfig) -> Vec<StatusEndpoint> {
    let host = &config.server.host;
    let port = config.server.port;
    vec![
        StatusEndpoint::from_template(
            StatusApi::McSrvStat,
            &config.status.primary_endpoint,
            host,
            port,
        ),
        StatusEndpoint::from_template(
            StatusApi::McStatus,
            &config.status.fallback_endpoint,
            host,
            port,
        ),
    ]
}

#[derive(Debug, Default)]
pub struct StatusBoard {
    snapshot: Arc<RwLock<StatusSnapshot>>,
}

impl Clone for StatusBoard {
    fn clone(&self) -> Self {
        Self {
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        *self.snapshot.read()
    }

    pub fn replace(&self, snapshot: StatusSnapshot) {
        *self.snapshot.write() = snapshot;
    }

    /// Flips the live snapshot to offline and returns the result.
    pub fn mark_offline(&self, policy: OfflinePolicy) -> StatusSnapshot {
        let mut guard = self.snapshot.write();
        guard.online = false;
        if policy == OfflinePolicy::ResetCounts {
            guard.online_players = 0;
            guard.max_players = 0;
            guard.latency_ms = None;
        }
        *guard
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollOutcome {
    Updated {
        source: StatusApi,
        snapshot: StatusSnapshot,
    },
    Offline(StatusSnapshot),
    /// Teardown happened while the request was in flight; nothing was written.
    Cancelled,
}

impl PollOutcome {
    pub fn snapshot(&self) -> Option<StatusSnapshot> {
        match self {
            Self::Updated { snapshot, .. } | Self::Offline(snapshot) => Some(*snapshot),
            Self::Cancelled => None,
        }
    }
}

pub struct StatusPoller<T> {
    transport: T,
    endpoints: Vec<StatusEndpoint>,
    board: StatusBoard,
    cancel: CancelToken,
    policy: OfflinePolicy,
    default_max_players: u32,
}

impl<T: StatusTransport> StatusPoller<T> {
    pub fn new(transport: T, config: &SiteConfig, board: StatusBoard, cancel: CancelToken) -> Self {
        Self {
            transport,
            endpoints: default_endpoints(config),
            board,
            cancel,
            policy: config.status.offline_policy,
            default_max_players: config.status.default_max_players,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<StatusEndpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn endpoints(&self) -> &[StatusEndpoint] {
        &self.endpoints
    }

    /// Runs the source chain once. Errors never escape; they only move the
    /// chain forward or end in the offline fallback.
    pub async fn poll_once(&self) -> PollOutcome {
        for endpoint in &self.endpoints {
            if self.cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }
            match endpoint
                .fetch(&self.transport, self.default_max_players)
                .await
            {
                Ok(snapshot) => {
                    if self.cancel.is_cancelled() {
                        return PollOutcome::Cancelled;
                    }
                    self.board.replace(snapshot);
                    debug!(
                        "status from {}: online={} players={}",
                        endpoint.api.name(),
                        snapshot.online,
                        snapshot.player_label()
                    );
                    return PollOutcome::Updated {
                        source: endpoint.api,
                        snapshot,
                    };
                }
                Err(err) => {
                    debug!("status source {} failed: {err}", endpoint.api.name());
                }
            }
        }
        if self.cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        warn!("all status sources failed; marking server offline");
        PollOutcome::Offline(self.board.mark_offline(self.policy))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl<T: StatusTransport> StatusPoller<T> {
    /// Polls immediately and then once per `period` until cancelled.
    pub fn run_blocking<F>(&self, period: std::time::Duration, mut on_update: F)
    where
        F: FnMut(&PollOutcome),
    {
        info!("status polling started ({} sources)", self.endpoints.len());
        loop {
            let outcome = pollster::block_on(self.poll_once());
            if outcome == PollOutcome::Cancelled {
                break;
            }
            on_update(&outcome);
            if self.cancel.wait_timeout(period) {
                break;
            }
        }
        info!("status polling stopped");
    }
}
