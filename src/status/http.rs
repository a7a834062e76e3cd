use serde_json::Value;

use super::{StatusError, StatusTransport};

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use std::time::Duration;

    use anyhow::{Context, Result};

    use super::*;

    /// Blocking reqwest client; native pollers run it on their own thread.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: reqwest::blocking::Client,
    }

    impl HttpTransport {
        pub fn new() -> Result<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent(concat!("vatra-site/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("failed to build HTTP client")?;
            Ok(Self { client })
        }
    }

    impl StatusTransport for HttpTransport {
        async fn get_json(&self, url: &str) -> Result<Value, StatusError> {
            let response = self
                .client
                .get(url)
                .send()
                .map_err(|err| StatusError::Transport(err.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(StatusError::Http(status.as_u16()));
            }
            response
                .json::<Value>()
                .map_err(|err| StatusError::Json(err.to_string()))
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod imp {
    use anyhow::{anyhow, Result};

    use super::*;

    /// Browser `fetch` through reqwest's wasm backend.
    #[derive(Debug, Clone, Default)]
    pub struct HttpTransport {
        client: reqwest::Client,
    }

    impl HttpTransport {
        pub fn new() -> Result<Self> {
            Ok(Self {
                client: reqwest::Client::new(),
            })
        }

        /// Downloads an asset as raw bytes. `url` must be absolute.
        pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| anyhow!("request for {url} failed: {err}"))?;
            let status = response.status();
            if !status.is_success() {
                return Err(anyhow!("request for {url} answered HTTP {status}"));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|err| anyhow!("reading {url} failed: {err}"))?;
            Ok(bytes.to_vec())
        }
    }

    impl StatusTransport for HttpTransport {
        async fn get_json(&self, url: &str) -> Result<Value, StatusError> {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| StatusError::Transport(err.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(StatusError::Http(status.as_u16()));
            }
            response
                .json::<Value>()
                .await
                .map_err(|err| StatusError::Json(err.to_string()))
        }
    }
}

pub use imp::HttpTransport;
