//! HttpNormalizer - HTTP 経由で住所正規化サービスを呼ぶ Normalizer
//!
//! `GET <endpoint>?address=<住所>` を投げ、
//! `{ pref, city, town, addr, level, lat, lng }` の JSON を受け取ります。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::ports::{NormalizeError, NormalizedAddress, Normalizer};

pub struct HttpNormalizer {
    http: Client,
    endpoint: Url,
}

impl HttpNormalizer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, NormalizeError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| NormalizeError::Transport(format!("invalid endpoint {endpoint}: {e}")))?;
        let http = Client::builder()
            .user_agent(concat!("hazardmap/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| NormalizeError::Transport(e.to_string()))?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl Normalizer for HttpNormalizer {
    async fn normalize(&self, address: &str) -> Result<NormalizedAddress, NormalizeError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[("address", address)])
            .send()
            .await
            .map_err(|e| NormalizeError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| NormalizeError::Transport(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| NormalizeError::Transport(e.to_string()))?;
        let normalized: NormalizedAddress = serde_json::from_slice(&body)
            .map_err(|e| NormalizeError::InvalidResponse(e.to_string()))?;
        debug!(level = normalized.level, "normalizer responded");
        Ok(normalized)
    }
}
