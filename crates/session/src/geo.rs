//! Best-effort IP geolocation against an external lookup service.
//!
//! Every failure path here resolves to `None`: registration must proceed
//! with null location fields whenever the service is slow, down, or
//! unconfigured.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct GeoInfo {
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Clone)]
pub struct GeoLocator {
    http: reqwest::Client,
    base_url: String,
}

impl GeoLocator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// `None` when `GEO_LOOKUP_URL` is unset; enrichment is then disabled
    /// entirely.
    pub fn from_env() -> Option<Self> {
        std::env::var("GEO_LOOKUP_URL").ok().map(Self::new)
    }

    /// Look up the location for an IP. Never fails the caller.
    pub async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), ip);

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "geolocation lookup failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "geolocation lookup rejected");
            return None;
        }

        match response.json::<GeoInfo>().await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, "geolocation response unreadable");
                None
            }
        }
    }
}
