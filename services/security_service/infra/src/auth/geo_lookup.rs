//! Geo-IP lookup adapter (C9, spec.md §4.7 step 4). Grounded on the
//! teacher's `reqwest::Client`-over-HTTP pattern (`KanidmClient`); any
//! failure collapses to `"Unknown"` rather than surfacing, per the
//! `GeoLocationLookup` trait's contract and spec.md §7 "Local recovery" —
//! a down geo provider must never block session creation.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use security_service_core::domains::auth::domain::session_cache::GeoLocationLookup;

#[derive(Debug, Clone, Deserialize)]
struct GeoIpResponse {
    city: Option<String>,
    country: Option<String>,
}

#[derive(Clone)]
pub struct HttpGeoLocationLookup {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGeoLocationLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_millis(500))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl GeoLocationLookup for HttpGeoLocationLookup {
    async fn locate(&self, ip_address: &str) -> String {
        if ip_address.is_empty() {
            return "Unknown".to_string();
        }

        let url = format!("{}/{}", self.base_url, ip_address);

        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(_) => return "Unknown".to_string(),
        };

        let body = match response.json::<GeoIpResponse>().await {
            Ok(b) => b,
            Err(_) => return "Unknown".to_string(),
        };

        match (body.city, body.country) {
            (Some(city), Some(country)) => format!("{city}, {country}"),
            (None, Some(country)) => country,
            (Some(city), None) => city,
            (None, None) => "Unknown".to_string(),
        }
    }
}

/// Stub for local/dev composition without a geo provider wired in.
pub struct UnknownGeoLocationLookup;

#[async_trait]
impl GeoLocationLookup for UnknownGeoLocationLookup {
    async fn locate(&self, _ip_address: &str) -> String {
        "Unknown".to_string()
    }
}
