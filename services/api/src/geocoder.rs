//! Address geocoding through a Nominatim-compatible search API

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{geo::Coordinates, models::address::Address};

/// Resolves a postal address to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the service found no match
    async fn locate(&self, address: &Address) -> Result<Option<Coordinates>>;
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// Client for the `/search` endpoint of a Nominatim server
pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("homecare-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build geocoder HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn locate(&self, address: &Address) -> Result<Option<Coordinates>> {
        let url = format!("{}/search", self.base_url);
        debug!("Geocoding address {}", address.id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("street", address.street.as_str()),
                ("city", address.city.as_str()),
                ("state", address.state.as_str()),
                ("postalcode", address.zip.as_str()),
                ("countrycodes", "us"),
                ("format", "json"),
                ("limit", "1"),
            ])
            .send()
            .await
            .context("Failed to reach geocoder")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Geocoder error: {} - {}", status, body);
        }

        let hits: Vec<SearchHit> = response
            .json()
            .await
            .context("Failed to parse geocoder response")?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let latitude: f64 = hit.lat.parse().context("Geocoder returned a bad latitude")?;
        let longitude: f64 = hit.lon.parse().context("Geocoder returned a bad longitude")?;
        Ok(Some(Coordinates::new(latitude, longitude)?))
    }
}
