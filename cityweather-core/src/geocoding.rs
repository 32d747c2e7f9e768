//! Direct and reverse geocoding against the OpenWeather geo endpoints.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;

use crate::{config::ClientConfig, error::LookupError, model::Place};

/// Name used when reverse geocoding comes back empty.
pub const FALLBACK_PLACE_NAME: &str = "My location";

#[derive(Debug, Clone)]
pub struct GeocodingClient {
    config: ClientConfig,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
    lat: f64,
    lon: f64,
}

impl GeocodingClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http: Client::new() }
    }

    /// Forward lookup. The first match wins; coordinates are taken verbatim.
    pub async fn resolve_by_name(&self, query: &str) -> Result<Place, LookupError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LookupError::EmptyQuery);
        }

        let results = self.direct(query).await.map_err(|err| {
            tracing::error!(query, "direct geocoding failed: {err:#}");
            LookupError::Network(format!("{err:#}"))
        })?;

        let first = results.into_iter().next().ok_or_else(|| {
            tracing::info!(query, "no geocoding match");
            LookupError::NotFound
        })?;

        Ok(Place {
            name: first.name.unwrap_or_else(|| query.to_string()),
            state: first.state,
            country: first.country,
            lat: first.lat,
            lon: first.lon,
        })
    }

    /// Reverse lookup. Never fails: the coordinates are already known, so any
    /// miss or error yields a place named [`FALLBACK_PLACE_NAME`].
    pub async fn resolve_by_coordinates(&self, lat: f64, lon: f64) -> Place {
        let first = match self.reverse(lat, lon).await {
            Ok(results) => results.into_iter().next(),
            Err(err) => {
                tracing::warn!(lat, lon, "reverse geocoding failed: {err:#}");
                None
            }
        };

        let (name, country) = match first {
            Some(r) => (r.name.filter(|n| !n.is_empty()), r.country),
            None => (None, None),
        };

        Place {
            name: name.unwrap_or_else(|| FALLBACK_PLACE_NAME.to_string()),
            state: None,
            country,
            lat,
            lon,
        }
    }

    async fn direct(&self, query: &str) -> Result<Vec<GeoResult>> {
        let url = self.config.endpoint("geo/1.0/direct")?;
        self.get_json(
            url,
            &[("q", query), ("limit", "1"), ("appid", self.config.api_key.as_str())],
            "direct geocoding",
        )
        .await
    }

    async fn reverse(&self, lat: f64, lon: f64) -> Result<Vec<GeoResult>> {
        let url = self.config.endpoint("geo/1.0/reverse")?;
        let (lat, lon) = (lat.to_string(), lon.to_string());
        self.get_json(
            url,
            &[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("limit", "1"),
                ("appid", self.config.api_key.as_str()),
            ],
            "reverse geocoding",
        )
        .await
    }

    async fn get_json(
        &self,
        url: url::Url,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<Vec<GeoResult>> {
        tracing::debug!(%url, "requesting {what}");

        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send {what} request"))?;

        let status = res.status();
        let body =
            res.text().await.with_context(|| format!("Failed to read {what} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "{what} request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body).with_context(|| format!("Failed to parse {what} JSON"))
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
    }

    #[tokio::test]
    async fn empty_query_makes_no_request() {
        // Unroutable base: if a request were attempted it would surface as Network.
        let cfg = ClientConfig::new("k", "http://127.0.0.1:1").unwrap();
        let client = GeocodingClient::new(cfg);

        assert_eq!(client.resolve_by_name("   ").await, Err(LookupError::EmptyQuery));
    }

    #[tokio::test]
    async fn reverse_lookup_falls_back_when_unreachable() {
        let cfg = ClientConfig::new("k", "http://127.0.0.1:1").unwrap();
        let client = GeocodingClient::new(cfg);

        let place = client.resolve_by_coordinates(10.5, -20.25).await;
        assert_eq!(place.name, FALLBACK_PLACE_NAME);
        assert_eq!((place.lat, place.lon), (10.5, -20.25));
        assert!(place.country.is_none());
    }
}
