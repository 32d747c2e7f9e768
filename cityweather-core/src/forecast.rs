use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::{
    config::ClientConfig, fetch::Fetch, geocoding::truncate_body, model::ForecastPayload,
};

/// The rendered card labels readings as °C and m/s, so requests are always metric.
const UNITS: &str = "metric";

/// Client for the 5-day / 3-hour forecast endpoint.
#[derive(Debug, Clone)]
pub struct ForecastClient {
    config: ClientConfig,
    http: Client,
}

impl ForecastClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http: Client::new() }
    }

    /// Full request URL for a coordinate pair, credentials and units included.
    pub fn forecast_url(&self, lat: f64, lon: f64) -> Result<Url> {
        let mut url = self.config.endpoint("data/2.5/forecast")?;
        url.query_pairs_mut()
            .append_pair("lat", &lat.to_string())
            .append_pair("lon", &lon.to_string())
            .append_pair("appid", &self.config.api_key)
            .append_pair("units", UNITS);
        Ok(url)
    }

    pub async fn get_forecast(&self, lat: f64, lon: f64) -> Result<ForecastPayload> {
        let url = self.forecast_url(lat, lon)?;
        self.get_url(&url).await
    }

    async fn get_url(&self, url: &Url) -> Result<ForecastPayload> {
        tracing::debug!(path = url.path(), "requesting forecast");

        let res = self
            .http
            .get(url.clone())
            .send()
            .await
            .context("Failed to send request to OpenWeather (forecast)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read OpenWeather forecast response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather forecast request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: ForecastPayload =
            serde_json::from_str(&body).context("Failed to parse OpenWeather forecast JSON")?;

        tracing::debug!(city = %parsed.city.name, entries = parsed.list.len(), "forecast received");
        Ok(parsed)
    }
}

#[async_trait]
impl Fetch<ForecastPayload> for ForecastClient {
    async fn fetch(&self, url: &Url) -> Result<ForecastPayload, String> {
        self.get_url(url).await.map_err(|err| format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_forecast_decodes_payload_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("lat", "48.85"))
            .and(query_param("lon", "2.35"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "city": { "name": "Paris", "country": "FR" },
                "list": [
                    { "dt": 1, "dt_txt": "2024-05-01 12:00:00",
                      "main": { "temp": 21.5, "humidity": 40 }, "wind": { "speed": 3.0 },
                      "weather": [{ "main": "Clear", "description": "clear sky" }] },
                    { "dt": 2, "dt_txt": "2024-05-01 15:00:00",
                      "main": { "temp": 19.0, "humidity": 45 }, "wind": { "speed": 2.5 },
                      "weather": [{ "main": "Clouds", "description": "few clouds" }] }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ForecastClient::new(ClientConfig::new("k", &server.uri()).unwrap());
        let payload = client.get_forecast(48.85, 2.35).await.unwrap();

        assert_eq!(payload.city.name, "Paris");
        assert_eq!(payload.list.len(), 2);
        assert_eq!(payload.list[0].main.temp, 21.5);
        assert_eq!(payload.list[1].dt_txt, "2024-05-01 15:00:00");
    }

    #[tokio::test]
    async fn get_forecast_reports_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let client = ForecastClient::new(ClientConfig::new("", &server.uri()).unwrap());
        let err = client.get_forecast(1.0, 2.0).await.unwrap_err();

        let msg = format!("{err:#}");
        assert!(msg.contains("401"));
        assert!(msg.contains("Invalid API key"));
    }

    #[test]
    fn stored_imperial_units_do_not_leak_into_requests() {
        let cfg: crate::config::Config =
            toml::from_str("api_key = \"k\"\nunits = \"imperial\"\n").unwrap();
        let client = ForecastClient::new(cfg.client_config().unwrap());

        let url = client.forecast_url(1.0, 2.0).unwrap();
        assert!(url.query().unwrap_or_default().ends_with("units=metric"));
    }

    #[test]
    fn forecast_url_carries_coordinates_key_and_units() {
        let cfg = ClientConfig::new("SECRET", "https://api.openweathermap.org").unwrap();
        let client = ForecastClient::new(cfg);

        let url = client.forecast_url(48.85, 2.35).unwrap();
        assert_eq!(url.path(), "/data/2.5/forecast");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("lat".to_string(), "48.85".to_string()),
                ("lon".to_string(), "2.35".to_string()),
                ("appid".to_string(), "SECRET".to_string()),
                ("units".to_string(), "metric".to_string()),
            ]
        );
    }

    #[test]
    fn same_coordinates_give_identical_urls() {
        let cfg = ClientConfig::new("k", "https://api.openweathermap.org").unwrap();
        let client = ForecastClient::new(cfg);

        assert_eq!(client.forecast_url(1.0, 2.0).unwrap(), client.forecast_url(1.0, 2.0).unwrap());
        assert_ne!(client.forecast_url(1.0, 2.0).unwrap(), client.forecast_url(1.0, 2.5).unwrap());
    }
}
