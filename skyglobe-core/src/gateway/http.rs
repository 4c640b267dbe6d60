use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::{
    Config,
    model::{Coordinates, CurrentConditions, DailyForecast, HourlyForecast, PlaceCandidate, WeatherAlert},
};

use super::{Endpoint, GeocodingGateway, WeatherGateway};

/// Gateway to the dashboard backend over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    http: Client,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid API base URL '{base_url}'"))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.as_str())
    }

    async fn get_json<T, Q>(&self, endpoint: Endpoint, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let res = self
            .http
            .get(self.url(endpoint))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {endpoint}"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read {endpoint} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "{} request failed with status {}: {}",
                endpoint,
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body).with_context(|| format!("Failed to parse {endpoint} JSON"))
    }
}

fn coord_query(coords: Coordinates) -> [(&'static str, String); 2] {
    [("lat", coords.lat.to_string()), ("lon", coords.lon.to_string())]
}

#[async_trait]
impl GeocodingGateway for HttpGateway {
    async fn forward_search(&self, text: &str) -> Result<Vec<PlaceCandidate>> {
        self.get_json(Endpoint::Geocoding, &[("city", text)]).await
    }

    async fn reverse(&self, coords: Coordinates) -> Result<Vec<PlaceCandidate>> {
        self.get_json(Endpoint::ReverseGeocoding, &coord_query(coords))
            .await
    }
}

#[async_trait]
impl WeatherGateway for HttpGateway {
    async fn get_current(&self, coords: Coordinates) -> Result<CurrentConditions> {
        self.get_json(Endpoint::Current, &coord_query(coords)).await
    }

    async fn get_hourly(&self, coords: Coordinates) -> Result<Vec<HourlyForecast>> {
        self.get_json(Endpoint::Hourly, &coord_query(coords)).await
    }

    async fn get_daily(&self, coords: Coordinates) -> Result<Vec<DailyForecast>> {
        self.get_json(Endpoint::Daily, &coord_query(coords)).await
    }

    async fn get_alerts(&self, coords: Coordinates) -> Vec<WeatherAlert> {
        // `null` and a missing list both mean "no alerts here"
        match self
            .get_json::<Option<Vec<WeatherAlert>>, _>(Endpoint::Alerts, &coord_query(coords))
            .await
        {
            Ok(alerts) => alerts.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(%coords, "Weather alerts unavailable: {err:#}");
                Vec::new()
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_endpoint() {
        let gw = HttpGateway::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(gw.url(Endpoint::ReverseGeocoding), "http://localhost:5000/geocoding/reverse");

        let gw = HttpGateway::new("https://api.example/v2", Duration::from_secs(1)).unwrap();
        assert_eq!(gw.url(Endpoint::Alerts), "https://api.example/v2/weather/alerts");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(250);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
