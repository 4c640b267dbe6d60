use crate::{
    Config,
    gateway::http::HttpGateway,
    model::{Coordinates, CurrentConditions, DailyForecast, HourlyForecast, PlaceCandidate, WeatherAlert},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod http;

/// Backend routes, relative to the configured base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Current,
    Hourly,
    Daily,
    Alerts,
    Geocoding,
    ReverseGeocoding,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Current => "/weather/current",
            Endpoint::Hourly => "/weather/hourly",
            Endpoint::Daily => "/weather/daily",
            Endpoint::Alerts => "/weather/alerts",
            Endpoint::Geocoding => "/geocoding",
            Endpoint::ReverseGeocoding => "/geocoding/reverse",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free text and coordinates to places.
#[async_trait]
pub trait GeocodingGateway: Send + Sync + Debug {
    /// Candidates for `text`, in the gateway's ranking order. Empty when
    /// nothing matches; errors only on transport or server failure.
    async fn forward_search(&self, text: &str) -> anyhow::Result<Vec<PlaceCandidate>>;

    /// Places at `coords`, most relevant first.
    async fn reverse(&self, coords: Coordinates) -> anyhow::Result<Vec<PlaceCandidate>>;
}

/// Coordinates to weather.
#[async_trait]
pub trait WeatherGateway: Send + Sync + Debug {
    async fn get_current(&self, coords: Coordinates) -> anyhow::Result<CurrentConditions>;

    async fn get_hourly(&self, coords: Coordinates) -> anyhow::Result<Vec<HourlyForecast>>;

    async fn get_daily(&self, coords: Coordinates) -> anyhow::Result<Vec<DailyForecast>>;

    /// Active alerts. Alert coverage is regional, so implementations turn
    /// every failure into an empty list instead of an error.
    async fn get_alerts(&self, coords: Coordinates) -> Vec<WeatherAlert>;
}

/// Construct the HTTP gateway described by `config`, shared by both roles.
pub fn gateway_from_config(config: &Config) -> anyhow::Result<Arc<HttpGateway>> {
    Ok(Arc::new(HttpGateway::from_config(config)?))
}
