use serde::Serialize;

use crate::model::WeatherPart;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("Latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinates must be finite numbers (got {lat}, {lon})")]
    NotFinite { lat: f64, lon: f64 },
}

/// Outcome of a failed selection, recorded in the coordinator state.
///
/// These never escape the coordinator as `Err`; callers read them from
/// `CoordinatorState::last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinatorError {
    #[error("No place matches '{query}'")]
    NoMatch { query: String },

    #[error("Geocoding failed: {reason}")]
    GeocodingFailed { reason: String },

    #[error("Weather unavailable: {reason}")]
    WeatherUnavailable { reason: String },

    /// Current conditions arrived but some secondary parts did not.
    #[error("Some weather data is missing: {}", join_parts(.failed))]
    PartialWeatherFailure { failed: Vec<WeatherPart> },
}

/// Search text rejected before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidQuery {
    #[error("Search text must not be blank")]
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("Map surface has been disposed")]
    Disposed,
    #[error("Map surface rejected the command: {0}")]
    Rejected(String),
}

fn join_parts(parts: &[WeatherPart]) -> String {
    parts
        .iter()
        .map(WeatherPart::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
