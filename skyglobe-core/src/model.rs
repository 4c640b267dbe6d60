use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;

/// A point on the globe in decimal degrees.
///
/// Equality is exact: two points compare equal only if both components are
/// bit-for-bit the same number. Use [`Coordinates::is_within`] for tolerant
/// comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub const MAX_LAT: f64 = 90.0;
    pub const MAX_LON: f64 = 180.0;

    /// Build a validated coordinate pair.
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::NotFinite { lat, lon });
        }
        if !(-Self::MAX_LAT..=Self::MAX_LAT).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-Self::MAX_LON..=Self::MAX_LON).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Fold raw map-click coordinates into range.
    ///
    /// A globe projection reports longitudes past the antimeridian after the
    /// user has spun it, so longitude wraps; latitude is clamped.
    pub fn wrapped(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::NotFinite { lat, lon });
        }

        let lat = lat.clamp(-Self::MAX_LAT, Self::MAX_LAT);
        let lon = if (-Self::MAX_LON..=Self::MAX_LON).contains(&lon) {
            lon
        } else {
            (lon + Self::MAX_LON).rem_euclid(360.0) - Self::MAX_LON
        };

        Ok(Self { lat, lon })
    }

    /// True when both components differ by at most `tolerance_deg`.
    pub fn is_within(&self, other: &Coordinates, tolerance_deg: f64) -> bool {
        (self.lat - other.lat).abs() <= tolerance_deg
            && (self.lon - other.lon).abs() <= tolerance_deg
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// One geocoding match, as returned by the gateway.
///
/// On the wire the coordinates are flat `lat`/`lon` fields next to the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub name: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(flatten)]
    pub coordinates: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_names: Option<BTreeMap<String, String>>,
}

impl PlaceCandidate {
    /// Localized name for a language code such as `"fr"`, if the gateway sent one.
    pub fn local_name(&self, lang: &str) -> Option<&str> {
        self.local_names
            .as_ref()
            .and_then(|names| names.get(lang))
            .map(String::as_str)
    }
}

/// The single place currently bound to the displayed weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub name: String,
    pub country: String,
    pub state: Option<String>,
    pub coordinates: Coordinates,
}

impl ResolvedLocation {
    /// "Name, State, CC", skipping the state when absent or repeating the name.
    pub fn display_name(&self) -> String {
        match self.state.as_deref() {
            Some(state) if !state.is_empty() && state != self.name => {
                format!("{}, {}, {}", self.name, state, self.country)
            }
            _ => format!("{}, {}", self.name, self.country),
        }
    }
}

impl From<PlaceCandidate> for ResolvedLocation {
    fn from(candidate: PlaceCandidate) -> Self {
        Self {
            name: candidate.name,
            country: candidate.country,
            state: candidate.state,
            coordinates: candidate.coordinates,
        }
    }
}

impl From<&PlaceCandidate> for ResolvedLocation {
    fn from(candidate: &PlaceCandidate) -> Self {
        candidate.clone().into()
    }
}

/// Current conditions in metric units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Observation time, unix seconds.
    pub dt: i64,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    /// hPa
    pub pressure: u32,
    /// m/s
    pub wind_speed: f64,
    #[serde(default)]
    pub wind_deg: u16,
    /// Metres; the backend omits it when unknown.
    #[serde(default)]
    pub visibility: Option<u32>,
    pub description: String,
    pub icon: String,
    #[serde(default)]
    pub sunrise: Option<i64>,
    #[serde(default)]
    pub sunset: Option<i64>,
}

impl CurrentConditions {
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        unix_to_utc(self.dt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub dt: i64,
    pub temperature: f64,
    pub description: String,
    pub icon: String,
    /// Probability of precipitation, 0.0..=1.0.
    #[serde(default)]
    pub pop: f64,
}

impl HourlyForecast {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        unix_to_utc(self.dt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub dt: i64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub description: String,
    pub icon: String,
    #[serde(default)]
    pub pop: f64,
}

impl DailyForecast {
    pub fn date(&self) -> Option<DateTime<Utc>> {
        unix_to_utc(self.dt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub sender_name: String,
    pub event: String,
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub description: String,
}

/// The four weather sub-fetches issued per location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherPart {
    Current,
    Hourly,
    Daily,
    Alerts,
}

impl WeatherPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherPart::Current => "current",
            WeatherPart::Hourly => "hourly",
            WeatherPart::Daily => "daily",
            WeatherPart::Alerts => "alerts",
        }
    }
}

impl std::fmt::Display for WeatherPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weather for one resolved location, composed after all sub-fetches settle.
///
/// `hourly` and `daily` are empty when their fetch failed; `alerts` is empty
/// when the region has none or the alerts endpoint was unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: ResolvedLocation,
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
    pub alerts: Vec<WeatherAlert>,
}

/// Monotonic counter of user-initiated selections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}
