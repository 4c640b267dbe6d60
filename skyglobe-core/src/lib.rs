//! Core library for the skyglobe weather dashboard.
//!
//! This crate defines:
//! - Configuration and startup diagnostics
//! - Geocoding and weather gateways, with an HTTP implementation
//! - The map surface contract and a headless globe
//! - The coordinator that turns searches and map clicks into one consistent,
//!   displayable state
//!
//! It is used by `skyglobe-cli`, but can also back other front ends.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod map;
pub mod model;
pub mod policy;

pub use config::{Config, StartupDiagnostic};
pub use coordinator::{Coordinator, CoordinatorState, Status};
pub use error::{CoordinateError, CoordinatorError, InvalidQuery, MapError};
pub use gateway::{GeocodingGateway, WeatherGateway, http::HttpGateway};
pub use map::{HeadlessGlobe, MapEvent, MapSurface};
pub use model::{
    Coordinates, CurrentConditions, DailyForecast, Generation, HourlyForecast, PlaceCandidate,
    ResolvedLocation, WeatherAlert, WeatherPart, WeatherSnapshot,
};
pub use policy::{CandidatePolicy, UseFirstGatewayRankedCandidate};
