//! The location/weather coordinator.
//!
//! Three entry points feed one display: text search, map clicks and direct
//! candidate selection. Each user-initiated selection opens a new
//! [`Generation`]; any result that settles under an older generation is
//! dropped without touching state. Within a generation only the most recently
//! started fetch may write, so a re-pick cannot be overwritten by the fetch it
//! replaced. A location and its weather are committed together, so the
//! display never pairs a place with another place's weather.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::anyhow;
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    Config,
    config::DEFAULT_REQUEST_TIMEOUT_SECS,
    error::{CoordinatorError, InvalidQuery},
    gateway::{GeocodingGateway, WeatherGateway, gateway_from_config},
    map::{MapEvent, MapEventStream, MapSurface},
    model::{
        Coordinates, CurrentConditions, DailyForecast, Generation, HourlyForecast, PlaceCandidate,
        ResolvedLocation, WeatherAlert, WeatherPart, WeatherSnapshot,
    },
    policy::{CandidatePolicy, UseFirstGatewayRankedCandidate},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Idle,
    Resolving,
    Fetching,
    Ready,
    PartialError,
    Error,
}

impl Status {
    /// True once the current generation has reached a final outcome.
    pub fn is_settled(&self) -> bool {
        matches!(self, Status::Ready | Status::PartialError | Status::Error)
    }
}

/// Everything the presentation layer needs to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoordinatorState {
    pub generation: Generation,
    pub status: Status,
    /// Place bound to `weather`; last known good on failure.
    pub resolved_location: Option<ResolvedLocation>,
    /// Place whose weather is being fetched in this generation.
    pub pending_location: Option<ResolvedLocation>,
    pub weather: Option<WeatherSnapshot>,
    /// Matches from this generation's lookup, in gateway order.
    pub candidates: Vec<PlaceCandidate>,
    pub last_error: Option<CoordinatorError>,
}

/// Result of merging the four weather sub-fetches.
#[derive(Debug, Clone, PartialEq)]
pub enum Composed {
    Complete(WeatherSnapshot),
    Partial {
        snapshot: WeatherSnapshot,
        failed: Vec<WeatherPart>,
    },
    Unavailable(String),
}

/// Merge settled sub-fetches. `current` is required; `hourly` and `daily`
/// degrade to empty sequences; `alerts` is already infallible.
pub fn compose_snapshot(
    location: ResolvedLocation,
    current: anyhow::Result<CurrentConditions>,
    hourly: anyhow::Result<Vec<HourlyForecast>>,
    daily: anyhow::Result<Vec<DailyForecast>>,
    alerts: Vec<WeatherAlert>,
) -> Composed {
    let current = match current {
        Ok(current) => current,
        Err(err) => return Composed::Unavailable(format!("{err:#}")),
    };

    let mut failed = Vec::new();

    let hourly = hourly.unwrap_or_else(|err| {
        tracing::warn!(location = %location.display_name(), "Hourly forecast failed: {err:#}");
        failed.push(WeatherPart::Hourly);
        Vec::new()
    });

    let daily = daily.unwrap_or_else(|err| {
        tracing::warn!(location = %location.display_name(), "Daily forecast failed: {err:#}");
        failed.push(WeatherPart::Daily);
        Vec::new()
    });

    let snapshot = WeatherSnapshot {
        location,
        current,
        hourly,
        daily,
        alerts,
    };

    if failed.is_empty() {
        Composed::Complete(snapshot)
    } else {
        Composed::Partial { snapshot, failed }
    }
}

/// A write permit: the generation plus the attempt that opened it.
///
/// Attempts count every step that may write state (a new selection, a weather
/// fetch). Only the holder of the latest attempt writes, so two fetches in one
/// generation cannot overwrite each other out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    generation: Generation,
    attempt: u64,
}

/// Single source of truth for the displayed place and weather.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct Coordinator {
    geocoder: Arc<dyn GeocodingGateway>,
    weather: Arc<dyn WeatherGateway>,
    map: Arc<dyn MapSurface>,
    policy: Arc<dyn CandidatePolicy>,
    timeout: Duration,
    state: Arc<watch::Sender<CoordinatorState>>,
    // only touched while the state lock is held
    latest_attempt: Arc<AtomicU64>,
}

impl Coordinator {
    pub fn new(
        geocoder: Arc<dyn GeocodingGateway>,
        weather: Arc<dyn WeatherGateway>,
        map: Arc<dyn MapSurface>,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());

        Self {
            geocoder,
            weather,
            map,
            policy: Arc::new(UseFirstGatewayRankedCandidate),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            state: Arc::new(state),
            latest_attempt: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wire the HTTP gateway from `config` into both gateway roles.
    pub fn from_config(config: &Config, map: Arc<dyn MapSurface>) -> anyhow::Result<Self> {
        let gateway = gateway_from_config(config)?;
        Ok(Self::new(gateway.clone(), gateway, map).with_timeout(config.request_timeout()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_candidate_policy(mut self, policy: impl CandidatePolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Copy of the current state.
    pub fn current_snapshot(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    pub fn generation(&self) -> Generation {
        self.state.borrow().generation
    }

    /// Change feed for the presentation layer.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Resolve free text and fetch weather for the best match.
    ///
    /// Returns the generation the search ran under. Resolution failures are
    /// recorded in the state, not returned.
    pub async fn search_by_name(&self, text: &str) -> Result<Generation, InvalidQuery> {
        let query = text.trim();
        if query.is_empty() {
            return Err(InvalidQuery::Blank);
        }

        let ticket = self.begin();
        tracing::debug!(generation = %ticket.generation, query, "Searching by name");

        let outcome = self
            .bounded("Geocoding search", self.geocoder.forward_search(query))
            .await;
        self.resolve(ticket, outcome, CoordinatorError::NoMatch { query: query.to_string() })
            .await;

        Ok(ticket.generation)
    }

    /// Reverse-geocode a point (typically a map click) and fetch its weather.
    ///
    /// `coords` must be in range; build it with [`Coordinates::new`] or
    /// [`Coordinates::wrapped`] rather than from raw fields.
    pub async fn search_by_coordinates(&self, coords: Coordinates) -> Generation {
        debug_assert!(
            Coordinates::new(coords.lat, coords.lon).is_ok(),
            "unvalidated coordinates: {coords}"
        );

        let ticket = self.begin();
        tracing::debug!(generation = %ticket.generation, %coords, "Searching by coordinates");

        let outcome = self
            .bounded("Reverse geocoding", self.geocoder.reverse(coords))
            .await;
        self.resolve(ticket, outcome, CoordinatorError::NoMatch { query: coords.to_string() })
            .await;

        ticket.generation
    }

    /// Fetch weather for a place the caller already picked.
    ///
    /// Runs under the current generation: the caller opened it when it
    /// started the search that produced `candidate`. The pick supersedes any
    /// lookup or fetch still in flight for that generation.
    pub async fn select_candidate(&self, candidate: &PlaceCandidate) -> Generation {
        let generation = self.generation();
        tracing::debug!(%generation, name = %candidate.name, "Candidate selected");

        self.fetch_weather_for(ResolvedLocation::from(candidate), generation, None)
            .await;

        generation
    }

    /// Subscribe to map clicks. Each click supersedes the one before it; the
    /// superseded lookup is aborted since its result would be dropped anyway.
    pub fn listen(&self, mut events: MapEventStream) -> JoinHandle<()> {
        let coordinator = self.clone();

        tokio::spawn(async move {
            let mut in_flight: Option<JoinHandle<Generation>> = None;

            while let Some(event) = events.recv().await {
                match event {
                    MapEvent::Clicked(coords) => {
                        if let Some(previous) = in_flight.take() {
                            previous.abort();
                        }

                        let c = coordinator.clone();
                        in_flight = Some(tokio::spawn(async move {
                            c.search_by_coordinates(coords).await
                        }));
                    }
                }
            }

            tracing::debug!("Map event stream closed");
        })
    }

    fn next_attempt(&self) -> u64 {
        self.latest_attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn holds_latest(&self, state: &CoordinatorState, ticket: Ticket) -> bool {
        state.generation == ticket.generation
            && self.latest_attempt.load(Ordering::SeqCst) == ticket.attempt
    }

    fn begin(&self) -> Ticket {
        let mut ticket = Ticket {
            generation: Generation::default(),
            attempt: 0,
        };

        self.state.send_modify(|state| {
            state.generation = state.generation.next();
            state.status = Status::Resolving;
            state.pending_location = None;
            state.candidates.clear();
            state.last_error = None;
            ticket = Ticket {
                generation: state.generation,
                attempt: self.next_attempt(),
            };
        });

        ticket
    }

    /// Apply `update` only while `ticket` is still the latest attempt.
    fn update_if_latest<F>(&self, ticket: Ticket, update: F) -> bool
    where
        F: FnOnce(&mut CoordinatorState),
    {
        let applied = self.state.send_if_modified(|state| {
            if !self.holds_latest(state, ticket) {
                return false;
            }
            update(state);
            true
        });

        if !applied {
            tracing::debug!(
                generation = %ticket.generation,
                attempt = ticket.attempt,
                latest = %self.generation(),
                "Dropped stale result"
            );
        }

        applied
    }

    /// Open a fetch attempt in `generation`. A search passes the ticket of
    /// its lookup, which must still be the latest; an explicit pick passes
    /// none and supersedes whatever else runs in the generation.
    fn start_fetch(
        &self,
        generation: Generation,
        after: Option<Ticket>,
        location: &ResolvedLocation,
    ) -> Option<Ticket> {
        let mut started = None;

        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            if let Some(lookup) = after {
                if !self.holds_latest(state, lookup) {
                    return false;
                }
            }

            state.status = Status::Fetching;
            state.pending_location = Some(location.clone());
            started = Some(Ticket {
                generation,
                attempt: self.next_attempt(),
            });
            true
        });

        if started.is_none() {
            tracing::debug!(%generation, latest = %self.generation(), "Dropped stale fetch");
        }

        started
    }

    async fn bounded<T, F>(&self, what: &str, call: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("{what} timed out after {:?}", self.timeout)),
        }
    }

    async fn resolve(
        &self,
        ticket: Ticket,
        outcome: anyhow::Result<Vec<PlaceCandidate>>,
        no_match: CoordinatorError,
    ) {
        let candidates = match outcome {
            Ok(candidates) => candidates,
            Err(err) => {
                let reason = format!("{err:#}");
                self.fail(ticket, CoordinatorError::GeocodingFailed { reason });
                return;
            }
        };

        let chosen = self.policy.choose(&candidates).map(ResolvedLocation::from);

        if !self.update_if_latest(ticket, |state| state.candidates = candidates) {
            return;
        }

        match chosen {
            Some(location) => {
                self.fetch_weather_for(location, ticket.generation, Some(ticket))
                    .await;
            }
            None => self.fail(ticket, no_match),
        }
    }

    fn fail(&self, ticket: Ticket, error: CoordinatorError) {
        let message = error.to_string();
        let applied = self.update_if_latest(ticket, |state| {
            state.status = Status::Error;
            state.pending_location = None;
            state.last_error = Some(error);
        });

        if applied {
            tracing::warn!(generation = %ticket.generation, "{message}");
        }
    }

    async fn fetch_weather_for(
        &self,
        location: ResolvedLocation,
        generation: Generation,
        after: Option<Ticket>,
    ) {
        let Some(ticket) = self.start_fetch(generation, after, &location) else {
            return;
        };

        let coords = location.coordinates;
        let (current, hourly, daily, alerts) = tokio::join!(
            self.bounded("Current weather", self.weather.get_current(coords)),
            self.bounded("Hourly forecast", self.weather.get_hourly(coords)),
            self.bounded("Daily forecast", self.weather.get_daily(coords)),
            self.alerts_for(coords),
        );

        match compose_snapshot(location, current, hourly, daily, alerts) {
            Composed::Unavailable(reason) => {
                self.fail(ticket, CoordinatorError::WeatherUnavailable { reason });
            }
            Composed::Complete(snapshot) => {
                self.commit(ticket, snapshot, Status::Ready, None);
            }
            Composed::Partial { snapshot, failed } => {
                let error = CoordinatorError::PartialWeatherFailure { failed };
                self.commit(ticket, snapshot, Status::PartialError, Some(error));
            }
        }
    }

    async fn alerts_for(&self, coords: Coordinates) -> Vec<WeatherAlert> {
        match tokio::time::timeout(self.timeout, self.weather.get_alerts(coords)).await {
            Ok(alerts) => alerts,
            Err(_) => {
                tracing::warn!(%coords, "Weather alerts timed out after {:?}", self.timeout);
                Vec::new()
            }
        }
    }

    fn commit(
        &self,
        ticket: Ticket,
        snapshot: WeatherSnapshot,
        status: Status,
        error: Option<CoordinatorError>,
    ) {
        let location = snapshot.location.clone();

        let applied = self.update_if_latest(ticket, |state| {
            state.status = status;
            state.resolved_location = Some(snapshot.location.clone());
            state.pending_location = None;
            state.weather = Some(snapshot);
            state.last_error = error;
        });
        if !applied {
            return;
        }

        tracing::info!(
            generation = %ticket.generation,
            location = %location.display_name(),
            ?status,
            "Weather updated"
        );
        self.show_on_map(location.coordinates);
    }

    fn show_on_map(&self, coords: Coordinates) {
        if let Err(err) = self.map.fly_to(coords) {
            tracing::warn!(%coords, "Map fly-to failed: {err}");
        }
        if let Err(err) = self.map.set_marker(coords) {
            tracing::warn!(%coords, "Map marker update failed: {err}");
        }
    }
}
