//! In-memory gateways and a recording map for coordinator tests.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use skyglobe_core::{
    Coordinates, Coordinator, CurrentConditions, DailyForecast, GeocodingGateway, HourlyForecast,
    MapError, MapSurface, PlaceCandidate, WeatherAlert, WeatherGateway, WeatherPart,
};
use tokio::sync::Semaphore;

/// Holds callers until opened. Opening is permanent.
#[derive(Debug, Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn closed() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    pub fn open(&self) {
        self.0.add_permits(1024);
    }

    async fn pass(&self) {
        let _permit = self.0.acquire().await;
    }
}

pub fn place(name: &str, country: &str, lat: f64, lon: f64) -> PlaceCandidate {
    PlaceCandidate {
        name: name.to_string(),
        country: country.to_string(),
        state: None,
        coordinates: Coordinates { lat, lon },
        local_names: None,
    }
}

pub fn world() -> Vec<PlaceCandidate> {
    vec![
        place("Paris", "FR", 48.8534, 2.3488),
        place("Paris", "US", 33.6609, -95.5555),
        place("Tokyo", "JP", 35.6895, 139.6917),
        place("Lima", "PE", -12.0432, -77.0282),
        place("Oslo", "NO", 59.9127, 10.7461),
        place("Nairobi", "KE", -1.2833, 36.8167),
        place("Auckland", "NZ", -36.8485, 174.7633),
    ]
}

/// Forward search matches names case-insensitively, in gazetteer order.
/// Reverse returns places within one degree, nearest first.
#[derive(Debug)]
pub struct FakeGeocoder {
    gazetteer: Vec<PlaceCandidate>,
    gates: Mutex<HashMap<String, Gate>>,
    failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn new(gazetteer: Vec<PlaceCandidate>) -> Arc<Self> {
        Arc::new(Self {
            gazetteer,
            gates: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    /// Hold searches for `key` (a query, or `Coordinates` display text).
    pub fn gate(&self, key: &str) -> Gate {
        let gate = Gate::closed();
        self.gates.lock().insert(key.to_string(), gate.clone());
        gate
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    async fn wait(&self, key: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().get(key).cloned();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("geocoding backend returned 502 Bad Gateway"));
        }
        Ok(())
    }
}

#[async_trait]
impl GeocodingGateway for FakeGeocoder {
    async fn forward_search(&self, text: &str) -> Result<Vec<PlaceCandidate>> {
        self.wait(text).await?;

        Ok(self
            .gazetteer
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(text))
            .cloned()
            .collect())
    }

    async fn reverse(&self, coords: Coordinates) -> Result<Vec<PlaceCandidate>> {
        self.wait(&coords.to_string()).await?;

        let distance = |p: &PlaceCandidate| {
            let dlat = p.coordinates.lat - coords.lat;
            let dlon = p.coordinates.lon - coords.lon;
            dlat * dlat + dlon * dlon
        };

        let mut near: Vec<PlaceCandidate> = self
            .gazetteer
            .iter()
            .filter(|p| p.coordinates.is_within(&coords, 1.0))
            .cloned()
            .collect();
        near.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
        Ok(near)
    }
}

/// Weather derived from the coordinates: the current temperature equals the
/// latitude, so tests can tell whose weather was applied.
#[derive(Debug)]
pub struct FakeWeather {
    failing: Mutex<HashSet<WeatherPart>>,
    gates: Mutex<HashMap<String, Gate>>,
    part_gates: Mutex<HashMap<WeatherPart, Gate>>,
    alerts: Mutex<Vec<WeatherAlert>>,
    pub current_calls: AtomicUsize,
}

impl FakeWeather {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failing: Mutex::new(HashSet::new()),
            gates: Mutex::new(HashMap::new()),
            part_gates: Mutex::new(HashMap::new()),
            alerts: Mutex::new(Vec::new()),
            current_calls: AtomicUsize::new(0),
        })
    }

    pub fn fail(&self, part: WeatherPart) {
        self.failing.lock().insert(part);
    }

    pub fn recover(&self, part: WeatherPart) {
        self.failing.lock().remove(&part);
    }

    /// Hold every sub-fetch for `coords`.
    pub fn gate(&self, coords: Coordinates) -> Gate {
        let gate = Gate::closed();
        self.gates.lock().insert(coords.to_string(), gate.clone());
        gate
    }

    /// Hold one sub-fetch, for every location.
    pub fn gate_part(&self, part: WeatherPart) -> Gate {
        let gate = Gate::closed();
        self.part_gates.lock().insert(part, gate.clone());
        gate
    }

    pub fn issue_alert(&self, event: &str) {
        self.alerts.lock().push(WeatherAlert {
            sender_name: "Met Office".into(),
            event: event.into(),
            start: 1_700_000_000,
            end: 1_700_050_000,
            description: String::new(),
        });
    }

    async fn settle(&self, part: WeatherPart, coords: Coordinates) -> Result<()> {
        let part_gate = self.part_gates.lock().get(&part).cloned();
        if let Some(gate) = part_gate {
            gate.pass().await;
        }

        let gate = self.gates.lock().get(&coords.to_string()).cloned();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        if self.failing.lock().contains(&part) {
            return Err(anyhow!("{part} endpoint returned 503 Service Unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl WeatherGateway for FakeWeather {
    async fn get_current(&self, coords: Coordinates) -> Result<CurrentConditions> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        self.settle(WeatherPart::Current, coords).await?;

        Ok(CurrentConditions {
            dt: 1_700_000_000,
            temperature: coords.lat,
            feels_like: coords.lat - 1.0,
            humidity: 60,
            pressure: 1013,
            wind_speed: 4.0,
            wind_deg: 180,
            visibility: Some(10_000),
            description: "scattered clouds".into(),
            icon: "03d".into(),
            sunrise: None,
            sunset: None,
        })
    }

    async fn get_hourly(&self, coords: Coordinates) -> Result<Vec<HourlyForecast>> {
        self.settle(WeatherPart::Hourly, coords).await?;

        Ok((0..3)
            .map(|h| HourlyForecast {
                dt: 1_700_000_000 + h * 3_600,
                temperature: coords.lat + h as f64,
                description: "clear sky".into(),
                icon: "01d".into(),
                pop: 0.0,
            })
            .collect())
    }

    async fn get_daily(&self, coords: Coordinates) -> Result<Vec<DailyForecast>> {
        self.settle(WeatherPart::Daily, coords).await?;

        Ok((0..2)
            .map(|d| DailyForecast {
                dt: 1_700_000_000 + d * 86_400,
                temp_min: coords.lat - 5.0,
                temp_max: coords.lat + 5.0,
                description: "light rain".into(),
                icon: "10d".into(),
                pop: 0.6,
            })
            .collect())
    }

    async fn get_alerts(&self, coords: Coordinates) -> Vec<WeatherAlert> {
        // same contract as the HTTP gateway: failure reads as "no alerts"
        if self.settle(WeatherPart::Alerts, coords).await.is_err() {
            return Vec::new();
        }
        self.alerts.lock().clone()
    }
}

#[derive(Debug, Default)]
pub struct RecordingMap {
    pub flights: Mutex<Vec<Coordinates>>,
    pub markers: Mutex<Vec<Coordinates>>,
    broken: AtomicBool,
}

impl RecordingMap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn break_rendering(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn flights(&self) -> Vec<Coordinates> {
        self.flights.lock().clone()
    }

    fn check(&self) -> Result<(), MapError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(MapError::Rejected("WebGL context lost".into()));
        }
        Ok(())
    }
}

impl MapSurface for RecordingMap {
    fn fly_to(&self, coords: Coordinates) -> Result<(), MapError> {
        self.check()?;
        self.flights.lock().push(coords);
        Ok(())
    }

    fn set_marker(&self, coords: Coordinates) -> Result<(), MapError> {
        self.check()?;
        self.markers.lock().push(coords);
        Ok(())
    }

    fn resize(&self) -> Result<(), MapError> {
        self.check()
    }

    fn dispose(&self) {}
}

pub struct Harness {
    pub coordinator: Coordinator,
    pub geocoder: Arc<FakeGeocoder>,
    pub weather: Arc<FakeWeather>,
    pub map: Arc<RecordingMap>,
}

pub fn harness() -> Harness {
    let geocoder = FakeGeocoder::new(world());
    let weather = FakeWeather::new();
    let map = RecordingMap::new();
    let coordinator = Coordinator::new(geocoder.clone(), weather.clone(), map.clone());

    Harness {
        coordinator,
        geocoder,
        weather,
        map,
    }
}
