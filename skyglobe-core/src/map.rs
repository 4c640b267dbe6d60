//! Map surface contract and a headless globe.
//!
//! The coordinator only ever commands the map (fly, mark) and listens to the
//! clicks it emits on an injected [`MapEventSink`]. Camera, marker and the
//! idle rotation belong to the surface.

use std::{fmt::Debug, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{error::MapError, model::Coordinates};

pub const DEFAULT_CENTER: Coordinates = Coordinates { lat: 48.8566, lon: 2.3522 };
pub const DEFAULT_ZOOM: f64 = 2.0;
pub const FLY_TO_ZOOM: f64 = 8.0;
pub const ROTATION_STEP_DEG: f64 = 0.1;
pub const IDLE_ROTATION_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapEvent {
    Clicked(Coordinates),
}

pub type MapEventSink = mpsc::UnboundedSender<MapEvent>;
pub type MapEventStream = mpsc::UnboundedReceiver<MapEvent>;

pub fn event_channel() -> (MapEventSink, MapEventStream) {
    mpsc::unbounded_channel()
}

/// Commands the coordinator may send to a map.
pub trait MapSurface: Send + Sync + Debug {
    fn fly_to(&self, coords: Coordinates) -> Result<(), MapError>;

    /// Place the single marker, replacing any previous one.
    fn set_marker(&self, coords: Coordinates) -> Result<(), MapError>;

    fn resize(&self) -> Result<(), MapError>;

    fn dispose(&self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub center: Coordinates,
    pub zoom: f64,
}

#[derive(Debug)]
struct GlobeState {
    camera: Camera,
    marker: Option<Coordinates>,
    rotating: bool,
    disposed: bool,
}

/// A globe without a renderer: tracks camera and marker, spins while idle,
/// and forwards clicks to its event sink.
#[derive(Debug)]
pub struct HeadlessGlobe {
    state: Mutex<GlobeState>,
    events: MapEventSink,
}

impl HeadlessGlobe {
    pub fn new(events: MapEventSink) -> Self {
        Self {
            state: Mutex::new(GlobeState {
                camera: Camera {
                    center: DEFAULT_CENTER,
                    zoom: DEFAULT_ZOOM,
                },
                marker: None,
                rotating: true,
                disposed: false,
            }),
            events,
        }
    }

    pub fn camera(&self) -> Camera {
        self.state.lock().camera
    }

    pub fn marker(&self) -> Option<Coordinates> {
        self.state.lock().marker
    }

    pub fn is_rotating(&self) -> bool {
        self.state.lock().rotating
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Any pointer or touch interaction stops the idle rotation for good.
    pub fn interact(&self) {
        self.state.lock().rotating = false;
    }

    /// Simulate a click at raw (possibly unwrapped) coordinates.
    pub fn click(&self, lat: f64, lon: f64) -> Result<Coordinates, MapError> {
        let coords = Coordinates::wrapped(lat, lon).map_err(|e| MapError::Rejected(e.to_string()))?;

        {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(MapError::Disposed);
            }
            state.rotating = false;
        }

        if self.events.send(MapEvent::Clicked(coords)).is_err() {
            tracing::debug!(%coords, "Map click dropped; nobody is listening");
        }

        Ok(coords)
    }

    /// Advance the idle rotation by one step. Returns false once rotation
    /// has stopped, which also ends [`spawn_idle_rotation`](Self::spawn_idle_rotation).
    pub fn rotate_step(&self) -> bool {
        let mut state = self.state.lock();
        if !state.rotating || state.disposed {
            return false;
        }

        let mut lon = state.camera.center.lon + ROTATION_STEP_DEG;
        if lon > Coordinates::MAX_LON {
            lon = -Coordinates::MAX_LON;
        }
        state.camera.center.lon = lon;
        true
    }

    pub fn spawn_idle_rotation(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let globe = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if !globe.rotate_step() {
                    tracing::debug!("Idle rotation stopped");
                    break;
                }
            }
        })
    }

    fn command<F>(&self, apply: F) -> Result<(), MapError>
    where
        F: FnOnce(&mut GlobeState),
    {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(MapError::Disposed);
        }
        apply(&mut state);
        Ok(())
    }
}

impl MapSurface for HeadlessGlobe {
    fn fly_to(&self, coords: Coordinates) -> Result<(), MapError> {
        self.command(|state| {
            state.camera = Camera {
                center: coords,
                zoom: FLY_TO_ZOOM,
            };
        })
    }

    fn set_marker(&self, coords: Coordinates) -> Result<(), MapError> {
        self.command(|state| state.marker = Some(coords))
    }

    fn resize(&self) -> Result<(), MapError> {
        // nothing to lay out without a renderer
        self.command(|_| {})
    }

    fn dispose(&self) {
        let mut state = self.state.lock();
        state.marker = None;
        state.rotating = false;
        state.disposed = true;
    }
}
