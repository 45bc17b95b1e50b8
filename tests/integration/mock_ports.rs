//! Mock adapters for integration tests.
//!
//! Every mock keeps its record behind an `Arc<Mutex<..>>` so the test can
//! hand the adapter to the engine and still inspect what happened.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use transitnap::app::events::EngineEvent;
use transitnap::app::ports::{
    AlertSink, Clock, EventSink, PositionSource, Subscription, WatchRequest,
};
use transitnap::app::watch::PositionReceiver;
use transitnap::config::{AlertPreferences, EngineConfig};
use transitnap::error::{Error, PositionError};
use transitnap::fsm::AlarmEpisode;
use transitnap::geo::{Coordinate, EARTH_RADIUS_M, RawCoordinate};
use transitnap::{EnginePorts, GeofenceEngine};

// ── Alert call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AlertCall {
    Triggered { episode_id: u64 },
    Stopped { episode_id: u64 },
}

#[derive(Clone, Default)]
pub struct RecordingAlerts {
    pub calls: Arc<Mutex<Vec<AlertCall>>>,
}

#[allow(dead_code)]
impl RecordingAlerts {
    pub fn calls(&self) -> Vec<AlertCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn triggered_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, AlertCall::Triggered { .. }))
            .count()
    }
}

impl AlertSink for RecordingAlerts {
    fn notify_triggered(&mut self, episode: &AlarmEpisode, _preferences: &AlertPreferences) {
        self.calls.lock().unwrap().push(AlertCall::Triggered {
            episode_id: episode.id,
        });
    }

    fn notify_stopped(&mut self, episode: &AlarmEpisode) {
        self.calls.lock().unwrap().push(AlertCall::Stopped {
            episode_id: episode.id,
        });
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingEvents {
    pub events: Arc<Mutex<Vec<EngineEvent>>>,
    pub errors: Arc<Mutex<Vec<Error>>>,
}

#[allow(dead_code)]
impl RecordingEvents {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<Error> {
        self.errors.lock().unwrap().clone()
    }

    pub fn distances(&self) -> Vec<f64> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::DistanceUpdated { distance_m, .. } => Some(*distance_m),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&mut self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn source_error(&mut self, error: &Error) {
        self.errors.lock().unwrap().push(*error);
    }
}

// ── Manual clock ──────────────────────────────────────────────

#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Utc.with_ymd_and_hms(2025, 4, 17, 7, 30, 0).unwrap())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ── Manual position source ────────────────────────────────────

#[derive(Default)]
struct ManualState {
    live: Option<PositionReceiver>,
    stale: Vec<PositionReceiver>,
    requests: Vec<WatchRequest>,
    unsubscribed: usize,
    refuse: Option<PositionError>,
}

/// Source whose samples are pushed synchronously by the test.
#[derive(Clone, Default)]
pub struct ManualSource {
    state: Arc<Mutex<ManualState>>,
}

#[allow(dead_code)]
impl ManualSource {
    pub fn refuse_with(&self, error: PositionError) {
        self.state.lock().unwrap().refuse = Some(error);
    }

    /// Deliver a fix through the live receiver.  Returns `false` if no
    /// watch is running.
    pub fn push(&self, fix: RawCoordinate) -> bool {
        let receiver = self.state.lock().unwrap().live.take();
        let Some(mut receiver) = receiver else {
            return false;
        };
        // The engine may unsubscribe from inside this call, so the lock
        // must not be held while delivering.
        receiver.on_sample(fix);
        let mut state = self.state.lock().unwrap();
        let still_live = state.unsubscribed < state.requests.len() && state.live.is_none();
        if still_live {
            state.live = Some(receiver);
        } else {
            state.stale.push(receiver);
        }
        true
    }

    pub fn push_error(&self, error: PositionError) {
        let receiver = self.state.lock().unwrap().live.take();
        if let Some(mut receiver) = receiver {
            receiver.on_error(error);
            self.state.lock().unwrap().live = Some(receiver);
        }
    }

    /// Deliver through every receiver whose watch was already released,
    /// simulating a late sample racing an unsubscribe.
    pub fn push_stale(&self, fix: RawCoordinate) -> usize {
        let mut stale = std::mem::take(&mut self.state.lock().unwrap().stale);
        for r in &mut stale {
            r.on_sample(fix);
        }
        let n = stale.len();
        self.state.lock().unwrap().stale = stale;
        n
    }

    pub fn subscriptions(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn unsubscriptions(&self) -> usize {
        self.state.lock().unwrap().unsubscribed
    }

    pub fn last_request(&self) -> Option<WatchRequest> {
        self.state.lock().unwrap().requests.last().copied()
    }

    pub fn is_live(&self) -> bool {
        self.state.lock().unwrap().live.is_some()
    }
}

struct ManualSubscription {
    state: Arc<Mutex<ManualState>>,
}

impl Subscription for ManualSubscription {
    fn unsubscribe(self: Box<Self>) {
        let mut state = self.state.lock().unwrap();
        state.unsubscribed += 1;
        if let Some(r) = state.live.take() {
            state.stale.push(r);
        }
    }
}

impl PositionSource for ManualSource {
    fn subscribe(
        &self,
        request: WatchRequest,
        receiver: PositionReceiver,
    ) -> Result<Box<dyn Subscription>, PositionError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.refuse {
            return Err(e);
        }
        state.requests.push(request);
        if let Some(old) = state.live.replace(receiver) {
            state.stale.push(old);
        }
        Ok(Box::new(ManualSubscription {
            state: self.state.clone(),
        }))
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness {
    pub engine: GeofenceEngine,
    pub source: ManualSource,
    pub alerts: RecordingAlerts,
    pub events: RecordingEvents,
    pub clock: ManualClock,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let source = ManualSource::default();
        let alerts = RecordingAlerts::default();
        let events = RecordingEvents::default();
        let clock = ManualClock::new();
        let engine = GeofenceEngine::new(
            config,
            EnginePorts {
                source: Box::new(source.clone()),
                alerts: Box::new(alerts.clone()),
                events: Box::new(events.clone()),
                clock: Box::new(clock.clone()),
            },
        )
        .unwrap();
        Self {
            engine,
            source,
            alerts,
            events,
            clock,
        }
    }
}

// ── Geometry helpers ──────────────────────────────────────────

pub fn nyc() -> Coordinate {
    Coordinate::new(40.7128, -74.0060).unwrap()
}

/// A fix `meters` due north of `origin`.
pub fn north_of(origin: Coordinate, meters: f64) -> RawCoordinate {
    let dlat = (meters / EARTH_RADIUS_M).to_degrees();
    RawCoordinate::new(origin.latitude() + dlat, origin.longitude())
}
