//! Engine driven by a real watch thread: [`PolledPositionSource`] over a
//! scripted [`ReplayProvider`] at 1 ms cadence.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use transitnap::adapters::polled::PolledPositionSource;
use transitnap::adapters::replay::ReplayProvider;
use transitnap::adapters::time::SystemClock;
use transitnap::app::ports::{AlertSink, PositionProvider, PositionSource};
use transitnap::config::{AlertPreferences, EngineConfig};
use transitnap::error::{Error, PositionError};
use transitnap::geo::RawCoordinate;
use transitnap::fsm::{AlarmEpisode, Resolution, StateId};
use transitnap::{EnginePorts, GeofenceEngine};

use super::mock_ports::{AlertCall, RecordingAlerts, RecordingEvents, north_of, nyc};

fn fast_config() -> EngineConfig {
    EngineConfig {
        sample_interval_ms: 1,
        fastest_interval_ms: 1,
        ..Default::default()
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

fn engine_with(
    source: impl PositionSource + 'static,
    alerts: impl AlertSink + 'static,
    events: &RecordingEvents,
) -> GeofenceEngine {
    GeofenceEngine::new(
        fast_config(),
        EnginePorts {
            source: Box::new(source),
            alerts: Box::new(alerts),
            events: Box::new(events.clone()),
            clock: Box::new(SystemClock::new()),
        },
    )
    .unwrap()
}

/// 5 km north of NYC to the destination itself.
fn inbound_route(steps: usize) -> ReplayProvider {
    let start = transitnap::Coordinate::try_from(north_of(nyc(), 5000.0)).unwrap();
    ReplayProvider::straight_route(start, nyc(), steps)
}

#[test]
fn worker_fixes_trigger_the_alarm() {
    let alerts = RecordingAlerts::default();
    let events = RecordingEvents::default();
    let engine = engine_with(
        PolledPositionSource::new(inbound_route(20)),
        alerts.clone(),
        &events,
    );
    engine.select_destination(nyc(), "NYC").unwrap();
    engine.arm().unwrap();

    assert!(wait_until(|| alerts.triggered_count() == 1));
    assert_eq!(engine.state_id(), StateId::Triggered);
    let d = engine.snapshot().active_episode.unwrap().trigger_distance_m.unwrap();
    assert!(d <= 500.0);

    engine.acknowledge_trigger().unwrap();
    assert_eq!(engine.state_id(), StateId::Idle);
    assert_eq!(engine.history()[0].resolution, Some(Resolution::Triggered));
    assert_eq!(alerts.triggered_count(), 1);
    assert!(!engine.is_watching());
}

/// Dismisses the alert from inside the trigger callback, on the watch
/// thread itself.
struct AckFromCallback {
    engine: Arc<OnceLock<Weak<GeofenceEngine>>>,
    inner: RecordingAlerts,
}

impl AlertSink for AckFromCallback {
    fn notify_triggered(&mut self, episode: &AlarmEpisode, preferences: &AlertPreferences) {
        self.inner.notify_triggered(episode, preferences);
        if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
            engine.acknowledge_trigger().unwrap();
        }
    }

    fn notify_stopped(&mut self, episode: &AlarmEpisode) {
        self.inner.notify_stopped(episode);
    }
}

#[test]
fn acknowledge_from_alert_callback_does_not_deadlock() {
    let slot = Arc::new(OnceLock::new());
    let alerts = RecordingAlerts::default();
    let events = RecordingEvents::default();
    let engine = Arc::new(engine_with(
        PolledPositionSource::new(inbound_route(20)),
        AckFromCallback {
            engine: slot.clone(),
            inner: alerts.clone(),
        },
        &events,
    ));
    slot.set(Arc::downgrade(&engine)).unwrap();

    engine.select_destination(nyc(), "NYC").unwrap();
    engine.arm().unwrap();

    assert!(wait_until(|| alerts.calls().len() == 2), "{:?}", alerts.calls());
    assert_eq!(
        alerts.calls(),
        vec![
            AlertCall::Triggered { episode_id: 1 },
            AlertCall::Stopped { episode_id: 1 },
        ]
    );
    assert_eq!(engine.state_id(), StateId::Idle);
    assert_eq!(engine.history().len(), 1);
    assert_eq!(engine.history()[0].resolution, Some(Resolution::Triggered));

    // The engine is usable again after a callback-driven stop.
    engine.select_destination(nyc(), "again").unwrap();
    engine.arm().unwrap();
    assert!(wait_until(|| engine.history().len() == 2));
}

#[test]
fn cancel_joins_worker_before_returning() {
    let alerts = RecordingAlerts::default();
    let events = RecordingEvents::default();
    // 500 fixes, 20 m apart, all far outside the radius.
    let far = transitnap::Coordinate::try_from(north_of(nyc(), 50_000.0)).unwrap();
    let less_far = transitnap::Coordinate::try_from(north_of(nyc(), 40_000.0)).unwrap();
    let engine = engine_with(
        PolledPositionSource::new(ReplayProvider::straight_route(far, less_far, 500)),
        alerts.clone(),
        &events,
    );
    engine.select_destination(nyc(), "NYC").unwrap();
    engine.arm().unwrap();

    assert!(wait_until(|| events.distances().len() >= 3));
    engine.cancel().unwrap();
    let seen = events.distances().len();

    thread::sleep(Duration::from_millis(20));
    assert_eq!(events.distances().len(), seen, "no fix after cancel returns");
    assert_eq!(engine.state_id(), StateId::Idle);
    assert_eq!(engine.history()[0].resolution, Some(Resolution::Cancelled));
    assert_eq!(alerts.calls(), vec![AlertCall::Stopped { episode_id: 1 }]);
}

#[test]
fn exhausted_route_leaves_engine_armed() {
    let events = RecordingEvents::default();
    let far = transitnap::Coordinate::try_from(north_of(nyc(), 9000.0)).unwrap();
    let near = transitnap::Coordinate::try_from(north_of(nyc(), 6000.0)).unwrap();
    let engine = engine_with(
        PolledPositionSource::new(ReplayProvider::straight_route(far, near, 5)),
        RecordingAlerts::default(),
        &events,
    );
    engine.select_destination(nyc(), "NYC").unwrap();
    engine.arm().unwrap();

    assert!(wait_until(|| events.distances().len() == 6));
    thread::sleep(Duration::from_millis(10));
    assert_eq!(events.distances().len(), 6);
    assert_eq!(engine.state_id(), StateId::Armed);
    assert!(engine.is_watching());

    engine.cancel().unwrap();
    assert!(!engine.is_watching());
}

#[test]
fn provider_errors_are_reported_and_watch_continues() {
    let alerts = RecordingAlerts::default();
    let events = RecordingEvents::default();
    let script = vec![
        Ok(north_of(nyc(), 3000.0)),
        Err(PositionError::Timeout),
        Err(PositionError::SignalLost),
        Ok(north_of(nyc(), 100.0)),
    ];
    let engine = engine_with(
        PolledPositionSource::new(ReplayProvider::new(script)),
        alerts.clone(),
        &events,
    );
    engine.select_destination(nyc(), "NYC").unwrap();
    engine.arm().unwrap();

    assert!(wait_until(|| alerts.triggered_count() == 1));
    assert_eq!(
        events.errors(),
        vec![
            Error::PositionUnavailable(PositionError::Timeout),
            Error::PositionUnavailable(PositionError::SignalLost),
        ]
    );
    engine.cancel().unwrap();
}

#[test]
fn each_arm_gets_a_fresh_provider() {
    let alerts = RecordingAlerts::default();
    let events = RecordingEvents::default();
    let engine = engine_with(
        PolledPositionSource::new(inbound_route(10)),
        alerts.clone(),
        &events,
    );
    for n in 1..=2 {
        engine.select_destination(nyc(), "NYC").unwrap();
        engine.arm().unwrap();
        assert!(wait_until(|| alerts.triggered_count() == n));
        engine.acknowledge_trigger().unwrap();
    }
    let ids: Vec<u64> = engine.history().iter().map(|e| e.id).collect();
    assert_eq!(ids, [1, 2]);
}

#[test]
fn dropping_engine_stops_worker() {
    let alerts = RecordingAlerts::default();
    let events = RecordingEvents::default();
    let far = transitnap::Coordinate::try_from(north_of(nyc(), 50_000.0)).unwrap();
    let less_far = transitnap::Coordinate::try_from(north_of(nyc(), 40_000.0)).unwrap();
    let engine = engine_with(
        PolledPositionSource::new(ReplayProvider::straight_route(far, less_far, 500)),
        alerts.clone(),
        &events,
    );
    engine.select_destination(nyc(), "NYC").unwrap();
    engine.arm().unwrap();
    assert!(wait_until(|| !events.distances().is_empty()));

    drop(engine);
    let seen = events.distances().len();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(events.distances().len(), seen);
    assert_eq!(alerts.calls(), vec![AlertCall::Stopped { episode_id: 1 }]);
}

/// Blocks in every `next_fix`, like a platform call waiting on the GPS.
#[derive(Clone, Default)]
struct BlockingProvider {
    in_fix: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl PositionProvider for BlockingProvider {
    fn next_fix(&mut self) -> Result<Option<RawCoordinate>, PositionError> {
        self.in_fix.store(true, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        self.in_fix.store(false, Ordering::SeqCst);
        Ok(Some(north_of(nyc(), 20_000.0)))
    }
}

#[test]
fn cancel_waits_for_blocking_fix() {
    let provider = BlockingProvider::default();
    let events = RecordingEvents::default();
    let engine = engine_with(
        PolledPositionSource::new(provider.clone()),
        RecordingAlerts::default(),
        &events,
    );
    engine.select_destination(nyc(), "NYC").unwrap();
    engine.arm().unwrap();
    assert!(wait_until(|| !events.distances().is_empty()));
    assert!(wait_until(|| provider.in_fix.load(Ordering::SeqCst)));

    engine.cancel().unwrap();
    assert!(!provider.in_fix.load(Ordering::SeqCst), "cancel returned mid-fix");
    let calls = provider.calls.load(Ordering::SeqCst);
    let seen = events.distances().len();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls);
    assert_eq!(events.distances().len(), seen);
    assert_eq!(engine.state_id(), StateId::Idle);
}
