//! Geofence engine, the hexagonal core.
//!
//! [`GeofenceEngine`] owns the alarm state machine, the active watch and
//! the history.  It exposes a clean, platform-agnostic API; all I/O flows
//! through the port traits handed over in [`EnginePorts`].
//!
//! ```text
//!  PositionSource ──▶ ┌────────────────────────┐ ──▶ AlertSink
//!   (watch worker)    │     GeofenceEngine     │
//!  UI commands ─────▶ │  FSM · Watch · History │ ──▶ EventSink
//!                     └────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! Three locks, always taken in the order `sinks → core → outbox`:
//!
//! - `core` serialises every transition.  Notices produced by a transition
//!   are queued into `outbox` before `core` is released, so they leave in
//!   transition order.
//! - `sinks` is held while one notice is delivered.  Whoever finds the
//!   outbox idle drains it; a sink that calls back into the engine only
//!   queues, and the outer drain delivers the rest.
//! - A [`WatchGuard`] is released (stop + join) only after `core` has been
//!   dropped, because the worker may be blocked on `core` with a sample.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::config::{AlertPreferences, EngineConfig};
use crate::error::{Error, Result};
use crate::fsm::{
    AlarmEpisode, Destination, EngineState, Operation, Resolution, StateId, next_state,
};
use crate::geo::{Coordinate, distance_meters};
use crate::history::{AlarmHistory, HistoryItem};

use super::commands::AlarmCommand;
use super::events::{EngineEvent, EngineSnapshot};
use super::ports::{AlertSink, Clock, EventSink, PositionSource, WatchRequest};
use super::watch::{PositionReceiver, WatchGuard};

// ───────────────────────────────────────────────────────────────
// Ports bundle
// ───────────────────────────────────────────────────────────────

/// Everything the engine talks to.
pub struct EnginePorts {
    pub source: Box<dyn PositionSource>,
    pub alerts: Box<dyn AlertSink>,
    pub events: Box<dyn EventSink>,
    pub clock: Box<dyn Clock>,
}

// ───────────────────────────────────────────────────────────────
// Internal state
// ───────────────────────────────────────────────────────────────

struct Core {
    state: EngineState,
    config: EngineConfig,
    history: AlarmHistory,
    current_distance_m: Option<f64>,
    last_position: Option<Coordinate>,
    next_episode_id: u64,
    watch: Option<WatchGuard>,
}

impl Core {
    /// Consult the transition table.
    fn check(&self, operation: Operation) -> Result<StateId> {
        let state = self.state.id();
        next_state(state, operation).ok_or_else(|| {
            warn!("Rejected {} in {}", operation, state);
            Error::InvalidTransition { state, operation }
        })
    }

    /// The descriptor flags of the current state must match what is held:
    /// a watch exactly in the watching states, bound to the open episode.
    fn assert_consistent(&self) {
        let id = self.state.id();
        debug_assert_eq!(self.watch.is_some(), id.is_watching(), "watch held in {}", id);
        debug_assert_eq!(self.state.episode().is_some(), id.has_episode(), "episode in {}", id);
        if let (Some(watch), Some(episode)) = (&self.watch, self.state.episode()) {
            debug_assert_eq!(watch.episode_id(), episode.id, "watch bound to another episode");
        }
    }

    /// Leave any state for Idle.  Archives the in-flight episode (if any)
    /// and hands back the watch so the caller can release it unlocked.
    fn close(
        &mut self,
        resolution: Resolution,
        now: DateTime<Utc>,
        notices: &mut Vec<Notice>,
    ) -> Option<WatchGuard> {
        let from = self.state.id();
        let watch = self.watch.take();

        match std::mem::take(&mut self.state) {
            EngineState::Armed { episode, .. } | EngineState::Triggered { episode, .. } => {
                let resolved = episode.resolve(resolution, now);
                info!(
                    "Episode {} resolved as {:?} ({})",
                    resolved.id, resolution, resolved.destination.address
                );
                self.history.append(resolved.clone());
                notices.push(Notice::Event(EngineEvent::EpisodeArchived(resolved.clone())));
                notices.push(state_changed(from, StateId::Idle));
                notices.push(Notice::Stopped(resolved));
            }
            EngineState::DestinationSelected(_) => {
                notices.push(state_changed(from, StateId::Idle));
            }
            EngineState::Idle => {}
        }

        self.current_distance_m = None;
        self.last_position = None;
        self.assert_consistent();
        watch
    }
}

/// Work queued for the sinks.
enum Notice {
    Event(EngineEvent),
    Triggered(AlarmEpisode, AlertPreferences),
    Stopped(AlarmEpisode),
    SourceError(Error),
}

fn state_changed(from: StateId, to: StateId) -> Notice {
    info!("Alarm transition: {} -> {}", from, to);
    Notice::Event(EngineEvent::StateChanged { from, to })
}

struct Sinks {
    alerts: Box<dyn AlertSink>,
    events: Box<dyn EventSink>,
}

impl Sinks {
    fn deliver(&mut self, notice: Notice) {
        match notice {
            Notice::Event(event) => self.events.emit(&event),
            Notice::Triggered(episode, preferences) => {
                self.alerts.notify_triggered(&episode, &preferences);
            }
            Notice::Stopped(episode) => self.alerts.notify_stopped(&episode),
            Notice::SourceError(error) => self.events.source_error(&error),
        }
    }
}

#[derive(Default)]
struct Outbox {
    pending: VecDeque<Notice>,
    draining: bool,
}

/// Clears `Outbox::draining` when a sink panics out of the drain loop.
/// The notice being delivered is lost; anything still queued goes out with
/// the next drain.
struct DrainGuard<'a>(&'a Mutex<Outbox>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("Sink panicked while delivering a notice, notice dropped");
            lock(self.0).draining = false;
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the engine handle and watch workers.
pub(crate) struct Shared {
    core: Mutex<Core>,
    outbox: Mutex<Outbox>,
    sinks: Mutex<Sinks>,
    source: Box<dyn PositionSource>,
    clock: Box<dyn Clock>,
}

impl Shared {
    /// Queue notices.  Call with `core` held so order follows transitions.
    fn post(&self, notices: impl IntoIterator<Item = Notice>) {
        lock(&self.outbox).pending.extend(notices);
    }

    /// Deliver queued notices unless another caller is already doing so.
    fn drain(&self) {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _unwind = DrainGuard(&self.outbox);
        loop {
            let next = {
                let mut outbox = lock(&self.outbox);
                match outbox.pending.pop_front() {
                    Some(notice) => notice,
                    None => {
                        // Cleared under the same lock as the empty check, so a
                        // concurrent post either lands here or drains itself.
                        outbox.draining = false;
                        return;
                    }
                }
            };
            lock(&self.sinks).deliver(next);
        }
    }

    /// Sample from a watch worker bound to `episode_id`.
    pub(crate) fn deliver_sample(&self, episode_id: u64, point: Coordinate) {
        self.apply_sample(Some(episode_id), point);
        self.drain();
    }

    /// Source failure from a watch worker.  The state is left alone.
    pub(crate) fn report_source_error(&self, episode_id: u64, error: Error) {
        {
            let core = lock(&self.core);
            if core.state.episode().map(|e| e.id) != Some(episode_id) {
                debug!("Source error for stale episode {} ignored", episode_id);
                return;
            }
            self.post([Notice::SourceError(error)]);
        }
        self.drain();
    }

    /// Core trigger rule.  Evaluated on every accepted sample.
    fn apply_sample(&self, expected_episode: Option<u64>, point: Coordinate) {
        let mut core = lock(&self.core);

        let (destination, episode_id) = match &core.state {
            EngineState::Armed {
                destination,
                episode,
            } => (destination.point, episode.id),
            other => {
                debug!("Sample ignored in {}", other.id());
                return;
            }
        };
        if expected_episode.is_some_and(|id| id != episode_id) {
            debug!("Stale sample for episode {:?} ignored", expected_episode);
            return;
        }

        let distance_m = distance_meters(point, destination);
        debug_assert!(distance_m.is_finite(), "distance of valid coordinates is finite");
        core.current_distance_m = Some(distance_m);
        core.last_position = Some(point);

        let mut notices = vec![Notice::Event(EngineEvent::DistanceUpdated {
            position: point,
            distance_m,
        })];

        let within_radius = distance_m <= core.config.trigger_radius_m;
        let Ok(to) = core.check(Operation::Sample { within_radius }) else {
            return;
        };
        debug!(
            "Episode {}: {:.0} m to destination (radius {:.0} m)",
            episode_id, distance_m, core.config.trigger_radius_m
        );

        if to == StateId::Triggered {
            let now = self.clock.now();
            let preferences = core.config.alerts;
            core.state = match std::mem::take(&mut core.state) {
                EngineState::Armed {
                    destination,
                    mut episode,
                } => {
                    episode.mark_triggered(now, distance_m);
                    info!(
                        "Geofence reached: episode {} at {:.0} m from {}",
                        episode.id, distance_m, destination.address
                    );
                    notices.push(state_changed(StateId::Armed, StateId::Triggered));
                    notices.push(Notice::Triggered(episode.clone(), preferences));
                    EngineState::Triggered {
                        destination,
                        episode,
                    }
                }
                other => other,
            };
        }

        core.assert_consistent();
        self.post(notices);
    }
}

// ───────────────────────────────────────────────────────────────
// GeofenceEngine
// ───────────────────────────────────────────────────────────────

/// The single authority over the alarm state.
///
/// All methods take `&self`; wrap the engine in an `Arc` to drive it from
/// several threads.  Dropping the engine shuts it down (see [`shutdown`]).
///
/// [`shutdown`]: GeofenceEngine::shutdown
pub struct GeofenceEngine {
    shared: Arc<Shared>,
}

impl GeofenceEngine {
    /// Construct an idle engine.  Fails if `config` does not validate.
    pub fn new(config: EngineConfig, ports: EnginePorts) -> Result<Self> {
        config.validate()?;
        info!(
            "Geofence engine ready: radius {:.0} m, interval {} ms, filter {:.0} m",
            config.trigger_radius_m, config.sample_interval_ms, config.min_distance_filter_m
        );
        let core = Core {
            state: EngineState::Idle,
            config,
            history: AlarmHistory::new(),
            current_distance_m: None,
            last_position: None,
            next_episode_id: 1,
            watch: None,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                outbox: Mutex::new(Outbox::default()),
                sinks: Mutex::new(Sinks {
                    alerts: ports.alerts,
                    events: ports.events,
                }),
                source: ports.source,
                clock: ports.clock,
            }),
        })
    }

    // ── Operations ────────────────────────────────────────────

    /// Choose (or replace) the pending destination.
    pub fn select_destination(&self, point: Coordinate, address: impl Into<String>) -> Result<()> {
        self.select(Destination::new(point, address))
    }

    /// Choose a destination from raw map input.  Out-of-range input is
    /// rejected with [`Error::InvalidCoordinate`] before the state machine
    /// sees it.  Without an address the coordinate placeholder is used.
    pub fn select_point(&self, latitude: f64, longitude: f64, address: Option<&str>) -> Result<()> {
        let point = Coordinate::new(latitude, longitude)?;
        let destination = match address {
            Some(a) => Destination::new(point, a),
            None => Destination::at(point),
        };
        self.select(destination)
    }

    fn select(&self, destination: Destination) -> Result<()> {
        let shared = &self.shared;
        {
            let mut core = lock(&shared.core);
            let from = core.state.id();
            let to = core.check(Operation::SelectDestination)?;
            info!(
                "Destination selected: {} ({})",
                destination.address, destination.point
            );
            core.state = EngineState::DestinationSelected(destination);
            core.assert_consistent();
            shared.post([state_changed(from, to)]);
        }
        shared.drain();
        Ok(())
    }

    /// Open an episode for the selected destination and start watching.
    ///
    /// Does not wait for a fix.  If the source refuses the subscription
    /// the state stays `DestinationSelected` and no episode is created.
    pub fn arm(&self) -> Result<()> {
        let shared = &self.shared;
        {
            let mut core = lock(&shared.core);
            let from = core.state.id();
            let to = core.check(Operation::Arm)?;
            let EngineState::DestinationSelected(destination) = core.state.clone() else {
                return Err(Error::InvalidTransition {
                    state: from,
                    operation: Operation::Arm,
                });
            };

            let episode_id = core.next_episode_id;
            let request = WatchRequest::from_config(&core.config);
            let receiver =
                PositionReceiver::new(Arc::downgrade(shared), episode_id, request.min_distance_m);
            let subscription = shared.source.subscribe(request, receiver).map_err(|e| {
                warn!("Arm failed, position source refused watch: {}", e);
                Error::PositionUnavailable(e)
            })?;

            debug_assert!(core.watch.is_none(), "no watch outside Armed/Triggered");
            core.next_episode_id += 1;
            core.watch = Some(WatchGuard::new(episode_id, subscription));
            core.current_distance_m = None;
            core.last_position = None;

            let episode = AlarmEpisode::new(episode_id, destination.clone(), shared.clock.now());
            info!(
                "Alarm armed: episode {} for {} (radius {:.0} m)",
                episode_id, destination.address, core.config.trigger_radius_m
            );
            core.state = EngineState::Armed {
                destination,
                episode,
            };
            core.assert_consistent();
            shared.post([state_changed(from, to)]);
        }
        shared.drain();
        Ok(())
    }

    /// Evaluate one position against the armed destination.  No-op unless
    /// armed.  Sources normally reach this through their
    /// [`PositionReceiver`]; it is public for adapters that push fixes
    /// directly.
    pub fn on_position_sample(&self, point: Coordinate) {
        self.shared.apply_sample(None, point);
        self.shared.drain();
    }

    /// Dismiss a fired alarm.  Archives the episode as `Triggered`.
    pub fn acknowledge_trigger(&self) -> Result<()> {
        self.resolve(Operation::AcknowledgeTrigger, Resolution::Triggered)
    }

    /// Stop from any non-idle state.  An in-flight episode is archived as
    /// `Cancelled`; a bare destination selection leaves no history entry.
    pub fn cancel(&self) -> Result<()> {
        self.resolve(Operation::Cancel, Resolution::Cancelled)
    }

    fn resolve(&self, operation: Operation, resolution: Resolution) -> Result<()> {
        let shared = &self.shared;
        let watch = {
            let mut core = lock(&shared.core);
            core.check(operation)?;
            let mut notices = Vec::new();
            let watch = core.close(resolution, shared.clock.now(), &mut notices);
            shared.post(notices);
            watch
        };
        // Stop + join outside the lock; after this no sample reaches us.
        if let Some(watch) = watch {
            watch.release();
        }
        shared.drain();
        Ok(())
    }

    /// Replace the configuration.  Only allowed while no watch runs.
    pub fn update_config(&self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        let shared = &self.shared;
        {
            let mut core = lock(&shared.core);
            core.check(Operation::UpdateConfig)?;
            info!("Configuration updated: radius {:.0} m", config.trigger_radius_m);
            core.config = config;
            shared.post([Notice::Event(EngineEvent::ConfigUpdated)]);
        }
        shared.drain();
        Ok(())
    }

    /// Process an external command.
    pub fn handle_command(&self, cmd: AlarmCommand) -> Result<()> {
        match cmd {
            AlarmCommand::SelectDestination { point, address } => {
                self.select_point(point.latitude, point.longitude, address.as_deref())
            }
            AlarmCommand::Arm => self.arm(),
            AlarmCommand::AcknowledgeTrigger => self.acknowledge_trigger(),
            AlarmCommand::Cancel => self.cancel(),
            AlarmCommand::UpdateConfig(config) => self.update_config(config),
        }
    }

    /// Release the watch and return to Idle.  Idempotent.
    pub fn shutdown(&self) {
        if self.state_id() == StateId::Idle {
            return;
        }
        info!("Geofence engine shutting down");
        if let Err(e) = self.cancel() {
            debug!("Shutdown raced with another transition: {}", e);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state_id(&self) -> StateId {
        lock(&self.shared.core).state.id()
    }

    /// Clone of the full state (destination and active episode included).
    pub fn state(&self) -> EngineState {
        lock(&self.shared.core).state.clone()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let core = lock(&self.shared.core);
        EngineSnapshot {
            state: core.state.id(),
            destination: core.state.destination().cloned(),
            active_episode: core.state.episode().cloned(),
            current_distance_m: core.current_distance_m,
            last_position: core.last_position,
            trigger_radius_m: core.config.trigger_radius_m,
        }
    }

    pub fn current_distance_m(&self) -> Option<f64> {
        lock(&self.shared.core).current_distance_m
    }

    /// Resolved episodes, oldest first.
    pub fn history(&self) -> Vec<AlarmEpisode> {
        lock(&self.shared.core).history.all().to_vec()
    }

    /// History rows for display, newest first.
    pub fn history_items(&self) -> Vec<HistoryItem> {
        lock(&self.shared.core).history.items()
    }

    pub fn config(&self) -> EngineConfig {
        lock(&self.shared.core).config.clone()
    }

    /// Whether a position watch is currently held.
    pub fn is_watching(&self) -> bool {
        lock(&self.shared.core).watch.is_some()
    }
}

impl Drop for GeofenceEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
