//! Port traits: the hexagonal boundary between the engine and the outside world.
//!
//! ```text
//!   PositionSource ──▶ PositionReceiver ──▶ GeofenceEngine ──▶ AlertSink
//!                                                   │
//!                                                   └────────▶ EventSink
//! ```
//!
//! Driven adapters (location providers, alert UI, log output, clocks)
//! implement these traits.  The [`GeofenceEngine`](super::engine::GeofenceEngine)
//! holds them as trait objects, so the core never touches a platform API.
//!
//! ## Threading
//!
//! - Every port is `Send`; the engine calls sinks from whichever thread
//!   produced the transition (caller or watch worker), one call at a time.
//! - Sinks are never called while the engine's state lock is held, so a
//!   sink may call back into the engine (e.g. auto-acknowledge).

use core::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::{AlertPreferences, EngineConfig};
use crate::error::{Error, PositionError};
use crate::fsm::AlarmEpisode;
use crate::geo::RawCoordinate;

use super::events::EngineEvent;
use super::watch::PositionReceiver;

// ───────────────────────────────────────────────────────────────
// Position source (driven adapter: location provider → engine)
// ───────────────────────────────────────────────────────────────

/// Cadence and accuracy hints passed to a source on subscribe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchRequest {
    pub interval: Duration,
    pub fastest_interval: Duration,
    pub min_distance_m: f64,
    pub high_accuracy: bool,
}

impl WatchRequest {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            interval: Duration::from_millis(u64::from(config.sample_interval_ms)),
            fastest_interval: Duration::from_millis(u64::from(config.fastest_interval_ms)),
            min_distance_m: config.min_distance_filter_m,
            high_accuracy: config.high_accuracy,
        }
    }
}

/// Push-style location source.
///
/// # Contract
///
/// - `subscribe` returns without blocking on the provider and without
///   calling `receiver` on the calling thread.  Samples are delivered
///   later, in production order, from the source's own worker.
/// - Provider failures go to [`PositionReceiver::on_error`]; `on_sample`
///   only ever sees fixes.
pub trait PositionSource: Send + Sync {
    fn subscribe(
        &self,
        request: WatchRequest,
        receiver: PositionReceiver,
    ) -> Result<Box<dyn Subscription>, PositionError>;
}

/// Handle for one running watch.
pub trait Subscription: Send {
    /// Stop delivery.  When this returns, the receiver is never called
    /// again (stop then join).  Called from the worker itself it only
    /// signals stop; the worker exits once the current callback returns.
    ///
    /// Stop is not an interrupt.  If the provider is blocked producing a
    /// fix, this waits for that call to return; the late fix is dropped.
    fn unsubscribe(self: Box<Self>);
}

/// Pull-style provider driven by a polling worker
/// ([`PolledPositionSource`](crate::adapters::polled::PolledPositionSource)).
pub trait PositionProvider: Send {
    /// Produce the next fix.  May block on the platform API.
    /// `Ok(None)` means the provider is exhausted and the watch ends.
    fn next_fix(&mut self) -> Result<Option<RawCoordinate>, PositionError>;
}

// ───────────────────────────────────────────────────────────────
// Alert sink (driven adapter: engine → user-facing alert)
// ───────────────────────────────────────────────────────────────

/// Receives trigger/stop notifications.  Each method is called at most
/// once per episode.
pub trait AlertSink: Send {
    /// The geofence fired.  Show the wake-up alert.
    fn notify_triggered(&mut self, episode: &AlarmEpisode, preferences: &AlertPreferences);

    /// The episode ended (acknowledged or cancelled).  Silence any alert.
    fn notify_stopped(&mut self, episode: &AlarmEpisode);
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: engine → presentation / logging)
// ───────────────────────────────────────────────────────────────

/// The engine emits structured [`EngineEvent`]s through this port.
/// Adapters decide where they go (log, UI store, test recorder).
pub trait EventSink: Send {
    fn emit(&mut self, event: &EngineEvent);

    /// Dedicated error channel for the running watch: provider failures
    /// ([`Error::PositionUnavailable`]) and malformed fixes
    /// ([`Error::InvalidCoordinate`]).  The engine stays armed.
    fn source_error(&mut self, error: &Error);
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for episode timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
