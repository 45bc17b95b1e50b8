//! Scoped position watch.
//!
//! [`WatchGuard`] owns the [`Subscription`] of one armed episode and
//! releases it on every exit path: acknowledge, cancel, engine shutdown,
//! or plain drop.  [`PositionReceiver`] is the delivery end handed to the
//! source; it is bound to one episode id, validates raw fixes, and applies
//! the spatial filter before anything reaches the engine.

use std::sync::Weak;

use log::{debug, warn};

use crate::error::{Error, PositionError};
use crate::geo::{Coordinate, RawCoordinate, distance_meters};

use super::engine::Shared;
use super::ports::Subscription;

// ───────────────────────────────────────────────────────────────
// WatchGuard
// ───────────────────────────────────────────────────────────────

/// Releases the subscription exactly once.
///
/// Must never be dropped while the engine state lock is held: release
/// joins the worker, and the worker may be waiting for that lock.
pub struct WatchGuard {
    episode_id: u64,
    subscription: Option<Box<dyn Subscription>>,
}

impl WatchGuard {
    pub(crate) fn new(episode_id: u64, subscription: Box<dyn Subscription>) -> Self {
        Self {
            episode_id,
            subscription: Some(subscription),
        }
    }

    pub fn episode_id(&self) -> u64 {
        self.episode_id
    }

    /// Stop the watch and wait for the worker to finish.
    pub fn release(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!("watch[{}]: releasing subscription", self.episode_id);
            subscription.unsubscribe();
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

impl core::fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WatchGuard")
            .field("episode_id", &self.episode_id)
            .field("active", &self.subscription.is_some())
            .finish()
    }
}

// ───────────────────────────────────────────────────────────────
// Spatial filter
// ───────────────────────────────────────────────────────────────

/// Drops fixes closer than `min_distance_m` to the last accepted one.
#[derive(Debug, Clone)]
pub struct DistanceFilter {
    min_distance_m: f64,
    last_accepted: Option<Coordinate>,
}

impl DistanceFilter {
    pub fn new(min_distance_m: f64) -> Self {
        Self {
            min_distance_m,
            last_accepted: None,
        }
    }

    /// `true` if `p` should be delivered.  The first fix always passes.
    pub fn accept(&mut self, p: Coordinate) -> bool {
        if let Some(prev) = self.last_accepted {
            if distance_meters(prev, p) < self.min_distance_m {
                return false;
            }
        }
        self.last_accepted = Some(p);
        true
    }
}

// ───────────────────────────────────────────────────────────────
// PositionReceiver
// ───────────────────────────────────────────────────────────────

/// Delivery end of one watch, owned by the source's worker.
///
/// Holds only a weak reference to the engine, so a forgotten worker can
/// never keep an engine alive.
pub struct PositionReceiver {
    engine: Weak<Shared>,
    episode_id: u64,
    filter: DistanceFilter,
}

impl PositionReceiver {
    pub(crate) fn new(engine: Weak<Shared>, episode_id: u64, min_distance_m: f64) -> Self {
        Self {
            engine,
            episode_id,
            filter: DistanceFilter::new(min_distance_m),
        }
    }

    pub fn episode_id(&self) -> u64 {
        self.episode_id
    }

    /// Deliver one fix from the provider.
    pub fn on_sample(&mut self, raw: RawCoordinate) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        let point = match Coordinate::try_from(raw) {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    "watch[{}]: dropping malformed fix ({}, {}): {}",
                    self.episode_id, raw.latitude, raw.longitude, e
                );
                engine.report_source_error(self.episode_id, Error::InvalidCoordinate(e));
                return;
            }
        };
        if !self.filter.accept(point) {
            debug!("watch[{}]: fix within spatial filter, skipped", self.episode_id);
            return;
        }
        engine.deliver_sample(self.episode_id, point);
    }

    /// Report a provider failure.  The engine stays armed.
    pub fn on_error(&mut self, error: PositionError) {
        if let Some(engine) = self.engine.upgrade() {
            warn!("watch[{}]: position unavailable: {}", self.episode_id, error);
            engine.report_source_error(self.episode_id, Error::PositionUnavailable(error));
        }
    }
}
