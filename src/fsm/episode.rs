//! Destination and episode records.
//!
//! An [`AlarmEpisode`] is created on `arm`, carried inside the engine state
//! while armed/triggered, and moved into the history once resolved.  After
//! [`AlarmEpisode::resolve`] it is never mutated again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, placeholder_address};

/// A point the user wants to be woken at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub point: Coordinate,
    /// Opaque label from the geocoding collaborator (or a placeholder).
    pub address: String,
}

impl Destination {
    pub fn new(point: Coordinate, address: impl Into<String>) -> Self {
        Self {
            point,
            address: address.into(),
        }
    }

    /// Destination labelled with the formatted-coordinate placeholder.
    pub fn at(point: Coordinate) -> Self {
        Self::new(point, placeholder_address(point))
    }
}

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Cancelled,
    Triggered,
}

/// One arm-to-resolution cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEpisode {
    /// Monotonic per-engine sequence number.
    pub id: u64,
    pub destination: Destination,
    pub armed_at: DateTime<Utc>,
    /// When the geofence fired, kept even if the episode is then cancelled.
    pub triggered_at: Option<DateTime<Utc>>,
    /// Distance of the sample that fired the trigger.
    pub trigger_distance_m: Option<f64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<Resolution>,
}

impl AlarmEpisode {
    pub fn new(id: u64, destination: Destination, armed_at: DateTime<Utc>) -> Self {
        Self {
            id,
            destination,
            armed_at,
            triggered_at: None,
            trigger_distance_m: None,
            resolved_at: None,
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub(crate) fn mark_triggered(&mut self, at: DateTime<Utc>, distance_m: f64) {
        self.triggered_at = Some(at);
        self.trigger_distance_m = Some(distance_m);
    }

    /// Close the episode.  `resolved_at` is never earlier than `armed_at`,
    /// even if the wall clock stepped backwards in between.
    pub fn resolve(mut self, resolution: Resolution, at: DateTime<Utc>) -> Self {
        self.resolved_at = Some(at.max(self.armed_at));
        self.resolution = Some(resolution);
        self
    }
}
