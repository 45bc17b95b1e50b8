//! Outbound engine events and the read-side snapshot.
//!
//! The [`GeofenceEngine`](super::engine::GeofenceEngine) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, feed a UI store, or record
//! them in a test.

use serde::Serialize;

use crate::fsm::{AlarmEpisode, Destination, StateId};
use crate::geo::Coordinate;

/// Structured events emitted by the engine, in transition order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The state machine moved.
    StateChanged { from: StateId, to: StateId },

    /// An accepted sample was evaluated against the destination.
    DistanceUpdated { position: Coordinate, distance_m: f64 },

    /// A resolved episode was appended to the history.
    EpisodeArchived(AlarmEpisode),

    /// The configuration was replaced.
    ConfigUpdated,
}

/// Point-in-time view of the engine for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    #[serde(serialize_with = "serialize_state")]
    pub state: StateId,
    pub destination: Option<Destination>,
    pub active_episode: Option<AlarmEpisode>,
    /// Distance at the last accepted sample of the current episode.
    pub current_distance_m: Option<f64>,
    pub last_position: Option<Coordinate>,
    pub trigger_radius_m: f64,
}

impl EngineSnapshot {
    pub fn is_armed(&self) -> bool {
        self.state == StateId::Armed
    }
}

fn serialize_state<S: serde::Serializer>(state: &StateId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(state.name())
}
