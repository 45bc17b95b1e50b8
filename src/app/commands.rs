//! Inbound commands to the engine.
//!
//! These represent user intents forwarded by the presentation layer (map
//! tap, "set alarm" button, alert dialog) that the
//! [`GeofenceEngine`](super::engine::GeofenceEngine) interprets and acts upon.

use crate::config::EngineConfig;
use crate::geo::RawCoordinate;

/// Commands that external adapters can send into the engine.
#[derive(Debug, Clone)]
pub enum AlarmCommand {
    /// The user picked a point on the map.  `None` address means no
    /// geocoder result; the formatted-coordinate placeholder is used.
    SelectDestination {
        point: RawCoordinate,
        address: Option<String>,
    },

    /// Start watching for the selected destination.
    Arm,

    /// The user dismissed the wake-up alert.
    AcknowledgeTrigger,

    /// Stop the alarm, whatever it is doing.
    Cancel,

    /// Replace the configuration (only while no watch is running).
    UpdateConfig(EngineConfig),
}
