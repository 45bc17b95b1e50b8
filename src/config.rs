//! Engine configuration parameters
//!
//! All tunable parameters for the geofence engine.  Loaded from JSON by the
//! embedding application; recognised keys only, unknown keys are ignored and
//! missing keys take their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // --- Watch cadence ---
    /// Requested interval between position samples (milliseconds)
    pub sample_interval_ms: u32,
    /// Fastest rate the source may deliver at (milliseconds, cadence hint)
    pub fastest_interval_ms: u32,
    /// Ask the provider for its high-accuracy mode
    pub high_accuracy: bool,

    // --- Geofence ---
    /// Drop samples closer than this to the previous accepted sample (metres, 0 = off)
    pub min_distance_filter_m: f64,
    /// Trigger when the distance to the destination is at or below this (metres)
    pub trigger_radius_m: f64,

    // --- Alert ---
    /// User-facing alert toggles handed to the alert sink
    pub alerts: AlertPreferences,
}

/// How the alert sink should present a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPreferences {
    pub notifications: bool,
    pub sound: bool,
    pub vibration: bool,
}

impl Default for AlertPreferences {
    fn default() -> Self {
        Self {
            notifications: true,
            sound: true,
            vibration: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Cadence
            sample_interval_ms: 5000,
            fastest_interval_ms: 2000,
            high_accuracy: true,

            // Geofence
            min_distance_filter_m: 10.0,
            trigger_radius_m: 500.0,

            alerts: AlertPreferences::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document.  Unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            return Err(Error::Config("sample_interval_ms must be > 0"));
        }
        if self.fastest_interval_ms == 0 {
            return Err(Error::Config("fastest_interval_ms must be > 0"));
        }
        if self.fastest_interval_ms > self.sample_interval_ms {
            return Err(Error::Config(
                "fastest_interval_ms must not exceed sample_interval_ms",
            ));
        }
        if !self.trigger_radius_m.is_finite() || self.trigger_radius_m <= 0.0 {
            return Err(Error::Config("trigger_radius_m must be a positive number"));
        }
        if !self.min_distance_filter_m.is_finite() || self.min_distance_filter_m < 0.0 {
            return Err(Error::Config("min_distance_filter_m must be >= 0"));
        }
        Ok(())
    }
}
