//! Log-based sink adapters.
//!
//! Implements [`AlertSink`] and [`EventSink`] by writing to the `log`
//! facade.  The host application decides where that goes; a UI adapter
//! would implement the same traits.

use log::{info, warn};

use crate::app::events::EngineEvent;
use crate::app::ports::{AlertSink, EventSink};
use crate::config::AlertPreferences;
use crate::error::Error;
use crate::fsm::AlarmEpisode;

/// Adapter that logs every [`EngineEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            EngineEvent::DistanceUpdated {
                position,
                distance_m,
            } => {
                info!("FIX   | {} | {:.0} m to go", position, distance_m);
            }
            EngineEvent::EpisodeArchived(e) => {
                info!(
                    "ARCH  | episode {} | {} | {:?}",
                    e.id,
                    e.destination.address,
                    e.resolution
                );
            }
            EngineEvent::ConfigUpdated => {
                info!("CONF  | configuration replaced");
            }
        }
    }

    fn source_error(&mut self, error: &Error) {
        warn!("GPS   | {}", error);
    }
}

/// Adapter that stands in for the wake-up dialog.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl LogAlertSink {
    pub fn new() -> Self {
        Self
    }
}

impl AlertSink for LogAlertSink {
    fn notify_triggered(&mut self, episode: &AlarmEpisode, preferences: &AlertPreferences) {
        if !preferences.notifications {
            info!("ALERT | episode {} reached (notifications off)", episode.id);
            return;
        }
        warn!(
            "ALERT | Wake up! Approaching {} ({:.0} m) | sound={} vibration={}",
            episode.destination.address,
            episode.trigger_distance_m.unwrap_or_default(),
            if preferences.sound { "on" } else { "off" },
            if preferences.vibration { "on" } else { "off" },
        );
    }

    fn notify_stopped(&mut self, episode: &AlarmEpisode) {
        info!("ALERT | episode {} stopped", episode.id);
    }
}
