//! A sink that panics must not silence the alerts of later episodes.

use std::panic::{self, AssertUnwindSafe};

use transitnap::app::ports::AlertSink;
use transitnap::config::{AlertPreferences, EngineConfig};
use transitnap::fsm::{AlarmEpisode, StateId};
use transitnap::{EnginePorts, GeofenceEngine};

use super::mock_ports::{
    AlertCall, ManualClock, ManualSource, RecordingAlerts, RecordingEvents, north_of, nyc,
};

/// Records every call, then panics on the first trigger only.
struct CrashOnFirstTrigger {
    inner: RecordingAlerts,
    crashed: bool,
}

impl AlertSink for CrashOnFirstTrigger {
    fn notify_triggered(&mut self, episode: &AlarmEpisode, preferences: &AlertPreferences) {
        self.inner.notify_triggered(episode, preferences);
        if !self.crashed {
            self.crashed = true;
            panic!("alert backend crashed");
        }
    }

    fn notify_stopped(&mut self, episode: &AlarmEpisode) {
        self.inner.notify_stopped(episode);
    }
}

#[test]
fn alerts_resume_after_sink_panic() {
    let source = ManualSource::default();
    let alerts = RecordingAlerts::default();
    let engine = GeofenceEngine::new(
        EngineConfig::default(),
        EnginePorts {
            source: Box::new(source.clone()),
            alerts: Box::new(CrashOnFirstTrigger {
                inner: alerts.clone(),
                crashed: false,
            }),
            events: Box::new(RecordingEvents::default()),
            clock: Box::new(ManualClock::new()),
        },
    )
    .unwrap();

    engine.select_destination(nyc(), "NYC").unwrap();
    engine.arm().unwrap();
    let crashed = panic::catch_unwind(AssertUnwindSafe(|| {
        source.push(north_of(nyc(), 50.0));
    }));
    assert!(crashed.is_err());
    assert_eq!(engine.state_id(), StateId::Triggered);

    engine.acknowledge_trigger().unwrap();
    engine.select_destination(nyc(), "NYC").unwrap();
    engine.arm().unwrap();
    assert!(source.push(north_of(nyc(), 50.0)));

    assert_eq!(engine.state_id(), StateId::Triggered);
    assert_eq!(
        alerts.calls(),
        vec![
            AlertCall::Triggered { episode_id: 1 },
            AlertCall::Stopped { episode_id: 1 },
            AlertCall::Triggered { episode_id: 2 },
        ]
    );
}
