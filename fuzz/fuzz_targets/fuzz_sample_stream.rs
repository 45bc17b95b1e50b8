//! Fuzz target: raw fix stream into an armed engine
//!
//! Each 17-byte chunk is one step: a tag byte and two `f64` words.  Tags
//! pick between a raw sample (any bit pattern, NaN and infinities
//! included), acknowledge, cancel, or re-select and re-arm.  The engine
//! must never panic and must keep its one-open-episode invariant.
//!
//! cargo fuzz run fuzz_sample_stream

#![no_main]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;
use transitnap::app::events::EngineEvent;
use transitnap::app::ports::{
    AlertSink, Clock, EventSink, PositionSource, Subscription, WatchRequest,
};
use transitnap::app::watch::PositionReceiver;
use transitnap::config::{AlertPreferences, EngineConfig};
use transitnap::error::{Error, PositionError};
use transitnap::fsm::AlarmEpisode;
use transitnap::geo::RawCoordinate;
use transitnap::{Coordinate, EnginePorts, GeofenceEngine};

type Slot = Arc<Mutex<Option<PositionReceiver>>>;

struct SlotSource(Slot);

struct SlotSubscription(Slot);

impl Subscription for SlotSubscription {
    fn unsubscribe(self: Box<Self>) {
        self.0.lock().unwrap().take();
    }
}

impl PositionSource for SlotSource {
    fn subscribe(
        &self,
        _request: WatchRequest,
        receiver: PositionReceiver,
    ) -> Result<Box<dyn Subscription>, PositionError> {
        *self.0.lock().unwrap() = Some(receiver);
        Ok(Box::new(SlotSubscription(self.0.clone())))
    }
}

struct Quiet;

impl AlertSink for Quiet {
    fn notify_triggered(&mut self, _: &AlarmEpisode, _: &AlertPreferences) {}
    fn notify_stopped(&mut self, _: &AlarmEpisode) {}
}

impl EventSink for Quiet {
    fn emit(&mut self, _: &EngineEvent) {}
    fn source_error(&mut self, _: &Error) {}
}

struct Epoch;

impl Clock for Epoch {
    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::default()
    }
}

fn word(bytes: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    f64::from_le_bytes(buf)
}

fuzz_target!(|data: &[u8]| {
    let slot: Slot = Arc::new(Mutex::new(None));
    let engine = GeofenceEngine::new(
        EngineConfig::default(),
        EnginePorts {
            source: Box::new(SlotSource(slot.clone())),
            alerts: Box::new(Quiet),
            events: Box::new(Quiet),
            clock: Box::new(Epoch),
        },
    )
    .unwrap();
    let dest = Coordinate::new(40.7128, -74.0060).unwrap();
    engine.select_destination(dest, "fuzz").unwrap();
    engine.arm().unwrap();

    for chunk in data.chunks_exact(17) {
        let raw = RawCoordinate::new(word(&chunk[1..9]), word(&chunk[9..17]));
        match chunk[0] % 4 {
            0 | 1 => {
                // Take the receiver out so an unsubscribe from inside the
                // delivery does not deadlock on the slot.
                let receiver = slot.lock().unwrap().take();
                if let Some(mut r) = receiver {
                    r.on_sample(raw);
                    let mut guard = slot.lock().unwrap();
                    if engine.is_watching() && guard.is_none() {
                        *guard = Some(r);
                    }
                }
            }
            2 => {
                let _ = engine.acknowledge_trigger();
            }
            _ => {
                let _ = engine.cancel();
                let _ = engine.select_point(raw.latitude, raw.longitude, None);
                let _ = engine.arm();
            }
        }

        let snap = engine.snapshot();
        assert_eq!(snap.active_episode.is_some(), snap.state.has_episode());
        if let Some(d) = snap.current_distance_m {
            assert!(d.is_finite() && d >= 0.0);
        }
    }
    assert!(engine.history().iter().all(AlarmEpisode::is_resolved));
});
