//! Fuzz target: `EngineConfig::from_json`
//!
//! Arbitrary bytes as a config document.  Parsing must never panic, and
//! anything it accepts must pass `validate` and survive a round trip.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use transitnap::config::EngineConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = EngineConfig::from_json(text) else {
        return;
    };
    assert!(config.validate().is_ok(), "accepted config must validate");

    let json = serde_json::to_string(&config).expect("config serializes");
    let again = EngineConfig::from_json(&json).expect("round trip parses");
    assert_eq!(again, config);
});
