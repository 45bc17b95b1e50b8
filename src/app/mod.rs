//! Application core: alarm orchestration with all I/O behind ports.
//!
//! This module contains the engine that drives the state machine from
//! position samples and user commands.  All interaction with location
//! providers, alert UI and clocks happens through the **port traits**
//! defined in [`ports`], keeping this layer fully testable without a
//! device.

pub mod commands;
pub mod engine;
pub mod events;
pub mod ports;
pub mod watch;

pub use engine::{EnginePorts, GeofenceEngine};
