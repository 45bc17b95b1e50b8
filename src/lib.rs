//! Transit Nap alarm engine library.
//!
//! Turns a stream of position samples into arm / trigger / stop
//! transitions for a single destination alarm, and keeps a history of
//! finished episodes.  Location providers and alert UI are reached only
//! through the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod geo;
pub mod history;

pub use app::{EnginePorts, GeofenceEngine};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use geo::{Coordinate, distance_meters};
