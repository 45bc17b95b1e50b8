//! Wall-clock adapter.
//!
//! [`SystemClock`] implements [`Clock`] with `chrono::Utc::now()`.  Tests
//! substitute their own clock to pin timestamps.

use chrono::{DateTime, Utc};

use crate::app::ports::Clock;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
