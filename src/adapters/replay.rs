//! Scripted position provider.
//!
//! Replays a fixed list of fixes and provider errors, one per poll, then
//! reports exhaustion.  Used by the simulator binary and by tests that
//! need a real watch thread with known input.

use crate::app::ports::PositionProvider;
use crate::error::PositionError;
use crate::geo::{Coordinate, RawCoordinate};

#[derive(Debug, Clone)]
pub struct ReplayProvider {
    script: Vec<Result<RawCoordinate, PositionError>>,
    cursor: usize,
}

impl ReplayProvider {
    pub fn new(script: Vec<Result<RawCoordinate, PositionError>>) -> Self {
        Self { script, cursor: 0 }
    }

    pub fn from_fixes(fixes: impl IntoIterator<Item = RawCoordinate>) -> Self {
        Self::new(fixes.into_iter().map(Ok).collect())
    }

    /// `steps + 1` evenly spaced fixes from `from` to `to` (inclusive),
    /// interpolated linearly in degrees.  Good enough for short routes.
    pub fn straight_route(from: Coordinate, to: Coordinate, steps: usize) -> Self {
        let steps = steps.max(1);
        let fixes = (0..=steps).map(|i| {
            let t = i as f64 / steps as f64;
            RawCoordinate::new(
                from.latitude() + (to.latitude() - from.latitude()) * t,
                from.longitude() + (to.longitude() - from.longitude()) * t,
            )
        });
        Self::from_fixes(fixes)
    }

    pub fn remaining(&self) -> usize {
        self.script.len() - self.cursor
    }
}

impl PositionProvider for ReplayProvider {
    fn next_fix(&mut self) -> Result<Option<RawCoordinate>, PositionError> {
        let Some(step) = self.script.get(self.cursor).copied() else {
            return Ok(None);
        };
        self.cursor += 1;
        step.map(Some)
    }
}
