//! Unified error types for the alarm engine.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! caller's error handling uniform.  All variants are `Copy` so they can be
//! handed to event sinks and across the watch thread without allocation.

use core::fmt;

use crate::fsm::{Operation, StateId};

// ---------------------------------------------------------------------------
// Top-level engine error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The operation is not allowed from the current state.  State is
    /// unchanged.
    InvalidTransition { state: StateId, operation: Operation },
    /// The position source could not produce a fix.
    PositionUnavailable(PositionError),
    /// A latitude/longitude pair was out of range or not finite.
    InvalidCoordinate(CoordinateError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { state, operation } => {
                write!(f, "invalid transition: {operation} not allowed in {state}")
            }
            Self::PositionUnavailable(e) => write!(f, "position unavailable: {e}"),
            Self::InvalidCoordinate(e) => write!(f, "invalid coordinate: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Position source errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionError {
    /// Location permission was denied or revoked.
    PermissionDenied,
    /// The provider is temporarily without a fix (tunnel, indoors).
    SignalLost,
    /// The provider did not answer within its own deadline.
    Timeout,
    /// The provider cannot be started (no hardware, worker spawn failed).
    SourceFailed,
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "location permission denied"),
            Self::SignalLost => write!(f, "no position fix"),
            Self::Timeout => write!(f, "position request timed out"),
            Self::SourceFailed => write!(f, "position source failed"),
        }
    }
}

impl std::error::Error for PositionError {}

impl From<PositionError> for Error {
    fn from(e: PositionError) -> Self {
        Self::PositionUnavailable(e)
    }
}

// ---------------------------------------------------------------------------
// Coordinate errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateError {
    /// Latitude outside `[-90, 90]`.
    LatitudeOutOfRange,
    /// Longitude outside `[-180, 180]`.
    LongitudeOutOfRange,
    /// NaN or infinite component.
    NotFinite,
}

impl fmt::Display for CoordinateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LatitudeOutOfRange => write!(f, "latitude out of range"),
            Self::LongitudeOutOfRange => write!(f, "longitude out of range"),
            Self::NotFinite => write!(f, "component is not finite"),
        }
    }
}

impl std::error::Error for CoordinateError {}

impl From<CoordinateError> for Error {
    fn from(e: CoordinateError) -> Self {
        Self::InvalidCoordinate(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
