//! Alarm state machine.
//!
//! ```text
//!            select                arm               d <= radius
//!   IDLE ─────────▶ SELECTED ─────────────▶ ARMED ─────────────▶ TRIGGERED
//!    ▲               │  ▲ │ select               │                  │
//!    │               │  └─┘ (overwrite)          │                  │
//!    │    cancel     │                  cancel   │  acknowledge /   │
//!    └───────────────┴───────────────────────────┴──── cancel ──────┘
//! ```
//!
//! The legal moves live in a static table ([`states::TRANSITIONS`]); the
//! engine asks [`next_state`] before touching anything, so a rejected
//! operation can never leave a half-applied state behind.  [`EngineState`]
//! carries the data that only exists in some states (destination, active
//! episode), which makes "armed without a destination" unrepresentable.

pub mod episode;
pub mod states;

use core::fmt;

pub use episode::{AlarmEpisode, Destination, Resolution};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Field-less discriminant of [`EngineState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    DestinationSelected = 1,
    Armed = 2,
    Triggered = 3,
}

impl StateId {
    /// Total number of states, used to size the descriptor table.
    pub const COUNT: usize = 4;

    pub const ALL: [StateId; StateId::COUNT] = [
        StateId::Idle,
        StateId::DestinationSelected,
        StateId::Armed,
        StateId::Triggered,
    ];

    pub fn name(self) -> &'static str {
        states::descriptor(self).name
    }

    /// Whether a position watch must be running in this state.
    pub fn is_watching(self) -> bool {
        states::descriptor(self).watching
    }

    /// Whether an unresolved episode exists in this state.
    pub fn has_episode(self) -> bool {
        states::descriptor(self).has_episode
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Inputs the state machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SelectDestination,
    Arm,
    /// An accepted position sample.  The guard is the radius check.
    Sample { within_radius: bool },
    AcknowledgeTrigger,
    Cancel,
    UpdateConfig,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectDestination => write!(f, "select destination"),
            Self::Arm => write!(f, "arm"),
            Self::Sample { .. } => write!(f, "position sample"),
            Self::AcknowledgeTrigger => write!(f, "acknowledge trigger"),
            Self::Cancel => write!(f, "cancel"),
            Self::UpdateConfig => write!(f, "update config"),
        }
    }
}

/// Look up the target state for `op` in `from`.  `None` = not allowed.
pub fn next_state(from: StateId, op: Operation) -> Option<StateId> {
    states::TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.operation == op)
        .map(|t| t.to)
}

// ---------------------------------------------------------------------------
// Engine state
// ---------------------------------------------------------------------------

/// The one authoritative alarm state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    DestinationSelected(Destination),
    Armed {
        destination: Destination,
        episode: AlarmEpisode,
    },
    Triggered {
        destination: Destination,
        episode: AlarmEpisode,
    },
}

impl EngineState {
    pub fn id(&self) -> StateId {
        match self {
            Self::Idle => StateId::Idle,
            Self::DestinationSelected(_) => StateId::DestinationSelected,
            Self::Armed { .. } => StateId::Armed,
            Self::Triggered { .. } => StateId::Triggered,
        }
    }

    pub fn destination(&self) -> Option<&Destination> {
        match self {
            Self::Idle => None,
            Self::DestinationSelected(d)
            | Self::Armed { destination: d, .. }
            | Self::Triggered { destination: d, .. } => Some(d),
        }
    }

    /// The unresolved episode, if one is in flight.
    pub fn episode(&self) -> Option<&AlarmEpisode> {
        match self {
            Self::Armed { episode, .. } | Self::Triggered { episode, .. } => Some(episode),
            _ => None,
        }
    }
}
