//! State descriptors and the transition table.
//!
//! Both tables are plain `static` data with no closures or dynamic dispatch.
//! Adding a transition means adding one row here; the engine and the tests
//! read everything else from these tables.
//!
//! ```text
//!  From                 Operation                 To
//!  ───────────────────  ────────────────────────  ───────────────────
//!  Idle                 select destination        DestinationSelected
//!  DestinationSelected  select destination        DestinationSelected
//!  DestinationSelected  arm                       Armed
//!  DestinationSelected  cancel                    Idle
//!  Armed                sample, d >  radius       Armed
//!  Armed                sample, d <= radius       Triggered
//!  Armed                cancel                    Idle   (Cancelled)
//!  Triggered            acknowledge trigger       Idle   (Triggered)
//!  Triggered            cancel                    Idle   (Cancelled)
//! ```

use super::{Operation, StateId};

// ═══════════════════════════════════════════════════════════════════════════
//  Descriptors
// ═══════════════════════════════════════════════════════════════════════════

/// Static descriptor for a single state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    /// A position watch is held for the whole time the state is current.
    pub watching: bool,
    /// An unresolved episode exists.
    pub has_episode: bool,
}

/// Indexed by `StateId as usize`.
static DESCRIPTORS: [StateDescriptor; StateId::COUNT] = [
    // Index 0: Idle
    StateDescriptor {
        id: StateId::Idle,
        name: "Idle",
        watching: false,
        has_episode: false,
    },
    // Index 1: DestinationSelected
    StateDescriptor {
        id: StateId::DestinationSelected,
        name: "DestinationSelected",
        watching: false,
        has_episode: false,
    },
    // Index 2: Armed
    StateDescriptor {
        id: StateId::Armed,
        name: "Armed",
        watching: true,
        has_episode: true,
    },
    // Index 3: Triggered (watch kept until acknowledge/cancel releases it)
    StateDescriptor {
        id: StateId::Triggered,
        name: "Triggered",
        watching: true,
        has_episode: true,
    },
];

pub fn descriptor(id: StateId) -> &'static StateDescriptor {
    &DESCRIPTORS[id as usize]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Transitions
// ═══════════════════════════════════════════════════════════════════════════

/// One legal move.
pub struct Transition {
    pub from: StateId,
    pub operation: Operation,
    pub to: StateId,
}

const fn row(from: StateId, operation: Operation, to: StateId) -> Transition {
    Transition {
        from,
        operation,
        to,
    }
}

pub static TRANSITIONS: &[Transition] = &[
    row(StateId::Idle, Operation::SelectDestination, StateId::DestinationSelected),
    row(StateId::Idle, Operation::UpdateConfig, StateId::Idle),
    row(
        StateId::DestinationSelected,
        Operation::SelectDestination,
        StateId::DestinationSelected,
    ),
    row(StateId::DestinationSelected, Operation::Arm, StateId::Armed),
    row(StateId::DestinationSelected, Operation::Cancel, StateId::Idle),
    row(
        StateId::DestinationSelected,
        Operation::UpdateConfig,
        StateId::DestinationSelected,
    ),
    row(
        StateId::Armed,
        Operation::Sample {
            within_radius: false,
        },
        StateId::Armed,
    ),
    row(
        StateId::Armed,
        Operation::Sample {
            within_radius: true,
        },
        StateId::Triggered,
    ),
    row(StateId::Armed, Operation::Cancel, StateId::Idle),
    row(StateId::Triggered, Operation::AcknowledgeTrigger, StateId::Idle),
    row(StateId::Triggered, Operation::Cancel, StateId::Idle),
];
