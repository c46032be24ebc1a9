use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, CircleId, Timestamp};

// ── CircleEvent ──────────────────────────────────────────────────────────────

/// Signals emitted by the engine, one commit at a time, for observers and
/// indexers. Persisted per circle under a monotonic sequence number in the
/// same atomic commit as the state change they describe.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum CircleEvent {
    /// A member was admitted and their collateral taken into custody.
    MemberJoined { address: Address, collateral: Amount },

    /// The last seat filled; the circle is live and round 1 is open.
    CircleActivated,

    /// A member paid their contribution for the round collecting toward
    /// turn `turn`.
    ContributionMade {
        address: Address,
        turn: u32,
        amount: Amount,
    },

    /// A member missed the round and forfeited collateral. Emitted at most
    /// once per member, ever.
    MemberDefaulted { address: Address },

    /// The pot was paid out. `turn_index` is the recipient's own fixed turn,
    /// so turns skipped over defaulted members are never re-announced.
    PotDistributed {
        recipient: Address,
        turn_index: u32,
        amount: Amount,
    },

    /// A member recovered their remaining collateral after the circle ended.
    CollateralWithdrawn { address: Address, amount: Amount },

    /// Every turn has been paid; the circle is done.
    CircleCompleted,

    /// No eligible recipient remained; the circle is dead and collateral
    /// withdrawal is open to all members.
    CircleFailed,
}

impl CircleEvent {
    /// Short tag for logs and RPC payloads.
    pub fn tag(&self) -> &'static str {
        match self {
            CircleEvent::MemberJoined { .. } => "MemberJoined",
            CircleEvent::CircleActivated => "CircleActivated",
            CircleEvent::ContributionMade { .. } => "ContributionMade",
            CircleEvent::MemberDefaulted { .. } => "MemberDefaulted",
            CircleEvent::PotDistributed { .. } => "PotDistributed",
            CircleEvent::CollateralWithdrawn { .. } => "CollateralWithdrawn",
            CircleEvent::CircleCompleted => "CircleCompleted",
            CircleEvent::CircleFailed => "CircleFailed",
        }
    }
}

// ── EventRecord ──────────────────────────────────────────────────────────────

/// An event as persisted: circle-scoped sequence number plus emission time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub circle_id: CircleId,
    /// Starts at 0 for each circle and increases by 1 per event.
    pub seq: u64,
    pub emitted_at: Timestamp,
    pub event: CircleEvent,
}
