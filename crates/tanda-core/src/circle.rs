use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_MEMBERS_LIMIT, MAX_PENALTY_RATE_PERCENT, MIN_MEMBERS, PERCENT_DENOMINATOR,
};
use crate::error::CircleError;
use crate::types::{Address, Amount, CircleId, Timestamp};

// ── CircleStatus ─────────────────────────────────────────────────────────────

/// Lifecycle of a circle. Transitions are one-way:
///   Forming → Active     (the join that fills the last seat)
///   Active  → Completed  (final turn paid out; current_turn == max_members + 1)
///   Active  → Failed     (settlement finds no eligible recipient)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CircleStatus {
    Forming,
    Active,
    Completed,
    Failed,
}

impl CircleStatus {
    /// True if no further state transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CircleStatus::Completed | CircleStatus::Failed)
    }
}

// ── CircleParams ─────────────────────────────────────────────────────────────

/// Immutable circle parameters, fixed at creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CircleParams {
    /// Fixed amount each member pays into the pot per round.
    pub contribution_amount: Amount,
    /// Collateral pulled from each member at join time, forfeitable on default.
    pub collateral_requirement: Amount,
    /// Seat count; the circle activates when the last seat fills.
    pub max_members: u32,
    /// Length of each round's contribution window (seconds).
    pub contribution_period_secs: i64,
    /// Extra time after the deadline before settlement may run (seconds).
    pub grace_period_secs: i64,
    /// Penalty applied to a missed contribution, percent of contribution.
    pub penalty_rate_percent: u16,
}

impl CircleParams {
    pub fn validate(&self) -> Result<(), CircleError> {
        if self.contribution_amount == 0 || self.collateral_requirement == 0 {
            return Err(CircleError::ZeroAmount);
        }
        if self.max_members < MIN_MEMBERS {
            return Err(CircleError::TooFewMembers {
                min: MIN_MEMBERS,
                got: self.max_members,
            });
        }
        if self.max_members > MAX_MEMBERS_LIMIT {
            return Err(CircleError::TooManyMembers {
                max: MAX_MEMBERS_LIMIT,
            });
        }
        if self.penalty_rate_percent > MAX_PENALTY_RATE_PERCENT {
            return Err(CircleError::InvalidPenaltyRate {
                max: MAX_PENALTY_RATE_PERCENT,
                got: self.penalty_rate_percent,
            });
        }
        if self.contribution_period_secs <= 0 {
            return Err(CircleError::InvalidContributionPeriod);
        }
        if self.grace_period_secs < 0 {
            return Err(CircleError::InvalidGracePeriod);
        }
        Ok(())
    }

    /// What a defaulter owes the pot: the missed contribution plus the penalty.
    /// Integer arithmetic; the penalty rounds down.
    pub fn amount_owed_on_default(&self) -> Amount {
        let penalty =
            self.contribution_amount * self.penalty_rate_percent as u128 / PERCENT_DENOMINATOR;
        self.contribution_amount + penalty
    }
}

// ── Member ───────────────────────────────────────────────────────────────────

/// One participant's record. Created on join and never removed: the record
/// is retained after default for audit and for the Failed-state withdrawal
/// path.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub address: Address,
    /// Fixed at join time: the kth member to join holds turn k (1-based).
    pub turn_index: u32,
    /// Remaining forfeitable balance. Monotonically non-increasing.
    pub collateral_deposited: Amount,
    /// Reset to false at the start of every round.
    pub has_contributed_this_round: bool,
    /// One-way false → true. A defaulted member never contributes or
    /// receives a payout again.
    pub is_defaulted: bool,
    /// Contribution-history counter. Stored and exposed in queries; no
    /// update rule is active in this version.
    pub reputation_score: i64,
    pub joined_at: Timestamp,
}

impl Member {
    pub fn new(address: Address, turn_index: u32, collateral: Amount, now: Timestamp) -> Self {
        Self {
            address,
            turn_index,
            collateral_deposited: collateral,
            has_contributed_this_round: false,
            is_defaulted: false,
            reputation_score: 0,
            joined_at: now,
        }
    }
}

// ── Circle ───────────────────────────────────────────────────────────────────

/// One rotating-payout group and its full ledger state, as stored in the
/// state DB. The engine is the sole mutator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Circle {
    pub id: CircleId,
    pub creator: Address,
    pub params: CircleParams,
    pub status: CircleStatus,
    /// 1-based pointer into join order: the next payout slot to resolve.
    /// Non-decreasing; equals max_members + 1 exactly when Completed.
    pub current_turn: u32,
    /// End of the current round's contribution window. None while Forming
    /// and once the circle reaches a terminal status.
    pub round_deadline: Option<Timestamp>,
    /// Value accumulated for the current round, zeroed after distribution.
    pub pot: Amount,
    /// Insertion order == join order == turn assignment.
    pub members: Vec<Member>,
    pub created_at: Timestamp,

    // ── Audit totals ─────────────────────────────────────────────────────────
    // Conservation holds in every reachable state:
    //   collateral_held() + pot + total_distributed + total_withdrawn
    //     == total_deposited
    /// Every unit of value ever pulled into custody (collateral + contributions).
    pub total_deposited: Amount,
    /// Every unit ever paid out as a pot distribution.
    pub total_distributed: Amount,
    /// Every unit ever returned as withdrawn collateral.
    pub total_withdrawn: Amount,
}

impl Circle {
    pub fn new(id: CircleId, creator: Address, params: CircleParams, now: Timestamp) -> Self {
        Self {
            id,
            creator,
            params,
            status: CircleStatus::Forming,
            current_turn: 0,
            round_deadline: None,
            pot: 0,
            members: Vec::new(),
            created_at: now,
            total_deposited: 0,
            total_distributed: 0,
            total_withdrawn: 0,
        }
    }

    /// The ledger address holding this circle's collateral and pot.
    pub fn custody_address(&self) -> Address {
        self.id.custody_address()
    }

    pub fn member(&self, address: &Address) -> Option<&Member> {
        self.members.iter().find(|m| &m.address == address)
    }

    pub fn member_mut(&mut self, address: &Address) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| &m.address == address)
    }

    pub fn is_member(&self, address: &Address) -> bool {
        self.member(address).is_some()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() as u32 >= self.params.max_members
    }

    /// Sum of collateral still held across all members.
    pub fn collateral_held(&self) -> Amount {
        self.members.iter().map(|m| m.collateral_deposited).sum()
    }
}
