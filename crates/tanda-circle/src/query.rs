use serde::{Deserialize, Serialize};

use tanda_core::circle::{Circle, CircleStatus};
use tanda_core::constants::MAX_EVENT_PAGE;
use tanda_core::error::CircleError;
use tanda_core::event::EventRecord;
use tanda_core::types::{Address, Amount, CircleId, Timestamp};
use tanda_state::StateDb;

use crate::rounds::{round_phase, RoundPhase};

// ── Boundary views ───────────────────────────────────────────────────────────

/// Circle summary as exposed at the query boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CircleInfo {
    pub id: CircleId,
    pub creator: Address,
    pub status: CircleStatus,
    pub current_turn: u32,
    pub round_deadline: Option<Timestamp>,
    pub pot: Amount,
    pub member_count: u32,
    pub max_members: u32,
    pub contribution_amount: Amount,
    pub collateral_requirement: Amount,
    pub contribution_period_secs: i64,
    pub grace_period_secs: i64,
    pub penalty_rate_percent: u16,
}

impl CircleInfo {
    fn from_circle(c: &Circle) -> Self {
        Self {
            id: c.id.clone(),
            creator: c.creator.clone(),
            status: c.status,
            current_turn: c.current_turn,
            round_deadline: c.round_deadline,
            pot: c.pot,
            member_count: c.members.len() as u32,
            max_members: c.params.max_members,
            contribution_amount: c.params.contribution_amount,
            collateral_requirement: c.params.collateral_requirement,
            contribution_period_secs: c.params.contribution_period_secs,
            grace_period_secs: c.params.grace_period_secs,
            penalty_rate_percent: c.params.penalty_rate_percent,
        }
    }
}

/// Per-member detail as exposed at the query boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberInfo {
    pub address: Address,
    pub turn_index: u32,
    pub collateral_deposited: Amount,
    pub has_contributed_this_round: bool,
    pub is_defaulted: bool,
    pub reputation_score: i64,
    pub joined_at: Timestamp,
}

// ── CircleQuery ──────────────────────────────────────────────────────────────

/// Read-only query helpers over the state DB. No side effects; the only
/// failures are malformed input, unknown circles, and storage faults.
pub struct CircleQuery<'a> {
    db: &'a StateDb,
}

impl<'a> CircleQuery<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    /// Fetch the raw circle aggregate by id.
    pub fn get(&self, id: &CircleId) -> Result<Option<Circle>, CircleError> {
        self.db.get_circle(id)
    }

    fn load(&self, id: &CircleId) -> Result<Circle, CircleError> {
        self.db
            .get_circle(id)?
            .ok_or_else(|| CircleError::CircleNotFound(id.to_hex()))
    }

    /// Circle summary: status, counters, pot, and the fixed parameters.
    pub fn circle_info(&self, id: &CircleId) -> Result<CircleInfo, CircleError> {
        Ok(CircleInfo::from_circle(&self.load(id)?))
    }

    /// Detail for one member, or None if the address never joined.
    pub fn member_info(
        &self,
        id: &CircleId,
        address: &Address,
    ) -> Result<Option<MemberInfo>, CircleError> {
        let circle = self.load(id)?;
        Ok(circle.member(address).map(|m| MemberInfo {
            address: m.address.clone(),
            turn_index: m.turn_index,
            collateral_deposited: m.collateral_deposited,
            has_contributed_this_round: m.has_contributed_this_round,
            is_defaulted: m.is_defaulted,
            reputation_score: m.reputation_score,
            joined_at: m.joined_at,
        }))
    }

    /// Member addresses ordered by join rank (== turn order).
    pub fn member_addresses(&self, id: &CircleId) -> Result<Vec<Address>, CircleError> {
        let circle = self.load(id)?;
        Ok(circle.members.iter().map(|m| m.address.clone()).collect())
    }

    /// The circle's immutable grace period, in seconds.
    pub fn grace_period_secs(&self, id: &CircleId) -> Result<i64, CircleError> {
        Ok(self.load(id)?.params.grace_period_secs)
    }

    /// Event history page, ordered by sequence number. `limit` is clamped.
    pub fn events(
        &self,
        id: &CircleId,
        from_seq: u64,
        limit: u32,
    ) -> Result<Vec<EventRecord>, CircleError> {
        if !self.db.circle_exists(id) {
            return Err(CircleError::CircleNotFound(id.to_hex()));
        }
        self.db
            .events_for_circle(id, from_seq, limit.min(MAX_EVENT_PAGE))
    }

    /// Ids of every circle in the database.
    pub fn list(&self) -> Result<Vec<CircleId>, CircleError> {
        self.db.list_circle_ids()
    }

    /// Human-readable one-line summary of a circle's state.
    pub fn describe(&self, id: &CircleId, now: Timestamp) -> Result<String, CircleError> {
        let c = self.load(id)?;

        let status_str = match c.status {
            CircleStatus::Forming => format!(
                "Forming — {}/{} seats filled",
                c.members.len(),
                c.params.max_members
            ),
            CircleStatus::Active => match round_phase(&c, now) {
                RoundPhase::Collecting { deadline } => format!(
                    "Active — turn {} collecting, window closes in {} s",
                    c.current_turn,
                    deadline - now
                ),
                RoundPhase::Grace { settle_after } => format!(
                    "Active — turn {} in grace, settlement opens after {}",
                    c.current_turn, settle_after
                ),
                RoundPhase::Settleable { .. } => {
                    format!("Active — turn {} ready to settle", c.current_turn)
                }
                RoundPhase::Idle => format!("Active — turn {}", c.current_turn),
            },
            CircleStatus::Completed => "Completed — collateral withdrawal open".to_string(),
            CircleStatus::Failed => {
                "Failed — collateral withdrawal open to all members".to_string()
            }
        };

        Ok(format!(
            "Circle {} | {} members | pot {} | {}",
            &id.to_hex()[..16],
            c.members.len(),
            c.pot,
            status_str
        ))
    }
}
