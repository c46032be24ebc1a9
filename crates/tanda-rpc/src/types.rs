use serde::{Deserialize, Serialize};

use tanda_circle::{CircleInfo, MemberInfo};
use tanda_core::circle::CircleParams;
use tanda_core::event::{CircleEvent, EventRecord};

// ── RpcCircleParams ──────────────────────────────────────────────────────────

/// Circle parameters as submitted by the client. Amounts are decimal
/// strings; everything else is a plain JSON number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCircleParams {
    pub contribution_amount: String,
    pub collateral_requirement: String,
    pub max_members: u32,
    pub contribution_period_secs: i64,
    pub grace_period_secs: i64,
    pub penalty_rate_percent: u16,
}

impl RpcCircleParams {
    /// Parse into domain parameters. Range validation happens in the engine;
    /// this only rejects malformed numbers.
    pub fn to_params(&self) -> Result<CircleParams, String> {
        Ok(CircleParams {
            contribution_amount: parse_amount(&self.contribution_amount)?,
            collateral_requirement: parse_amount(&self.collateral_requirement)?,
            max_members: self.max_members,
            contribution_period_secs: self.contribution_period_secs,
            grace_period_secs: self.grace_period_secs,
            penalty_rate_percent: self.penalty_rate_percent,
        })
    }
}

/// Parse a decimal-string token amount.
pub fn parse_amount(s: &str) -> Result<u128, String> {
    s.parse::<u128>()
        .map_err(|e| format!("invalid amount {s:?}: {e}"))
}

// ── RpcCircleInfo ────────────────────────────────────────────────────────────

/// JSON-serializable circle summary returned by `tanda_getCircleInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCircleInfo {
    pub circle_id: String,
    pub creator: String,
    pub status: String,
    pub current_turn: u32,
    pub round_deadline: Option<i64>,
    /// Current pot (u128 as string).
    pub pot: String,
    pub member_count: u32,
    pub max_members: u32,
    pub contribution_amount: String,
    pub collateral_requirement: String,
    pub contribution_period_secs: i64,
    pub grace_period_secs: i64,
    pub penalty_rate_percent: u16,
}

impl From<CircleInfo> for RpcCircleInfo {
    fn from(info: CircleInfo) -> Self {
        Self {
            circle_id: info.id.to_hex(),
            creator: info.creator.to_b58(),
            status: format!("{:?}", info.status),
            current_turn: info.current_turn,
            round_deadline: info.round_deadline,
            pot: info.pot.to_string(),
            member_count: info.member_count,
            max_members: info.max_members,
            contribution_amount: info.contribution_amount.to_string(),
            collateral_requirement: info.collateral_requirement.to_string(),
            contribution_period_secs: info.contribution_period_secs,
            grace_period_secs: info.grace_period_secs,
            penalty_rate_percent: info.penalty_rate_percent,
        }
    }
}

// ── RpcMemberInfo ────────────────────────────────────────────────────────────

/// JSON-serializable member detail returned by `tanda_getMemberInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMemberInfo {
    pub address: String,
    pub turn_index: u32,
    /// Remaining collateral (u128 as string).
    pub collateral_deposited: String,
    pub has_contributed_this_round: bool,
    pub is_defaulted: bool,
    pub reputation_score: i64,
    pub joined_at: i64,
}

impl From<MemberInfo> for RpcMemberInfo {
    fn from(m: MemberInfo) -> Self {
        Self {
            address: m.address.to_b58(),
            turn_index: m.turn_index,
            collateral_deposited: m.collateral_deposited.to_string(),
            has_contributed_this_round: m.has_contributed_this_round,
            is_defaulted: m.is_defaulted,
            reputation_score: m.reputation_score,
            joined_at: m.joined_at,
        }
    }
}

// ── RpcEvent ─────────────────────────────────────────────────────────────────

/// Flattened event record returned by `tanda_getEvents`. Fields not carried
/// by a given event kind are null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEvent {
    pub seq: u64,
    pub emitted_at: i64,
    pub kind: String,
    pub address: Option<String>,
    pub turn: Option<u32>,
    /// Amount (u128 as string) for value-bearing events.
    pub amount: Option<String>,
}

impl From<EventRecord> for RpcEvent {
    fn from(r: EventRecord) -> Self {
        let kind = r.event.tag().to_string();
        let (address, turn, amount) = match r.event {
            CircleEvent::MemberJoined { address, collateral } => {
                (Some(address.to_b58()), None, Some(collateral.to_string()))
            }
            CircleEvent::CircleActivated
            | CircleEvent::CircleCompleted
            | CircleEvent::CircleFailed => (None, None, None),
            CircleEvent::ContributionMade { address, turn, amount } => {
                (Some(address.to_b58()), Some(turn), Some(amount.to_string()))
            }
            CircleEvent::MemberDefaulted { address } => (Some(address.to_b58()), None, None),
            CircleEvent::PotDistributed { recipient, turn_index, amount } => (
                Some(recipient.to_b58()),
                Some(turn_index),
                Some(amount.to_string()),
            ),
            CircleEvent::CollateralWithdrawn { address, amount } => {
                (Some(address.to_b58()), None, Some(amount.to_string()))
            }
        };
        Self {
            seq: r.seq,
            emitted_at: r.emitted_at,
            kind,
            address,
            turn,
            amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_parse_as_u128() {
        assert_eq!(parse_amount("0").unwrap(), 0);
        assert_eq!(
            parse_amount("340282366920938463463374607431768211455").unwrap(),
            u128::MAX
        );
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("1.5").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn params_round_trip() {
        let rpc = RpcCircleParams {
            contribution_amount: "100".into(),
            collateral_requirement: "50".into(),
            max_members: 3,
            contribution_period_secs: 300,
            grace_period_secs: 60,
            penalty_rate_percent: 5,
        };
        let p = rpc.to_params().unwrap();
        assert_eq!(p.contribution_amount, 100);
        assert_eq!(p.collateral_requirement, 50);
    }
}
