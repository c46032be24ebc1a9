use thiserror::Error;

use crate::types::Timestamp;

#[derive(Debug, Error)]
pub enum CircleError {
    // ── Creation errors ──────────────────────────────────────────────────────
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("circle needs at least {min} members, got {got}")]
    TooFewMembers { min: u32, got: u32 },

    #[error("circle size exceeds limit of {max} members")]
    TooManyMembers { max: u32 },

    #[error("penalty rate must not exceed {max} percent, got {got}")]
    InvalidPenaltyRate { max: u16, got: u16 },

    #[error("contribution period must be greater than zero seconds")]
    InvalidContributionPeriod,

    #[error("grace period must not be negative")]
    InvalidGracePeriod,

    // ── Membership errors ────────────────────────────────────────────────────
    #[error("circle is not forming; no further members may join")]
    NotForming,

    #[error("address is already a member of this circle")]
    AlreadyMember,

    // ── Contribution errors ──────────────────────────────────────────────────
    #[error("circle is not active")]
    CircleNotActive,

    #[error("address is not a member of this circle")]
    NotAMember,

    #[error("member has defaulted and can no longer take part")]
    MemberDefaulted,

    #[error("contribution window closed at {deadline}")]
    ContributionWindowClosed { deadline: Timestamp },

    #[error("member has already contributed this round")]
    AlreadyContributed,

    // ── Settlement errors ────────────────────────────────────────────────────
    #[error("grace period not elapsed; settlement opens after {settle_after}")]
    GracePeriodNotElapsed { settle_after: Timestamp },

    // ── Withdrawal errors ────────────────────────────────────────────────────
    #[error("collateral withdrawal not eligible")]
    WithdrawalNotEligible,

    // ── External ledger ──────────────────────────────────────────────────────
    #[error("value transfer failed: {0}")]
    ValueTransferFailed(String),

    // ── Lookup / storage ─────────────────────────────────────────────────────
    #[error("unknown circle: {0}")]
    CircleNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CircleError {
    /// Stable machine-readable kind, carried across the RPC boundary so the
    /// client can surface the specific failure and offer a retry.
    pub fn kind(&self) -> &'static str {
        match self {
            CircleError::ZeroAmount => "ZeroAmount",
            CircleError::TooFewMembers { .. } => "TooFewMembers",
            CircleError::TooManyMembers { .. } => "TooManyMembers",
            CircleError::InvalidPenaltyRate { .. } => "InvalidPenaltyRate",
            CircleError::InvalidContributionPeriod => "InvalidContributionPeriod",
            CircleError::InvalidGracePeriod => "InvalidGracePeriod",
            CircleError::NotForming => "NotForming",
            CircleError::AlreadyMember => "AlreadyMember",
            CircleError::CircleNotActive => "CircleNotActive",
            CircleError::NotAMember => "NotAMember",
            CircleError::MemberDefaulted => "MemberDefaulted",
            CircleError::ContributionWindowClosed { .. } => "ContributionWindowClosed",
            CircleError::AlreadyContributed => "AlreadyContributed",
            CircleError::GracePeriodNotElapsed { .. } => "GracePeriodNotElapsed",
            CircleError::WithdrawalNotEligible => "WithdrawalNotEligible",
            CircleError::ValueTransferFailed(_) => "ValueTransferFailed",
            CircleError::CircleNotFound(_) => "CircleNotFound",
            CircleError::Serialization(_) => "Serialization",
            CircleError::Storage(_) => "Storage",
        }
    }
}
