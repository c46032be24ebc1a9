/// ─── Tanda Protocol Constants ───────────────────────────────────────────────
///
/// Rotating savings circles with collateral-backed settlement.
///
/// A circle collects one fixed contribution per member per round and pays the
/// whole pot to one member per round, in join order, until every member has
/// been paid once. Missed contributions are covered from posted collateral.

// ── Circle sizing ────────────────────────────────────────────────────────────

/// Smallest viable circle. A 1-member circle would pay itself.
pub const MIN_MEMBERS: u32 = 2;

/// Hard cap on membership. Recipient selection is a linear scan over the
/// member list, so group sizes stay small by construction.
pub const MAX_MEMBERS_LIMIT: u32 = 100;

// ── Penalties ────────────────────────────────────────────────────────────────

/// Penalty rate is a whole-number percentage of the contribution amount.
pub const MAX_PENALTY_RATE_PERCENT: u16 = 100;

/// Denominator for penalty-rate arithmetic.
pub const PERCENT_DENOMINATOR: u128 = 100;

// ── Query limits ─────────────────────────────────────────────────────────────

/// Maximum page size for event-history queries.
pub const MAX_EVENT_PAGE: u32 = 200;
