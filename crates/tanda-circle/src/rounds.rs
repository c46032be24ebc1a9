//! Round timing helpers.
//!
//! A round has two gates measured against an externally supplied clock:
//! the contribution window closes at `round_deadline`, and settlement is
//! accepted only strictly after `round_deadline + grace_period`. The stretch
//! between the two exists so that a settlement call racing a late
//! contribution can never front-run it.

use tanda_core::circle::{Circle, CircleStatus};
use tanda_core::types::Timestamp;

/// Where a circle's current round sits relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// No round is running: the circle is forming or has ended.
    Idle,
    /// The contribution window is open.
    Collecting { deadline: Timestamp },
    /// Window closed; settlement not yet accepted.
    Grace { settle_after: Timestamp },
    /// `process_round` will be accepted.
    Settleable { since: Timestamp },
}

/// First timestamp at which settlement is accepted for a round with the
/// given deadline.
pub fn settle_open_at(deadline: Timestamp, grace_period_secs: i64) -> Timestamp {
    deadline + grace_period_secs + 1
}

/// Classify `now` against the circle's current round.
pub fn round_phase(circle: &Circle, now: Timestamp) -> RoundPhase {
    if circle.status != CircleStatus::Active {
        return RoundPhase::Idle;
    }
    let Some(deadline) = circle.round_deadline else {
        return RoundPhase::Idle;
    };
    let since = settle_open_at(deadline, circle.params.grace_period_secs);
    if now <= deadline {
        RoundPhase::Collecting { deadline }
    } else if now < since {
        RoundPhase::Grace {
            settle_after: since - 1,
        }
    } else {
        RoundPhase::Settleable { since }
    }
}
