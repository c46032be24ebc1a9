use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use tanda_core::circle::{Circle, CircleParams, CircleStatus, Member};
use tanda_core::error::CircleError;
use tanda_core::event::{CircleEvent, EventRecord};
use tanda_core::types::{Address, CircleId, Timestamp};
use tanda_token::TokenLedger;

use crate::db::StateDb;

// ── CircleEngine ──────────────────────────────────────────────────────────────

/// The circle state machine.
///
/// Sole mutator of circle state and sole caller of the token ledger. Every
/// operation is atomic: all checks run first against a working copy, then the
/// operation's single external transfer executes, then the copy is committed
/// together with its emitted events. A failure anywhere leaves the stored
/// state untouched.
///
/// Time never comes from a clock inside the engine; callers supply `now`,
/// which keeps window and settlement checks deterministic under test.
pub struct CircleEngine {
    pub db: Arc<StateDb>,
    ledger: Arc<dyn TokenLedger>,
    /// Single-writer discipline: one mutating operation fully applies before
    /// the next begins.
    write_lock: Mutex<()>,
}

impl CircleEngine {
    pub fn new(db: Arc<StateDb>, ledger: Arc<dyn TokenLedger>) -> Self {
        Self {
            db,
            ledger,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load_circle(&self, id: &CircleId) -> Result<Circle, CircleError> {
        self.db
            .get_circle(id)?
            .ok_or_else(|| CircleError::CircleNotFound(id.to_hex()))
    }

    /// Persist the working copy and its events as one logical commit.
    fn commit(
        &self,
        circle: &Circle,
        events: Vec<CircleEvent>,
        now: Timestamp,
    ) -> Result<(), CircleError> {
        self.db.put_circle(circle)?;
        for event in events {
            let seq = self.db.next_event_seq(&circle.id)?;
            self.db.append_event(&EventRecord {
                circle_id: circle.id.clone(),
                seq,
                emitted_at: now,
                event,
            })?;
        }
        Ok(())
    }

    // ── Creation ─────────────────────────────────────────────────────────────

    /// Create a new circle in `Forming` with validated, immutable parameters.
    /// The creator does not auto-join; joining is always explicit, which
    /// keeps join order (and with it turn assignment) auditable.
    pub fn create_circle(
        &self,
        creator: &Address,
        params: CircleParams,
        now: Timestamp,
    ) -> Result<CircleId, CircleError> {
        params.validate()?;

        let _guard = self.lock();
        let seq = self.db.next_circle_seq()?;
        let id = CircleId::derive(creator, seq, now);
        let circle = Circle::new(id.clone(), creator.clone(), params, now);

        self.commit(&circle, Vec::new(), now)?;
        info!(circle = %id, creator = %creator, "circle created");
        Ok(id)
    }

    // ── Membership admission ─────────────────────────────────────────────────

    /// Admit `caller` into a forming circle, pulling their collateral into
    /// custody. The join that fills the last seat activates the circle and
    /// opens round 1 in the same atomic step.
    ///
    /// Fails with `NotForming`, `AlreadyMember`, or `ValueTransferFailed`.
    pub fn join(
        &self,
        id: &CircleId,
        caller: &Address,
        now: Timestamp,
    ) -> Result<(), CircleError> {
        let _guard = self.lock();
        let mut circle = self.load_circle(id)?;

        // A full circle has already activated, so NotForming also covers it.
        if circle.status != CircleStatus::Forming {
            return Err(CircleError::NotForming);
        }
        if circle.is_member(caller) {
            return Err(CircleError::AlreadyMember);
        }

        let collateral = circle.params.collateral_requirement;
        let custody = circle.custody_address();
        let turn_index = circle.members.len() as u32 + 1;

        circle
            .members
            .push(Member::new(caller.clone(), turn_index, collateral, now));
        circle.total_deposited += collateral;

        let mut events = vec![CircleEvent::MemberJoined {
            address: caller.clone(),
            collateral,
        }];

        let activated = circle.is_full();
        if activated {
            circle.status = CircleStatus::Active;
            circle.current_turn = 1;
            circle.round_deadline = Some(now + circle.params.contribution_period_secs);
            events.push(CircleEvent::CircleActivated);
        }

        self.ledger
            .transfer_from(caller, &custody, &custody, collateral)
            .map_err(|e| CircleError::ValueTransferFailed(e.to_string()))?;
        self.commit(&circle, events, now)?;

        info!(circle = %id, member = %caller, turn_index, "member joined");
        if activated {
            info!(circle = %id, members = circle.members.len(), "circle activated");
        }
        Ok(())
    }

    // ── Contribution collection ──────────────────────────────────────────────

    /// Collect `caller`'s fixed contribution for the current round. The
    /// window closes strictly at the round deadline; the grace period only
    /// delays settlement, it does not extend collection.
    ///
    /// Fails with `CircleNotActive`, `NotAMember`, `MemberDefaulted`,
    /// `ContributionWindowClosed`, `AlreadyContributed`, or
    /// `ValueTransferFailed`.
    pub fn contribute(
        &self,
        id: &CircleId,
        caller: &Address,
        now: Timestamp,
    ) -> Result<(), CircleError> {
        let _guard = self.lock();
        let mut circle = self.load_circle(id)?;

        if circle.status != CircleStatus::Active {
            return Err(CircleError::CircleNotActive);
        }
        let deadline = circle
            .round_deadline
            .ok_or_else(|| CircleError::Storage("active circle has no round deadline".into()))?;

        {
            let member = circle.member(caller).ok_or(CircleError::NotAMember)?;
            if member.is_defaulted {
                return Err(CircleError::MemberDefaulted);
            }
            if now > deadline {
                return Err(CircleError::ContributionWindowClosed { deadline });
            }
            if member.has_contributed_this_round {
                return Err(CircleError::AlreadyContributed);
            }
        }

        let amount = circle.params.contribution_amount;
        let turn = circle.current_turn;
        let custody = circle.custody_address();

        if let Some(member) = circle.member_mut(caller) {
            member.has_contributed_this_round = true;
        }
        circle.pot += amount;
        circle.total_deposited += amount;

        self.ledger
            .transfer_from(caller, &custody, &custody, amount)
            .map_err(|e| CircleError::ValueTransferFailed(e.to_string()))?;
        self.commit(
            &circle,
            vec![CircleEvent::ContributionMade {
                address: caller.clone(),
                turn,
                amount,
            }],
            now,
        )?;

        info!(circle = %id, member = %caller, turn, amount, "contribution collected");
        Ok(())
    }

    // ── Round settlement ─────────────────────────────────────────────────────

    /// Settle the current round once the grace window has elapsed. Anyone may
    /// call this: settlement is a permissionless maintenance action so no
    /// single party can block the circle.
    ///
    /// One atomic step: sweep defaulters (seizing `min(collateral, owed)`
    /// each), pick the first non-defaulted member at or after `current_turn`,
    /// pay them the whole pot, and open the next round. If no eligible
    /// recipient remains the circle transitions to `Failed` with no
    /// distribution.
    ///
    /// Fails with `CircleNotActive` or `GracePeriodNotElapsed`.
    pub fn process_round(&self, id: &CircleId, now: Timestamp) -> Result<(), CircleError> {
        let _guard = self.lock();
        let mut circle = self.load_circle(id)?;

        if circle.status != CircleStatus::Active {
            return Err(CircleError::CircleNotActive);
        }
        let deadline = circle
            .round_deadline
            .ok_or_else(|| CircleError::Storage("active circle has no round deadline".into()))?;
        let settle_after = deadline + circle.params.grace_period_secs;
        if now <= settle_after {
            return Err(CircleError::GracePeriodNotElapsed { settle_after });
        }

        let mut events = Vec::new();

        // ── 1. Default sweep ─────────────────────────────────────────────────
        // Members already defaulted in an earlier round are skipped: default
        // is permanent and announced at most once.
        let owed = circle.params.amount_owed_on_default();
        let mut seized_total = 0u128;
        for member in circle.members.iter_mut() {
            if member.is_defaulted || member.has_contributed_this_round {
                continue;
            }
            let seize = member.collateral_deposited.min(owed);
            member.collateral_deposited -= seize;
            member.is_defaulted = true;
            seized_total += seize;
            events.push(CircleEvent::MemberDefaulted {
                address: member.address.clone(),
            });
            warn!(circle = %id, member = %member.address, seized = seize, "member defaulted");
        }
        circle.pot += seized_total;

        // ── 2. Recipient selection ───────────────────────────────────────────
        // Bounded linear scan from current_turn over join order; the member
        // list is small and fixed, so no auxiliary index is kept.
        let recipient = circle.members[circle.current_turn as usize - 1..]
            .iter()
            .find(|m| !m.is_defaulted)
            .map(|m| (m.address.clone(), m.turn_index));

        let Some((recipient_addr, turn_index)) = recipient else {
            circle.status = CircleStatus::Failed;
            circle.round_deadline = None;
            events.push(CircleEvent::CircleFailed);
            self.commit(&circle, events, now)?;
            warn!(circle = %id, "no eligible recipient remains; circle failed");
            return Ok(());
        };

        // ── 3. Distribution ──────────────────────────────────────────────────
        // The emitted turn is the recipient's own fixed index, so turns
        // skipped over defaulted members are never reused or re-announced.
        let payout = circle.pot;
        circle.total_distributed += payout;
        events.push(CircleEvent::PotDistributed {
            recipient: recipient_addr.clone(),
            turn_index,
            amount: payout,
        });

        // ── 4. Round reset ───────────────────────────────────────────────────
        circle.pot = 0;
        for member in circle.members.iter_mut() {
            if !member.is_defaulted {
                member.has_contributed_this_round = false;
            }
        }
        circle.current_turn = turn_index + 1;
        if circle.current_turn > circle.params.max_members {
            circle.status = CircleStatus::Completed;
            circle.round_deadline = None;
            events.push(CircleEvent::CircleCompleted);
        } else {
            circle.round_deadline = Some(now + circle.params.contribution_period_secs);
        }

        let custody = circle.custody_address();
        self.ledger
            .transfer(&custody, &recipient_addr, payout)
            .map_err(|e| CircleError::ValueTransferFailed(e.to_string()))?;
        self.commit(&circle, events, now)?;

        info!(
            circle = %id,
            recipient = %recipient_addr,
            turn_index,
            payout,
            status = ?circle.status,
            "round settled"
        );
        Ok(())
    }

    // ── Collateral withdrawal ────────────────────────────────────────────────

    /// Return `caller`'s remaining collateral after the circle ends. Allowed
    /// once the circle is `Completed` (clean record only) or `Failed` (any
    /// member, defaulted or not).
    ///
    /// Fails with `WithdrawalNotEligible` or `ValueTransferFailed`.
    pub fn withdraw_collateral(
        &self,
        id: &CircleId,
        caller: &Address,
        now: Timestamp,
    ) -> Result<(), CircleError> {
        let _guard = self.lock();
        let mut circle = self.load_circle(id)?;

        let member = circle
            .member(caller)
            .ok_or(CircleError::WithdrawalNotEligible)?;
        let eligible = match circle.status {
            CircleStatus::Completed => !member.is_defaulted,
            CircleStatus::Failed => true,
            CircleStatus::Forming | CircleStatus::Active => false,
        };
        if !eligible || member.collateral_deposited == 0 {
            return Err(CircleError::WithdrawalNotEligible);
        }

        let amount = member.collateral_deposited;
        let custody = circle.custody_address();

        if let Some(member) = circle.member_mut(caller) {
            member.collateral_deposited = 0;
        }
        circle.total_withdrawn += amount;

        self.ledger
            .transfer(&custody, caller, amount)
            .map_err(|e| CircleError::ValueTransferFailed(e.to_string()))?;
        self.commit(
            &circle,
            vec![CircleEvent::CollateralWithdrawn {
                address: caller.clone(),
                amount,
            }],
            now,
        )?;

        info!(circle = %id, member = %caller, amount, "collateral withdrawn");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tanda_core::event::CircleEvent;
    use tanda_token::MemoryLedger;

    // ── Helpers ───────────────────────────────────────────────────────────────

    const T0: Timestamp = 1_000_000;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 32])
    }

    fn params() -> CircleParams {
        // Contribution 100, collateral 50, penalty 5%,
        // period 300 s, grace 60 s.
        CircleParams {
            contribution_amount: 100,
            collateral_requirement: 50,
            max_members: 3,
            contribution_period_secs: 300,
            grace_period_secs: 60,
            penalty_rate_percent: 5,
        }
    }

    fn setup() -> (CircleEngine, Arc<MemoryLedger>) {
        let db = Arc::new(StateDb::temporary().expect("open temp db"));
        let ledger = Arc::new(MemoryLedger::new());
        let engine = CircleEngine::new(db, Arc::clone(&ledger) as Arc<dyn TokenLedger>);
        (engine, ledger)
    }

    /// Mint funds for `who` and approve the circle's custody address.
    fn fund(ledger: &MemoryLedger, id: &CircleId, who: &Address, amount: u128) {
        ledger.mint(who, amount);
        ledger
            .approve(who, &id.custody_address(), amount)
            .expect("approve");
    }

    /// Create a 3-member circle and join a, b, c in order, activating it.
    fn active_circle(engine: &CircleEngine, ledger: &MemoryLedger) -> CircleId {
        let creator = addr(0);
        let id = engine.create_circle(&creator, params(), T0).expect("create");
        for who in [addr(1), addr(2), addr(3)] {
            fund(ledger, &id, &who, 1_000);
            engine.join(&id, &who, T0).expect("join");
        }
        id
    }

    fn circle(engine: &CircleEngine, id: &CircleId) -> Circle {
        engine.db.get_circle(id).unwrap().unwrap()
    }

    fn events(engine: &CircleEngine, id: &CircleId) -> Vec<CircleEvent> {
        engine
            .db
            .events_for_circle(id, 0, 1_000)
            .unwrap()
            .into_iter()
            .map(|r| r.event)
            .collect()
    }

    /// Value is only ever moved, never created or destroyed:
    ///   collateral held + pot + distributed + withdrawn == deposited,
    /// and the custody address holds exactly the undisbursed part.
    fn assert_conservation(engine: &CircleEngine, ledger: &MemoryLedger, id: &CircleId) {
        let c = circle(engine, id);
        assert_eq!(
            c.collateral_held() + c.pot + c.total_distributed + c.total_withdrawn,
            c.total_deposited,
            "conservation violated"
        );
        assert_eq!(
            ledger.balance_of(&id.custody_address()).unwrap(),
            c.total_deposited - c.total_distributed - c.total_withdrawn,
            "custody balance out of sync"
        );
    }

    // ── Creation ─────────────────────────────────────────────────────────────

    #[test]
    fn create_validates_params() {
        let (engine, _ledger) = setup();
        let mut bad = params();
        bad.contribution_amount = 0;
        assert!(matches!(
            engine.create_circle(&addr(0), bad, T0),
            Err(CircleError::ZeroAmount)
        ));
    }

    #[test]
    fn created_circle_is_forming_and_empty() {
        let (engine, _ledger) = setup();
        let id = engine.create_circle(&addr(0), params(), T0).unwrap();
        let c = circle(&engine, &id);
        assert_eq!(c.status, CircleStatus::Forming);
        assert!(c.members.is_empty());
        assert_eq!(c.round_deadline, None);
        assert_eq!(c.creator, addr(0));
    }

    #[test]
    fn create_assigns_distinct_ids() {
        let (engine, _ledger) = setup();
        let a = engine.create_circle(&addr(0), params(), T0).unwrap();
        let b = engine.create_circle(&addr(0), params(), T0).unwrap();
        assert_ne!(a, b);
        assert_eq!(engine.db.list_circle_ids().unwrap().len(), 2);
    }

    // ── Joining ──────────────────────────────────────────────────────────────

    #[test]
    fn join_pulls_collateral_and_assigns_turns() {
        let (engine, ledger) = setup();
        let id = engine.create_circle(&addr(0), params(), T0).unwrap();

        fund(&ledger, &id, &addr(1), 1_000);
        engine.join(&id, &addr(1), T0 + 5).unwrap();

        let c = circle(&engine, &id);
        assert_eq!(c.status, CircleStatus::Forming);
        let m = c.member(&addr(1)).unwrap();
        assert_eq!(m.turn_index, 1);
        assert_eq!(m.collateral_deposited, 50);
        assert_eq!(m.joined_at, T0 + 5);
        assert!(!m.is_defaulted);
        assert_eq!(ledger.balance_of(&id.custody_address()).unwrap(), 50);
        assert_eq!(ledger.balance_of(&addr(1)).unwrap(), 950);
        assert_conservation(&engine, &ledger, &id);
    }

    #[test]
    fn last_join_activates_circle() {
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        let c = circle(&engine, &id);
        assert_eq!(c.status, CircleStatus::Active);
        assert_eq!(c.current_turn, 1);
        assert_eq!(c.round_deadline, Some(T0 + 300));
        assert_eq!(
            events(&engine, &id).last(),
            Some(&CircleEvent::CircleActivated)
        );
        assert_conservation(&engine, &ledger, &id);
    }

    #[test]
    fn join_after_activation_rejected() {
        // A 4th address is turned away once the circle is live.
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        fund(&ledger, &id, &addr(4), 1_000);
        assert!(matches!(
            engine.join(&id, &addr(4), T0 + 1),
            Err(CircleError::NotForming)
        ));
    }

    #[test]
    fn duplicate_join_rejected() {
        let (engine, ledger) = setup();
        let id = engine.create_circle(&addr(0), params(), T0).unwrap();
        fund(&ledger, &id, &addr(1), 1_000);
        engine.join(&id, &addr(1), T0).unwrap();
        assert!(matches!(
            engine.join(&id, &addr(1), T0),
            Err(CircleError::AlreadyMember)
        ));
    }

    #[test]
    fn join_without_allowance_leaves_state_untouched() {
        let (engine, ledger) = setup();
        let id = engine.create_circle(&addr(0), params(), T0).unwrap();

        ledger.mint(&addr(1), 1_000); // no approve
        assert!(matches!(
            engine.join(&id, &addr(1), T0),
            Err(CircleError::ValueTransferFailed(_))
        ));

        let c = circle(&engine, &id);
        assert!(c.members.is_empty());
        assert_eq!(c.total_deposited, 0);
        assert_eq!(ledger.balance_of(&addr(1)).unwrap(), 1_000);
        assert!(events(&engine, &id).is_empty());
    }

    // ── Contributing ─────────────────────────────────────────────────────────

    #[test]
    fn contribute_collects_into_pot() {
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        engine.contribute(&id, &addr(1), T0 + 10).unwrap();

        let c = circle(&engine, &id);
        assert_eq!(c.pot, 100);
        assert!(c.member(&addr(1)).unwrap().has_contributed_this_round);
        assert!(events(&engine, &id).contains(&CircleEvent::ContributionMade {
            address: addr(1),
            turn: 1,
            amount: 100,
        }));
        assert_conservation(&engine, &ledger, &id);
    }

    #[test]
    fn contribute_on_forming_circle_rejected() {
        let (engine, ledger) = setup();
        let id = engine.create_circle(&addr(0), params(), T0).unwrap();
        fund(&ledger, &id, &addr(1), 1_000);
        engine.join(&id, &addr(1), T0).unwrap();
        assert!(matches!(
            engine.contribute(&id, &addr(1), T0),
            Err(CircleError::CircleNotActive)
        ));
    }

    #[test]
    fn contribute_past_deadline_rejected() {
        // The window closes at the deadline even though settlement cannot run
        // until the grace period has elapsed.
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        assert!(matches!(
            engine.contribute(&id, &addr(1), T0 + 301),
            Err(CircleError::ContributionWindowClosed { deadline }) if deadline == T0 + 300
        ));
        // Exactly at the deadline still counts.
        engine.contribute(&id, &addr(1), T0 + 300).unwrap();
    }

    #[test]
    fn contribute_twice_rejected() {
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);
        engine.contribute(&id, &addr(1), T0 + 1).unwrap();
        assert!(matches!(
            engine.contribute(&id, &addr(1), T0 + 2),
            Err(CircleError::AlreadyContributed)
        ));
    }

    #[test]
    fn contribute_by_stranger_rejected() {
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);
        fund(&ledger, &id, &addr(9), 1_000);
        assert!(matches!(
            engine.contribute(&id, &addr(9), T0 + 1),
            Err(CircleError::NotAMember)
        ));
    }

    // ── Settlement ───────────────────────────────────────────────────────────

    #[test]
    fn settlement_before_grace_elapsed_rejected() {
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        // Deadline T0+300, grace 60: settlement opens strictly after T0+360.
        for now in [T0 + 100, T0 + 300, T0 + 360] {
            assert!(matches!(
                engine.process_round(&id, now),
                Err(CircleError::GracePeriodNotElapsed { settle_after }) if settle_after == T0 + 360
            ));
        }
    }

    #[test]
    fn settlement_on_forming_circle_rejected() {
        let (engine, _ledger) = setup();
        let id = engine.create_circle(&addr(0), params(), T0).unwrap();
        assert!(matches!(
            engine.process_round(&id, T0 + 1_000),
            Err(CircleError::CircleNotActive)
        ));
    }

    #[test]
    fn full_round_distributes_pot_in_turn_order() {
        // All three contribute; the pot of 300 goes to the
        // first-joined member and the next round opens.
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        for who in [addr(1), addr(2), addr(3)] {
            engine.contribute(&id, &who, T0 + 10).unwrap();
        }
        let settle_at = T0 + 361;
        engine.process_round(&id, settle_at).unwrap();

        let c = circle(&engine, &id);
        assert_eq!(c.status, CircleStatus::Active);
        assert_eq!(c.current_turn, 2);
        assert_eq!(c.pot, 0);
        assert_eq!(c.round_deadline, Some(settle_at + 300));
        assert!(c.members.iter().all(|m| !m.has_contributed_this_round));
        assert!(events(&engine, &id).contains(&CircleEvent::PotDistributed {
            recipient: addr(1),
            turn_index: 1,
            amount: 300,
        }));
        // Recipient paid their own 100 in and got the whole 300 out.
        assert_eq!(ledger.balance_of(&addr(1)).unwrap(), 1_000 - 50 - 100 + 300);
        assert_conservation(&engine, &ledger, &id);
    }

    #[test]
    fn defaulter_collateral_seized_into_pot() {
        // Member 2 misses the round. Their whole collateral of 50
        // is seized (50 < owed 105) and the pot of 250 goes to member 1.
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        engine.contribute(&id, &addr(1), T0 + 10).unwrap();
        engine.contribute(&id, &addr(3), T0 + 10).unwrap();
        engine.process_round(&id, T0 + 361).unwrap();

        let c = circle(&engine, &id);
        let defaulted = c.member(&addr(2)).unwrap();
        assert!(defaulted.is_defaulted);
        assert_eq!(defaulted.collateral_deposited, 0);
        assert_eq!(c.current_turn, 2);

        let log = events(&engine, &id);
        let default_pos = log
            .iter()
            .position(|e| matches!(e, CircleEvent::MemberDefaulted { address } if *address == addr(2)))
            .expect("default event");
        let payout_pos = log
            .iter()
            .position(|e| {
                *e == CircleEvent::PotDistributed {
                    recipient: addr(1),
                    turn_index: 1,
                    amount: 250,
                }
            })
            .expect("payout event");
        assert!(default_pos < payout_pos, "default announced before payout");
        assert_conservation(&engine, &ledger, &id);
    }

    #[test]
    fn settlement_skips_defaulted_turn_permanently() {
        // After member 2 defaults in round 1, the next settlement
        // pays member 3 under their own turn index (3), announces no second
        // default, and completes the circle with current_turn == 4.
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        engine.contribute(&id, &addr(1), T0 + 10).unwrap();
        engine.contribute(&id, &addr(3), T0 + 10).unwrap();
        engine.process_round(&id, T0 + 361).unwrap();

        // Defaulted members stay locked out.
        assert!(matches!(
            engine.contribute(&id, &addr(2), T0 + 400),
            Err(CircleError::MemberDefaulted)
        ));

        engine.contribute(&id, &addr(1), T0 + 400).unwrap();
        engine.contribute(&id, &addr(3), T0 + 400).unwrap();
        engine.process_round(&id, T0 + 361 + 361).unwrap();

        let c = circle(&engine, &id);
        assert_eq!(c.status, CircleStatus::Completed);
        assert_eq!(c.current_turn, 4);
        assert_eq!(c.round_deadline, None);

        let log = events(&engine, &id);
        assert!(log.contains(&CircleEvent::PotDistributed {
            recipient: addr(3),
            turn_index: 3,
            amount: 200,
        }));
        let default_count = log
            .iter()
            .filter(|e| matches!(e, CircleEvent::MemberDefaulted { .. }))
            .count();
        assert_eq!(default_count, 1, "default announced exactly once");
        assert!(log.contains(&CircleEvent::CircleCompleted));
        assert_conservation(&engine, &ledger, &id);
    }

    #[test]
    fn seizes_only_owed_amount_on_default() {
        // Forfeiture choice (documented in DESIGN.md): when collateral
        // exceeds contribution + penalty, exactly the owed amount is seized
        // and the surplus stays in custody.
        let (engine, ledger) = setup();
        let mut p = params();
        p.collateral_requirement = 500;
        let id = engine.create_circle(&addr(0), p, T0).unwrap();
        for who in [addr(1), addr(2), addr(3)] {
            fund(&ledger, &id, &who, 1_000);
            engine.join(&id, &who, T0).unwrap();
        }

        engine.contribute(&id, &addr(1), T0 + 10).unwrap();
        engine.contribute(&id, &addr(3), T0 + 10).unwrap();
        engine.process_round(&id, T0 + 361).unwrap();

        let c = circle(&engine, &id);
        let defaulted = c.member(&addr(2)).unwrap();
        assert!(defaulted.is_defaulted);
        // owed = 100 + 5% = 105; 500 - 105 = 395 remains.
        assert_eq!(defaulted.collateral_deposited, 395);
        assert!(events(&engine, &id).contains(&CircleEvent::PotDistributed {
            recipient: addr(1),
            turn_index: 1,
            amount: 100 + 100 + 105,
        }));
        assert_conservation(&engine, &ledger, &id);
    }

    #[test]
    fn circle_fails_when_no_recipient_remains() {
        // Nobody contributes in round 1: every member defaults and there is
        // no one left to pay, so the circle dies with the pot undistributed.
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        engine.process_round(&id, T0 + 361).unwrap();

        let c = circle(&engine, &id);
        assert_eq!(c.status, CircleStatus::Failed);
        assert!(c.members.iter().all(|m| m.is_defaulted));
        assert_eq!(c.total_distributed, 0);

        let log = events(&engine, &id);
        assert!(log.contains(&CircleEvent::CircleFailed));
        assert!(!log
            .iter()
            .any(|e| matches!(e, CircleEvent::PotDistributed { .. })));
        assert_conservation(&engine, &ledger, &id);
    }

    // ── Withdrawal ───────────────────────────────────────────────────────────

    fn completed_circle(engine: &CircleEngine, ledger: &MemoryLedger) -> CircleId {
        let id = active_circle(engine, ledger);
        let mut now = T0;
        for _ in 0..3 {
            for who in [addr(1), addr(2), addr(3)] {
                engine.contribute(&id, &who, now + 10).unwrap();
            }
            now += 361;
            engine.process_round(&id, now).unwrap();
        }
        id
    }

    #[test]
    fn withdraw_after_completion() {
        // A clean member recovers their full collateral once, and
        // a second attempt is rejected.
        let (engine, ledger) = setup();
        let id = completed_circle(&engine, &ledger);
        assert_eq!(circle(&engine, &id).status, CircleStatus::Completed);

        let before = ledger.balance_of(&addr(1)).unwrap();
        engine.withdraw_collateral(&id, &addr(1), T0 + 2_000).unwrap();

        let c = circle(&engine, &id);
        assert_eq!(c.member(&addr(1)).unwrap().collateral_deposited, 0);
        assert_eq!(ledger.balance_of(&addr(1)).unwrap(), before + 50);
        assert!(events(&engine, &id).contains(&CircleEvent::CollateralWithdrawn {
            address: addr(1),
            amount: 50,
        }));
        assert_conservation(&engine, &ledger, &id);

        assert!(matches!(
            engine.withdraw_collateral(&id, &addr(1), T0 + 2_001),
            Err(CircleError::WithdrawalNotEligible)
        ));
    }

    #[test]
    fn withdraw_while_active_rejected() {
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);
        assert!(matches!(
            engine.withdraw_collateral(&id, &addr(1), T0 + 1),
            Err(CircleError::WithdrawalNotEligible)
        ));
    }

    #[test]
    fn defaulted_member_cannot_withdraw_after_completion() {
        // Surplus collateral of a defaulter is only recoverable on the
        // Failed path; a Completed circle keeps it in custody.
        let (engine, ledger) = setup();
        let mut p = params();
        p.collateral_requirement = 500;
        let id = engine.create_circle(&addr(0), p, T0).unwrap();
        for who in [addr(1), addr(2), addr(3)] {
            fund(&ledger, &id, &who, 2_000);
            engine.join(&id, &who, T0).unwrap();
        }

        let mut now = T0;
        for _ in 0..3 {
            engine.contribute(&id, &addr(1), now + 10).unwrap();
            engine.contribute(&id, &addr(3), now + 10).unwrap();
            now += 361;
            engine.process_round(&id, now).unwrap();
            if circle(&engine, &id).status != CircleStatus::Active {
                break;
            }
        }
        let c = circle(&engine, &id);
        assert_eq!(c.status, CircleStatus::Completed);
        assert_eq!(c.member(&addr(2)).unwrap().collateral_deposited, 395);

        assert!(matches!(
            engine.withdraw_collateral(&id, &addr(2), now + 1),
            Err(CircleError::WithdrawalNotEligible)
        ));
        // Clean members still get theirs back.
        engine.withdraw_collateral(&id, &addr(1), now + 1).unwrap();
        assert_conservation(&engine, &ledger, &id);
    }

    #[test]
    fn failed_circle_lets_defaulted_members_withdraw_remainder() {
        let (engine, ledger) = setup();
        let mut p = params();
        p.collateral_requirement = 500;
        let id = engine.create_circle(&addr(0), p, T0).unwrap();
        for who in [addr(1), addr(2), addr(3)] {
            fund(&ledger, &id, &who, 2_000);
            engine.join(&id, &who, T0).unwrap();
        }

        // Nobody contributes: all default, circle fails, 105 seized each.
        engine.process_round(&id, T0 + 361).unwrap();
        assert_eq!(circle(&engine, &id).status, CircleStatus::Failed);

        let before = ledger.balance_of(&addr(2)).unwrap();
        engine.withdraw_collateral(&id, &addr(2), T0 + 400).unwrap();
        assert_eq!(ledger.balance_of(&addr(2)).unwrap(), before + 395);
        assert_conservation(&engine, &ledger, &id);
    }

    // ── Cross-cutting properties ─────────────────────────────────────────────

    #[test]
    fn current_turn_never_decreases_and_payout_turns_unique() {
        let (engine, ledger) = setup();
        let id = active_circle(&engine, &ledger);

        let mut last_turn = 0u32;
        let mut now = T0;
        let mut round = 0;
        loop {
            let c = circle(&engine, &id);
            assert!(c.current_turn >= last_turn, "current_turn decreased");
            last_turn = c.current_turn;
            if c.status != CircleStatus::Active {
                break;
            }
            round += 1;
            engine.contribute(&id, &addr(1), now + 10).unwrap();
            if round == 1 {
                // Member 2 contributes only in round 1, then defaults.
                engine.contribute(&id, &addr(2), now + 10).unwrap();
            }
            engine.contribute(&id, &addr(3), now + 10).unwrap();
            now += 361;
            engine.process_round(&id, now).unwrap();
        }

        let mut turns: Vec<u32> = events(&engine, &id)
            .iter()
            .filter_map(|e| match e {
                CircleEvent::PotDistributed { turn_index, .. } => Some(*turn_index),
                _ => None,
            })
            .collect();
        let len = turns.len();
        turns.sort_unstable();
        turns.dedup();
        assert_eq!(turns.len(), len, "a turn was paid out twice");
    }

    #[test]
    fn completed_iff_current_turn_passes_max() {
        let (engine, ledger) = setup();
        let id = completed_circle(&engine, &ledger);
        let c = circle(&engine, &id);
        assert_eq!(c.status, CircleStatus::Completed);
        assert_eq!(c.current_turn, c.params.max_members + 1);
    }

    #[test]
    fn reputation_score_is_inert() {
        // No update rule is active; the counter stays at its initial value.
        let (engine, ledger) = setup();
        let id = completed_circle(&engine, &ledger);
        let c = circle(&engine, &id);
        assert!(c.members.iter().all(|m| m.reputation_score == 0));
    }

    #[test]
    fn unknown_circle_reported() {
        let (engine, _ledger) = setup();
        let bogus = CircleId::from_bytes([9u8; 32]);
        assert!(matches!(
            engine.join(&bogus, &addr(1), T0),
            Err(CircleError::CircleNotFound(_))
        ));
    }
}
