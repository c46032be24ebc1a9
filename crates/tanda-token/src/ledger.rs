use thiserror::Error;

use tanda_core::types::{Address, Amount};

// ── TokenError ───────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: Amount, have: Amount },

    #[error("insufficient allowance: need {need}, have {have}")]
    InsufficientAllowance { need: Amount, have: Amount },

    #[error("ledger rejected the operation: {0}")]
    Rejected(String),
}

// ── TokenLedger ──────────────────────────────────────────────────────────────

/// The external fungible-token ledger the engine moves value through.
///
/// Pull model on the way in: a member pre-authorizes an allowance for the
/// circle's custody address, and the engine collects with [`transfer_from`].
/// Push model on the way out: the engine pays from custody with
/// [`transfer`]. Custody addresses have no key material; the engine is their
/// sole authority.
///
/// Implementations use interior mutability so callers can share one ledger
/// handle across the engine and the RPC layer.
///
/// [`transfer_from`]: TokenLedger::transfer_from
/// [`transfer`]: TokenLedger::transfer
pub trait TokenLedger: Send + Sync {
    fn balance_of(&self, owner: &Address) -> Result<Amount, TokenError>;

    fn allowance(&self, owner: &Address, spender: &Address) -> Result<Amount, TokenError>;

    /// Authorize `spender` to pull up to `amount` from `owner`. Invoked by
    /// the client on behalf of the caller, never by the engine.
    fn approve(&self, owner: &Address, spender: &Address, amount: Amount)
        -> Result<(), TokenError>;

    /// Move `amount` from `owner` to `to`, consuming `spender`'s allowance.
    fn transfer_from(
        &self,
        owner: &Address,
        spender: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError>;

    /// Move `amount` out of `from` directly. Used only for payouts from a
    /// circle's custody address.
    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError>;
}
