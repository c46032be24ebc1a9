use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use tanda_core::types::{Address, Amount};

use crate::ledger::{TokenError, TokenLedger};

// ── MemoryLedger ─────────────────────────────────────────────────────────────

/// In-memory token ledger with ERC-20-style balance and allowance semantics.
///
/// Backs the dev node and the test suites. Balances are not persisted; a
/// production deployment would point the engine at a real ledger service.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    balances: HashMap<Address, Amount>,
    /// (owner, spender) → remaining allowance.
    allowances: HashMap<(Address, Address), Amount>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `to` out of thin air. Dev/test faucet only.
    pub fn mint(&self, to: &Address, amount: Amount) {
        let mut inner = self.lock();
        *inner.balances.entry(to.clone()).or_insert(0) += amount;
        debug!(to = %to, amount, "minted");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means another thread panicked mid-operation;
        // the map itself is still consistent enough to read.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenLedger for MemoryLedger {
    fn balance_of(&self, owner: &Address) -> Result<Amount, TokenError> {
        Ok(self.lock().balances.get(owner).copied().unwrap_or(0))
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Result<Amount, TokenError> {
        Ok(self
            .lock()
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0))
    }

    fn approve(
        &self,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.lock()
            .allowances
            .insert((owner.clone(), spender.clone()), amount);
        debug!(owner = %owner, spender = %spender, amount, "approved");
        Ok(())
    }

    fn transfer_from(
        &self,
        owner: &Address,
        spender: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let mut inner = self.lock();

        let key = (owner.clone(), spender.clone());
        let allowed = inner.allowances.get(&key).copied().unwrap_or(0);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                need: amount,
                have: allowed,
            });
        }

        let have = inner.balances.get(owner).copied().unwrap_or(0);
        if have < amount {
            return Err(TokenError::InsufficientBalance { need: amount, have });
        }

        inner.allowances.insert(key, allowed - amount);
        inner.balances.insert(owner.clone(), have - amount);
        *inner.balances.entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }

    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError> {
        let mut inner = self.lock();

        let have = inner.balances.get(from).copied().unwrap_or(0);
        if have < amount {
            return Err(TokenError::InsufficientBalance { need: amount, have });
        }

        inner.balances.insert(from.clone(), have - amount);
        *inner.balances.entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }
}
