//! tanda-token
//!
//! The value-transfer collaborator boundary. The engine never holds token
//! balances itself; all value movement goes through a [`TokenLedger`], an
//! external account/allowance service whose every call can fail. A failed
//! transfer aborts the enclosing engine operation.

pub mod ledger;
pub mod memory;

pub use ledger::{TokenError, TokenLedger};
pub use memory::MemoryLedger;
