use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Token amount in base units of the external value ledger. u128 comfortably
/// holds 18-decimal stablecoin amounts circles are typically denominated in.
pub type Amount = u128;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

// ── Id parsing ───────────────────────────────────────────────────────────────

/// Failure to parse an `Address` or `CircleId` from its string form.
#[derive(Debug, Error)]
pub enum ParseIdError {
    #[error("invalid base-58: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

// ── Address ──────────────────────────────────────────────────────────────────

/// 32-byte participant identity.
///
/// Key management, signatures, and wallet flows live outside the engine; an
/// address is an opaque identifier supplied by the caller.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, ParseIdError> {
        let bytes = bs58::decode(s).into_vec()?;
        if bytes.len() != 32 {
            return Err(ParseIdError::Length(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_b58()[..8])
    }
}

// ── CircleId ─────────────────────────────────────────────────────────────────

/// 32-byte circle identifier: BLAKE3 over the creator, a database-assigned
/// creation sequence number, and the creation timestamp.
///
/// Circles are independent instances addressed by id, never singletons.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CircleId(pub [u8; 32]);

impl CircleId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ParseIdError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(ParseIdError::Length(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Derive a fresh circle id. `seq` is a per-database monotonic counter,
    /// which keeps ids unique even for identical creator/timestamp pairs.
    pub fn derive(creator: &Address, seq: u64, created_at: Timestamp) -> Self {
        let mut h = blake3::Hasher::new();
        h.update(b"tanda:circle:v1");
        h.update(creator.as_bytes());
        h.update(&seq.to_le_bytes());
        h.update(&created_at.to_le_bytes());
        Self(*h.finalize().as_bytes())
    }

    /// The ledger address holding this circle's collateral and pot.
    ///
    /// The engine is the sole authority over custody addresses; no key
    /// material exists for them.
    pub fn custody_address(&self) -> Address {
        let mut h = blake3::Hasher::new();
        h.update(b"tanda:custody:v1");
        h.update(&self.0);
        Address(*h.finalize().as_bytes())
    }
}

impl fmt::Display for CircleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for CircleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CircleId({}…)", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_b58_round_trip() {
        let a = Address::from_bytes([7u8; 32]);
        let s = a.to_b58();
        assert_eq!(Address::from_b58(&s).unwrap(), a);
    }

    #[test]
    fn address_rejects_wrong_length() {
        let short = bs58::encode(&[1u8; 16]).into_string();
        assert!(matches!(
            Address::from_b58(&short),
            Err(ParseIdError::Length(16))
        ));
    }

    #[test]
    fn circle_id_derivation_is_sequence_sensitive() {
        let creator = Address::from_bytes([1u8; 32]);
        let a = CircleId::derive(&creator, 1, 1_000);
        let b = CircleId::derive(&creator, 2, 1_000);
        assert_ne!(a, b);
    }

    #[test]
    fn custody_address_is_stable_and_distinct() {
        let creator = Address::from_bytes([2u8; 32]);
        let id = CircleId::derive(&creator, 1, 42);
        assert_eq!(id.custody_address(), id.custody_address());
        assert_ne!(id.custody_address().0, creator.0);
    }
}
