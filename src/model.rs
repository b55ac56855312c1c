// ============================================================================
// POOL DOMAIN MODEL - Pools, Bets, Members
// ============================================================================
//
// Value types for the betting pool engine. A pool or bet record is
// self-authorizing: its identifier doubles as an ed25519 public key, and the
// record carries a detached signature over its canonical signed fields,
// produced by the private half of that key (the "rendezvous" key, held only
// by the client that authored the record).
//
// Canonical signing bytes are a hand-rolled, length-prefixed concatenation so
// they are stable across serde/serializer changes.

use std::fmt;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Domain separator for pool record signatures
const POOL_SIGNING_DOMAIN: &[u8] = b"BETPOOL_POOL_V1";

/// Domain separator for bet record signatures
const BET_SIGNING_DOMAIN: &[u8] = b"BETPOOL_BET_V1";

// ============================================================================
// PRIMITIVE VALUE TYPES
// ============================================================================

/// A 32-byte ed25519 public key. Used as pool IDs, bet IDs, funding and
/// payout destinations, and caller owner keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let raw = hex::decode(s)?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(D::Error::custom)
    }
}

/// An opaque 16-byte user identifier, assigned by the account system.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub [u8; 16]);

impl UserId {
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.to_hex())
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(&s).map_err(D::Error::custom)?;
        let bytes: [u8; 16] = raw
            .try_into()
            .map_err(|_| D::Error::custom("user id must be 16 bytes"))?;
        Ok(Self(bytes))
    }
}

/// A detached 64-byte ed25519 signature.
#[derive(Clone, Copy)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(&s).map_err(D::Error::custom)?;
        let bytes: [u8; 64] = raw
            .try_into()
            .map_err(|_| D::Error::custom("signature must be 64 bytes"))?;
        Ok(Self(bytes))
    }
}

/// An ed25519 keypair. The engine itself only ever verifies; signing lives
/// here for clients and tests that author pool/bet records.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes())
    }
}

/// A fiat amount in a named currency, e.g. 250.00 usd.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiatAmount {
    /// Lowercase ISO currency code
    pub currency: String,
    /// Native amount in the currency's major unit
    pub native_amount: f64,
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Declared outcome of a pool. `Unknown` means "not yet resolved" and is the
/// only state a pool may be created in. Transitions are one-way: once a pool
/// carries a non-`Unknown` resolution it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Unknown,
    Refunded,
    Yes,
    No,
}

impl Resolution {
    /// Byte tag used in canonical signing payloads
    fn signing_tag(self) -> u8 {
        match self {
            Resolution::Unknown => 0,
            Resolution::Refunded => 1,
            Resolution::Yes => 2,
            Resolution::No => 3,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::Unknown => "unknown",
            Resolution::Refunded => "refunded",
            Resolution::Yes => "yes",
            Resolution::No => "no",
        };
        f.write_str(s)
    }
}

// ============================================================================
// POOL
// ============================================================================

/// A yes/no betting pool backed by a shared funding vault on the external
/// ledger. `id` is the rendezvous public key: both the pool's identifier and
/// the verification key for `signature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PublicKey,
    pub creator_id: UserId,
    pub name: String,
    pub buy_in_currency: String,
    pub buy_in_amount: f64,
    /// Token account on the external ledger holding the pooled stake.
    /// Must never equal the vault address derivable from `id` itself.
    pub funding_destination: PublicKey,
    pub is_open: bool,
    pub resolution: Resolution,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Detached signature over `signable_bytes()`, verifying against `id`
    pub signature: Signature,
}

impl Pool {
    pub fn has_resolution(&self) -> bool {
        self.resolution != Resolution::Unknown
    }

    pub fn buy_in(&self) -> FiatAmount {
        FiatAmount {
            currency: self.buy_in_currency.clone(),
            native_amount: self.buy_in_amount,
        }
    }

    /// Canonical bytes covered by the rendezvous signature. Covers every
    /// signed field, so close/resolve mutations require a fresh signature
    /// over the post-mutation record.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(192 + self.name.len());
        buf.extend_from_slice(POOL_SIGNING_DOMAIN);
        buf.extend_from_slice(&self.id.0);
        buf.extend_from_slice(&self.creator_id.0);
        buf.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(&(self.buy_in_currency.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.buy_in_currency.as_bytes());
        buf.extend_from_slice(&self.buy_in_amount.to_bits().to_le_bytes());
        buf.extend_from_slice(&self.funding_destination.0);
        buf.push(self.is_open as u8);
        buf.push(self.resolution.signing_tag());
        buf.extend_from_slice(&self.created_at.timestamp().to_le_bytes());
        match self.closed_at {
            Some(ts) => {
                buf.push(1);
                buf.extend_from_slice(&ts.timestamp().to_le_bytes());
            }
            None => buf.push(0),
        }
        buf
    }
}

// ============================================================================
// BET
// ============================================================================

/// A single user's bet in a pool. `id` is a second, bet-specific rendezvous
/// key; it also identifies the funding intent on the external ledger that
/// pays for this bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub pool_id: PublicKey,
    pub id: PublicKey,
    pub user_id: UserId,
    pub selected_outcome: bool,
    /// The user's personal payout token account on the external ledger
    pub payout_destination: PublicKey,
    pub ts: DateTime<Utc>,
    /// Sticky "paid" cache: set once the funding intent is observed settled,
    /// never unset. Not covered by the signature and never client-asserted.
    pub is_intent_submitted: bool,
    /// Detached signature over `signable_bytes()`, verifying against `id`
    pub signature: Signature,
}

impl Bet {
    /// Canonical bytes covered by the bet signature
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(160);
        buf.extend_from_slice(BET_SIGNING_DOMAIN);
        buf.extend_from_slice(&self.pool_id.0);
        buf.extend_from_slice(&self.id.0);
        buf.extend_from_slice(&self.user_id.0);
        buf.push(self.selected_outcome as u8);
        buf.extend_from_slice(&self.payout_destination.0);
        buf.extend_from_slice(&self.ts.timestamp().to_le_bytes());
        buf
    }
}

// ============================================================================
// MEMBER
// ============================================================================

/// A (user, pool) participation record, created once when a user creates a
/// pool or first bets in it. `id` is a store-assigned monotonic sequence
/// value that doubles as the opaque paging cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub user_id: UserId,
    pub pool_id: PublicKey,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool(keypair: &Keypair) -> Pool {
        Pool {
            id: keypair.public(),
            creator_id: UserId::generate(),
            name: "Will it rain tomorrow?".to_string(),
            buy_in_currency: "usd".to_string(),
            buy_in_amount: 250.0,
            funding_destination: Keypair::generate().public(),
            is_open: true,
            resolution: Resolution::Unknown,
            created_at: Utc::now(),
            closed_at: None,
            signature: Signature([0; 64]),
        }
    }

    #[test]
    fn pool_signable_bytes_cover_mutations() {
        let keypair = Keypair::generate();
        let pool = test_pool(&keypair);
        let base = pool.signable_bytes();

        let mut closed = pool.clone();
        closed.is_open = false;
        closed.closed_at = Some(Utc::now());
        assert_ne!(base, closed.signable_bytes());

        let mut resolved = pool.clone();
        resolved.resolution = Resolution::Yes;
        assert_ne!(base, resolved.signable_bytes());

        let mut renamed = pool.clone();
        renamed.name = "Will it snow tomorrow?".to_string();
        assert_ne!(base, renamed.signable_bytes());

        // Signature itself is not covered
        let mut resigned = pool.clone();
        resigned.signature = Signature([7; 64]);
        assert_eq!(base, resigned.signable_bytes());
    }

    #[test]
    fn resolution_tags_are_distinct() {
        let tags: Vec<u8> = [
            Resolution::Unknown,
            Resolution::Refunded,
            Resolution::Yes,
            Resolution::No,
        ]
        .iter()
        .map(|r| r.signing_tag())
        .collect();
        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn public_key_hex_round_trip() {
        let key = Keypair::generate().public();
        assert_eq!(key, PublicKey::from_hex(&key.to_hex()).unwrap());

        let json = serde_json::to_string(&key).unwrap();
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
