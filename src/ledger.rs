// ============================================================================
// EXTERNAL LEDGER ORACLE
// ============================================================================
//
// Read-only view of the external value-transfer ledger: settled transfer
// intents, token account metadata, and cached vault balances. The ledger is
// the single source of truth for whether a bet was actually paid for; the
// engine never trusts a client's claim.
//
// Intent kinds and payout actions are closed tagged variants matched
// exhaustively. Anything a validator does not recognize is a hard validation
// error, never a silent skip.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::model::PublicKey;

// ============================================================================
// INTENTS
// ============================================================================

/// Settlement state of a ledger intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentState {
    Pending,
    Confirmed,
    Revoked,
}

/// Metadata of a public payment intent: value moved to a destination token
/// account, denominated in a fiat currency at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub destination: PublicKey,
    pub exchange_currency: String,
    pub native_amount: f64,
}

/// Metadata of a public distribution intent: a vault's balance split across
/// a set of payout actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionMetadata {
    pub source: PublicKey,
}

/// The closed set of intent kinds this engine understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntentKind {
    PublicPayment(PaymentMetadata),
    PublicDistribution(DistributionMetadata),
}

/// A unit of ledger work representing a requested or settled value transfer.
/// For bet payments the intent id equals the bet's rendezvous key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    pub id: PublicKey,
    pub state: IntentState,
    pub kind: IntentKind,
}

/// A proposed fund movement inside a distribution intent. Both variants move
/// `amount` quarks to `destination`; they differ only in how the ledger
/// closes out the destination account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PayoutAction {
    Transfer { destination: PublicKey, amount: u64 },
    Withdraw { destination: PublicKey, amount: u64 },
}

impl PayoutAction {
    pub fn destination(&self) -> &PublicKey {
        match self {
            PayoutAction::Transfer { destination, .. } => destination,
            PayoutAction::Withdraw { destination, .. } => destination,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            PayoutAction::Transfer { amount, .. } => *amount,
            PayoutAction::Withdraw { amount, .. } => *amount,
        }
    }
}

// ============================================================================
// ACCOUNTS
// ============================================================================

/// The closed set of token account kinds relevant to pool validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    /// A user's personal payout account
    Primary,
    /// A shared betting pool vault
    PoolVault,
    /// A swap/intermediary account; never valid as a pool destination
    Swap,
}

/// Metadata for a token account on the external ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub token_address: PublicKey,
    pub owner: PublicKey,
    pub kind: AccountKind,
    /// Derivation index the owning client uses to construct spend
    /// transactions for this account
    pub derivation_index: u64,
}

// ============================================================================
// ORACLE TRAIT
// ============================================================================

/// Read-only oracle over the external ledger. No lock is ever held across
/// these calls; implementations own their own timeouts.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Looks up a settled or in-flight intent by id. `None` means the ledger
    /// has never seen the intent.
    async fn get_intent(&self, id: &PublicKey) -> Result<Option<IntentRecord>, LedgerError>;

    /// Looks up token account metadata by token address
    async fn get_account_info(
        &self,
        token_address: &PublicKey,
    ) -> Result<Option<AccountInfo>, LedgerError>;

    /// Cached balance of a token account, in quarks
    async fn get_cached_balance(&self, token_address: &PublicKey) -> Result<u64, LedgerError>;

    /// The vault token address that `owner` alone would derive. Used to
    /// reject pools whose rendezvous key doubles as the spendable vault key.
    fn derive_vault_address(&self, owner: &PublicKey) -> PublicKey;
}
