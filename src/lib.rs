//! # betpool
//!
//! Peer-funded prediction pool engine layered on an external value-transfer
//! ledger. A pool is a yes/no question backed by a shared funding vault;
//! registered users submit cryptographically self-authorizing bets; the pool
//! creator closes betting and declares a resolution; a payout pipeline then
//! distributes the vault's exact balance to winners with no double-payment
//! and no leftover balance.
//!
//! ## Architecture
//!
//! - **Model**: pool/bet/member value types with rendezvous-key signature
//!   framing (a record's id IS its verification key)
//! - **Store**: persistence contract plus an in-memory reference store
//!   (single reader/writer lock, clone-on-read)
//! - **Engine**: signature + timestamp validation and the
//!   OPEN -> CLOSED -> RESOLVED state machine
//! - **Payout**: admission validation for bet payments and vault
//!   distributions against the ledger oracle
//! - **Auth**: Ed25519 record signatures (no sessions for record mutation)
//!
//! The external ledger (balances, settled transfer intents, account
//! metadata) is treated strictly as a read-only oracle: "paid" is an
//! externally-derived, sticky fact, never client-asserted state.

pub mod auth;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod model;
pub mod payment;
pub mod payout;
pub mod store;

pub use auth::{AccountRegistry, Auth, Authorizer, SignatureVerifier};
pub use engine::{
    ClosePoolRequest, ClosePoolResponse, ClosePoolResult, CreatePoolRequest, CreatePoolResponse,
    CreatePoolResult, GetPagedPoolsRequest, GetPagedPoolsResponse, GetPagedPoolsResult,
    GetPoolRequest, GetPoolResponse, GetPoolResult, MakeBetRequest, MakeBetResponse, MakeBetResult,
    PoolEngine, PoolMetadata, ResolvePoolRequest, ResolvePoolResponse, ResolvePoolResult,
};
pub use error::{AuthError, EngineError, LedgerError, PaymentError, StoreError};
pub use event::{Event, EventForwarder, EventKind, StaleEventDetector, UserEvent};
pub use ledger::{
    AccountInfo, AccountKind, DistributionMetadata, IntentKind, IntentRecord, IntentState, Ledger,
    PaymentMetadata, PayoutAction,
};
pub use model::{
    Bet, FiatAmount, Keypair, Member, Pool, PublicKey, Resolution, Signature, UserId,
};
pub use payment::{bet_summary, is_bet_paid, user_summary, BetSummary, UserOutcome};
pub use payout::{PayoutValidator, ValidationError};
pub use store::{memory::InMemoryPoolStore, Order, PoolStore, QueryOptions, MAX_PARTICIPANTS};
