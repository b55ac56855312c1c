// ============================================================================
// POOL STORE - Persistence contract
// ============================================================================
//
// The persistence boundary for pools, bets, and members. Two conforming
// implementations are expected: the in-process `memory::InMemoryPoolStore`
// reference (single reader/writer lock) and a transactional relational store
// (unique constraints plus conditional UPDATE ... WHERE guards). Only the
// contract lives here.
//
// Every read returns an owned, independent copy; callers never alias store
// internals.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{Bet, Member, Pool, PublicKey, Resolution, Signature, UserId};

/// Maximum number of bets per pool
pub const MAX_PARTICIPANTS: usize = 100;

/// Paged query ordering over member ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Options for paged member queries. The paging token is a previously
/// returned `Member.id`; results strictly follow it in the query order.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub order: Order,
    pub limit: usize,
    pub paging_token: Option<u64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            order: Order::Ascending,
            limit: 1024,
            paging_token: None,
        }
    }
}

impl QueryOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_descending(mut self) -> Self {
        self.order = Order::Descending;
        self
    }

    pub fn with_paging_token(mut self, token: u64) -> Self {
        self.paging_token = Some(token);
        self
    }
}

#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Creates a new betting pool and the creator's membership atomically.
    /// Fails with `PoolIdExists` / `FundingDestinationExists` on uniqueness
    /// conflicts, whichever field collides.
    async fn create_pool(&self, pool: &Pool) -> Result<(), StoreError>;

    /// Closes a pool, recording `closed_at` and the fresh rendezvous
    /// signature. A no-op success if the pool is already closed.
    async fn close_pool(
        &self,
        pool_id: &PublicKey,
        closed_at: DateTime<Utc>,
        new_signature: Signature,
    ) -> Result<(), StoreError>;

    /// Resolves a closed pool with an outcome. Fails with `PoolOpen` when
    /// the pool is still open and `PoolResolved` when a resolution already
    /// exists; the stored resolution is never overwritten.
    async fn resolve_pool(
        &self,
        pool_id: &PublicKey,
        resolution: Resolution,
        new_signature: Signature,
    ) -> Result<(), StoreError>;

    async fn get_pool_by_id(&self, pool_id: &PublicKey) -> Result<Pool, StoreError>;

    async fn get_pool_by_funding_destination(
        &self,
        funding_destination: &PublicKey,
    ) -> Result<Pool, StoreError>;

    /// Creates a new bet and the bettor's membership atomically. Enforces
    /// the `MAX_PARTICIPANTS` capacity and (pool, user) / bet id uniqueness.
    async fn create_bet(&self, bet: &Bet) -> Result<(), StoreError>;

    /// Updates an existing bet's outcome in place, recording the fresh
    /// signature and timestamp
    async fn update_bet_outcome(
        &self,
        bet_id: &PublicKey,
        new_outcome: bool,
        new_signature: Signature,
        new_ts: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Sets the sticky paid flag on a bet. Monotonic; never unset.
    async fn mark_bet_as_paid(&self, bet_id: &PublicKey) -> Result<(), StoreError>;

    async fn get_bet_by_id(&self, bet_id: &PublicKey) -> Result<Bet, StoreError>;

    async fn get_bet_by_user(
        &self,
        pool_id: &PublicKey,
        user_id: &UserId,
    ) -> Result<Bet, StoreError>;

    async fn get_bets_by_pool(&self, pool_id: &PublicKey) -> Result<Vec<Bet>, StoreError>;

    /// Pool memberships for a user, paged in either direction from an
    /// optional cursor. `MemberNotFound` when the page is empty.
    async fn get_paged_members(
        &self,
        user_id: &UserId,
        options: QueryOptions,
    ) -> Result<Vec<Member>, StoreError>;
}
