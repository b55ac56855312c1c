// ============================================================================
// IN-MEMORY POOL STORE - Reference implementation
// ============================================================================
//
// All collections live behind a single reader/writer lock: reads take the
// shared lock, mutations the exclusive lock. No lock is ever held across an
// external-ledger call (the store makes none). Reads clone before returning
// so callers never alias store internals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::model::{Bet, Member, Pool, PublicKey, Resolution, Signature, UserId};
use crate::store::{Order, PoolStore, QueryOptions, MAX_PARTICIPANTS};

#[derive(Default)]
struct Collections {
    next_member_id: u64,
    pools: Vec<Pool>,
    bets: Vec<Bet>,
    members: Vec<Member>,
}

impl Collections {
    fn find_pool_by_id(&self, pool_id: &PublicKey) -> Option<&Pool> {
        self.pools.iter().find(|p| p.id == *pool_id)
    }

    fn find_pool_by_id_mut(&mut self, pool_id: &PublicKey) -> Option<&mut Pool> {
        self.pools.iter_mut().find(|p| p.id == *pool_id)
    }

    fn find_pool_by_funding_destination(&self, funding_destination: &PublicKey) -> Option<&Pool> {
        self.pools
            .iter()
            .find(|p| p.funding_destination == *funding_destination)
    }

    fn find_bet_by_id(&self, bet_id: &PublicKey) -> Option<&Bet> {
        self.bets.iter().find(|b| b.id == *bet_id)
    }

    fn find_bet_by_id_mut(&mut self, bet_id: &PublicKey) -> Option<&mut Bet> {
        self.bets.iter_mut().find(|b| b.id == *bet_id)
    }

    fn find_bet_by_pool_and_user(&self, pool_id: &PublicKey, user_id: &UserId) -> Option<&Bet> {
        self.bets
            .iter()
            .find(|b| b.pool_id == *pool_id && b.user_id == *user_id)
    }

    fn count_bets_by_pool(&self, pool_id: &PublicKey) -> usize {
        self.bets.iter().filter(|b| b.pool_id == *pool_id).count()
    }

    fn find_member(&self, user_id: &UserId, pool_id: &PublicKey) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.user_id == *user_id && m.pool_id == *pool_id)
    }

    /// Membership rows are created at most once per (user, pool) pair, as a
    /// side effect of pool or bet creation
    fn add_member_if_not_found(&mut self, user_id: &UserId, pool_id: &PublicKey) {
        if self.find_member(user_id, pool_id).is_some() {
            return;
        }
        self.next_member_id += 1;
        self.members.push(Member {
            id: self.next_member_id,
            user_id: *user_id,
            pool_id: *pool_id,
        });
    }
}

/// Reference in-memory store
#[derive(Default)]
pub struct InMemoryPoolStore {
    inner: RwLock<Collections>,
}

impl InMemoryPoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn reset(&self) {
        *self.inner.write() = Collections::default();
    }
}

#[async_trait]
impl PoolStore for InMemoryPoolStore {
    async fn create_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        if inner.find_pool_by_id(&pool.id).is_some() {
            return Err(StoreError::PoolIdExists);
        }
        if inner
            .find_pool_by_funding_destination(&pool.funding_destination)
            .is_some()
        {
            return Err(StoreError::FundingDestinationExists);
        }

        inner.pools.push(pool.clone());
        inner.add_member_if_not_found(&pool.creator_id, &pool.id);

        Ok(())
    }

    async fn close_pool(
        &self,
        pool_id: &PublicKey,
        closed_at: DateTime<Utc>,
        new_signature: Signature,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        let pool = inner
            .find_pool_by_id_mut(pool_id)
            .ok_or(StoreError::PoolNotFound)?;
        if !pool.is_open {
            return Ok(());
        }

        pool.is_open = false;
        pool.closed_at = Some(closed_at);
        pool.signature = new_signature;

        Ok(())
    }

    async fn resolve_pool(
        &self,
        pool_id: &PublicKey,
        resolution: Resolution,
        new_signature: Signature,
    ) -> Result<(), StoreError> {
        if resolution == Resolution::Unknown {
            return Err(StoreError::InvalidResolution);
        }

        let mut inner = self.inner.write();

        let pool = inner
            .find_pool_by_id_mut(pool_id)
            .ok_or(StoreError::PoolNotFound)?;
        if pool.is_open {
            return Err(StoreError::PoolOpen);
        }
        if pool.resolution != Resolution::Unknown {
            return Err(StoreError::PoolResolved);
        }

        pool.resolution = resolution;
        pool.signature = new_signature;

        Ok(())
    }

    async fn get_pool_by_id(&self, pool_id: &PublicKey) -> Result<Pool, StoreError> {
        let inner = self.inner.read();
        inner
            .find_pool_by_id(pool_id)
            .cloned()
            .ok_or(StoreError::PoolNotFound)
    }

    async fn get_pool_by_funding_destination(
        &self,
        funding_destination: &PublicKey,
    ) -> Result<Pool, StoreError> {
        let inner = self.inner.read();
        inner
            .find_pool_by_funding_destination(funding_destination)
            .cloned()
            .ok_or(StoreError::PoolNotFound)
    }

    async fn create_bet(&self, bet: &Bet) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        // Capacity before uniqueness: a full pool rejects even a fresh bettor
        if inner.count_bets_by_pool(&bet.pool_id) >= MAX_PARTICIPANTS {
            return Err(StoreError::MaxBetCountExceeded);
        }

        if inner.find_bet_by_id(&bet.id).is_some() {
            return Err(StoreError::BetExists);
        }
        if inner
            .find_bet_by_pool_and_user(&bet.pool_id, &bet.user_id)
            .is_some()
        {
            return Err(StoreError::BetExists);
        }

        inner.bets.push(bet.clone());
        inner.add_member_if_not_found(&bet.user_id, &bet.pool_id);

        Ok(())
    }

    async fn update_bet_outcome(
        &self,
        bet_id: &PublicKey,
        new_outcome: bool,
        new_signature: Signature,
        new_ts: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        let bet = inner
            .find_bet_by_id_mut(bet_id)
            .ok_or(StoreError::BetNotFound)?;

        bet.selected_outcome = new_outcome;
        bet.signature = new_signature;
        bet.ts = new_ts;

        Ok(())
    }

    async fn mark_bet_as_paid(&self, bet_id: &PublicKey) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        let bet = inner
            .find_bet_by_id_mut(bet_id)
            .ok_or(StoreError::BetNotFound)?;
        bet.is_intent_submitted = true;

        Ok(())
    }

    async fn get_bet_by_id(&self, bet_id: &PublicKey) -> Result<Bet, StoreError> {
        let inner = self.inner.read();
        inner
            .find_bet_by_id(bet_id)
            .cloned()
            .ok_or(StoreError::BetNotFound)
    }

    async fn get_bet_by_user(
        &self,
        pool_id: &PublicKey,
        user_id: &UserId,
    ) -> Result<Bet, StoreError> {
        let inner = self.inner.read();
        inner
            .find_bet_by_pool_and_user(pool_id, user_id)
            .cloned()
            .ok_or(StoreError::BetNotFound)
    }

    async fn get_bets_by_pool(&self, pool_id: &PublicKey) -> Result<Vec<Bet>, StoreError> {
        let inner = self.inner.read();
        let bets: Vec<Bet> = inner
            .bets
            .iter()
            .filter(|b| b.pool_id == *pool_id)
            .cloned()
            .collect();
        if bets.is_empty() {
            return Err(StoreError::BetNotFound);
        }
        Ok(bets)
    }

    async fn get_paged_members(
        &self,
        user_id: &UserId,
        options: QueryOptions,
    ) -> Result<Vec<Member>, StoreError> {
        let inner = self.inner.read();

        let mut page: Vec<Member> = inner
            .members
            .iter()
            .filter(|m| m.user_id == *user_id)
            .filter(|m| match (options.paging_token, options.order) {
                (Some(cursor), Order::Ascending) => m.id > cursor,
                (Some(cursor), Order::Descending) => m.id < cursor,
                (None, _) => true,
            })
            .copied()
            .collect();

        match options.order {
            Order::Ascending => page.sort_by_key(|m| m.id),
            Order::Descending => page.sort_by_key(|m| std::cmp::Reverse(m.id)),
        }
        page.truncate(options.limit);

        if page.is_empty() {
            return Err(StoreError::MemberNotFound);
        }
        Ok(page)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Keypair, Signature};

    fn new_pool(creator_id: UserId) -> Pool {
        Pool {
            id: Keypair::generate().public(),
            creator_id,
            name: "Will the launch slip?".to_string(),
            buy_in_currency: "usd".to_string(),
            buy_in_amount: 250.0,
            funding_destination: Keypair::generate().public(),
            is_open: true,
            resolution: Resolution::Unknown,
            created_at: Utc::now(),
            closed_at: None,
            signature: Signature([1; 64]),
        }
    }

    fn new_bet(pool_id: PublicKey, user_id: UserId) -> Bet {
        Bet {
            pool_id,
            id: Keypair::generate().public(),
            user_id,
            selected_outcome: true,
            payout_destination: Keypair::generate().public(),
            ts: Utc::now(),
            is_intent_submitted: false,
            signature: Signature([2; 64]),
        }
    }

    #[tokio::test]
    async fn member_ids_are_monotonic_and_deduplicated() {
        let store = InMemoryPoolStore::new();
        let user = UserId::generate();

        let pool = new_pool(user);
        store.create_pool(&pool).await.unwrap();

        // The creator's bet in their own pool must not create a second row
        store.create_bet(&new_bet(pool.id, user)).await.unwrap();

        let other_pool = new_pool(UserId::generate());
        store.create_pool(&other_pool).await.unwrap();
        store
            .create_bet(&new_bet(other_pool.id, user))
            .await
            .unwrap();

        let members = store
            .get_paged_members(&user, QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(members.len(), 2);
        assert!(members[0].id < members[1].id);
        assert_eq!(members[0].pool_id, pool.id);
        assert_eq!(members[1].pool_id, other_pool.id);
    }

    #[tokio::test]
    async fn reads_return_independent_copies() {
        let store = InMemoryPoolStore::new();
        let pool = new_pool(UserId::generate());
        store.create_pool(&pool).await.unwrap();

        let mut copy = store.get_pool_by_id(&pool.id).await.unwrap();
        copy.name = "mutated locally".to_string();

        let fresh = store.get_pool_by_id(&pool.id).await.unwrap();
        assert_eq!(fresh.name, pool.name);

        store.reset();
        assert_eq!(
            store.get_pool_by_id(&pool.id).await,
            Err(StoreError::PoolNotFound)
        );
    }
}
