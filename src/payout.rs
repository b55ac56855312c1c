// ============================================================================
// PAYOUT VALIDATOR - Distribution admission for the ledger pipeline
// ============================================================================
//
// Consumed by the external ledger's intent-admission pipeline: bet payments
// are validated before commit, distributions of a resolved pool's vault are
// validated for financial correctness (funds conservation, no duplicate
// payouts, every computed payee paid exactly once), and settled bet payments
// trigger a tally event to every pool member.
//
// Remainder policy: with `n` payees and vault balance `B`, every payout must
// lie in `[B / n, B / n + 1]` and the payouts must sum to exactly `B`. The
// window plus exact exhaustion bounds every payee to an equal share within
// one quark.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::error::{LedgerError, PaymentError, StoreError};
use crate::event::{
    forward_fire_and_forget, Event, EventForwarder, EventKind, StaleEventDetector, UserEvent,
};
use crate::ledger::{IntentKind, IntentRecord, Ledger, PayoutAction};
use crate::model::{Bet, PublicKey, Resolution};
use crate::payment;
use crate::store::PoolStore;

/// Validation failures surfaced to the admission pipeline. `Denied` is a
/// policy rejection; the invalid variants carry the specific offending
/// intent or action detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("intent denied: {0}")]
    Denied(String),
    #[error("invalid intent: {0}")]
    InvalidIntent(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<PaymentError> for ValidationError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Store(err) => ValidationError::Store(err),
            PaymentError::Ledger(err) => ValidationError::Ledger(err),
            PaymentError::UnsupportedResolution => {
                ValidationError::InvalidIntent("unsupported resolution".to_string())
            }
        }
    }
}

pub struct PayoutValidator {
    pools: Arc<dyn PoolStore>,
    ledger: Arc<dyn Ledger>,
    forwarder: Arc<dyn EventForwarder>,
    stale_events: Arc<StaleEventDetector>,
}

impl PayoutValidator {
    pub fn new(
        pools: Arc<dyn PoolStore>,
        ledger: Arc<dyn Ledger>,
        forwarder: Arc<dyn EventForwarder>,
    ) -> Self {
        Self {
            pools,
            ledger,
            forwarder,
            stale_events: Arc::new(StaleEventDetector::new()),
        }
    }

    // ------------------------------------------------------------------------
    // Bet payment admission (pre-commit)
    // ------------------------------------------------------------------------

    /// A bet payment must target a known pool vault, reference a known bet
    /// belonging to that pool, and match the pool's buy-in exactly.
    pub async fn validate_bet_payment(&self, intent: &IntentRecord) -> Result<(), ValidationError> {
        let IntentKind::PublicPayment(metadata) = &intent.kind else {
            return Err(ValidationError::InvalidIntent(
                "expected a public payment intent".to_string(),
            ));
        };

        // The intent id must match the bet id
        let bet = match self.pools.get_bet_by_id(&intent.id).await {
            Ok(bet) => bet,
            Err(StoreError::BetNotFound) => {
                return Err(ValidationError::InvalidIntent(format!(
                    "bet with id {} does not exist",
                    intent.id
                )))
            }
            Err(err) => return Err(err.into()),
        };

        // The payment must be made to a betting pool vault
        let pool = match self
            .pools
            .get_pool_by_funding_destination(&metadata.destination)
            .await
        {
            Ok(pool) => pool,
            Err(StoreError::PoolNotFound) => {
                return Err(ValidationError::InvalidIntent(format!(
                    "betting pool with funding destination {} does not exist",
                    metadata.destination
                )))
            }
            Err(err) => return Err(err.into()),
        };

        // The bet must be associated to the pool it was made against
        if pool.id != bet.pool_id {
            return Err(ValidationError::InvalidIntent(
                "bet payment sent to wrong pool".to_string(),
            ));
        }

        // Payment amount must be exactly the buy-in
        if metadata.exchange_currency != pool.buy_in_currency {
            return Err(ValidationError::InvalidIntent(format!(
                "betting pool buy in currency must be {}",
                pool.buy_in_currency
            )));
        }
        if metadata.native_amount != pool.buy_in_amount {
            return Err(ValidationError::InvalidIntent(format!(
                "betting pool buy in amount must be {:.6}",
                pool.buy_in_amount
            )));
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Distribution admission (pre-commit)
    // ------------------------------------------------------------------------

    /// Validates a proposed payout of a resolved pool's vault against the
    /// computed payee set and the conservation rules.
    pub async fn validate_distribution(
        &self,
        intent: &IntentRecord,
        actions: &[PayoutAction],
    ) -> Result<(), ValidationError> {
        let IntentKind::PublicDistribution(metadata) = &intent.kind else {
            return Err(ValidationError::InvalidIntent(
                "expected a public distribution intent".to_string(),
            ));
        };

        let pool = match self
            .pools
            .get_pool_by_funding_destination(&metadata.source)
            .await
        {
            Ok(pool) => pool,
            Err(StoreError::PoolNotFound) => {
                return Err(ValidationError::InvalidIntent(
                    "source is not a betting pool".to_string(),
                ))
            }
            Err(err) => return Err(err.into()),
        };

        // Payout requires a closed, resolved pool
        if pool.is_open {
            return Err(ValidationError::InvalidIntent(
                "betting pool is open".to_string(),
            ));
        }
        if !pool.has_resolution() {
            return Err(ValidationError::InvalidIntent(
                "betting pool is not resolved".to_string(),
            ));
        }

        let bets = match self.pools.get_bets_by_pool(&pool.id).await {
            Ok(bets) => bets,
            Err(StoreError::BetNotFound) => {
                return Err(ValidationError::InvalidIntent(
                    "no bets made against betting pool".to_string(),
                ))
            }
            Err(err) => return Err(err.into()),
        };

        let mut paid_bets = Vec::new();
        for bet in bets {
            if payment::is_bet_paid(&*self.pools, &*self.ledger, &pool, &bet).await? {
                paid_bets.push(bet);
            }
        }

        let payees = compute_payees(pool.resolution, &paid_bets)?;
        if payees.is_empty() {
            return Err(ValidationError::Denied(
                "no bets to pay out for pool".to_string(),
            ));
        }

        let vault_balance = self.ledger.get_cached_balance(&metadata.source).await?;
        let min_payout = vault_balance / payees.len() as u64;

        let mut remaining_balance = vault_balance as i64;
        let mut seen_destinations: HashSet<PublicKey> = HashSet::new();
        for action in actions {
            let amount = action.amount();

            // Each payee receives an equal share, within one quark
            if amount < min_payout {
                return Err(ValidationError::InvalidAction(format!(
                    "bet payout amount minimum is {min_payout}"
                )));
            }
            if amount > min_payout + 1 {
                return Err(ValidationError::InvalidAction(format!(
                    "bet payout amount maximum is {}",
                    min_payout + 1
                )));
            }
            remaining_balance -= amount as i64;

            // Each payee is paid at most once
            if !seen_destinations.insert(*action.destination()) {
                return Err(ValidationError::InvalidAction(format!(
                    "duplicate bet payout destination {}",
                    action.destination()
                )));
            }
        }

        // The exact vault balance must be distributed
        if remaining_balance != 0 {
            return Err(ValidationError::InvalidIntent(format!(
                "betting pool has a remaining balance of {remaining_balance} quarks"
            )));
        }

        // Every computed payee appears exactly once among the actions
        if actions.len() != payees.len() {
            return Err(ValidationError::InvalidIntent(format!(
                "expected {} actions",
                payees.len()
            )));
        }
        for payee in &payees {
            if !seen_destinations.contains(&payee.payout_destination) {
                return Err(ValidationError::InvalidIntent(format!(
                    "bet payout to {} is missing",
                    payee.payout_destination
                )));
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Settlement notification (post-commit)
    // ------------------------------------------------------------------------

    /// Called after a bet payment commits. Recomputes the pool's tally and
    /// forwards a bet-update event to every member (creator plus bettors);
    /// delivery is fire-and-forget with staleness suppression.
    pub async fn on_bet_payment_settled(
        &self,
        intent_id: &PublicKey,
    ) -> Result<(), ValidationError> {
        let bet = self.pools.get_bet_by_id(intent_id).await?;
        let pool = self.pools.get_pool_by_id(&bet.pool_id).await?;

        let (bet_summary, bets) =
            payment::bet_summary(&*self.pools, &*self.ledger, &pool).await?;

        let mut recipients: HashSet<_> = bets.iter().map(|b| b.user_id).collect();
        recipients.insert(pool.creator_id);

        let ts = Utc::now();
        let events: Vec<UserEvent> = recipients
            .into_iter()
            .map(|user_id| UserEvent {
                user_id,
                event: Event::new(
                    ts,
                    EventKind::PoolBetUpdate {
                        pool_id: pool.id,
                        bet_summary: bet_summary.clone(),
                    },
                ),
            })
            .collect();

        info!(
            pool_id = %pool.id,
            bet_id = %bet.id,
            num_yes = bet_summary.num_yes,
            num_no = bet_summary.num_no,
            "Bet payment settled"
        );

        forward_fire_and_forget(
            Arc::clone(&self.forwarder),
            Some(Arc::clone(&self.stale_events)),
            events,
        );
        Ok(())
    }
}

/// Partitions paid bets into the payee set for a resolution. A yes/no market
/// where nobody picked the declared side degenerates into a full refund of
/// all paid bettors.
fn compute_payees(resolution: Resolution, paid_bets: &[Bet]) -> Result<Vec<&Bet>, ValidationError> {
    let winners: Vec<&Bet> = match resolution {
        Resolution::Refunded => paid_bets.iter().collect(),
        Resolution::Yes => paid_bets.iter().filter(|b| b.selected_outcome).collect(),
        Resolution::No => paid_bets.iter().filter(|b| !b.selected_outcome).collect(),
        Resolution::Unknown => {
            return Err(ValidationError::InvalidIntent(
                "unsupported resolution".to_string(),
            ))
        }
    };

    if winners.is_empty() {
        return Ok(paid_bets.iter().collect());
    }
    Ok(winners)
}
