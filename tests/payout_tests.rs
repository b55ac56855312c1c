// ============================================================================
// PAYOUT VALIDATOR TESTS - Admission and funds conservation
// ============================================================================


use std::sync::Arc;

use betpool::{
    Bet, DistributionMetadata, EventKind, InMemoryPoolStore, IntentKind, IntentRecord, IntentState,
    Keypair, PaymentMetadata, PayoutAction, PayoutValidator, Pool, PoolStore, PublicKey,
    Resolution, Signature, UserId, ValidationError,
};
use test_helpers::{now_secs, CollectingForwarder, MockLedger};

struct Harness {
    pools: Arc<InMemoryPoolStore>,
    ledger: Arc<MockLedger>,
    forwarder: Arc<CollectingForwarder>,
    validator: PayoutValidator,
}

impl Harness {
    fn new() -> Self {
        test_helpers::init_tracing();
        let pools = Arc::new(InMemoryPoolStore::new());
        let ledger = Arc::new(MockLedger::new());
        let forwarder = Arc::new(CollectingForwarder::new());
        let validator = PayoutValidator::new(
            Arc::clone(&pools) as Arc<dyn PoolStore>,
            Arc::clone(&ledger) as Arc<dyn betpool::Ledger>,
            Arc::clone(&forwarder) as Arc<dyn betpool::EventForwarder>,
        );
        Self {
            pools,
            ledger,
            forwarder,
            validator,
        }
    }

    /// A stored pool, open or closed/resolved as requested
    async fn stored_pool(&self, resolution: Resolution, is_open: bool) -> Pool {
        let pool = Pool {
            id: Keypair::generate().public(),
            creator_id: UserId::generate(),
            name: "Does the team win the final?".to_string(),
            buy_in_currency: "usd".to_string(),
            buy_in_amount: 250.0,
            funding_destination: Keypair::generate().public(),
            is_open: true,
            resolution: Resolution::Unknown,
            created_at: now_secs(),
            closed_at: None,
            signature: Signature([1; 64]),
        };
        self.pools.create_pool(&pool).await.unwrap();
        if !is_open {
            self.pools
                .close_pool(&pool.id, now_secs(), Signature([2; 64]))
                .await
                .unwrap();
            if resolution != Resolution::Unknown {
                self.pools
                    .resolve_pool(&pool.id, resolution, Signature([3; 64]))
                    .await
                    .unwrap();
            }
        }
        self.pools.get_pool_by_id(&pool.id).await.unwrap()
    }

    /// A stored bet in `pool`, optionally with its buy-in payment settled on
    /// the ledger
    async fn stored_bet(&self, pool: &Pool, outcome: bool, paid: bool) -> Bet {
        let bet = Bet {
            pool_id: pool.id,
            id: Keypair::generate().public(),
            user_id: UserId::generate(),
            selected_outcome: outcome,
            payout_destination: Keypair::generate().public(),
            ts: now_secs(),
            is_intent_submitted: false,
            signature: Signature([4; 64]),
        };
        self.pools.create_bet(&bet).await.unwrap();
        if paid {
            self.ledger.settle_bet_payment(pool, &bet);
        }
        bet
    }
}

fn payment_intent(bet: &Bet, pool: &Pool) -> IntentRecord {
    IntentRecord {
        id: bet.id,
        state: IntentState::Pending,
        kind: IntentKind::PublicPayment(PaymentMetadata {
            destination: pool.funding_destination,
            exchange_currency: pool.buy_in_currency.clone(),
            native_amount: pool.buy_in_amount,
        }),
    }
}

fn distribution_intent(pool: &Pool) -> IntentRecord {
    IntentRecord {
        id: Keypair::generate().public(),
        state: IntentState::Pending,
        kind: IntentKind::PublicDistribution(DistributionMetadata {
            source: pool.funding_destination,
        }),
    }
}

fn transfer(destination: PublicKey, amount: u64) -> PayoutAction {
    PayoutAction::Transfer {
        destination,
        amount,
    }
}

/// Payouts within the equal-share window that sum to exactly `balance`
fn equal_split_actions(payees: &[&Bet], balance: u64) -> Vec<PayoutAction> {
    let min_payout = balance / payees.len() as u64;
    let remainder = (balance % payees.len() as u64) as usize;
    payees
        .iter()
        .enumerate()
        .map(|(i, bet)| {
            let amount = if i < remainder {
                min_payout + 1
            } else {
                min_payout
            };
            transfer(bet.payout_destination, amount)
        })
        .collect()
}

// ============================================================================
// BET PAYMENT ADMISSION
// ============================================================================

#[tokio::test]
async fn bet_payment_admission() {
    let h = Harness::new();
    let pool = h.stored_pool(Resolution::Unknown, true).await;
    let bet = h.stored_bet(&pool, true, false).await;

    h.validator
        .validate_bet_payment(&payment_intent(&bet, &pool))
        .await
        .unwrap();
}

#[tokio::test]
async fn bet_payment_rejections() {
    let h = Harness::new();
    let pool = h.stored_pool(Resolution::Unknown, true).await;
    let bet = h.stored_bet(&pool, true, false).await;

    // Wrong intent kind
    assert!(matches!(
        h.validator
            .validate_bet_payment(&distribution_intent(&pool))
            .await,
        Err(ValidationError::InvalidIntent(_))
    ));

    // Intent id does not reference a known bet
    let mut unknown_bet = payment_intent(&bet, &pool);
    unknown_bet.id = Keypair::generate().public();
    assert!(matches!(
        h.validator.validate_bet_payment(&unknown_bet).await,
        Err(ValidationError::InvalidIntent(_))
    ));

    // Destination is not a pool vault
    let mut wrong_destination = payment_intent(&bet, &pool);
    let IntentKind::PublicPayment(metadata) = &mut wrong_destination.kind else {
        unreachable!()
    };
    metadata.destination = Keypair::generate().public();
    assert!(matches!(
        h.validator.validate_bet_payment(&wrong_destination).await,
        Err(ValidationError::InvalidIntent(_))
    ));

    // Destination is a different pool's vault
    let other_pool = h.stored_pool(Resolution::Unknown, true).await;
    assert!(matches!(
        h.validator
            .validate_bet_payment(&payment_intent(&bet, &other_pool))
            .await,
        Err(ValidationError::InvalidIntent(_))
    ));

    // Wrong currency
    let mut wrong_currency = payment_intent(&bet, &pool);
    let IntentKind::PublicPayment(metadata) = &mut wrong_currency.kind else {
        unreachable!()
    };
    metadata.exchange_currency = "eur".to_string();
    assert!(matches!(
        h.validator.validate_bet_payment(&wrong_currency).await,
        Err(ValidationError::InvalidIntent(_))
    ));

    // Wrong amount
    let mut wrong_amount = payment_intent(&bet, &pool);
    let IntentKind::PublicPayment(metadata) = &mut wrong_amount.kind else {
        unreachable!()
    };
    metadata.native_amount = pool.buy_in_amount - 1.0;
    assert!(matches!(
        h.validator.validate_bet_payment(&wrong_amount).await,
        Err(ValidationError::InvalidIntent(_))
    ));
}

// ============================================================================
// DISTRIBUTION ADMISSION
// ============================================================================

#[tokio::test]
async fn distribution_pays_winners_the_exact_balance() {
    let h = Harness::new();
    let pool = h.stored_pool(Resolution::Yes, false).await;

    let mut winners = Vec::new();
    for _ in 0..3 {
        winners.push(h.stored_bet(&pool, true, true).await);
    }
    for _ in 0..2 {
        h.stored_bet(&pool, false, true).await;
    }
    // Unpaid winner never collects
    h.stored_bet(&pool, true, false).await;

    // 5 paid buy-ins, indivisible by the 3 winners
    h.ledger.set_balance(pool.funding_destination, 1_000);

    let payees: Vec<&Bet> = winners.iter().collect();
    let actions = equal_split_actions(&payees, 1_000);
    assert_eq!(actions.iter().map(|a| a.amount()).sum::<u64>(), 1_000);

    h.validator
        .validate_distribution(&distribution_intent(&pool), &actions)
        .await
        .unwrap();
}

#[tokio::test]
async fn distribution_conservation_at_scale() {
    let h = Harness::new();
    let pool = h.stored_pool(Resolution::No, false).await;

    let mut winners = Vec::new();
    for i in 0..100 {
        let bet = h.stored_bet(&pool, i % 2 == 0, true).await;
        if !bet.selected_outcome {
            winners.push(bet);
        }
    }
    assert_eq!(winners.len(), 50);

    // 100 x $250 of quarks, deliberately not divisible by 50
    let balance = 25_000_017u64;
    h.ledger.set_balance(pool.funding_destination, balance);

    let payees: Vec<&Bet> = winners.iter().collect();
    let actions = equal_split_actions(&payees, balance);
    assert_eq!(actions.iter().map(|a| a.amount()).sum::<u64>(), balance);
    let min_payout = balance / 50;
    assert!(actions
        .iter()
        .all(|a| a.amount() == min_payout || a.amount() == min_payout + 1));

    h.validator
        .validate_distribution(&distribution_intent(&pool), &actions)
        .await
        .unwrap();
}

#[tokio::test]
async fn distribution_requires_closed_resolved_pool() {
    let h = Harness::new();

    let open = h.stored_pool(Resolution::Unknown, true).await;
    assert!(matches!(
        h.validator
            .validate_distribution(&distribution_intent(&open), &[])
            .await,
        Err(ValidationError::InvalidIntent(_))
    ));

    let unresolved = h.stored_pool(Resolution::Unknown, false).await;
    assert!(matches!(
        h.validator
            .validate_distribution(&distribution_intent(&unresolved), &[])
            .await,
        Err(ValidationError::InvalidIntent(_))
    ));

    // Source that is no pool vault at all
    let mut foreign = distribution_intent(&open);
    let IntentKind::PublicDistribution(metadata) = &mut foreign.kind else {
        unreachable!()
    };
    metadata.source = Keypair::generate().public();
    assert!(matches!(
        h.validator.validate_distribution(&foreign, &[]).await,
        Err(ValidationError::InvalidIntent(_))
    ));
}

#[tokio::test]
async fn distribution_with_no_paid_bets_is_denied() {
    let h = Harness::new();
    let pool = h.stored_pool(Resolution::Yes, false).await;
    h.stored_bet(&pool, true, false).await;

    assert!(matches!(
        h.validator
            .validate_distribution(&distribution_intent(&pool), &[])
            .await,
        Err(ValidationError::Denied(_))
    ));
}

#[tokio::test]
async fn distribution_rejects_malformed_action_sets() {
    let h = Harness::new();
    let pool = h.stored_pool(Resolution::Yes, false).await;

    let mut winners = Vec::new();
    for _ in 0..4 {
        winners.push(h.stored_bet(&pool, true, true).await);
    }
    let balance = 1_000u64;
    h.ledger.set_balance(pool.funding_destination, balance);
    let payees: Vec<&Bet> = winners.iter().collect();
    let intent = distribution_intent(&pool);
    let valid = equal_split_actions(&payees, balance);

    // Underpaying one winner
    let mut underpaid = valid.clone();
    underpaid[0] = transfer(*underpaid[0].destination(), 249);
    assert!(matches!(
        h.validator.validate_distribution(&intent, &underpaid).await,
        Err(ValidationError::InvalidAction(_))
    ));

    // Overpaying one winner past the window
    let mut overpaid = valid.clone();
    overpaid[0] = transfer(*overpaid[0].destination(), 252);
    assert!(matches!(
        h.validator.validate_distribution(&intent, &overpaid).await,
        Err(ValidationError::InvalidAction(_))
    ));

    // Paying the same destination twice
    let mut duplicated = valid.clone();
    duplicated[1] = transfer(*duplicated[0].destination(), 250);
    assert!(matches!(
        h.validator.validate_distribution(&intent, &duplicated).await,
        Err(ValidationError::InvalidAction(_))
    ));

    // Leaving balance in the vault
    assert!(matches!(
        h.validator
            .validate_distribution(&intent, &valid[..3])
            .await,
        Err(ValidationError::InvalidIntent(_))
    ));

    // Diverting one payout to a non-payee
    let mut diverted = valid.clone();
    diverted[0] = transfer(Keypair::generate().public(), 250);
    assert!(matches!(
        h.validator.validate_distribution(&intent, &diverted).await,
        Err(ValidationError::InvalidIntent(_))
    ));

    // An extra action on top of the full split cannot balance
    let mut padded = valid.clone();
    padded.push(transfer(Keypair::generate().public(), 250));
    assert!(h.validator.validate_distribution(&intent, &padded).await.is_err());

    h.validator
        .validate_distribution(&intent, &valid)
        .await
        .unwrap();
}

#[tokio::test]
async fn refunded_pool_pays_every_paid_bettor() {
    let h = Harness::new();
    let pool = h.stored_pool(Resolution::Refunded, false).await;

    let mut bettors = Vec::new();
    for i in 0..5 {
        bettors.push(h.stored_bet(&pool, i % 2 == 0, true).await);
    }
    h.stored_bet(&pool, true, false).await;

    let balance = 5_000u64;
    h.ledger.set_balance(pool.funding_destination, balance);
    let payees: Vec<&Bet> = bettors.iter().collect();
    let actions = equal_split_actions(&payees, balance);

    h.validator
        .validate_distribution(&distribution_intent(&pool), &actions)
        .await
        .unwrap();
}

#[tokio::test]
async fn one_sided_pool_refunds_the_losing_side() {
    let h = Harness::new();
    // Resolution is Yes but everyone bet no
    let pool = h.stored_pool(Resolution::Yes, false).await;

    let mut bettors = Vec::new();
    for _ in 0..3 {
        bettors.push(h.stored_bet(&pool, false, true).await);
    }

    let balance = 900u64;
    h.ledger.set_balance(pool.funding_destination, balance);
    let payees: Vec<&Bet> = bettors.iter().collect();
    let actions = equal_split_actions(&payees, balance);

    h.validator
        .validate_distribution(&distribution_intent(&pool), &actions)
        .await
        .unwrap();
}

// ============================================================================
// SETTLEMENT NOTIFICATION
// ============================================================================

#[tokio::test]
async fn settled_payment_notifies_all_members_once_per_tally() {
    let h = Harness::new();
    let pool = h.stored_pool(Resolution::Unknown, true).await;
    let first = h.stored_bet(&pool, true, true).await;
    let second = h.stored_bet(&pool, false, false).await;

    h.validator.on_bet_payment_settled(&first.id).await.unwrap();

    // Creator plus both bettors
    let events = h.forwarder.wait_for_events(3).await;
    assert_eq!(events.len(), 3);
    let recipients: Vec<_> = events.iter().map(|e| e.user_id).collect();
    assert!(recipients.contains(&pool.creator_id));
    assert!(recipients.contains(&first.user_id));
    assert!(recipients.contains(&second.user_id));
    for event in &events {
        let EventKind::PoolBetUpdate {
            pool_id,
            bet_summary,
        } = &event.event.kind
        else {
            panic!("expected a bet update event");
        };
        assert_eq!(*pool_id, pool.id);
        assert_eq!(bet_summary.total_votes(), 1);
    }

    // A duplicate settlement notification carries no new information and is
    // suppressed
    h.validator.on_bet_payment_settled(&first.id).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.forwarder.events().len(), 3);

    // The second payment advances the tally and is forwarded
    h.ledger.settle_bet_payment(&pool, &second);
    h.validator
        .on_bet_payment_settled(&second.id)
        .await
        .unwrap();
    let events = h.forwarder.wait_for_events(6).await;
    assert_eq!(events.len(), 6);
}
