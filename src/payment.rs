// ============================================================================
// BET PAYMENT ORACLE - "is this bet paid?" and summary arithmetic
// ============================================================================
//
// A bet is paid when the external ledger shows a settled transfer whose id
// equals the bet's rendezvous key, whose destination is the pool's funding
// vault, and whose currency/amount equal the buy-in exactly. The first
// positive observation is written back to the store, making "paid" a sticky,
// monotonic, externally-derived fact.

use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::ledger::{IntentKind, IntentState, Ledger};
use crate::model::{Bet, FiatAmount, Pool, Resolution, UserId};
use crate::store::PoolStore;

/// Lazily determines whether `bet` has been paid, caching the result
/// permanently in the store once true. Unpaid is never cached; the ledger is
/// re-consulted on the next check.
pub async fn is_bet_paid(
    pools: &dyn PoolStore,
    ledger: &dyn Ledger,
    pool: &Pool,
    bet: &Bet,
) -> Result<bool, PaymentError> {
    if bet.is_intent_submitted {
        return Ok(true);
    }

    let Some(intent) = ledger.get_intent(&bet.id).await? else {
        return Ok(false);
    };

    let IntentKind::PublicPayment(payment) = &intent.kind else {
        return Ok(false);
    };
    if payment.destination != pool.funding_destination {
        return Ok(false);
    }
    if payment.exchange_currency != pool.buy_in_currency {
        return Ok(false);
    }
    if payment.native_amount != pool.buy_in_amount {
        return Ok(false);
    }
    if intent.state == IntentState::Revoked {
        return Ok(false);
    }

    pools.mark_bet_as_paid(&bet.id).await?;

    Ok(true)
}

// ============================================================================
// BET SUMMARY
// ============================================================================

/// Tally of paid bets by outcome. Unpaid bets never count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetSummary {
    pub num_yes: u32,
    pub num_no: u32,
    pub total_amount_bet: FiatAmount,
}

impl BetSummary {
    pub fn total_votes(&self) -> u32 {
        self.num_yes + self.num_no
    }
}

/// Computes the paid-bet tally for a pool, returning the bets with their
/// paid flags refreshed from the ledger. A pool with no bets yet yields an
/// empty summary.
pub async fn bet_summary(
    pools: &dyn PoolStore,
    ledger: &dyn Ledger,
    pool: &Pool,
) -> Result<(BetSummary, Vec<Bet>), PaymentError> {
    let mut bets = match pools.get_bets_by_pool(&pool.id).await {
        Ok(bets) => bets,
        Err(crate::error::StoreError::BetNotFound) => Vec::new(),
        Err(err) => return Err(err.into()),
    };

    let mut num_yes = 0u32;
    let mut num_no = 0u32;
    for bet in bets.iter_mut() {
        let is_paid = is_bet_paid(pools, ledger, pool, bet).await?;
        bet.is_intent_submitted = is_paid;
        if !is_paid {
            continue;
        }
        if bet.selected_outcome {
            num_yes += 1;
        } else {
            num_no += 1;
        }
    }

    let summary = BetSummary {
        num_yes,
        num_no,
        total_amount_bet: FiatAmount {
            currency: pool.buy_in_currency.clone(),
            native_amount: f64::from(num_yes + num_no) * pool.buy_in_amount,
        },
    };
    Ok((summary, bets))
}

// ============================================================================
// PER-USER OUTCOME
// ============================================================================

/// A member's personal outcome for a resolved pool, derived from the same
/// equal-split arithmetic the distribution validator enforces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserOutcome {
    /// No paid bet, or the pool is unresolved
    None,
    Win {
        amount_won: FiatAmount,
        total_received: FiatAmount,
    },
    Lose {
        amount_lost: FiatAmount,
    },
    Refund {
        amount_refunded: FiatAmount,
    },
}

/// Computes a user's outcome from an already-computed summary and bet list,
/// avoiding a second ledger pass. Winners of a one-sided market (nobody on
/// the declared side) are downgraded to refunds.
pub fn user_summary(
    user_id: &UserId,
    pool: &Pool,
    summary: &BetSummary,
    bets: &[Bet],
) -> Result<UserOutcome, PaymentError> {
    if !pool.has_resolution() {
        return Ok(UserOutcome::None);
    }

    let Some(user_bet) = bets.iter().find(|b| b.user_id == *user_id) else {
        return Ok(UserOutcome::None);
    };
    if !user_bet.is_intent_submitted {
        return Ok(UserOutcome::None);
    }

    let (is_winner, is_refunded, num_winners, num_losers) = match pool.resolution {
        Resolution::Refunded => (false, true, 0u32, 0u32),
        Resolution::Yes => (
            user_bet.selected_outcome,
            summary.num_yes == 0,
            summary.num_yes,
            summary.num_no,
        ),
        Resolution::No => (
            !user_bet.selected_outcome,
            summary.num_no == 0,
            summary.num_no,
            summary.num_yes,
        ),
        Resolution::Unknown => return Err(PaymentError::UnsupportedResolution),
    };

    let buy_in = pool.buy_in();
    if is_refunded {
        return Ok(UserOutcome::Refund {
            amount_refunded: buy_in,
        });
    }
    if is_winner {
        let total_received =
            f64::from(num_winners + num_losers) * pool.buy_in_amount / f64::from(num_winners);
        let amount_won = (total_received - pool.buy_in_amount).max(0.0);
        return Ok(UserOutcome::Win {
            amount_won: FiatAmount {
                currency: pool.buy_in_currency.clone(),
                native_amount: amount_won,
            },
            total_received: FiatAmount {
                currency: pool.buy_in_currency.clone(),
                native_amount: total_received,
            },
        });
    }
    Ok(UserOutcome::Lose {
        amount_lost: buy_in,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Keypair, PublicKey, Signature};
    use chrono::Utc;

    fn resolved_pool(resolution: Resolution) -> Pool {
        Pool {
            id: Keypair::generate().public(),
            creator_id: UserId::generate(),
            name: "Does the bridge reopen this year?".to_string(),
            buy_in_currency: "usd".to_string(),
            buy_in_amount: 100.0,
            funding_destination: Keypair::generate().public(),
            is_open: false,
            resolution,
            created_at: Utc::now(),
            closed_at: Some(Utc::now()),
            signature: Signature([0; 64]),
        }
    }

    fn paid_bet(pool_id: PublicKey, user_id: UserId, outcome: bool) -> Bet {
        Bet {
            pool_id,
            id: Keypair::generate().public(),
            user_id,
            selected_outcome: outcome,
            payout_destination: Keypair::generate().public(),
            ts: Utc::now(),
            is_intent_submitted: true,
            signature: Signature([0; 64]),
        }
    }

    fn summary_of(bets: &[Bet], pool: &Pool) -> BetSummary {
        let num_yes = bets
            .iter()
            .filter(|b| b.is_intent_submitted && b.selected_outcome)
            .count() as u32;
        let num_no = bets
            .iter()
            .filter(|b| b.is_intent_submitted && !b.selected_outcome)
            .count() as u32;
        BetSummary {
            num_yes,
            num_no,
            total_amount_bet: FiatAmount {
                currency: pool.buy_in_currency.clone(),
                native_amount: f64::from(num_yes + num_no) * pool.buy_in_amount,
            },
        }
    }

    #[test]
    fn winner_takes_equal_split_of_losing_stakes() {
        let pool = resolved_pool(Resolution::Yes);
        let winner = UserId::generate();
        let bets = vec![
            paid_bet(pool.id, winner, true),
            paid_bet(pool.id, UserId::generate(), false),
            paid_bet(pool.id, UserId::generate(), false),
        ];
        let summary = summary_of(&bets, &pool);

        let outcome = user_summary(&winner, &pool, &summary, &bets).unwrap();
        match outcome {
            UserOutcome::Win {
                amount_won,
                total_received,
            } => {
                assert_eq!(total_received.native_amount, 300.0);
                assert_eq!(amount_won.native_amount, 200.0);
            }
            other => panic!("expected win, got {other:?}"),
        }
    }

    #[test]
    fn loser_loses_the_buy_in() {
        let pool = resolved_pool(Resolution::Yes);
        let loser = UserId::generate();
        let bets = vec![
            paid_bet(pool.id, UserId::generate(), true),
            paid_bet(pool.id, loser, false),
        ];
        let summary = summary_of(&bets, &pool);

        let outcome = user_summary(&loser, &pool, &summary, &bets).unwrap();
        assert_eq!(
            outcome,
            UserOutcome::Lose {
                amount_lost: pool.buy_in()
            }
        );
    }

    #[test]
    fn one_sided_market_refunds_everyone() {
        // Resolution is Yes but nobody bet yes
        let pool = resolved_pool(Resolution::Yes);
        let bettor = UserId::generate();
        let bets = vec![
            paid_bet(pool.id, bettor, false),
            paid_bet(pool.id, UserId::generate(), false),
        ];
        let summary = summary_of(&bets, &pool);

        let outcome = user_summary(&bettor, &pool, &summary, &bets).unwrap();
        assert_eq!(
            outcome,
            UserOutcome::Refund {
                amount_refunded: pool.buy_in()
            }
        );
    }

    #[test]
    fn unpaid_bet_has_no_outcome() {
        let pool = resolved_pool(Resolution::Refunded);
        let bettor = UserId::generate();
        let mut bet = paid_bet(pool.id, bettor, true);
        bet.is_intent_submitted = false;
        let bets = vec![bet];
        let summary = summary_of(&bets, &pool);

        let outcome = user_summary(&bettor, &pool, &summary, &bets).unwrap();
        assert_eq!(outcome, UserOutcome::None);
    }

    #[test]
    fn unresolved_pool_has_no_outcome() {
        let pool = resolved_pool(Resolution::Unknown);
        let bettor = UserId::generate();
        let bets = vec![paid_bet(pool.id, bettor, true)];
        let summary = summary_of(&bets, &pool);

        let outcome = user_summary(&bettor, &pool, &summary, &bets).unwrap();
        assert_eq!(outcome, UserOutcome::None);
    }
}
