// ============================================================================
// EVENTS - Producer contract for the real-time fan-out transport
// ============================================================================
//
// The streaming transport itself is out of scope; this module owns the
// producer side: event payloads, the `EventForwarder` seam, staleness
// suppression for bet tallies, and the fire-and-forget delivery task with
// bounded retries. Delivery is never awaited by the mutation that caused it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::{Pool, PublicKey, UserId};
use crate::payment::{BetSummary, UserOutcome};

/// Delivery attempts before an event batch is dropped
const MAX_FORWARD_ATTEMPTS: u32 = 3;

/// Base backoff between delivery attempts
const FORWARD_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event delivery failed: {0}")]
    DeliveryFailed(String),
}

// ============================================================================
// EVENT PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// The paid-bet tally for a pool changed
    PoolBetUpdate {
        pool_id: PublicKey,
        bet_summary: BetSummary,
    },
    /// A pool was resolved; carries the recipient's personal outcome
    PoolResolved {
        pool: Pool,
        bet_summary: BetSummary,
        user_outcome: UserOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Random event id, unique per emission
    pub id: [u8; 16],
    pub ts: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn new(ts: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            id: rand::random(),
            ts,
            kind,
        }
    }
}

/// An event addressed to a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    pub user_id: UserId,
    pub event: Event,
}

// ============================================================================
// FORWARDER SEAM
// ============================================================================

/// Producer contract consumed by the external streaming transport:
/// at-least-attempted delivery, no ordering guarantee beyond emission order.
#[async_trait]
pub trait EventForwarder: Send + Sync {
    async fn forward_user_events(&self, events: Vec<UserEvent>) -> Result<(), EventError>;
}

// ============================================================================
// STALENESS SUPPRESSION
// ============================================================================

/// Drops bet-update batches whose tally does not advance the last observed
/// vote count for the pool. Concurrent settlement notifications can arrive
/// out of order; only a strictly growing tally is worth forwarding.
#[derive(Default)]
pub struct StaleEventDetector {
    latest_tally_by_pool: DashMap<PublicKey, u32>,
}

impl StaleEventDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch fans one tally update out to every pool member, so the
    /// decision is made once per batch and the recorded tally advances at
    /// most once.
    pub fn should_drop(&self, events: &[UserEvent]) -> bool {
        let Some(EventKind::PoolBetUpdate {
            pool_id,
            bet_summary,
        }) = events.first().map(|e| &e.event.kind)
        else {
            return false;
        };

        let votes = bet_summary.total_votes();
        match self.latest_tally_by_pool.entry(*pool_id) {
            Entry::Occupied(mut entry) => {
                if *entry.get() >= votes {
                    return true;
                }
                entry.insert(votes);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(votes);
                false
            }
        }
    }
}

// ============================================================================
// FIRE-AND-FORGET DELIVERY
// ============================================================================

/// Spawns a delivery task for `events`, retrying with linear backoff up to
/// `MAX_FORWARD_ATTEMPTS` before dropping the batch with a warning. The
/// caller does not await delivery.
pub fn forward_fire_and_forget(
    forwarder: Arc<dyn EventForwarder>,
    detector: Option<Arc<StaleEventDetector>>,
    events: Vec<UserEvent>,
) {
    if let Some(detector) = detector {
        if detector.should_drop(&events) {
            return;
        }
    }
    if events.is_empty() {
        return;
    }

    tokio::spawn(async move {
        for attempt in 1..=MAX_FORWARD_ATTEMPTS {
            match forwarder.forward_user_events(events.clone()).await {
                Ok(()) => return,
                Err(err) if attempt == MAX_FORWARD_ATTEMPTS => {
                    warn!(
                        error = %err,
                        num_events = events.len(),
                        "Dropping user events after exhausting delivery attempts"
                    );
                }
                Err(_) => {
                    tokio::time::sleep(FORWARD_BACKOFF * attempt).await;
                }
            }
        }
    });
}

// ============================================================================
// TESTS
// ============================================================================
