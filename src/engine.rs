// ============================================================================
// POOL ENGINE - Lifecycle orchestration
// ============================================================================
//
// The single entry point for pool/bet mutation and query. Validates record
// signatures and timestamp skew, drives the OPEN -> CLOSED -> RESOLVED state
// machine, and delegates persistence to the store. Domain outcomes are
// result codes in the responses; `EngineError` is reserved for transport
// concerns (denied callers, malformed input, infrastructure faults).
//
// A rejected call has zero side effects: every validation runs before any
// state is touched.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{AccountRegistry, Auth, Authorizer, SignatureVerifier};
use crate::error::{EngineError, StoreError};
use crate::event::{forward_fire_and_forget, Event, EventForwarder, EventKind, UserEvent};
use crate::ledger::{AccountKind, Ledger};
use crate::model::{Bet, Pool, PublicKey, Resolution, Signature, UserId};
use crate::payment::{self, BetSummary, UserOutcome};
use crate::store::{PoolStore, QueryOptions};

/// Client timestamps must fall within this skew window of server time
const MAX_TS_DELTA_SECS: i64 = 60;

/// Page size used when the caller does not supply one
const DEFAULT_MAX_PAGED_POOLS: usize = 1024;

// ============================================================================
// REQUESTS / RESPONSES
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreatePoolRequest {
    pub pool: Pool,
    pub auth: Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CreatePoolResult {
    Ok,
    /// A pool with this rendezvous key already exists
    RendezvousExists,
    FundingDestinationExists,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePoolResponse {
    pub result: CreatePoolResult,
}

#[derive(Debug, Clone)]
pub struct GetPoolRequest {
    pub id: PublicKey,
    pub exclude_bets: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GetPoolResult {
    Ok,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetPoolResponse {
    pub result: GetPoolResult,
    pub pool: Option<PoolMetadata>,
}

#[derive(Debug, Clone)]
pub struct GetPagedPoolsRequest {
    pub auth: Auth,
    pub options: Option<QueryOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GetPagedPoolsResult {
    Ok,
    /// The caller belongs to no pool (or the page is empty)
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetPagedPoolsResponse {
    pub result: GetPagedPoolsResult,
    pub pools: Vec<PoolMetadata>,
}

#[derive(Debug, Clone)]
pub struct ClosePoolRequest {
    pub id: PublicKey,
    pub closed_at: DateTime<Utc>,
    /// Fresh rendezvous signature over the pool record with `is_open = false`
    /// and `closed_at` applied
    pub new_signature: Signature,
    pub auth: Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClosePoolResult {
    Ok,
    NotFound,
    /// Caller is not the pool creator
    Denied,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosePoolResponse {
    pub result: ClosePoolResult,
}

#[derive(Debug, Clone)]
pub struct ResolvePoolRequest {
    pub id: PublicKey,
    pub resolution: Resolution,
    /// Fresh rendezvous signature over the pool record with `resolution`
    /// applied
    pub new_signature: Signature,
    pub auth: Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolvePoolResult {
    Ok,
    NotFound,
    Denied,
    /// Pools must be closed before they can be resolved
    PoolOpen,
    /// A different resolution was already declared; the stored value wins
    DifferentOutcomeDeclared,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvePoolResponse {
    pub result: ResolvePoolResult,
}

#[derive(Debug, Clone)]
pub struct MakeBetRequest {
    pub pool_id: PublicKey,
    pub bet: Bet,
    pub auth: Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MakeBetResult {
    Ok,
    PoolNotFound,
    PoolClosed,
    /// The user already has a bet with a different id or payout destination
    MultipleBets,
    MaxBetsReceived,
    /// The existing bet is paid; its outcome can no longer change
    BetOutcomeSolidified,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MakeBetResponse {
    pub result: MakeBetResult,
}

/// A pool with its derived bet state, as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolMetadata {
    pub pool: Pool,
    pub bets: Vec<Bet>,
    pub bet_summary: BetSummary,
    /// Ledger derivation index of the funding vault; creator-only
    pub derivation_index: Option<u64>,
    /// Cursor for `GetPagedPools` continuation
    pub paging_token: Option<u64>,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct PoolEngine {
    verifier: SignatureVerifier,
    authorizer: Arc<dyn Authorizer>,
    accounts: Arc<dyn AccountRegistry>,
    pools: Arc<dyn PoolStore>,
    ledger: Arc<dyn Ledger>,
    forwarder: Arc<dyn EventForwarder>,
}

impl PoolEngine {
    pub fn new(
        verifier: SignatureVerifier,
        authorizer: Arc<dyn Authorizer>,
        accounts: Arc<dyn AccountRegistry>,
        pools: Arc<dyn PoolStore>,
        ledger: Arc<dyn Ledger>,
        forwarder: Arc<dyn EventForwarder>,
    ) -> Self {
        Self {
            verifier,
            authorizer,
            accounts,
            pools,
            ledger,
            forwarder,
        }
    }

    // ------------------------------------------------------------------------
    // CreatePool
    // ------------------------------------------------------------------------

    pub async fn create_pool(
        &self,
        req: CreatePoolRequest,
    ) -> Result<CreatePoolResponse, EngineError> {
        let user_id = self.authorize_registered(&req.auth).await?;

        if !self.verify_pool_signature(&req.pool, &req.pool.signature) {
            return Err(EngineError::PermissionDenied);
        }
        if req.pool.creator_id != user_id {
            return Err(EngineError::InvalidArgument(
                "pool.creator_id must be the caller",
            ));
        }
        if !req.pool.is_open {
            return Err(EngineError::InvalidArgument("pool.is_open must be true"));
        }
        if req.pool.resolution != Resolution::Unknown {
            return Err(EngineError::InvalidArgument("pool.resolution cannot be set"));
        }
        validate_client_timestamp(req.pool.created_at)?;

        if let Err(reason) = self.validate_funding_destination(&req.auth.owner, &req.pool).await? {
            return Err(EngineError::InvalidArgument(reason));
        }

        match self.pools.create_pool(&req.pool).await {
            Ok(()) => {}
            Err(StoreError::PoolIdExists) => {
                return Ok(CreatePoolResponse {
                    result: CreatePoolResult::RendezvousExists,
                })
            }
            Err(StoreError::FundingDestinationExists) => {
                return Ok(CreatePoolResponse {
                    result: CreatePoolResult::FundingDestinationExists,
                })
            }
            Err(err) => {
                warn!(user_id = %user_id, pool_id = %req.pool.id, error = %err, "Failure persisting pool");
                return Err(EngineError::Internal("failure persisting pool".to_string()));
            }
        }

        info!(user_id = %user_id, pool_id = %req.pool.id, "Created pool");
        Ok(CreatePoolResponse {
            result: CreatePoolResult::Ok,
        })
    }

    /// The funding destination must be a pool vault on the external ledger,
    /// owned by the caller, and must not be the vault address the rendezvous
    /// key itself derives (which would make the pool id a spendable key).
    async fn validate_funding_destination(
        &self,
        owner: &PublicKey,
        pool: &Pool,
    ) -> Result<Result<(), &'static str>, EngineError> {
        let derived_vault = self.ledger.derive_vault_address(&pool.id);
        if derived_vault == pool.funding_destination {
            return Ok(Err(
                "pool.id is the private key for pool.funding_destination",
            ));
        }

        let info = self
            .ledger
            .get_account_info(&pool.funding_destination)
            .await
            .map_err(|err| {
                warn!(pool_id = %pool.id, error = %err, "Failure validating funding destination");
                EngineError::Internal("failure validating funding destination".to_string())
            })?;

        match info {
            Some(info) if info.kind == AccountKind::PoolVault => {
                if info.owner != *owner {
                    return Ok(Err(
                        "pool.funding_destination is not your pool vault account",
                    ));
                }
                Ok(Ok(()))
            }
            _ => Ok(Err("pool.funding_destination is not a pool vault account")),
        }
    }

    // ------------------------------------------------------------------------
    // GetPool / GetPagedPools
    // ------------------------------------------------------------------------

    pub async fn get_pool(&self, req: GetPoolRequest) -> Result<GetPoolResponse, EngineError> {
        match self
            .load_pool_metadata(&req.id, None, !req.exclude_bets)
            .await?
        {
            Some(metadata) => Ok(GetPoolResponse {
                result: GetPoolResult::Ok,
                pool: Some(metadata),
            }),
            None => Ok(GetPoolResponse {
                result: GetPoolResult::NotFound,
                pool: None,
            }),
        }
    }

    pub async fn get_paged_pools(
        &self,
        req: GetPagedPoolsRequest,
    ) -> Result<GetPagedPoolsResponse, EngineError> {
        let user_id = self.authorize_registered(&req.auth).await?;

        let mut options = req.options.unwrap_or_default();
        if options.limit == 0 {
            options.limit = DEFAULT_MAX_PAGED_POOLS;
        }

        let memberships = match self.pools.get_paged_members(&user_id, options).await {
            Ok(memberships) => memberships,
            Err(StoreError::MemberNotFound) => {
                return Ok(GetPagedPoolsResponse {
                    result: GetPagedPoolsResult::NotFound,
                    pools: Vec::new(),
                })
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "Failure getting user memberships");
                return Err(EngineError::Internal(
                    "failure getting user memberships".to_string(),
                ));
            }
        };

        let mut pools = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let Some(mut metadata) = self
                .load_pool_metadata(&membership.pool_id, Some(&user_id), true)
                .await?
            else {
                warn!(user_id = %user_id, pool_id = %membership.pool_id, "Membership references missing pool");
                return Err(EngineError::Internal(
                    "failure getting pool with bets".to_string(),
                ));
            };
            metadata.paging_token = Some(membership.id);
            pools.push(metadata);
        }

        Ok(GetPagedPoolsResponse {
            result: GetPagedPoolsResult::Ok,
            pools,
        })
    }

    // ------------------------------------------------------------------------
    // ClosePool
    // ------------------------------------------------------------------------

    pub async fn close_pool(
        &self,
        req: ClosePoolRequest,
    ) -> Result<ClosePoolResponse, EngineError> {
        let user_id = self.authorize_registered(&req.auth).await?;

        validate_client_timestamp(req.closed_at)?;

        let pool = match self.pools.get_pool_by_id(&req.id).await {
            Ok(pool) => pool,
            Err(StoreError::PoolNotFound) => {
                return Ok(ClosePoolResponse {
                    result: ClosePoolResult::NotFound,
                })
            }
            Err(err) => {
                warn!(user_id = %user_id, pool_id = %req.id, error = %err, "Failure getting pool");
                return Err(EngineError::Internal("failure getting pool".to_string()));
            }
        };

        if pool.creator_id != user_id {
            return Ok(ClosePoolResponse {
                result: ClosePoolResult::Denied,
            });
        }
        // Retried closes are a no-op success
        if !pool.is_open {
            return Ok(ClosePoolResponse {
                result: ClosePoolResult::Ok,
            });
        }

        let mut closed = pool.clone();
        closed.is_open = false;
        closed.closed_at = Some(req.closed_at);
        if !self.verify_pool_signature(&closed, &req.new_signature) {
            return Err(EngineError::PermissionDenied);
        }

        if let Err(err) = self
            .pools
            .close_pool(&req.id, req.closed_at, req.new_signature)
            .await
        {
            warn!(user_id = %user_id, pool_id = %req.id, error = %err, "Failure persisting pool closure");
            return Err(EngineError::Internal(
                "failure persisting pool closure".to_string(),
            ));
        }

        info!(user_id = %user_id, pool_id = %req.id, "Closed pool");
        Ok(ClosePoolResponse {
            result: ClosePoolResult::Ok,
        })
    }

    // ------------------------------------------------------------------------
    // ResolvePool
    // ------------------------------------------------------------------------

    pub async fn resolve_pool(
        &self,
        req: ResolvePoolRequest,
    ) -> Result<ResolvePoolResponse, EngineError> {
        let user_id = self.authorize_registered(&req.auth).await?;

        if req.resolution == Resolution::Unknown {
            return Err(EngineError::InvalidArgument("resolution must be set"));
        }

        let pool = match self.pools.get_pool_by_id(&req.id).await {
            Ok(pool) => pool,
            Err(StoreError::PoolNotFound) => {
                return Ok(ResolvePoolResponse {
                    result: ResolvePoolResult::NotFound,
                })
            }
            Err(err) => {
                warn!(user_id = %user_id, pool_id = %req.id, error = %err, "Failure getting pool");
                return Err(EngineError::Internal("failure getting pool".to_string()));
            }
        };

        if pool.creator_id != user_id {
            return Ok(ResolvePoolResponse {
                result: ResolvePoolResult::Denied,
            });
        }
        if pool.is_open {
            return Ok(ResolvePoolResponse {
                result: ResolvePoolResult::PoolOpen,
            });
        }
        if pool.has_resolution() {
            // Re-declaring the same outcome is an idempotent retry; anything
            // else is a conflict, never a mutation
            if pool.resolution != req.resolution {
                return Ok(ResolvePoolResponse {
                    result: ResolvePoolResult::DifferentOutcomeDeclared,
                });
            }
            return Ok(ResolvePoolResponse {
                result: ResolvePoolResult::Ok,
            });
        }

        let mut resolved = pool.clone();
        resolved.resolution = req.resolution;
        if !self.verify_pool_signature(&resolved, &req.new_signature) {
            return Err(EngineError::PermissionDenied);
        }

        if let Err(err) = self
            .pools
            .resolve_pool(&req.id, req.resolution, req.new_signature)
            .await
        {
            warn!(user_id = %user_id, pool_id = %req.id, error = %err, "Failure persisting pool resolution");
            return Err(EngineError::Internal(
                "failure persisting pool resolution".to_string(),
            ));
        }

        info!(user_id = %user_id, pool_id = %req.id, resolution = %req.resolution, "Resolved pool");

        if let Err(err) = self.notify_pool_resolution(&req.id).await {
            // Resolution is already durable; notification failures only cost
            // freshness on clients
            warn!(pool_id = %req.id, error = %err, "Failure producing pool resolution events");
        }

        Ok(ResolvePoolResponse {
            result: ResolvePoolResult::Ok,
        })
    }

    /// Produces one `PoolResolved` event per paid bettor, carrying their
    /// personal outcome. Delivery is fire-and-forget.
    async fn notify_pool_resolution(&self, pool_id: &PublicKey) -> Result<(), EngineError> {
        let pool = self
            .pools
            .get_pool_by_id(pool_id)
            .await
            .map_err(|err| EngineError::Internal(err.to_string()))?;

        let (summary, bets) = payment::bet_summary(&*self.pools, &*self.ledger, &pool).await?;

        let ts = Utc::now();
        let mut events = Vec::new();
        for bet in &bets {
            let outcome = payment::user_summary(&bet.user_id, &pool, &summary, &bets)?;
            if outcome == UserOutcome::None {
                continue;
            }
            events.push(UserEvent {
                user_id: bet.user_id,
                event: Event::new(
                    ts,
                    EventKind::PoolResolved {
                        pool: pool.clone(),
                        bet_summary: summary.clone(),
                        user_outcome: outcome,
                    },
                ),
            });
        }

        forward_fire_and_forget(Arc::clone(&self.forwarder), None, events);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // MakeBet
    // ------------------------------------------------------------------------

    pub async fn make_bet(&self, req: MakeBetRequest) -> Result<MakeBetResponse, EngineError> {
        let user_id = self.authorize_registered(&req.auth).await?;

        if !self
            .verifier
            .verify(&req.bet.id, &req.bet.signable_bytes(), &req.bet.signature)
        {
            warn!(
                bet_id = %req.bet.id,
                payload = %hex::encode(req.bet.signable_bytes()),
                "Bet signature verification failed"
            );
            return Err(EngineError::PermissionDenied);
        }
        if req.bet.user_id != user_id {
            return Err(EngineError::InvalidArgument(
                "bet.user_id must be the caller",
            ));
        }
        // The signed record must target the pool every subsequent check runs
        // against
        if req.bet.pool_id != req.pool_id {
            return Err(EngineError::InvalidArgument(
                "bet.pool_id must match the requested pool",
            ));
        }
        validate_client_timestamp(req.bet.ts)?;

        let pool = match self.pools.get_pool_by_id(&req.pool_id).await {
            Ok(pool) => pool,
            Err(StoreError::PoolNotFound) => {
                return Ok(MakeBetResponse {
                    result: MakeBetResult::PoolNotFound,
                })
            }
            Err(err) => {
                warn!(user_id = %user_id, pool_id = %req.pool_id, error = %err, "Failure getting pool");
                return Err(EngineError::Internal("failure getting pool".to_string()));
            }
        };
        if !pool.is_open {
            return Ok(MakeBetResponse {
                result: MakeBetResult::PoolClosed,
            });
        }

        match self.pools.get_bet_by_user(&req.pool_id, &user_id).await {
            Ok(existing) => {
                // A user may not re-key their bet or move its payout
                if existing.id != req.bet.id
                    || existing.payout_destination != req.bet.payout_destination
                {
                    return Ok(MakeBetResponse {
                        result: MakeBetResult::MultipleBets,
                    });
                }

                let is_paid = payment::is_bet_paid(&*self.pools, &*self.ledger, &pool, &existing)
                    .await
                    .map_err(|err| {
                        warn!(bet_id = %existing.id, error = %err, "Failure checking bet payment");
                        EngineError::Internal("failure checking bet payment".to_string())
                    })?;
                if is_paid {
                    return Ok(MakeBetResponse {
                        result: MakeBetResult::BetOutcomeSolidified,
                    });
                }

                // Unchanged selection is a no-op retry; preserve the original
                // bet metadata
                if existing.selected_outcome == req.bet.selected_outcome {
                    return Ok(MakeBetResponse {
                        result: MakeBetResult::Ok,
                    });
                }

                if let Err(err) = self
                    .pools
                    .update_bet_outcome(
                        &req.bet.id,
                        req.bet.selected_outcome,
                        req.bet.signature,
                        req.bet.ts,
                    )
                    .await
                {
                    warn!(user_id = %user_id, bet_id = %req.bet.id, error = %err, "Failure updating bet outcome");
                    return Err(EngineError::Internal(
                        "failure updating bet outcome".to_string(),
                    ));
                }

                info!(user_id = %user_id, bet_id = %req.bet.id, "Updated bet outcome");
                return Ok(MakeBetResponse {
                    result: MakeBetResult::Ok,
                });
            }
            Err(StoreError::BetNotFound) => {}
            Err(err) => {
                warn!(user_id = %user_id, pool_id = %req.pool_id, error = %err, "Failure getting existing bet");
                return Err(EngineError::Internal(
                    "failure getting existing bet".to_string(),
                ));
            }
        }

        if let Err(reason) = self
            .validate_payout_destination(&req.auth.owner, &req.bet.payout_destination)
            .await?
        {
            return Err(EngineError::InvalidArgument(reason));
        }

        match self.pools.create_bet(&req.bet).await {
            Ok(()) => {}
            Err(StoreError::MaxBetCountExceeded) => {
                return Ok(MakeBetResponse {
                    result: MakeBetResult::MaxBetsReceived,
                })
            }
            Err(err) => {
                warn!(user_id = %user_id, bet_id = %req.bet.id, error = %err, "Failure persisting new bet");
                return Err(EngineError::Internal(
                    "failure persisting new bet".to_string(),
                ));
            }
        }

        info!(user_id = %user_id, pool_id = %req.pool_id, bet_id = %req.bet.id, "Created bet");
        Ok(MakeBetResponse {
            result: MakeBetResult::Ok,
        })
    }

    /// The payout destination must be the caller's own primary account on
    /// the external ledger
    async fn validate_payout_destination(
        &self,
        owner: &PublicKey,
        payout_destination: &PublicKey,
    ) -> Result<Result<(), &'static str>, EngineError> {
        let info = self
            .ledger
            .get_account_info(payout_destination)
            .await
            .map_err(|err| {
                warn!(error = %err, "Failure validating payout destination");
                EngineError::Internal("failure validating payout destination".to_string())
            })?;

        match info {
            Some(info) if info.kind == AccountKind::Primary => {
                if info.owner != *owner {
                    return Ok(Err("bet.payout_destination is not your primary account"));
                }
                Ok(Ok(()))
            }
            _ => Ok(Err("bet.payout_destination is not a primary account")),
        }
    }

    // ------------------------------------------------------------------------
    // SHARED HELPERS
    // ------------------------------------------------------------------------

    /// Authorizes the caller and requires a registered account
    async fn authorize_registered(&self, auth: &Auth) -> Result<UserId, EngineError> {
        let user_id = self.authorizer.authorize(auth).await?;

        let is_registered = self.accounts.is_registered(&user_id).await.map_err(|err| {
            warn!(user_id = %user_id, error = %err, "Failure getting user registration status");
            EngineError::Internal("failure getting user registration status".to_string())
        })?;
        if !is_registered {
            return Err(EngineError::PermissionDenied);
        }

        Ok(user_id)
    }

    fn verify_pool_signature(&self, pool: &Pool, signature: &Signature) -> bool {
        let verified = self
            .verifier
            .verify(&pool.id, &pool.signable_bytes(), signature);
        if !verified {
            warn!(
                pool_id = %pool.id,
                payload = %hex::encode(pool.signable_bytes()),
                "Pool signature verification failed"
            );
        }
        verified
    }

    /// Loads a pool with its derived bet state. `None` when the pool does
    /// not exist. The funding vault's derivation index is included only when
    /// the requesting user is the creator.
    async fn load_pool_metadata(
        &self,
        pool_id: &PublicKey,
        requesting_user: Option<&UserId>,
        include_bets: bool,
    ) -> Result<Option<PoolMetadata>, EngineError> {
        let pool = match self.pools.get_pool_by_id(pool_id).await {
            Ok(pool) => pool,
            Err(StoreError::PoolNotFound) => return Ok(None),
            Err(err) => {
                warn!(pool_id = %pool_id, error = %err, "Failure getting pool");
                return Err(EngineError::Internal("failure getting pool".to_string()));
            }
        };

        let (bet_summary, bets) = payment::bet_summary(&*self.pools, &*self.ledger, &pool)
            .await
            .map_err(|err| {
                warn!(pool_id = %pool_id, error = %err, "Failure getting pool with bets");
                EngineError::Internal("failure getting pool with bets".to_string())
            })?;

        let derivation_index = match requesting_user {
            Some(user_id) if *user_id == pool.creator_id => {
                let info = self
                    .ledger
                    .get_account_info(&pool.funding_destination)
                    .await
                    .map_err(|err| {
                        warn!(pool_id = %pool_id, error = %err, "Failure getting funding destination info");
                        EngineError::Internal(
                            "failure getting funding destination info".to_string(),
                        )
                    })?
                    .ok_or_else(|| {
                        EngineError::Internal(
                            "funding destination account info missing".to_string(),
                        )
                    })?;
                Some(info.derivation_index)
            }
            _ => None,
        };

        Ok(Some(PoolMetadata {
            pool,
            bets: if include_bets { bets } else { Vec::new() },
            bet_summary,
            derivation_index,
            paging_token: None,
        }))
    }
}

/// Client timestamps must carry zero sub-second precision and fall within
/// the skew window. Rejected before any state is touched.
fn validate_client_timestamp(ts: DateTime<Utc>) -> Result<(), EngineError> {
    if ts.timestamp_subsec_nanos() > 0 {
        return Err(EngineError::InvalidArgument(
            "timestamp sub-second precision cannot be set",
        ));
    }
    let now = Utc::now();
    if ts > now + Duration::seconds(MAX_TS_DELTA_SECS)
        || ts < now - Duration::seconds(MAX_TS_DELTA_SECS)
    {
        return Err(EngineError::InvalidArgument("timestamp is invalid"));
    }
    Ok(())
}
