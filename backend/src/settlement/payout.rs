//! Payout Scheduler / Processor
//!
//! Once per tick the engine walks each payout queue up to `now`, attempts
//! settlement of every due entry, and falls back to a compensating refund
//! when settlement fails.
//!
//! # Processing Flow
//!
//! ```text
//! walk_due(now) ──► vault missing? ──► warn, skip
//!       │
//!       ▼
//!    settle ──ok──► Completed event
//!       │
//!      err ──► post-payout? ──► critical (no refund: funds already left)
//!       │
//!       ▼
//!    refund ──ok──► Refunded event (typed reason)
//!       │
//!      err ──► critical
//!
//! after walk: dequeue every processed key (failure ⇒ critical, non-fatal)
//! ```
//!
//! # Critical Invariants
//!
//! 1. **At most once**: each entry is attempted at most once per tick
//! 2. **Always removed**: every attempted entry is dequeued, whatever the
//!    outcome; there is no automatic retry
//! 3. **Bounded**: at most `cap` entries are attempted per call
//! 4. **Tick never aborts**: settlement, refund and dequeue failures are
//!    recorded, never propagated

use crate::ledger::{BankLedger, LedgerError};
use crate::models::coin::Amount;
use crate::models::event::{Event, EventLog};
use crate::models::payout::{PendingSwapOut, PendingWithdrawal, RefundReason};
use crate::models::registry::{RegistryError, VaultRegistry};
use crate::queue::{IndexedDueQueue, QueueError, SeqKey};
use crate::valuation::{PriceSource, ValuationEngine, ValuationError};
use std::ops::ControlFlow;
use thiserror::Error;
use tracing::{error, warn};

/// Errors that can occur while settling or refunding a payout
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Vault lookup failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Vault {0} is paused")]
    VaultPaused(String),

    #[error("Pricing failed: {0}")]
    Pricing(#[from] ValuationError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The payout left the principal account but a follow-up step failed
    #[error("Payout sent but post-payout step failed: {0}")]
    PostPayout(String),
}

impl SettlementError {
    /// True if the failure happened after funds were paid out
    pub fn is_critical(&self) -> bool {
        matches!(self, SettlementError::PostPayout(_))
    }
}

impl From<&SettlementError> for RefundReason {
    fn from(err: &SettlementError) -> Self {
        match err {
            SettlementError::VaultPaused(_) => RefundReason::VaultPaused,
            SettlementError::Pricing(_) => RefundReason::PricingUnavailable,
            SettlementError::Ledger(LedgerError::InsufficientFunds { .. }) => {
                RefundReason::InsufficientFunds
            }
            SettlementError::Ledger(LedgerError::SendRestricted(_)) => {
                RefundReason::PermissionDenied
            }
            _ => RefundReason::Unknown,
        }
    }
}

/// Everything a payout needs to settle or refund itself
pub struct PayoutContext<'a, L: BankLedger, P: PriceSource> {
    pub ledger: &'a mut L,
    pub prices: &'a P,
    pub vaults: &'a mut VaultRegistry,
    pub valuation: &'a ValuationEngine,
    pub events: &'a mut EventLog,
    pub now: i64,
    /// Pause the vault on a critical failure
    pub auto_pause: bool,
}

impl<'a, L: BankLedger, P: PriceSource> PayoutContext<'a, L, P> {
    /// Log a critical failure, record it, and pause the vault if configured
    pub fn record_critical(&mut self, vault: &str, request_id: Option<u64>, detail: String) {
        error!(
            critical = true,
            vault = vault,
            request_id = ?request_id,
            "CRITICAL: {}",
            detail
        );
        self.events.log(Event::CriticalFailure {
            time: self.now,
            vault: vault.to_string(),
            request_id,
            detail: detail.clone(),
        });
        if self.auto_pause {
            self.pause_vault(vault, &detail);
        }
    }

    /// Pause `vault`, freezing its current valuation
    ///
    /// Already-paused and unknown vaults are left alone. If the live
    /// valuation cannot be computed the vault is still paused with a zero
    /// snapshot.
    pub fn pause_vault(&mut self, vault: &str, reason: &str) {
        let snapshot = match self.vaults.get_vault(vault) {
            Ok(v) if v.paused => return,
            Ok(v) => self.valuation.snapshot(&*self.ledger, self.prices, v),
            Err(e) => {
                warn!(vault = vault, error = %e, "cannot pause unknown vault");
                return;
            }
        };
        let snapshot = snapshot.unwrap_or_else(|e| {
            warn!(vault = vault, error = %e, "valuation failed while pausing; freezing at zero");
            Default::default()
        });

        if let Ok(v) = self.vaults.get_vault_mut(vault) {
            v.pause(reason, snapshot);
        }
        self.events.log(Event::VaultPaused {
            time: self.now,
            vault: vault.to_string(),
            reason: reason.to_string(),
            total_value: snapshot.total_value,
            nav_per_share: snapshot.nav_per_share,
        });
    }
}

/// A queued payout that knows how to settle and refund itself
pub trait PayoutRequest {
    fn owner(&self) -> &str;
    fn vault_address(&self) -> &str;

    /// Attempt settlement, returning the completion event
    fn settle<L: BankLedger, P: PriceSource>(
        &self,
        request_id: u64,
        ctx: &mut PayoutContext<'_, L, P>,
    ) -> Result<Event, SettlementError>;

    /// Undo the request's escrow, returning the refund event
    fn refund<L: BankLedger, P: PriceSource>(
        &self,
        request_id: u64,
        reason: RefundReason,
        ctx: &mut PayoutContext<'_, L, P>,
    ) -> Result<Event, SettlementError>;
}

impl PayoutRequest for PendingSwapOut {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn vault_address(&self) -> &str {
        &self.vault_address
    }

    /// Pay out the current value of the escrowed shares, then burn them
    fn settle<L: BankLedger, P: PriceSource>(
        &self,
        request_id: u64,
        ctx: &mut PayoutContext<'_, L, P>,
    ) -> Result<Event, SettlementError> {
        let vault = ctx.vaults.get_vault(&self.vault_address)?;
        if vault.paused {
            return Err(SettlementError::VaultPaused(vault.address.clone()));
        }
        let principal = vault.principal_address.clone();

        let payout = ctx.valuation.shares_to_redeem(
            &*ctx.ledger,
            ctx.prices,
            vault,
            self.shares.amount,
            &self.redeem_denom,
        )?;
        ctx.ledger.transfer(&principal, &self.owner, &payout)?;

        // Funds have left principal; nothing below may refund
        ctx.ledger
            .burn(&self.vault_address, &self.shares)
            .map_err(|e| {
                SettlementError::PostPayout(format!(
                    "failed to burn {} escrowed at {}: {}",
                    self.shares, self.vault_address, e
                ))
            })?;
        let vault = ctx
            .vaults
            .get_vault_mut(&self.vault_address)
            .map_err(|e| SettlementError::PostPayout(e.to_string()))?;
        vault.total_shares = reduce_shares(vault.total_shares, self.shares.amount)?;

        Ok(Event::SwapOutCompleted {
            time: ctx.now,
            request_id,
            vault: self.vault_address.clone(),
            owner: self.owner.clone(),
            shares: self.shares.clone(),
            payout,
        })
    }

    /// Return escrowed shares from the vault account to the owner
    fn refund<L: BankLedger, P: PriceSource>(
        &self,
        request_id: u64,
        reason: RefundReason,
        ctx: &mut PayoutContext<'_, L, P>,
    ) -> Result<Event, SettlementError> {
        ctx.ledger
            .transfer(&self.vault_address, &self.owner, &self.shares)?;
        Ok(Event::SwapOutRefunded {
            time: ctx.now,
            request_id,
            vault: self.vault_address.clone(),
            owner: self.owner.clone(),
            shares: self.shares.clone(),
            reason,
        })
    }
}

fn reduce_shares(total: Amount, burned: Amount) -> Result<Amount, SettlementError> {
    total
        .checked_sub(burned)
        .filter(|remaining| *remaining >= 0)
        .ok_or_else(|| {
            SettlementError::PostPayout(format!(
                "burned {} shares but vault only tracked {}",
                burned, total
            ))
        })
}

impl PayoutRequest for PendingWithdrawal {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn vault_address(&self) -> &str {
        &self.vault_address
    }

    /// Release escrowed assets from the vault account to the owner
    fn settle<L: BankLedger, P: PriceSource>(
        &self,
        request_id: u64,
        ctx: &mut PayoutContext<'_, L, P>,
    ) -> Result<Event, SettlementError> {
        let vault = ctx.vaults.get_vault(&self.vault_address)?;
        if vault.paused {
            return Err(SettlementError::VaultPaused(vault.address.clone()));
        }
        ctx.ledger
            .transfer(&self.vault_address, &self.owner, &self.assets)?;
        Ok(Event::WithdrawalCompleted {
            time: ctx.now,
            request_id,
            vault: self.vault_address.clone(),
            owner: self.owner.clone(),
            assets: self.assets.clone(),
        })
    }

    /// Return escrowed assets from the vault account to principal
    fn refund<L: BankLedger, P: PriceSource>(
        &self,
        request_id: u64,
        reason: RefundReason,
        ctx: &mut PayoutContext<'_, L, P>,
    ) -> Result<Event, SettlementError> {
        let principal = ctx
            .vaults
            .get_vault(&self.vault_address)?
            .principal_address
            .clone();
        ctx.ledger
            .transfer(&self.vault_address, &principal, &self.assets)?;
        Ok(Event::WithdrawalRefunded {
            time: ctx.now,
            request_id,
            vault: self.vault_address.clone(),
            owner: self.owner.clone(),
            assets: self.assets.clone(),
            reason,
        })
    }
}

/// Outcome counters for one call to [`process_due_payouts`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayoutProcessingResult {
    /// Entries visited and removed (includes skipped ones)
    pub attempted: usize,
    pub settled: usize,
    pub refunded: usize,
    /// Entries whose vault no longer exists
    pub skipped: usize,
    pub critical_failures: usize,
}

/// Settle or refund every entry due at or before `ctx.now`, up to `cap`
///
/// `cap` of `None` means uncapped. Entries beyond the cap stay queued for
/// the next tick.
pub fn process_due_payouts<T, L, P>(
    queue: &mut IndexedDueQueue<T>,
    ctx: &mut PayoutContext<'_, L, P>,
    cap: Option<usize>,
) -> Result<PayoutProcessingResult, QueueError>
where
    T: PayoutRequest,
    L: BankLedger,
    P: PriceSource,
{
    let mut result = PayoutProcessingResult::default();
    let mut processed: Vec<(i64, SeqKey)> = Vec::new();

    queue.walk_due(ctx.now, |due_time, key, request| {
        if cap.is_some_and(|limit| processed.len() >= limit) {
            return Ok::<_, QueueError>(ControlFlow::Break(()));
        }
        processed.push((due_time, key.clone()));
        process_one(key.id, request, ctx, &mut result);
        Ok(ControlFlow::Continue(()))
    })?;

    for (due_time, key) in processed {
        match queue.dequeue(due_time, &key.owner, key.id) {
            Ok(_) => {}
            Err(e) => {
                result.critical_failures += 1;
                ctx.record_critical(
                    &key.owner,
                    Some(key.id),
                    format!("failed to dequeue processed payout: {}", e),
                );
            }
        }
    }

    Ok(result)
}

fn process_one<T, L, P>(
    request_id: u64,
    request: &T,
    ctx: &mut PayoutContext<'_, L, P>,
    result: &mut PayoutProcessingResult,
) where
    T: PayoutRequest,
    L: BankLedger,
    P: PriceSource,
{
    result.attempted += 1;
    let vault = request.vault_address().to_string();

    if let Err(e) = ctx.vaults.get_vault(&vault) {
        warn!(vault = %vault, request_id, error = %e, "skipping payout for missing vault");
        result.skipped += 1;
        return;
    }

    let err = match request.settle(request_id, ctx) {
        Ok(event) => {
            ctx.events.log(event);
            result.settled += 1;
            return;
        }
        Err(e) => e,
    };

    if err.is_critical() {
        result.critical_failures += 1;
        ctx.record_critical(&vault, Some(request_id), err.to_string());
        return;
    }

    let reason = RefundReason::from(&err);
    warn!(
        vault = %vault,
        request_id,
        owner = request.owner(),
        reason = %reason,
        error = %err,
        "payout failed; refunding"
    );
    match request.refund(request_id, reason, ctx) {
        Ok(event) => {
            ctx.events.log(event);
            result.refunded += 1;
        }
        Err(refund_err) => {
            result.critical_failures += 1;
            ctx.record_critical(
                &vault,
                Some(request_id),
                format!(
                    "refund failed after settlement error ({}): {}",
                    err, refund_err
                ),
            );
        }
    }
}
