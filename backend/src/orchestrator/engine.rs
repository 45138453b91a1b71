//! Orchestrator Engine
//!
//! Drives the vault engine through discrete processing ticks, integrating:
//! - Interest reconciliation (due period timeouts)
//! - Verification scheduling (can reserves fund another window?)
//! - Payout processing (pending withdrawals and swap-outs)
//! - Event logging (complete audit trail)
//!
//! # Architecture
//!
//! ```text
//! tick(now):
//! 1. Advance the clock (rejects timestamps that move backwards)
//! 2. on_tick_start(now)
//!    - for each due period timeout: reconcile interest, move the vault
//!      to AwaitingVerification
//! 3. on_tick_end(now)
//!    - for each vault awaiting verification: disable interest if reserves
//!      cannot fund a window, then schedule the next timeout
//!    - process due withdrawals (capped by config)
//!    - process due swap-outs (capped by config)
//! ```
//!
//! # Example
//!
//! ```rust
//! use vault_engine_core_rs::ledger::InMemoryLedger;
//! use vault_engine_core_rs::models::vault::Vault;
//! use vault_engine_core_rs::orchestrator::{Engine, EngineConfig};
//! use vault_engine_core_rs::valuation::PriceTable;
//!
//! let mut engine = Engine::new(EngineConfig::default(), InMemoryLedger::new(), PriceTable::new()).unwrap();
//! engine.register_vault(Vault::new("vault1", "vshare", "uusd", "vault1-principal")).unwrap();
//!
//! let result = engine.tick(1_700_000_000).unwrap();
//! assert_eq!(result.height, 1);
//! assert_eq!(result.scheduled, 1);
//! ```

use crate::core::time::{TimeError, TimeManager, SECONDS_PER_HOUR};
use crate::interest::InterestError;
use crate::ledger::{BankLedger, LedgerError};
use crate::models::coin::{Amount, Coin};
use crate::models::event::{Event, EventLog};
use crate::models::payout::{PendingSwapOut, PendingWithdrawal};
use crate::models::registry::{Account, RegistryError, VaultRegistry};
use crate::models::vault::{Vault, VaultError};
use crate::orchestrator::checkpoint::{compute_config_hash, validate_snapshot, EngineSnapshot};
use crate::queue::{IndexedDueQueue, QueueError, SwapOutQueue, WithdrawalQueue};
use crate::reconcile::{
    can_payout, estimate_vault_total_assets, reconcile_vault_interest, withdrawal_escrow,
    PeriodStateError, PeriodStateMachine, ReconcileError,
};
use crate::settlement::{process_due_payouts, PayoutContext, PayoutProcessingResult};
use crate::valuation::{PriceSource, ValuationEngine, ValuationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

// ============================================================================
// Configuration Types
// ============================================================================

/// Default time between a vault's verification and its next reconciliation
pub const AUTO_RECONCILE_TIMEOUT: i64 = 20 * SECONDS_PER_HOUR;

/// Default maximum swap-outs processed per tick
pub const DEFAULT_SWAP_OUT_BATCH_SIZE: usize = 100;

/// Engine configuration
///
/// # Fields
///
/// * `reconciliation_window` - Seconds from verification to the next period timeout
/// * `swap_out_batch_size` - Maximum swap-outs attempted per tick
/// * `withdrawal_batch_size` - Maximum withdrawals attempted per tick (`None` = uncapped)
/// * `peg_denom` - Denom valued 1:1 against every underlying asset
/// * `auto_pause_on_critical` - Pause a vault when a critical failure hits it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub reconciliation_window: i64,
    pub swap_out_batch_size: usize,
    pub withdrawal_batch_size: Option<usize>,
    pub peg_denom: Option<String>,
    pub auto_pause_on_critical: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconciliation_window: AUTO_RECONCILE_TIMEOUT,
            swap_out_batch_size: DEFAULT_SWAP_OUT_BATCH_SIZE,
            withdrawal_batch_size: None,
            peg_denom: None,
            auto_pause_on_critical: true,
        }
    }
}

impl EngineConfig {
    /// Check every field is usable
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.reconciliation_window <= 0 {
            return Err(EngineError::InvalidConfig(format!(
                "reconciliation_window must be positive, got {}",
                self.reconciliation_window
            )));
        }
        if self.swap_out_batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "swap_out_batch_size must be positive".to_string(),
            ));
        }
        if self.withdrawal_batch_size == Some(0) {
            return Err(EngineError::InvalidConfig(
                "withdrawal_batch_size must be positive when set".to_string(),
            ));
        }
        if self.peg_denom.as_deref() == Some("") {
            return Err(EngineError::InvalidConfig(
                "peg_denom cannot be empty when set".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Results and Errors
// ============================================================================

/// Result of a single tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickResult {
    /// Tick height after this tick
    pub height: u64,

    /// Tick timestamp
    pub time: i64,

    /// Vaults whose period timeout came due
    pub timeouts_processed: usize,

    /// Reconciliations that failed (logged; vault still moves to verification)
    pub reconcile_failures: usize,

    /// Vaults moved from verification to a scheduled timeout
    pub scheduled: usize,

    /// Vaults whose interest rate was set to zero
    pub interest_disabled: usize,

    pub withdrawals: PayoutProcessingResult,

    pub swap_outs: PayoutProcessingResult,
}

/// Engine error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Clock error: {0}")]
    Time(#[from] TimeError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Vault already registered: {0}")]
    VaultExists(String),

    #[error("Vault {0} is paused")]
    VaultPaused(String),

    #[error("Vault {0} is not paused")]
    VaultNotPaused(String),

    #[error("Vault {vault} does not accept {denom}")]
    UnsupportedDenom { vault: String, denom: String },

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Period state error: {0}")]
    PeriodState(#[from] PeriodStateError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Valuation error: {0}")]
    Valuation(#[from] ValuationError),

    #[error("Interest error: {0}")]
    Interest(#[from] InterestError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("State validation error: {0}")]
    StateValidation(String),

    #[error("Config mismatch: expected hash {expected}, found {found}")]
    ConfigMismatch { expected: String, found: String },
}

// ============================================================================
// Engine
// ============================================================================

/// Deterministic vault accounting and scheduling engine
pub struct Engine<L: BankLedger, P: PriceSource> {
    config: EngineConfig,
    config_hash: String,
    time: TimeManager,
    ledger: L,
    prices: P,
    vaults: VaultRegistry,
    periods: PeriodStateMachine,
    pending_withdrawals: WithdrawalQueue,
    pending_swap_outs: SwapOutQueue,
    valuation: ValuationEngine,
    event_log: EventLog,
}

impl<L: BankLedger, P: PriceSource> Engine<L, P> {
    /// Create an engine with an empty registry and queues
    pub fn new(config: EngineConfig, ledger: L, prices: P) -> Result<Self, EngineError> {
        config.validate()?;
        let config_hash = compute_config_hash(&config)?;
        Ok(Self {
            periods: PeriodStateMachine::new(config.reconciliation_window),
            valuation: ValuationEngine::new(config.peg_denom.clone()),
            config,
            config_hash,
            time: TimeManager::new(),
            ledger,
            prices,
            vaults: VaultRegistry::new(),
            pending_withdrawals: IndexedDueQueue::new(),
            pending_swap_outs: IndexedDueQueue::new(),
            event_log: EventLog::new(),
        })
    }

    // ========================================================================
    // Tick Driver
    // ========================================================================

    /// Run one full tick at `now`
    pub fn tick(&mut self, now: i64) -> Result<TickResult, EngineError> {
        self.time.advance_to(now)?;

        let mut result = TickResult {
            height: self.time.current_height(),
            time: now,
            ..Default::default()
        };
        self.on_tick_start(now, &mut result)?;
        self.on_tick_end(now, &mut result)?;

        debug!(
            height = result.height,
            time = now,
            timeouts = result.timeouts_processed,
            scheduled = result.scheduled,
            withdrawals = result.withdrawals.attempted,
            swap_outs = result.swap_outs.attempted,
            "tick complete"
        );
        Ok(result)
    }

    /// Reconcile every vault whose period timeout is due
    fn on_tick_start(&mut self, now: i64, result: &mut TickResult) -> Result<(), EngineError> {
        for (_, address) in self.periods.due_timeouts(now) {
            result.timeouts_processed += 1;

            let vault = match self.vaults.get_vault(&address) {
                Ok(vault) => vault,
                Err(e) => {
                    warn!(vault = %address, error = %e, "dropping period timeout for missing vault");
                    self.periods.remove_vault(&address);
                    continue;
                }
            };

            let reconciled = withdrawal_escrow(&self.pending_withdrawals, vault).and_then(
                |escrowed| {
                    reconcile_vault_interest(&mut self.ledger, vault, escrowed, &mut self.event_log, now)
                },
            );
            if let Err(e) = reconciled {
                result.reconcile_failures += 1;
                error!(vault = %address, error = %e, "failed to reconcile interest");
            }

            let vault = self.vaults.get_vault_mut(&address)?;
            self.periods.to_verification(vault, now)?;
        }
        Ok(())
    }

    /// Schedule verified vaults, then process due payouts
    fn on_tick_end(&mut self, now: i64, result: &mut TickResult) -> Result<(), EngineError> {
        let window = self.config.reconciliation_window;

        for address in self.periods.awaiting_verification() {
            let vault = match self.vaults.get_vault(&address) {
                Ok(vault) => vault,
                Err(e) => {
                    warn!(vault = %address, error = %e, "dropping verification for missing vault");
                    self.periods.remove_vault(&address);
                    continue;
                }
            };

            let payable = match withdrawal_escrow(&self.pending_withdrawals, vault)
                .and_then(|escrowed| can_payout(&self.ledger, vault, escrowed, window))
            {
                Ok(payable) => payable,
                Err(e) => {
                    error!(vault = %address, error = %e, "failed to check if vault can payout");
                    continue;
                }
            };

            let vault = self.vaults.get_vault_mut(&address)?;
            if !payable {
                let previous_rate = std::mem::replace(&mut vault.current_interest_rate, "0".to_string());
                info!(vault = %address, previous_rate = %previous_rate, "reserves exhausted; interest disabled");
                self.event_log.log(Event::InterestDisabled {
                    time: now,
                    vault: address.clone(),
                    previous_rate,
                });
                result.interest_disabled += 1;
            }
            self.periods.to_timeout_scheduled(vault, now)?;
            result.scheduled += 1;
        }

        let mut ctx = PayoutContext {
            ledger: &mut self.ledger,
            prices: &self.prices,
            vaults: &mut self.vaults,
            valuation: &self.valuation,
            events: &mut self.event_log,
            now,
            auto_pause: self.config.auto_pause_on_critical,
        };
        result.withdrawals = process_due_payouts(
            &mut self.pending_withdrawals,
            &mut ctx,
            self.config.withdrawal_batch_size,
        )?;
        result.swap_outs = process_due_payouts(
            &mut self.pending_swap_outs,
            &mut ctx,
            Some(self.config.swap_out_batch_size),
        )?;
        Ok(())
    }

    // ========================================================================
    // Vault Lifecycle
    // ========================================================================

    /// Validate and register `vault`, starting its first period in verification
    pub fn register_vault(&mut self, mut vault: Vault) -> Result<(), EngineError> {
        vault.validate()?;
        if self.vaults.contains(&vault.address) {
            return Err(EngineError::VaultExists(vault.address));
        }
        self.periods
            .to_verification(&mut vault, self.time.current_time())?;
        info!(vault = %vault.address, "vault registered");
        self.vaults.set_vault(vault);
        Ok(())
    }

    /// Register a plain account (a non-vault address)
    pub fn register_account(&mut self, address: impl Into<String>) {
        self.vaults.set_base_account(address);
    }

    /// Remove a vault and purge it from every queue
    ///
    /// Returns the number of pending payouts dropped. Escrowed balances stay
    /// where they are.
    pub fn remove_vault(&mut self, address: &str) -> Result<usize, EngineError> {
        self.vaults.get_vault(address)?;
        self.periods.remove_vault(address);
        let dropped = self.pending_withdrawals.remove_all_for_owner(address)
            + self.pending_swap_outs.remove_all_for_owner(address);
        self.vaults.remove(address);
        info!(vault = %address, dropped, "vault removed");
        Ok(dropped)
    }

    /// Pause `vault`, freezing its valuation at the current live value
    pub fn pause_vault(&mut self, address: &str, reason: &str) -> Result<(), EngineError> {
        let vault = self.vaults.get_vault(address)?;
        if vault.paused {
            return Err(EngineError::VaultPaused(address.to_string()));
        }
        let snapshot = self.valuation.snapshot(&self.ledger, &self.prices, vault)?;
        self.vaults.get_vault_mut(address)?.pause(reason, snapshot);
        self.event_log.log(Event::VaultPaused {
            time: self.time.current_time(),
            vault: address.to_string(),
            reason: reason.to_string(),
            total_value: snapshot.total_value,
            nav_per_share: snapshot.nav_per_share,
        });
        Ok(())
    }

    /// Resume a paused vault; valuation reads live balances again
    pub fn unpause_vault(&mut self, address: &str) -> Result<(), EngineError> {
        let vault = self.vaults.get_vault_mut(address)?;
        if !vault.paused {
            return Err(EngineError::VaultNotPaused(address.to_string()));
        }
        vault.unpause();
        info!(vault = %address, "vault unpaused");
        self.event_log.log(Event::VaultUnpaused {
            time: self.time.current_time(),
            vault: address.to_string(),
        });
        Ok(())
    }

    // ========================================================================
    // Payout Requests
    // ========================================================================

    /// Escrow `shares` from `owner` and queue a swap-out due at `due_time`
    ///
    /// The payout in `redeem_denom` is priced when the request is processed.
    pub fn enqueue_swap_out(
        &mut self,
        owner: &str,
        vault_address: &str,
        shares: Coin,
        redeem_denom: &str,
        due_time: i64,
    ) -> Result<u64, EngineError> {
        if due_time < 0 {
            return Err(QueueError::NegativeDueTime(due_time).into());
        }
        let vault = self.active_vault(vault_address)?;
        if shares.denom != vault.share_denom {
            return Err(EngineError::UnsupportedDenom {
                vault: vault_address.to_string(),
                denom: shares.denom,
            });
        }
        if !vault.accepts_denom(redeem_denom) {
            return Err(EngineError::UnsupportedDenom {
                vault: vault_address.to_string(),
                denom: redeem_denom.to_string(),
            });
        }
        if !shares.is_positive() {
            return Err(EngineError::NonPositiveAmount(shares.amount));
        }

        self.ledger.transfer(owner, vault_address, &shares)?;
        let request = PendingSwapOut {
            owner: owner.to_string(),
            vault_address: vault_address.to_string(),
            shares: shares.clone(),
            redeem_denom: redeem_denom.to_string(),
        };
        let id = match self
            .pending_swap_outs
            .enqueue(due_time, vault_address, request)
        {
            Ok(id) => id,
            Err(e) => {
                // Undo the escrow; the request never existed
                self.ledger.transfer(vault_address, owner, &shares)?;
                return Err(e.into());
            }
        };
        self.event_log.log(Event::SwapOutRequested {
            time: self.time.current_time(),
            request_id: id,
            vault: vault_address.to_string(),
            owner: owner.to_string(),
            shares,
            redeem_denom: redeem_denom.to_string(),
            due_time,
        });
        Ok(id)
    }

    /// Escrow `assets` from principal and queue a withdrawal to `owner`
    pub fn enqueue_withdrawal(
        &mut self,
        owner: &str,
        vault_address: &str,
        assets: Coin,
        due_time: i64,
    ) -> Result<u64, EngineError> {
        if due_time < 0 {
            return Err(QueueError::NegativeDueTime(due_time).into());
        }
        let vault = self.active_vault(vault_address)?;
        if !vault.accepts_denom(&assets.denom) {
            return Err(EngineError::UnsupportedDenom {
                vault: vault_address.to_string(),
                denom: assets.denom,
            });
        }
        if !assets.is_positive() {
            return Err(EngineError::NonPositiveAmount(assets.amount));
        }
        let principal = vault.principal_address.clone();

        self.ledger.transfer(&principal, vault_address, &assets)?;
        let request = PendingWithdrawal {
            owner: owner.to_string(),
            vault_address: vault_address.to_string(),
            assets: assets.clone(),
        };
        let id = match self
            .pending_withdrawals
            .enqueue(due_time, vault_address, request)
        {
            Ok(id) => id,
            Err(e) => {
                self.ledger.transfer(vault_address, &principal, &assets)?;
                return Err(e.into());
            }
        };
        self.event_log.log(Event::WithdrawalRequested {
            time: self.time.current_time(),
            request_id: id,
            vault: vault_address.to_string(),
            owner: owner.to_string(),
            assets,
            due_time,
        });
        Ok(id)
    }

    /// Make swap-out `id` due immediately
    pub fn expedite_swap_out(&mut self, id: u64) -> Result<(), EngineError> {
        let previous = self.pending_swap_outs.expedite(id)?;
        info!(request_id = id, previous_due = previous, "swap-out expedited");
        let vault = self.pending_swap_outs.get_by_id(id).map(|(_, owner, _)| owner.to_string());
        self.log_expedited(id, vault, previous);
        Ok(())
    }

    /// Make withdrawal `id` due immediately
    pub fn expedite_withdrawal(&mut self, id: u64) -> Result<(), EngineError> {
        let previous = self.pending_withdrawals.expedite(id)?;
        info!(request_id = id, previous_due = previous, "withdrawal expedited");
        let vault = self.pending_withdrawals.get_by_id(id).map(|(_, owner, _)| owner.to_string());
        self.log_expedited(id, vault, previous);
        Ok(())
    }

    fn log_expedited(&mut self, request_id: u64, vault: Option<String>, previous_due_time: i64) {
        if let Some(vault) = vault {
            self.event_log.log(Event::PayoutExpedited {
                time: self.time.current_time(),
                request_id,
                vault,
                previous_due_time,
            });
        }
    }

    fn active_vault(&self, address: &str) -> Result<&Vault, EngineError> {
        let vault = self.vaults.get_vault(address)?;
        if vault.paused {
            return Err(EngineError::VaultPaused(address.to_string()));
        }
        Ok(vault)
    }

    // ========================================================================
    // Valuation Queries
    // ========================================================================

    pub fn total_vault_value(&self, address: &str) -> Result<Amount, EngineError> {
        let vault = self.vaults.get_vault(address)?;
        Ok(self
            .valuation
            .total_vault_value(&self.ledger, &self.prices, vault)?)
    }

    pub fn nav_per_share(&self, address: &str) -> Result<Amount, EngineError> {
        let vault = self.vaults.get_vault(address)?;
        Ok(self
            .valuation
            .nav_per_share(&self.ledger, &self.prices, vault)?)
    }

    /// Shares a deposit of `coin` would mint right now
    pub fn preview_deposit(&self, address: &str, coin: &Coin) -> Result<Coin, EngineError> {
        let vault = self.vaults.get_vault(address)?;
        Ok(self
            .valuation
            .deposit_to_shares(&self.ledger, &self.prices, vault, coin)?)
    }

    /// Payout a redemption of `shares` would yield right now
    pub fn preview_redeem(
        &self,
        address: &str,
        shares: Amount,
        redeem_denom: &str,
    ) -> Result<Coin, EngineError> {
        let vault = self.vaults.get_vault(address)?;
        Ok(self.valuation.shares_to_redeem(
            &self.ledger,
            &self.prices,
            vault,
            shares,
            redeem_denom,
        )?)
    }

    /// Total vault value plus interest accrued since the period start
    pub fn estimate_vault_total_assets(&self, address: &str) -> Result<Amount, EngineError> {
        let vault = self.vaults.get_vault(address)?;
        let total = self
            .valuation
            .total_vault_value(&self.ledger, &self.prices, vault)?;
        let total_assets = Coin::new(vault.underlying_asset.clone(), total);
        Ok(estimate_vault_total_assets(
            vault,
            &total_assets,
            self.time.current_time(),
        )?)
    }

    // ========================================================================
    // Checkpoint
    // ========================================================================

    /// Export engine-owned state
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            current_height: self.time.current_height(),
            current_time: self.time.current_time(),
            accounts: self.vaults.accounts().cloned().collect(),
            periods: self.periods.export(),
            pending_swap_outs: self.pending_swap_outs.export(),
            pending_withdrawals: self.pending_withdrawals.export(),
            config_hash: self.config_hash.clone(),
        }
    }

    /// Rebuild an engine from a validated snapshot
    pub fn restore(
        config: EngineConfig,
        ledger: L,
        prices: P,
        snapshot: EngineSnapshot,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(config, ledger, prices)?;
        validate_snapshot(&snapshot, &engine.config_hash)?;

        engine.time = TimeManager::from_parts(snapshot.current_height, snapshot.current_time);
        for account in snapshot.accounts {
            if let Account::Vault(vault) = &account {
                vault.validate()?;
            }
            engine.vaults.insert(account);
        }
        engine.periods =
            PeriodStateMachine::import(engine.config.reconciliation_window, snapshot.periods)?;
        engine.pending_swap_outs = IndexedDueQueue::import(snapshot.pending_swap_outs)?;
        engine.pending_withdrawals = IndexedDueQueue::import(snapshot.pending_withdrawals)?;

        info!(
            height = snapshot.current_height,
            vaults = engine.vaults.vaults().count(),
            "engine restored from checkpoint"
        );
        Ok(engine)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn current_time(&self) -> i64 {
        self.time.current_time()
    }

    pub fn current_height(&self) -> u64 {
        self.time.current_height()
    }

    pub fn vault(&self, address: &str) -> Result<&Vault, EngineError> {
        Ok(self.vaults.get_vault(address)?)
    }

    pub fn vaults(&self) -> &VaultRegistry {
        &self.vaults
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn prices(&self) -> &P {
        &self.prices
    }

    pub fn prices_mut(&mut self) -> &mut P {
        &mut self.prices
    }

    pub fn periods(&self) -> &PeriodStateMachine {
        &self.periods
    }

    pub fn pending_swap_outs(&self) -> &SwapOutQueue {
        &self.pending_swap_outs
    }

    pub fn pending_withdrawals(&self) -> &WithdrawalQueue {
        &self.pending_withdrawals
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }
}
