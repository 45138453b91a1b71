//! Domain models for the vault engine

pub mod coin;
pub mod event;
pub mod payout;
pub mod registry;
pub mod vault;

// Re-exports
pub use coin::{Amount, Coin};
pub use event::{Event, EventLog};
pub use payout::{PendingSwapOut, PendingWithdrawal, RefundReason};
pub use registry::{Account, RegistryError, VaultRegistry};
pub use vault::{PausedValuation, Vault, VaultAccount, VaultError};
