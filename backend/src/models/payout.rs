//! Pending payout payloads
//!
//! Both payloads are stored in sequence-indexed due queues keyed by
//! `(due_time, id, vault_address)`. The queue key carries the identity; the
//! payload only carries what settlement needs.

use crate::models::coin::Coin;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A redemption of shares for a payout denomination
///
/// `shares` were escrowed into the vault account when the request was
/// accepted. The payout amount is computed when the request is processed,
/// from the vault's valuation at that moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSwapOut {
    pub owner: String,
    pub vault_address: String,
    pub shares: Coin,
    pub redeem_denom: String,
}

/// A withdrawal of an asset amount already fixed at request time
///
/// `assets` were moved from the principal account into the vault account
/// when the request was accepted. Settlement releases them to the owner; a
/// refund returns them to principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWithdrawal {
    pub owner: String,
    pub vault_address: String,
    pub assets: Coin,
}

/// Why a pending payout was refunded instead of settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefundReason {
    InsufficientFunds,
    PermissionDenied,
    VaultPaused,
    PricingUnavailable,
    Unknown,
}

impl RefundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundReason::InsufficientFunds => "insufficient_funds",
            RefundReason::PermissionDenied => "permission_denied",
            RefundReason::VaultPaused => "vault_paused",
            RefundReason::PricingUnavailable => "pricing_unavailable",
            RefundReason::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RefundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
