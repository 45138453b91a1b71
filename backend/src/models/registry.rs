//! Vault registry
//!
//! Entity persistence for the engine. Accounts are stored as a tagged
//! variant so that looking up a plain account where a vault is expected is a
//! typed error rather than a failed downcast.

use crate::models::vault::Vault;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Account {0} is not a vault")]
    NotAVault(String),
}

/// A stored account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Account {
    Vault(Vault),
    Base { address: String },
}

impl Account {
    pub fn address(&self) -> &str {
        match self {
            Account::Vault(vault) => &vault.address,
            Account::Base { address } => address,
        }
    }
}

/// Address-keyed account store with deterministic iteration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultRegistry {
    accounts: BTreeMap<String, Account>,
}

impl VaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a vault by address
    ///
    /// # Example
    /// ```
    /// use vault_engine_core_rs::models::registry::{RegistryError, VaultRegistry};
    /// use vault_engine_core_rs::models::vault::Vault;
    ///
    /// let mut registry = VaultRegistry::new();
    /// registry.set_vault(Vault::new("v1", "vshare", "uusd", "p1"));
    /// registry.set_base_account("alice");
    ///
    /// assert!(registry.get_vault("v1").is_ok());
    /// assert_eq!(
    ///     registry.get_vault("alice"),
    ///     Err(RegistryError::NotAVault("alice".to_string()))
    /// );
    /// ```
    pub fn get_vault(&self, address: &str) -> Result<&Vault, RegistryError> {
        match self.accounts.get(address) {
            Some(Account::Vault(vault)) => Ok(vault),
            Some(Account::Base { .. }) => Err(RegistryError::NotAVault(address.to_string())),
            None => Err(RegistryError::NotFound(address.to_string())),
        }
    }

    pub fn get_vault_mut(&mut self, address: &str) -> Result<&mut Vault, RegistryError> {
        match self.accounts.get_mut(address) {
            Some(Account::Vault(vault)) => Ok(vault),
            Some(Account::Base { .. }) => Err(RegistryError::NotAVault(address.to_string())),
            None => Err(RegistryError::NotFound(address.to_string())),
        }
    }

    /// Insert or replace a vault
    pub fn set_vault(&mut self, vault: Vault) {
        self.accounts
            .insert(vault.address.clone(), Account::Vault(vault));
    }

    /// Register a plain (non-vault) account
    pub fn set_base_account(&mut self, address: impl Into<String>) {
        let address = address.into();
        self.accounts
            .insert(address.clone(), Account::Base { address });
    }

    /// Insert an account of either kind, returning any it replaced
    pub fn insert(&mut self, account: Account) -> Option<Account> {
        self.accounts.insert(account.address().to_string(), account)
    }

    /// All accounts in address order
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn remove(&mut self, address: &str) -> Option<Account> {
        self.accounts.remove(address)
    }

    /// All vaults in address order
    pub fn vaults(&self) -> impl Iterator<Item = &Vault> {
        self.accounts.values().filter_map(|account| match account {
            Account::Vault(vault) => Some(vault),
            Account::Base { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
