//! Resolver collaborators for token metadata and vault balances.
//!
//! The initializer and reducer only depend on the traits here; the concrete
//! implementations read through the contract handles. Tests substitute their own
//! implementations.

use crate::chain::{AbiDescriptor, Address, ChainReader, ContractHandle};
use crate::store::state::{AppState, BalanceRecord, TokenSettings};
use crate::store::SyncError;
use std::sync::Arc;
use tracing::info;

/// Loads descriptive token metadata, with a cache-presence check.
#[async_trait::async_trait]
pub trait TokenSettingsResolver: Send + Sync {
    /// Fetch the token's settings from its contract.
    async fn load_token_settings(&self, token: &ContractHandle)
    -> Result<TokenSettings, SyncError>;

    /// Whether a previously cached state already carries loaded token settings, making
    /// the fetch unnecessary.
    fn has_loaded_token_settings(&self, cached: Option<&AppState>) -> bool;
}

/// Computes vault balance entries and reports the vault's initialization block.
#[async_trait::async_trait]
pub trait VaultBalanceResolver: Send + Sync {
    /// Recompute the balance entry for `token` held by the vault and merge it into
    /// `prior` (replacing an existing entry for the same token, appending otherwise).
    async fn update_balances(
        &self,
        prior: &[BalanceRecord],
        token: &Address,
        vault: &ContractHandle,
    ) -> Result<Vec<BalanceRecord>, SyncError>;

    /// The block the vault's event log starts at.
    async fn vault_initialization_block(&self, vault: &ContractHandle)
    -> Result<u64, SyncError>;
}

/// Fire-and-forget registration of a human-readable label for the running instance.
pub trait InstanceIdentity: Send + Sync {
    fn identify(&self, label: &str);
}

/// Token settings resolver backed by the standard ERC-20 getters.
pub struct Erc20SettingsResolver;

#[async_trait::async_trait]
impl TokenSettingsResolver for Erc20SettingsResolver {
    async fn load_token_settings(
        &self,
        token: &ContractHandle,
    ) -> Result<TokenSettings, SyncError> {
        let (name, symbol, decimals) = futures::future::try_join3(
            token.call("name"),
            token.call("symbol"),
            token.call("decimals"),
        )
        .await?;

        Ok(TokenSettings {
            name,
            symbol,
            decimals: decimals.parse().unwrap_or_default(),
        })
    }

    fn has_loaded_token_settings(&self, cached: Option<&AppState>) -> bool {
        cached
            .map(|state| !state.stake_token.symbol.is_empty())
            .unwrap_or(false)
    }
}

/// Vault balance resolver reading token balances through ERC-20 `balanceOf`.
pub struct VaultBalanceLoader {
    reader: Arc<dyn ChainReader>,
}

impl VaultBalanceLoader {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }
}

#[async_trait::async_trait]
impl VaultBalanceResolver for VaultBalanceLoader {
    async fn update_balances(
        &self,
        prior: &[BalanceRecord],
        token: &Address,
        vault: &ContractHandle,
    ) -> Result<Vec<BalanceRecord>, SyncError> {
        let handle = ContractHandle::new(token.clone(), AbiDescriptor::erc20(), self.reader.clone());

        let balance = handle
            .call_with("balanceOf", &[vault.address().as_str().to_string()])
            .await?;
        let (symbol, decimals) =
            futures::future::try_join(handle.call("symbol"), handle.call("decimals")).await?;

        let record = BalanceRecord {
            token: token.clone(),
            symbol,
            decimals: decimals.parse().unwrap_or_default(),
            balance: balance.parse().unwrap_or_default(),
        };

        let mut next = prior.to_vec();
        match next.iter_mut().find(|entry| entry.token == record.token) {
            Some(entry) => *entry = record,
            None => next.push(record),
        }
        Ok(next)
    }

    async fn vault_initialization_block(
        &self,
        vault: &ContractHandle,
    ) -> Result<u64, SyncError> {
        let block = vault.call("initializationBlock").await?;
        block.parse().map_err(|_| {
            SyncError::ParseError(format!(
                "vault initialization block is not a block number: {}",
                block
            ))
        })
    }
}

/// Identity sink that records the label in the log stream.
pub struct TracingIdentity;

impl InstanceIdentity for TracingIdentity {
    fn identify(&self, label: &str) {
        info!("Instance identified as {}", label);
    }
}
