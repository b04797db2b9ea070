//! Seed state construction.
//!
//! The initializer produces the state the reducer starts folding from, merging a
//! previously cached state with freshly resolved global parameters and token settings.
//! Cached values are reused where the cache says they are complete; the request token is
//! always resolved fresh.

use crate::chain::{Address, ContractHandle};
use crate::store::resolvers::{InstanceIdentity, TokenSettingsResolver, VaultBalanceResolver};
use crate::store::state::{AppState, GlobalParams, RequestTokenSettings, StakeToken};
use crate::store::SyncError;
use std::sync::Arc;
use tracing::debug;

/// Builds the seed `AppState` for a sync run.
pub struct StateInitializer {
    app: ContractHandle,
    stake_token: ContractHandle,
    vault: ContractHandle,
    request_token: Address,
    settings: Arc<dyn TokenSettingsResolver>,
    balances: Arc<dyn VaultBalanceResolver>,
    identity: Arc<dyn InstanceIdentity>,
}

impl StateInitializer {
    pub fn new(
        app: ContractHandle,
        stake_token: ContractHandle,
        vault: ContractHandle,
        request_token: Address,
        settings: Arc<dyn TokenSettingsResolver>,
        balances: Arc<dyn VaultBalanceResolver>,
        identity: Arc<dyn InstanceIdentity>,
    ) -> Self {
        Self {
            app,
            stake_token,
            vault,
            request_token,
            settings,
            balances,
            identity,
        }
    }

    /// Produce the seed state, merging the cache where it is trustworthy.
    ///
    /// Cached proposals and stakes always survive; global params are reused verbatim when
    /// a cache exists; stake token settings are reused when the resolver's presence
    /// predicate accepts the cache. The request token is re-resolved unconditionally, and
    /// `is_syncing` is forced on regardless of what the cache contained.
    pub async fn initial_state(&self, cached: Option<AppState>) -> Result<AppState, SyncError> {
        let global_params = match cached.as_ref() {
            Some(state) => state.global_params.clone(),
            None => self.fetch_global_params().await?,
        };

        let stake_token = if self.settings.has_loaded_token_settings(cached.as_ref()) {
            debug!("Reusing cached stake token settings");
            cached
                .as_ref()
                .map(|state| state.stake_token.clone())
                .unwrap_or_default()
        } else {
            let settings = self.settings.load_token_settings(&self.stake_token).await?;
            let supply = self.stake_token.call("totalSupply").await?;
            StakeToken::from_settings(settings, supply.parse().unwrap_or_default())
        };

        let records = self
            .balances
            .update_balances(&[], &self.request_token, &self.vault)
            .await?;
        let record = records
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::MissingBalance(self.request_token.clone()))?;
        let request_token = RequestTokenSettings::from_record(record, self.request_token.clone());

        self.identity
            .identify(&format!("{} ({})", stake_token.symbol, request_token.symbol));

        let mut state = cached.unwrap_or_default();
        state.global_params = global_params;
        state.stake_token = stake_token;
        state.request_token = request_token;
        state.is_syncing = true;
        Ok(state)
    }

    async fn fetch_global_params(&self) -> Result<GlobalParams, SyncError> {
        let (decay, max_ratio, weight) = futures::future::try_join3(
            self.app.call("decay"),
            self.app.call("maxRatio"),
            self.app.call("weight"),
        )
        .await?;

        Ok(GlobalParams::from_raw(
            decay.parse().unwrap_or_default(),
            max_ratio.parse().unwrap_or_default(),
            weight.parse().unwrap_or_default(),
        ))
    }
}
