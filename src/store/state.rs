//! Application state for the conviction voting sync layer.
//!
//! `AppState` is the single aggregate the reducer folds events into. It is serializable
//! because it round-trips through the state cache across restarts. Token amounts are
//! `u128` and serialize as decimal strings, since JSON numbers cannot carry full
//! 256-bit-token magnitudes.

use crate::chain::Address;
use serde::{Deserialize, Serialize};

/// Governance parameters of the conviction voting app.
///
/// Derived once from the three raw contract values and immutable afterwards; cached
/// across restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalParams {
    pub alpha: f64,
    pub max_ratio: f64,
    pub weight: f64,
}

impl GlobalParams {
    /// Scale the raw integer contract values into their decimal form.
    pub fn from_raw(decay: u128, max_ratio: u128, weight: u128) -> Self {
        Self {
            alpha: decay as f64 / 10.0,
            max_ratio: max_ratio as f64 / 10.0,
            weight: weight as f64 / 100.0,
        }
    }
}

/// Descriptive metadata for a token contract, resolved once and cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSettings {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
}

/// The stake token: its settings plus the live total supply.
///
/// The supply is refreshed whenever the stake token emits a `Transfer`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeToken {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    #[serde(with = "amount")]
    pub token_supply: u128,
}

impl StakeToken {
    pub fn from_settings(settings: TokenSettings, token_supply: u128) -> Self {
        Self {
            name: settings.name,
            symbol: settings.symbol,
            decimals: settings.decimals,
            token_supply,
        }
    }
}

/// One vault balance entry produced by the vault balance resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRecord {
    pub token: Address,
    pub symbol: String,
    pub decimals: u32,
    #[serde(with = "amount")]
    pub balance: u128,
}

/// The request token: the vault's balance entry merged with the token address.
///
/// Re-derived on every relevant vault event and never trusted from the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTokenSettings {
    pub symbol: String,
    pub decimals: u32,
    #[serde(with = "amount")]
    pub balance: u128,
    pub address: Address,
}

impl RequestTokenSettings {
    pub fn from_record(record: BalanceRecord, address: Address) -> Self {
        Self {
            symbol: record.symbol,
            decimals: record.decimals,
            balance: record.balance,
            address,
        }
    }
}

/// A funding proposal. Created on `ProposalAdded`, flagged on `ProposalExecuted`,
/// never deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: u64,
    pub name: String,
    pub link: Option<String>,
    #[serde(with = "amount")]
    pub requested_amount: u128,
    pub creator: Address,
    pub beneficiary: Address,
    #[serde(default)]
    pub executed: bool,
}

/// One stake movement on a proposal at a point in time. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvictionStake {
    pub entity: Address,
    pub proposal: u64,
    #[serde(with = "amount")]
    pub tokens_staked: u128,
    #[serde(with = "amount")]
    pub total_tokens_staked: u128,
    /// Block number of the stake change.
    pub time: u64,
    #[serde(with = "amount")]
    pub conviction: u128,
}

/// The aggregate root folded by the reducer and published after every step.
///
/// Always fully formed: every reduction returns a complete value, and unhandled events
/// hand the input state back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    #[serde(default)]
    pub conviction_stakes: Vec<ConvictionStake>,
    pub global_params: GlobalParams,
    pub stake_token: StakeToken,
    pub request_token: RequestTokenSettings,
    #[serde(default)]
    pub is_syncing: bool,
}

/// Serde adapter rendering `u128` amounts as decimal strings on the wire.
mod amount {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a decimal string or integer amount")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<u128, E> {
                value.parse().map_err(de::Error::custom)
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<u128, E> {
                Ok(value as u128)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
