//! Event classification for the reducer.
//!
//! Incoming events are dispatched in two stages. The first stage classifies an event by
//! its emitting contract (stake token, vault, or anything else); the second stage — the
//! generic name switch in the reducer — only runs when the first stage declines to handle
//! the event. Keeping the classification explicit makes the one intentional fallthrough
//! visible: a vault event for a token other than the watched request token is classified
//! as `Vault { token_matches: false }` and then evaluated against the generic switch,
//! where it matches nothing and leaves the state unchanged.

use crate::chain::{Address, ChainEvent};

/// Stake token `Transfer` events drive the total supply refresh.
pub const TRANSFER_EVENT: &str = "Transfer";
/// Appends a new proposal.
pub const PROPOSAL_ADDED_EVENT: &str = "ProposalAdded";
/// Appends a conviction stake entry.
pub const STAKE_CHANGED_EVENT: &str = "StakeChanged";
/// Flags an existing proposal as executed.
pub const PROPOSAL_EXECUTED_EVENT: &str = "ProposalExecuted";
/// Synthetic marker emitted by the store when a sync pass begins.
pub const SYNC_STARTED_EVENT: &str = "SyncStarted";
/// Synthetic marker emitted by the store once the scan reaches the chain head.
pub const SYNC_CAUGHT_UP_EVENT: &str = "SyncCaughtUp";

/// The contract addresses events are classified against.
#[derive(Debug, Clone)]
pub struct WatchedContracts {
    pub stake_token: Address,
    pub vault: Address,
    pub request_token: Address,
}

/// Where an event came from, as far as dispatch is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOrigin {
    /// Emitted by the watched stake token contract.
    StakeToken,
    /// Emitted by the watched vault. `token_matches` is true when the event's `token`
    /// parameter is the watched request token.
    Vault { token_matches: bool },
    /// Emitted by any other contract (including the app itself).
    Other,
}

/// Classify an event by its emitting contract.
pub fn classify(event: &ChainEvent, watched: &WatchedContracts) -> EventOrigin {
    if event.address == watched.stake_token {
        return EventOrigin::StakeToken;
    }

    if event.address == watched.vault {
        let token_matches = event
            .string_value("token")
            .map(|token| Address::new(&token) == watched.request_token)
            .unwrap_or(false);
        return EventOrigin::Vault { token_matches };
    }

    EventOrigin::Other
}

/// Build a synthetic sync marker event for the reducer.
///
/// Markers carry no return values and no emitting contract; they exist so that the sync
/// flag transitions flow through the same reduction path as chain events.
pub fn sync_marker(name: &str, block_number: u64) -> ChainEvent {
    ChainEvent {
        event: name.to_string(),
        return_values: Default::default(),
        block_number,
        address: Address::default(),
    }
}
