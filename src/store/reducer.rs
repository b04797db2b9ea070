//! The event reducer: the state machine at the heart of the sync layer.
//!
//! Given the current state and one incoming event, the reducer produces the next state.
//! Dispatch runs in two stages: events from the watched stake token or vault are handled
//! by source first; everything the source stage declines — including vault events for
//! tokens other than the watched request token — is evaluated against the generic
//! event-name switch, where unmatched events return the input state unchanged.
//!
//! Event payloads are trusted: numeric fields are parsed base-10 and malformed values
//! degrade to zero instead of failing the fold. The only asynchronous work is the contract
//! read on the stake token supply and vault balance paths.

use crate::chain::{Address, ChainEvent, ContractHandle};
use crate::store::events::{
    classify, EventOrigin, WatchedContracts, PROPOSAL_ADDED_EVENT, PROPOSAL_EXECUTED_EVENT,
    STAKE_CHANGED_EVENT, SYNC_CAUGHT_UP_EVENT, SYNC_STARTED_EVENT, TRANSFER_EVENT,
};
use crate::store::resolvers::VaultBalanceResolver;
use crate::store::state::{AppState, ConvictionStake, Proposal, RequestTokenSettings};
use crate::store::SyncError;
use std::sync::Arc;
use tracing::debug;

/// Folds chain events into [`AppState`].
pub struct EventReducer {
    stake_token: ContractHandle,
    vault: ContractHandle,
    watched: WatchedContracts,
    balances: Arc<dyn VaultBalanceResolver>,
}

impl EventReducer {
    pub fn new(
        stake_token: ContractHandle,
        vault: ContractHandle,
        request_token: Address,
        balances: Arc<dyn VaultBalanceResolver>,
    ) -> Self {
        let watched = WatchedContracts {
            stake_token: stake_token.address().clone(),
            vault: vault.address().clone(),
            request_token,
        };
        Self {
            stake_token,
            vault,
            watched,
            balances,
        }
    }

    /// Fold one event into the state.
    ///
    /// The caller must fully await each reduction before starting the next; the reducer
    /// itself takes ownership of the state so an unhandled event hands the very same
    /// value back.
    pub async fn reduce(&self, state: AppState, event: &ChainEvent) -> Result<AppState, SyncError> {
        match classify(event, &self.watched) {
            EventOrigin::StakeToken => {
                if event.event == TRANSFER_EVENT {
                    let supply = self.stake_token.call("totalSupply").await?;
                    let mut next = state;
                    next.stake_token.token_supply = supply.parse().unwrap_or_default();
                    return Ok(next);
                }
                // Any other stake token event is irrelevant here.
                Ok(state)
            }
            EventOrigin::Vault { token_matches: true } => {
                let records = self
                    .balances
                    .update_balances(&[], &self.watched.request_token, &self.vault)
                    .await?;
                let record = records
                    .into_iter()
                    .next()
                    .ok_or_else(|| SyncError::MissingBalance(self.watched.request_token.clone()))?;
                let mut next = state;
                next.request_token =
                    RequestTokenSettings::from_record(record, self.watched.request_token.clone());
                Ok(next)
            }
            // Vault events for unrelated tokens deliberately fall through to the generic
            // switch, where they match nothing and leave the state unchanged.
            EventOrigin::Vault {
                token_matches: false,
            }
            | EventOrigin::Other => Ok(apply_named(state, event)),
        }
    }
}

/// The generic event-name switch, independent of source.
fn apply_named(state: AppState, event: &ChainEvent) -> AppState {
    match event.event.as_str() {
        PROPOSAL_ADDED_EVENT => {
            let mut next = state;
            next.proposals.push(Proposal {
                id: parse_uint(event, "id") as u64,
                name: event.string_value("title").unwrap_or_default(),
                link: decode_link(event.string_value("link")),
                requested_amount: parse_uint(event, "amount"),
                creator: address_value(event, "entity"),
                beneficiary: address_value(event, "beneficiary"),
                executed: false,
            });
            next
        }
        STAKE_CHANGED_EVENT => {
            let mut next = state;
            next.conviction_stakes.push(ConvictionStake {
                entity: address_value(event, "entity"),
                proposal: parse_uint(event, "id") as u64,
                tokens_staked: parse_uint(event, "tokensStaked"),
                total_tokens_staked: parse_uint(event, "totalTokensStaked"),
                time: event.block_number,
                conviction: parse_uint(event, "conviction"),
            });
            next
        }
        PROPOSAL_EXECUTED_EVENT => {
            // A malformed or unknown id matches nothing; the rebuilt list is then
            // identical in value, which is the intended silent ignore.
            let executed_id = event
                .string_value("id")
                .and_then(|id| id.parse::<u64>().ok());
            let mut next = state;
            next.proposals = next
                .proposals
                .into_iter()
                .map(|proposal| {
                    if Some(proposal.id) == executed_id {
                        Proposal {
                            executed: true,
                            ..proposal
                        }
                    } else {
                        proposal
                    }
                })
                .collect();
            next
        }
        SYNC_STARTED_EVENT => {
            let mut next = state;
            next.is_syncing = true;
            next
        }
        SYNC_CAUGHT_UP_EVENT => {
            let mut next = state;
            next.is_syncing = false;
            next
        }
        _ => state,
    }
}

/// Base-10 parse of a numeric event field. Malformed values degrade to zero; the event
/// source is trusted, so this is not an error.
fn parse_uint(event: &ChainEvent, key: &str) -> u128 {
    let raw = event.string_value(key).unwrap_or_default();
    raw.parse().unwrap_or_else(|_| {
        debug!(
            "Malformed numeric field {} = {:?} in {}; storing zero",
            key, raw, event.event
        );
        0
    })
}

fn address_value(event: &ChainEvent, key: &str) -> Address {
    event
        .string_value(key)
        .map(|value| Address::new(&value))
        .unwrap_or_default()
}

/// Decode the proposal link from its possibly hex-encoded byte form.
///
/// Empty links become `None`; plain text passes through untouched.
fn decode_link(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    if raw.is_empty() || raw == "0x" {
        return None;
    }

    let stripped = raw.strip_prefix("0x").unwrap_or(&raw);
    match hex::decode(stripped) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes)
                .trim_end_matches('\0')
                .to_string();
            if text.is_empty() { None } else { Some(text) }
        }
        Err(_) => Some(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{AbiDescriptor, ChainError, ChainReader};
    use crate::store::state::BalanceRecord;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedReader {
        values: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedReader {
        fn new(values: &[(&str, &str)]) -> Self {
            Self {
                values: values
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChainReader for ScriptedReader {
        async fn call(
            &self,
            _address: &Address,
            method: &str,
            _args: &[String],
        ) -> Result<String, ChainError> {
            self.calls.lock().unwrap().push(method.to_string());
            self.values.get(method).cloned().ok_or(ChainError::NoData)
        }

        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(0)
        }

        async fn fetch_events(
            &self,
            _address: &Address,
            _from_block: u64,
            _to_block: u64,
        ) -> Result<Vec<ChainEvent>, ChainError> {
            Ok(Vec::new())
        }
    }

    struct FixedBalances {
        balance: u128,
    }

    #[async_trait::async_trait]
    impl VaultBalanceResolver for FixedBalances {
        async fn update_balances(
            &self,
            _prior: &[BalanceRecord],
            token: &Address,
            _vault: &ContractHandle,
        ) -> Result<Vec<BalanceRecord>, SyncError> {
            Ok(vec![BalanceRecord {
                token: token.clone(),
                symbol: "REQ".to_string(),
                decimals: 18,
                balance: self.balance,
            }])
        }

        async fn vault_initialization_block(
            &self,
            _vault: &ContractHandle,
        ) -> Result<u64, SyncError> {
            Ok(0)
        }
    }

    fn reducer_with(reader: Arc<ScriptedReader>, balance: u128) -> EventReducer {
        EventReducer::new(
            ContractHandle::new(Address::new("0xstk"), AbiDescriptor::erc20(), reader.clone()),
            ContractHandle::new(Address::new("0xva"), AbiDescriptor::vault(), reader),
            Address::new("0xreq"),
            Arc::new(FixedBalances { balance }),
        )
    }

    fn reducer() -> EventReducer {
        reducer_with(Arc::new(ScriptedReader::new(&[])), 0)
    }

    fn event(name: &str, address: &str, block: u64, values: serde_json::Value) -> ChainEvent {
        serde_json::from_value(json!({
            "event": name,
            "returnValues": values,
            "blockNumber": block,
            "address": address,
        }))
        .expect("test event should deserialize")
    }

    #[tokio::test]
    async fn proposal_stake_execute_scenario() {
        let r = reducer();
        let state = AppState::default();

        let state = r
            .reduce(
                state,
                &event(
                    "ProposalAdded",
                    "0xapp",
                    90,
                    json!({
                        "id": "1",
                        "title": "Fund X",
                        "amount": "500",
                        "entity": "0xaaaa",
                        "beneficiary": "0xbbbb",
                        "link": "",
                    }),
                ),
            )
            .await
            .unwrap();

        assert_eq!(state.proposals.len(), 1);
        let proposal = &state.proposals[0];
        assert_eq!(proposal.id, 1);
        assert_eq!(proposal.name, "Fund X");
        assert_eq!(proposal.link, None);
        assert_eq!(proposal.requested_amount, 500);
        assert_eq!(proposal.creator, Address::new("0xaaaa"));
        assert_eq!(proposal.beneficiary, Address::new("0xbbbb"));
        assert!(!proposal.executed);

        let state = r
            .reduce(
                state,
                &event(
                    "StakeChanged",
                    "0xapp",
                    100,
                    json!({
                        "entity": "0xcccc",
                        "id": "1",
                        "tokensStaked": "10",
                        "totalTokensStaked": "10",
                        "conviction": "5",
                    }),
                ),
            )
            .await
            .unwrap();

        assert_eq!(
            state.conviction_stakes,
            vec![ConvictionStake {
                entity: Address::new("0xcccc"),
                proposal: 1,
                tokens_staked: 10,
                total_tokens_staked: 10,
                time: 100,
                conviction: 5,
            }]
        );

        let state = r
            .reduce(
                state,
                &event("ProposalExecuted", "0xapp", 110, json!({ "id": "1" })),
            )
            .await
            .unwrap();

        assert!(state.proposals[0].executed);
        assert_eq!(state.proposals.len(), 1);
        assert_eq!(state.conviction_stakes.len(), 1);
    }

    #[tokio::test]
    async fn unhandled_events_return_the_same_state() {
        let r = reducer();
        let mut state = AppState::default();
        state.proposals.push(Proposal {
            id: 7,
            ..Default::default()
        });

        let proposals_ptr = state.proposals.as_ptr();
        let before = state.clone();
        let next = r
            .reduce(state, &event("Approval", "0xsomewhere", 5, json!({})))
            .await
            .unwrap();

        assert_eq!(next, before);
        // The same owned value came back: no clone, no reallocation.
        assert_eq!(next.proposals.as_ptr(), proposals_ptr);
    }

    #[tokio::test]
    async fn executed_flag_flips_only_the_matching_proposal() {
        let r = reducer();
        let mut state = AppState::default();
        for id in [3u64, 7, 9] {
            state.proposals.push(Proposal {
                id,
                name: format!("proposal {}", id),
                ..Default::default()
            });
        }

        let next = r
            .reduce(
                state,
                &event("ProposalExecuted", "0xapp", 12, json!({ "id": "7" })),
            )
            .await
            .unwrap();

        assert!(!next.proposals[0].executed);
        assert!(next.proposals[1].executed);
        assert!(!next.proposals[2].executed);
        assert_eq!(next.proposals[1].name, "proposal 7");
    }

    #[tokio::test]
    async fn executing_an_unknown_id_is_silently_ignored() {
        let r = reducer();
        let mut state = AppState::default();
        state.proposals.push(Proposal {
            id: 1,
            ..Default::default()
        });
        let before = state.clone();

        let next = r
            .reduce(
                state,
                &event("ProposalExecuted", "0xapp", 12, json!({ "id": "42" })),
            )
            .await
            .unwrap();
        assert_eq!(next, before);
    }

    #[tokio::test]
    async fn stake_token_transfer_refreshes_the_supply() {
        let reader = Arc::new(ScriptedReader::new(&[("totalSupply", "12345")]));
        let r = reducer_with(reader.clone(), 0);

        let next = r
            .reduce(
                AppState::default(),
                &event("Transfer", "0xSTK", 8, json!({ "value": "10" })),
            )
            .await
            .unwrap();

        assert_eq!(next.stake_token.token_supply, 12345);
        assert_eq!(*reader.calls.lock().unwrap(), vec!["totalSupply"]);
    }

    #[tokio::test]
    async fn other_stake_token_events_are_ignored() {
        let reader = Arc::new(ScriptedReader::new(&[("totalSupply", "12345")]));
        let r = reducer_with(reader.clone(), 0);
        let before = AppState::default();

        let next = r
            .reduce(before.clone(), &event("Approval", "0xstk", 8, json!({})))
            .await
            .unwrap();

        assert_eq!(next, before);
        assert!(reader.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn vault_events_for_the_request_token_refresh_the_balance() {
        let r = reducer_with(Arc::new(ScriptedReader::new(&[])), 900);

        let next = r
            .reduce(
                AppState::default(),
                &event(
                    "VaultTransfer",
                    "0xva",
                    20,
                    json!({ "token": "0xreq", "value": "900" }),
                ),
            )
            .await
            .unwrap();

        assert_eq!(next.request_token.balance, 900);
        assert_eq!(next.request_token.address, Address::new("0xreq"));
    }

    #[tokio::test]
    async fn vault_events_for_other_tokens_fall_through_unchanged() {
        // Pins the intentional fallthrough: a vault event for an unrelated token reaches
        // the generic switch, matches nothing there, and the state passes through.
        let r = reducer_with(Arc::new(ScriptedReader::new(&[])), 900);
        let before = AppState::default();

        let next = r
            .reduce(
                before.clone(),
                &event(
                    "VaultTransfer",
                    "0xva",
                    20,
                    json!({ "token": "0xother", "value": "900" }),
                ),
            )
            .await
            .unwrap();

        assert_eq!(next, before);
        assert_eq!(next.request_token.balance, 0);
    }

    #[tokio::test]
    async fn a_proposal_added_by_the_vault_for_another_token_still_appends() {
        // The fallthrough is a real dispatch path, not a dead branch: a generic event
        // name on a vault event for an unrelated token must be handled by the switch.
        let r = reducer();

        let next = r
            .reduce(
                AppState::default(),
                &event(
                    "ProposalAdded",
                    "0xva",
                    21,
                    json!({ "token": "0xother", "id": "2", "title": "via vault", "amount": "1" }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(next.proposals.len(), 1);
        assert_eq!(next.proposals[0].name, "via vault");
    }

    #[tokio::test]
    async fn sync_markers_toggle_the_flag() {
        let r = reducer();
        let mut state = AppState::default();
        state.is_syncing = true;

        let state = r
            .reduce(
                state,
                &crate::store::events::sync_marker(SYNC_CAUGHT_UP_EVENT, 30),
            )
            .await
            .unwrap();
        assert!(!state.is_syncing);

        let state = r
            .reduce(
                state,
                &crate::store::events::sync_marker(SYNC_STARTED_EVENT, 31),
            )
            .await
            .unwrap();
        assert!(state.is_syncing);
    }

    #[tokio::test]
    async fn malformed_numbers_degrade_to_zero() {
        let r = reducer();

        let next = r
            .reduce(
                AppState::default(),
                &event(
                    "ProposalAdded",
                    "0xapp",
                    5,
                    json!({ "id": "not-a-number", "title": "odd", "amount": "1e5" }),
                ),
            )
            .await
            .unwrap();

        assert_eq!(next.proposals.len(), 1);
        assert_eq!(next.proposals[0].id, 0);
        assert_eq!(next.proposals[0].requested_amount, 0);
    }

    #[test]
    fn link_decoding() {
        assert_eq!(decode_link(None), None);
        assert_eq!(decode_link(Some(String::new())), None);
        assert_eq!(decode_link(Some("0x".to_string())), None);
        // 0x697066733a2f2f  == "ipfs://"
        assert_eq!(
            decode_link(Some("0x697066733a2f2f".to_string())),
            Some("ipfs://".to_string())
        );
        assert_eq!(
            decode_link(Some("https://example.org".to_string())),
            Some("https://example.org".to_string())
        );
    }
}
