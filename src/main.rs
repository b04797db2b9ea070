mod chain;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::chain::{AbiDescriptor, Address, ChainReader, ContractHandle, HttpChainReader};
use crate::store::{
	retry, Erc20SettingsResolver, EventReducer, External, FileStateCacheRepository,
	RetryOptions, StateInitializer, SyncStore, TracingIdentity, VaultBalanceLoader,
	VaultBalanceResolver,
};

/// How often the store polls the chain head for new events.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.init();

	info!("Starting conviction voting sync service");

	let reader_url = std::env::var("CHAIN_READER_URL")
		.unwrap_or_else(|_| "http://localhost:8600".to_string());
	let data_dir = std::env::var("SYNC_DATA_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|_| PathBuf::from(".conviction-sync"));
	let app_address = match std::env::var("CONVICTION_APP_ADDRESS") {
		Ok(value) => Address::new(&value),
		Err(_) => {
			error!("CONVICTION_APP_ADDRESS is not set");
			return;
		}
	};

	let reader: Arc<dyn ChainReader> = Arc::new(HttpChainReader::new(reader_url));
	let app = ContractHandle::new(app_address, AbiDescriptor::conviction_app(), reader.clone());

	// Resolve the three watched addresses in one joined attempt; any single failure
	// fails the attempt and backs off.
	let addresses = retry(
		|| async {
			futures::future::try_join3(
				app.call("stakeToken"),
				app.call("vault"),
				app.call("requestToken"),
			)
			.await
		},
		RetryOptions::default(),
	)
	.await;

	let (stake_token_address, vault_address, request_token_address) = match addresses {
		Ok((stake_token, vault, request_token)) => (
			Address::new(&stake_token),
			Address::new(&vault),
			Address::new(&request_token),
		),
		Err(e) => {
			error!("Could not start background execution: {}", e);
			return;
		}
	};

	info!(
		"Watching stake token {}, vault {}, request token {}",
		stake_token_address, vault_address, request_token_address
	);

	let stake_token = ContractHandle::new(
		stake_token_address,
		AbiDescriptor::erc20(),
		reader.clone(),
	);
	let vault = ContractHandle::new(vault_address, AbiDescriptor::vault(), reader.clone());

	let balances = Arc::new(VaultBalanceLoader::new(reader.clone()));
	let vault_initialization_block = match balances.vault_initialization_block(&vault).await {
		Ok(block) => block,
		Err(e) => {
			error!("Could not start background execution: {}", e);
			return;
		}
	};

	let initializer = StateInitializer::new(
		app.clone(),
		stake_token.clone(),
		vault.clone(),
		request_token_address.clone(),
		Arc::new(Erc20SettingsResolver),
		balances.clone(),
		Arc::new(TracingIdentity),
	);
	let reducer = EventReducer::new(
		stake_token.clone(),
		vault.clone(),
		request_token_address,
		balances,
	);
	let externals = vec![
		External {
			contract: app,
			initialization_block: 0,
		},
		External {
			contract: stake_token,
			initialization_block: 0,
		},
		External {
			contract: vault,
			initialization_block: vault_initialization_block,
		},
	];

	let cache = Arc::new(FileStateCacheRepository::new(data_dir));
	let store = SyncStore::new(reader, reducer, initializer, externals, cache, POLL_INTERVAL);

	let mut snapshots = store.subscribe();
	tokio::spawn(async move {
		while snapshots.changed().await.is_ok() {
			let state = snapshots.borrow_and_update().clone();
			debug!(
				"State snapshot: {} proposals, {} stakes, syncing={}",
				state.proposals.len(),
				state.conviction_stakes.len(),
				state.is_syncing
			);
		}
	});

	if let Err(e) = store.run().await {
		error!("Synchronization halted: {}", e);
	}
}
