//! State cache persistence.
//!
//! The cache carries the folded `AppState` across application restarts so a new run can
//! seed the reducer without replaying the whole event log. The repository trait abstracts
//! the storage; the file implementation writes the state as JSON next to a metadata
//! sidecar recording the sync block and timestamp.

use crate::store::state::AppState;
use crate::store::SyncError;
use std::path::PathBuf;
use tracing::{info, warn};

/// Repository for cached application state
#[async_trait::async_trait]
pub trait StateCacheRepository: Send + Sync {
	/// Load the cached state and the block it was synced through, if any.
	async fn load(&self) -> Result<Option<(AppState, u64)>, SyncError>;

	/// Persist the state as synced through the given block.
	async fn save(&self, state: &AppState, block: u64) -> Result<(), SyncError>;
}

/// File-based implementation of StateCacheRepository
pub struct FileStateCacheRepository {
	data_dir: PathBuf,
}

impl FileStateCacheRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn state_filename(&self) -> PathBuf {
		self.data_dir.join("app_state.json")
	}

	fn metadata_filename(&self) -> PathBuf {
		self.data_dir.join("app_state.meta.json")
	}
}

#[async_trait::async_trait]
impl StateCacheRepository for FileStateCacheRepository {
	async fn load(&self) -> Result<Option<(AppState, u64)>, SyncError> {
		let filename = self.state_filename();
		if !filename.exists() {
			return Ok(None);
		}

		let content = tokio::fs::read_to_string(&filename)
			.await
			.map_err(|e| SyncError::CacheError(format!("Failed to read state cache: {}", e)))?;

		// A corrupt cache is not fatal: resync from scratch instead.
		let state: AppState = match serde_json::from_str(&content) {
			Ok(state) => state,
			Err(e) => {
				warn!("Discarding unreadable state cache: {}", e);
				return Ok(None);
			}
		};

		let mut block = 0u64;
		if let Ok(meta_content) = tokio::fs::read_to_string(self.metadata_filename()).await {
			if let Ok(metadata) = serde_json::from_str::<serde_json::Value>(&meta_content) {
				if let Some(b) = metadata.get("syncBlock").and_then(|b| b.as_u64()) {
					block = b;
				}
			}
		}

		info!("Loaded cached state from {:?} at block {}", filename, block);
		Ok(Some((state, block)))
	}

	async fn save(&self, state: &AppState, block: u64) -> Result<(), SyncError> {
		tokio::fs::create_dir_all(&self.data_dir)
			.await
			.map_err(|e| SyncError::CacheError(format!("Failed to create cache dir: {}", e)))?;

		let metadata = serde_json::json!({
			"syncBlock": block,
			"timestamp": chrono::Utc::now().to_rfc3339(),
		});
		tokio::fs::write(
			self.metadata_filename(),
			serde_json::to_string_pretty(&metadata)
				.map_err(|e| SyncError::CacheError(format!("Failed to serialize metadata: {}", e)))?,
		)
		.await
		.map_err(|e| SyncError::CacheError(format!("Failed to write cache metadata: {}", e)))?;

		let content = serde_json::to_string_pretty(state)
			.map_err(|e| SyncError::CacheError(format!("Failed to serialize state: {}", e)))?;
		tokio::fs::write(self.state_filename(), content)
			.await
			.map_err(|e| SyncError::CacheError(format!("Failed to write state cache: {}", e)))?;

		Ok(())
	}
}
