//! The event-sourced state store.
//!
//! This module holds the synchronization core: the application state, the event reducer,
//! the state initializer, the bootstrap retry, the resolver collaborators, the state
//! cache and the sync driver that wires them together.

pub mod cache;
pub mod driver;
pub mod events;
pub mod init;
pub mod progress;
pub mod reducer;
pub mod resolvers;
pub mod retry;
pub mod state;

pub use cache::{FileStateCacheRepository, StateCacheRepository};
pub use driver::{External, SyncStore};
pub use init::StateInitializer;
pub use reducer::EventReducer;
pub use resolvers::{
    Erc20SettingsResolver, InstanceIdentity, TokenSettingsResolver, TracingIdentity,
    VaultBalanceLoader, VaultBalanceResolver,
};
pub use retry::{retry, RetryOptions};
pub use state::AppState;

use crate::chain::{Address, ChainError};

/// Error types for the synchronization layer
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("chain read error: {0}")]
    ChainError(#[from] ChainError),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("vault returned no balance entry for token {0}")]
    MissingBalance(Address),

    #[error("parse error: {0}")]
    ParseError(String),
}
