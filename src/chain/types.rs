//! Types for the chain read layer.
//!
//! Contract calls go through a read endpoint that performs the ABI work server-side, so
//! call results arrive as decimal strings and event logs arrive already decoded. The types
//! here mirror that wire format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A contract address, normalised to lowercase hex so comparisons are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded event log from a watched contract.
///
/// `return_values` entries are JSON values as decoded by the read endpoint; numeric fields
/// are decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEvent {
    /// The event name, e.g. `ProposalAdded`.
    pub event: String,
    /// Decoded event parameters, keyed by parameter name.
    #[serde(default)]
    pub return_values: HashMap<String, serde_json::Value>,
    /// The block the event was emitted in.
    pub block_number: u64,
    /// The emitting contract.
    pub address: Address,
}

impl ChainEvent {
    /// Read a return value as a string. Numbers are rendered in decimal so callers can
    /// apply one parsing policy regardless of how the endpoint encoded the field.
    pub fn string_value(&self, key: &str) -> Option<String> {
        match self.return_values.get(key)? {
            serde_json::Value::String(value) => Some(value.clone()),
            serde_json::Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

/// The surface of a contract binding: the method names a handle may call.
///
/// The read endpoint owns the actual ABI; the descriptor only guards against calling a
/// method the binding was never declared with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbiDescriptor {
    methods: Vec<String>,
}

impl AbiDescriptor {
    pub fn new(methods: &[&str]) -> Self {
        Self {
            methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// The conviction-voting app contract surface.
    pub fn conviction_app() -> Self {
        Self::new(&[
            "stakeToken",
            "requestToken",
            "vault",
            "decay",
            "maxRatio",
            "weight",
        ])
    }

    /// The ERC-20 token surface.
    pub fn erc20() -> Self {
        Self::new(&["name", "symbol", "decimals", "totalSupply", "balanceOf"])
    }

    /// The vault app surface.
    pub fn vault() -> Self {
        Self::new(&["initializationBlock", "balance"])
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

/// Read capability over the chain: constant calls, the current head, and decoded logs.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    /// Execute a constant call and return the result as a decimal string.
    async fn call(
        &self,
        address: &Address,
        method: &str,
        args: &[String],
    ) -> Result<String, ChainError>;

    /// The current chain head block number.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Decoded event logs for one contract over an inclusive block range.
    async fn fetch_events(
        &self,
        address: &Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>, ChainError>;
}

/// A contract bound to an address, an ABI surface and a reader.
#[derive(Clone)]
pub struct ContractHandle {
    address: Address,
    abi: AbiDescriptor,
    reader: Arc<dyn ChainReader>,
}

impl ContractHandle {
    pub fn new(address: Address, abi: AbiDescriptor, reader: Arc<dyn ChainReader>) -> Self {
        Self {
            address,
            abi,
            reader,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Call a zero-argument constant method.
    pub async fn call(&self, method: &str) -> Result<String, ChainError> {
        self.call_with(method, &[]).await
    }

    /// Call a constant method with arguments.
    pub async fn call_with(&self, method: &str, args: &[String]) -> Result<String, ChainError> {
        if !self.abi.has_method(method) {
            return Err(ChainError::UnknownMethod {
                method: method.to_string(),
                address: self.address.clone(),
            });
        }
        self.reader.call(&self.address, method, args).await
    }
}

/// Error types for the chain read layer
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("read endpoint error: {0}")]
    EndpointError(String),

    #[error("method {method} is not part of the ABI bound at {address}")]
    UnknownMethod { method: String, address: Address },

    #[error("no data returned")]
    NoData,
}
