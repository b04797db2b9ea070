//!
//! HTTP client for the chain read endpoint.
//!
//! This module provides an async client for executing constant contract calls and fetching
//! decoded event logs. The endpoint performs ABI encoding and decoding server-side: call
//! results come back as decimal strings and logs come back as structured JSON. All methods
//! are async and designed for use with Tokio.

use super::types::{Address, ChainError, ChainEvent, ChainReader};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Client for the chain read endpoint
#[derive(Clone)]
pub struct HttpChainReader {
	/// The underlying HTTP client.
	http_client: Client,
	/// The base URL of the read endpoint.
	reader_url: String,
}

impl HttpChainReader {
	/// Create a new reader client.
	///
	/// # Arguments
	/// * `reader_url` - The base URL of the read endpoint.
	///
	/// # Returns
	/// A new `HttpChainReader` instance.
	pub fn new(reader_url: String) -> Self {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			reader_url,
		}
	}

	/// POST a JSON request to the given endpoint path and return the `data` payload.
	async fn execute(
		&self,
		path: &str,
		body: serde_json::Value,
	) -> Result<serde_json::Value, ChainError> {
		let url = format!("{}/{}", self.reader_url.trim_end_matches('/'), path);
		debug!("POST {} {}", url, body);

		let response = self.http_client.post(&url).json(&body).send().await?;
		let payload: serde_json::Value = response.json().await?;

		if let Some(message) = payload.get("error").and_then(|e| e.as_str()) {
			return Err(ChainError::EndpointError(message.to_string()));
		}

		payload
			.get("data")
			.cloned()
			.ok_or(ChainError::NoData)
	}
}

#[async_trait::async_trait]
impl ChainReader for HttpChainReader {
	/// Execute a constant contract call.
	///
	/// # Arguments
	/// * `address` - The contract to call.
	/// * `method` - The method name; the endpoint resolves it against the contract ABI.
	/// * `args` - Call arguments as strings (addresses in hex, integers in decimal).
	///
	/// # Returns
	/// The call result as a decimal string, or a `ChainError` if the call fails.
	async fn call(
		&self,
		address: &Address,
		method: &str,
		args: &[String],
	) -> Result<String, ChainError> {
		let data = self
			.execute(
				"call",
				json!({
					"address": address,
					"method": method,
					"args": args,
				}),
			)
			.await?;

		match data {
			serde_json::Value::String(value) => Ok(value),
			serde_json::Value::Number(value) => Ok(value.to_string()),
			_ => Err(ChainError::NoData),
		}
	}

	/// Fetch the current chain head block number.
	async fn block_number(&self) -> Result<u64, ChainError> {
		let data = self.execute("blockNumber", json!({})).await?;

		data.as_u64()
			.or_else(|| data.as_str().and_then(|s| s.parse().ok()))
			.ok_or(ChainError::NoData)
	}

	/// Fetch decoded event logs for one contract over an inclusive block range.
	///
	/// # Arguments
	/// * `address` - The emitting contract.
	/// * `from_block` - First block of the range.
	/// * `to_block` - Last block of the range.
	///
	/// # Returns
	/// The decoded events in log order, or a `ChainError` if the fetch fails.
	async fn fetch_events(
		&self,
		address: &Address,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ChainEvent>, ChainError> {
		let data = self
			.execute(
				"logs",
				json!({
					"address": address,
					"fromBlock": from_block,
					"toBlock": to_block,
				}),
			)
			.await?;

		let events: Vec<ChainEvent> = serde_json::from_value(data)?;
		debug!(
			"Fetched {} events for {} in blocks {}..={}",
			events.len(),
			address,
			from_block,
			to_block
		);
		Ok(events)
	}
}
