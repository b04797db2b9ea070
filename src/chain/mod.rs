//! Chain read layer
//!
//! This module provides the client and types for reading on-chain state through a read
//! endpoint that decodes ABI data server-side: constant calls return decimal strings and
//! event logs arrive as structured JSON ready for the reducer.

/// HTTP client for the chain read endpoint
mod client;
/// Type definitions for addresses, events and contract bindings
mod types;

pub use client::HttpChainReader;
pub use types::*;
