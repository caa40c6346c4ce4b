use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Account state as known to the canonical ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub address: Address,
    #[serde(default)]
    pub balance: U256,
    pub nonce: u64,
}

/// Read-only view of one account's provisional nonce window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceWindow {
    pub address: Address,
    /// Canonical nonce observed at the last resync
    pub base: u64,
    /// Nonces currently handed out and not invalidated, ascending
    pub reserved: Vec<u64>,
    /// First nonce past the end of the window, absent at the top of the nonce space
    pub next: Option<u64>,
}

/// Nonce handed back to a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceResponse {
    pub address: Address,
    pub nonce: u64,
}

/// Parameters naming a single account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressParams {
    pub address: Address,
}

/// Parameters naming an account and one of its nonces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressNonceParams {
    pub address: Address,
    pub nonce: u64,
}

/// Errors surfaced by the JSON-RPC service
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(#[from] serde_json::Error),
    #[error("Nonce space exhausted for {0:?}")]
    NoncesExhausted(Address),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcError {
    /// Standard JSON-RPC 2.0 error code
    pub fn code(&self) -> i32 {
        match self {
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidParams(_) => -32602,
            RpcError::NoncesExhausted(_) => -32000,
            RpcError::Internal(_) => -32603,
        }
    }
}
