//! This crate hands out nonces for transactions originated locally by a ledger node.
//! It includes modules for data types, per-account nonce tracking, the JSON-RPC API,
//! and configuration.

pub mod types; // Defines common data structures and errors used throughout the crate.
pub mod state; // Ledger collaborator, account trackers and the managed nonce registry.
pub mod api; // JSON-RPC front end over the registry.
pub mod config; // Defines and loads service configuration.

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use config::Config;
pub use state::{Ledger, ManagedState};
