//! State Management Module
//!
//! This module tracks provisional nonces for locally originated transactions.
//! - `Ledger`: source of each account's canonical nonce
//! - `StateCache`: in-memory ledger of account balances and nonces
//! - `AccountTracker`: provisional nonce window for a single account
//! - `ManagedState`: registry of trackers, the entry point for the submission path

mod account;
mod cache;
mod managed;


use ethers::types::Address;

pub use account::AccountTracker;
pub use cache::StateCache;
pub use managed::ManagedState;

/// Canonical nonce source
///
/// Implementations must answer quickly and without blocking on I/O; the
/// registry queries the ledger while holding an account's lock.
pub trait Ledger: Send + Sync {
    /// Next nonce the ledger expects from `address`; `0` for unknown accounts.
    fn nonce(&self, address: &Address) -> u64;
}

impl<L: Ledger + ?Sized> Ledger for std::sync::Arc<L> {
    fn nonce(&self, address: &Address) -> u64 {
        (**self).nonce(address)
    }
}
