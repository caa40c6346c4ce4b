//! Managed State Module
//!
//! This module implements the registry of per-account nonce trackers.
//! The transaction submission path holds one `ManagedState` and asks it for a
//! nonce before stamping each locally originated transaction.
//!
//! # Locking
//! - The address map sits behind a read-write lock; it is only write-locked the
//!   first time an address is seen.
//! - Each tracker has its own mutex, so the resync-scan-mutate sequence for one
//!   address runs as a unit while other addresses proceed independently.

use super::{AccountTracker, Ledger};
use crate::NonceWindow;
use ethers::types::Address;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry mapping addresses to their nonce trackers
///
/// Trackers are created lazily, seeded with the ledger's canonical nonce, and
/// live as long as the registry.
pub struct ManagedState<L> {
    /// Canonical nonce source, polled on every operation
    ledger: L,
    /// At most one tracker per address
    accounts: RwLock<HashMap<Address, Arc<Mutex<AccountTracker>>>>,
}

impl<L: Ledger> ManagedState<L> {
    /// Creates an empty registry on top of `ledger`
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Returns a nonce safe to stamp on a new transaction from `address`
    ///
    /// Reuses the lowest slot freed by an earlier removal before growing the
    /// window. `None` only once every nonce up to `u64::MAX` is reserved.
    pub fn new_nonce(&self, address: Address) -> Option<u64> {
        let tracker = self.tracker(address);
        let mut tracker = tracker.lock();
        let nonce = tracker.new_nonce(self.ledger.nonce(&address))?;
        debug!("Issued nonce {} for {:?}", nonce, address);
        Some(nonce)
    }

    /// Invalidates `nonce` and every later nonce issued for `address`
    ///
    /// Unknown addresses, nonces below the window and nonces never issued are
    /// ignored.
    pub fn remove_nonce(&self, address: Address, nonce: u64) {
        let Some(tracker) = self.existing(&address) else {
            debug!("Ignoring removal of nonce {} for untracked {:?}", nonce, address);
            return;
        };
        let mut tracker = tracker.lock();
        tracker.remove_nonce(self.ledger.nonce(&address), nonce);
    }

    /// Nonce the next allocation would hand out if no slot has been freed
    ///
    /// Does not reserve anything and does not start tracking `address`.
    /// `None` if the window already ends at `u64::MAX`.
    pub fn pending_nonce(&self, address: Address) -> Option<u64> {
        let Some(tracker) = self.existing(&address) else {
            return Some(self.ledger.nonce(&address));
        };
        let mut tracker = tracker.lock();
        tracker.resync(self.ledger.nonce(&address));
        tracker.next_nonce()
    }

    /// Reseeds the tracker for `address` at `nonce`, dropping its window
    pub fn reset_account(&self, address: Address, nonce: u64) {
        info!("Resetting nonce tracking for {:?} to {}", address, nonce);
        let tracker = self.tracker(address);
        *tracker.lock() = AccountTracker::new(nonce);
    }

    /// Snapshot of the provisional window for a tracked address
    pub fn window(&self, address: Address) -> Option<NonceWindow> {
        let tracker = self.existing(&address)?;
        let mut tracker = tracker.lock();
        tracker.resync(self.ledger.nonce(&address));
        Some(NonceWindow {
            address,
            base: tracker.base(),
            reserved: tracker.reserved_nonces().collect(),
            next: tracker.next_nonce(),
        })
    }

    pub fn has_account(&self, address: &Address) -> bool {
        self.accounts.read().contains_key(address)
    }

    /// Number of addresses with a tracker
    pub fn tracked_accounts(&self) -> usize {
        self.accounts.read().len()
    }

    fn existing(&self, address: &Address) -> Option<Arc<Mutex<AccountTracker>>> {
        self.accounts.read().get(address).cloned()
    }

    /// Tracker for `address`, bootstrapped from the ledger on first use
    fn tracker(&self, address: Address) -> Arc<Mutex<AccountTracker>> {
        if let Some(tracker) = self.existing(&address) {
            return tracker;
        }

        // Re-check under the write lock: another caller may have won the race.
        let mut accounts = self.accounts.write();
        accounts
            .entry(address)
            .or_insert_with(|| {
                let base = self.ledger.nonce(&address);
                info!("Tracking nonces for {:?} from {}", address, base);
                Arc::new(Mutex::new(AccountTracker::new(base)))
            })
            .clone()
    }
}

impl<L> std::fmt::Debug for ManagedState<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedState")
            .field("accounts", &self.accounts.read().len())
            .finish()
    }
}
