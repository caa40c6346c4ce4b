//! Per-account provisional nonce window
//!
//! An `AccountTracker` remembers which nonces above the canonical one have been
//! handed out for transactions that are not confirmed yet. Bit `i` of the window
//! stands for nonce `base + i`; a cleared bit is a freed slot that may be reused.

use bitvec::vec::BitVec;
use tracing::{debug, warn};

/// Provisional nonce bookkeeping for exactly one address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountTracker {
    /// Canonical nonce observed at the last resync
    base: u64,
    /// Reservation bits for `base..base + len`, grown only at the tail
    reserved: BitVec,
}

impl AccountTracker {
    /// Creates a tracker with an empty window starting at `base`
    pub fn new(base: u64) -> Self {
        Self {
            base,
            reserved: BitVec::new(),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Number of slots in the window, reserved or freed
    pub fn window_len(&self) -> usize {
        self.reserved.len()
    }

    /// First nonce past the end of the window, `None` once the window reaches
    /// the top of the nonce space
    pub fn next_nonce(&self) -> Option<u64> {
        self.base.checked_add(self.reserved.len() as u64)
    }

    /// Whether `nonce` is currently handed out
    pub fn is_reserved(&self, nonce: u64) -> bool {
        self.offset_of(nonce)
            .map(|offset| self.reserved[offset])
            .unwrap_or(false)
    }

    /// Reserved nonces in ascending order
    pub fn reserved_nonces(&self) -> impl Iterator<Item = u64> + '_ {
        self.reserved.iter_ones().map(move |k| self.base + k as u64)
    }

    /// Rebase onto `canonical` if the ledger moved past us.
    ///
    /// Every reservation is dropped on rebase: old slots cannot be mapped onto
    /// the new baseline. Returns `true` if a reset happened.
    pub fn resync(&mut self, canonical: u64) -> bool {
        if canonical <= self.base {
            return false;
        }
        debug!(
            "Canonical nonce advanced from {} to {}, discarding {} provisional slots",
            self.base,
            canonical,
            self.reserved.len()
        );
        self.base = canonical;
        self.reserved.clear();
        true
    }

    /// Hand out the lowest free nonce, growing the window if none is free.
    ///
    /// Returns `None` when every nonce up to `u64::MAX` is already reserved.
    pub fn new_nonce(&mut self, canonical: u64) -> Option<u64> {
        self.resync(canonical);
        self.allocate()
    }

    /// Invalidate `nonce` and every nonce issued after it.
    ///
    /// Nonces below the window or never issued are ignored.
    pub fn remove_nonce(&mut self, canonical: u64, nonce: u64) {
        self.resync(canonical);
        self.free_from(nonce);
    }

    fn allocate(&mut self) -> Option<u64> {
        // Every slot in the window maps to a representable nonce
        if let Some(k) = self.reserved.first_zero() {
            self.reserved.set(k, true);
            return Some(self.base + k as u64);
        }
        let Some(nonce) = self.next_nonce() else {
            warn!("Nonce space exhausted above {}", self.base);
            return None;
        };
        self.reserved.push(true);
        Some(nonce)
    }

    fn free_from(&mut self, nonce: u64) -> bool {
        let Some(offset) = self.offset_of(nonce) else {
            return false;
        };
        debug!("Freeing {} nonces from {}", self.reserved.len() - offset, nonce);
        self.reserved.truncate(offset);
        true
    }

    /// Window index of `nonce`, if it falls inside the window
    fn offset_of(&self, nonce: u64) -> Option<usize> {
        let offset = nonce.checked_sub(self.base)?;
        if offset >= self.reserved.len() as u64 {
            return None;
        }
        Some(offset as usize)
    }
}
