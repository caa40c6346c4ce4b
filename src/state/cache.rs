use super::Ledger;
use crate::AccountState;
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// In-memory account state, shared by cloning
#[derive(Clone, Default)]
pub struct StateCache {
    accounts: Arc<RwLock<HashMap<Address, AccountState>>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache, e.g. from the genesis accounts in the config
    pub fn from_accounts(accounts: impl IntoIterator<Item = AccountState>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|acc| (acc.address, acc))
            .collect();
        Self {
            accounts: Arc::new(RwLock::new(accounts)),
        }
    }

    pub fn get_balance(&self, address: &Address) -> Option<U256> {
        self.accounts.read().get(address).map(|acc| acc.balance)
    }

    pub fn get_nonce(&self, address: &Address) -> Option<u64> {
        self.accounts.read().get(address).map(|acc| acc.nonce)
    }

    /// Apply new ledger state for an account
    pub fn update(&self, state: AccountState) {
        debug!("Ledger state for {:?} now at nonce {}", state.address, state.nonce);
        self.accounts.write().insert(state.address, state);
    }

    /// Overwrite only the nonce, creating an empty account if needed
    pub fn set_nonce(&self, address: Address, nonce: u64) {
        let mut accounts = self.accounts.write();
        accounts
            .entry(address)
            .or_insert_with(|| AccountState {
                address,
                balance: U256::zero(),
                nonce,
            })
            .nonce = nonce;
    }
}

impl Ledger for StateCache {
    fn nonce(&self, address: &Address) -> u64 {
        self.get_nonce(address).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_account_reports_zero() {
        let cache = StateCache::new();
        assert_eq!(cache.get_nonce(&Address::zero()), None);
        assert_eq!(Ledger::nonce(&cache, &Address::zero()), 0);
    }

    #[test]
    fn clones_share_state() {
        let cache = StateCache::new();
        let other = cache.clone();
        let addr = Address::repeat_byte(0x11);

        other.update(AccountState {
            address: addr,
            balance: U256::from(7),
            nonce: 3,
        });
        assert_eq!(cache.get_nonce(&addr), Some(3));
        assert_eq!(cache.get_balance(&addr), Some(U256::from(7)));

        cache.set_nonce(addr, 9);
        assert_eq!(other.get_nonce(&addr), Some(9));
        assert_eq!(other.get_balance(&addr), Some(U256::from(7)));
    }
}
