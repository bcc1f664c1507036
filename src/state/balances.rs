use crate::{BalanceEntry, BalanceValue, BlockHeight, ChainId, OwnerAddress, TokenKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type OwnerBalances = HashMap<TokenKey, BalanceEntry>;

/// Shared handle to the cached balances, keyed chain -> owner -> token
///
/// The store trusts its keys. Owners and tokens are validated by the refresh
/// controller before anything is fetched or written.
#[derive(Clone, Default)]
pub struct BalanceStore {
    chains: Arc<RwLock<HashMap<ChainId, HashMap<OwnerAddress, OwnerBalances>>>>,
}

impl BalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the entry for (chain, owner, token)
    ///
    /// `fetched_at_height` must be the height current when the fetch was issued.
    pub fn upsert_balance(
        &self,
        chain_id: ChainId,
        owner: &OwnerAddress,
        token: &TokenKey,
        value: BalanceValue,
        fetched_at_height: BlockHeight,
    ) {
        let mut chains = self.chains.write();
        chains
            .entry(chain_id)
            .or_default()
            .entry(owner.clone())
            .or_default()
            .insert(
                token.clone(),
                BalanceEntry {
                    value,
                    fetched_at_height,
                },
            );
    }

    pub fn get_balance(
        &self,
        chain_id: ChainId,
        owner: &OwnerAddress,
        token: &TokenKey,
    ) -> Option<BalanceEntry> {
        let chains = self.chains.read();
        chains.get(&chain_id)?.get(owner)?.get(token).cloned()
    }

    /// Total number of cached entries across all chains.
    pub fn len(&self) -> usize {
        self.chains
            .read()
            .values()
            .flat_map(HashMap::values)
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
