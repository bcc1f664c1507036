//! Consumer-facing facade
//!
//! `BalanceTracker` bundles the stores, the session and the watch registry and
//! exposes the read path consumers use. Reads never wait on the network: they
//! return what is cached, and hide anything fetched for an older block.

use crate::{
    chain::{AddressValidator, BlockListener, ListenerHandle, Session},
    refresh::{ControllerContext, ControllerStats, WatchRegistry},
    state::{BalanceStore, BlockHeightStore},
    BalanceValue, BlockHeight, ChainId, OwnerAddress, TokenKey,
};
use std::sync::Arc;

pub struct BalanceTracker {
    session: Session,
    heights: BlockHeightStore,
    balances: BalanceStore,
    registry: WatchRegistry,
}

impl BalanceTracker {
    /// Creates a tracker with fresh, empty stores.
    pub fn new(session: Session, validator: Arc<dyn AddressValidator>) -> Self {
        Self::with_stores(
            session,
            BlockHeightStore::new(),
            BalanceStore::new(),
            validator,
        )
    }

    /// Creates a tracker over existing store handles.
    pub fn with_stores(
        session: Session,
        heights: BlockHeightStore,
        balances: BalanceStore,
        validator: Arc<dyn AddressValidator>,
    ) -> Self {
        let registry = WatchRegistry::new(ControllerContext {
            session: session.clone(),
            heights: heights.clone(),
            balances: balances.clone(),
            validator,
        });

        Self {
            session,
            heights,
            balances,
            registry,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn heights(&self) -> &BlockHeightStore {
        &self.heights
    }

    pub fn balances(&self) -> &BalanceStore {
        &self.balances
    }

    /// Start pumping block notifications into the height store
    ///
    /// Call once at startup and keep the handle for the application's lifetime.
    pub fn start_listener(&self) -> ListenerHandle {
        BlockListener::new(self.session.clone(), self.heights.clone()).start()
    }

    /// Latest height of `chain_id`, or of the connected chain when `None`.
    pub fn current_block_height(&self, chain_id: Option<ChainId>) -> Option<BlockHeight> {
        let chain_id = chain_id.or_else(|| self.session.chain_id())?;
        self.heights.get_block_height(chain_id)
    }

    /// Balance of `owner` in `token` on the connected chain
    ///
    /// `None` while loading, for unknown chains and for pairs nobody watches;
    /// `Some(None)` when the fetch for the current block failed.
    pub fn address_balance(&self, token: &str, owner: &str) -> Option<BalanceValue> {
        let chain_id = self.session.chain_id()?;
        let height = self.heights.get_block_height(chain_id)?;
        let entry = self.balances.get_balance(
            chain_id,
            &OwnerAddress::new(owner),
            &TokenKey::from_raw(token),
        )?;

        // Stale entries stay in the store but are never shown
        entry.is_fresh_at(height).then_some(entry.value)
    }

    /// Start observing (token, owner); returns the pair's consumer count.
    pub fn watch(&self, token: &str, owner: &str) -> usize {
        self.registry.mount(token, owner)
    }

    /// Stop observing (token, owner); `false` if it was not watched.
    pub fn unwatch(&self, token: &str, owner: &str) -> bool {
        self.registry.unmount(token, owner)
    }

    pub fn watch_stats(&self, token: &str, owner: &str) -> Option<ControllerStats> {
        self.registry.stats(token, owner)
    }

    pub fn watch_count(&self) -> usize {
        self.registry.len()
    }

    /// Tear down every watch.
    pub fn shutdown(&self) {
        self.registry.clear();
    }
}
