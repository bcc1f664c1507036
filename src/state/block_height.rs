//! Block Height Store
//!
//! Process-wide record of the latest block height seen on each chain. Heights are
//! written by the block listener only; everything else reads them or registers as
//! an observer to be told when a chain advances.

use crate::{BlockHeight, ChainId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

type ObserverId = u64;

#[derive(Default)]
struct HeightState {
    /// Latest height per chain; a missing chain means "unknown", not zero
    heights: HashMap<ChainId, BlockHeight>,
    /// Observer registration table, keyed by the chain each observer watches
    observers: HashMap<ChainId, HashMap<ObserverId, mpsc::UnboundedSender<BlockHeight>>>,
    next_observer: ObserverId,
}

/// Shared handle to the block height map
///
/// Cloning the handle shares the underlying map. Reads are synchronous and never
/// wait on anything but the short internal lock.
#[derive(Clone, Default)]
pub struct BlockHeightStore {
    inner: Arc<RwLock<HeightState>>,
}

impl BlockHeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `height` as the latest block on `chain_id`
    ///
    /// Overwrites unconditionally: the event source is trusted to never go backwards.
    /// Every observer of `chain_id` receives the height in the order calls are made.
    pub fn set_block_height(&self, chain_id: ChainId, height: BlockHeight) {
        let mut state = self.inner.write();
        state.heights.insert(chain_id, height);
        trace!(chain_id, height, "block height updated");

        if let Some(observers) = state.observers.get_mut(&chain_id) {
            // Receivers dropped without unsubscribing are pruned here
            observers.retain(|_, sender| sender.send(height).is_ok());
            if observers.is_empty() {
                state.observers.remove(&chain_id);
            }
        }
    }

    /// Latest known height for `chain_id`, or `None` if it was never set.
    pub fn get_block_height(&self, chain_id: ChainId) -> Option<BlockHeight> {
        self.inner.read().heights.get(&chain_id).copied()
    }

    /// Register interest in height changes for `chain_id`
    ///
    /// The returned subscription stays in the registration table until it is
    /// dropped or [`HeightSubscription::unsubscribe`] is called.
    pub fn subscribe(&self, chain_id: ChainId) -> HeightSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.write();
        let id = state.next_observer;
        state.next_observer += 1;
        state.observers.entry(chain_id).or_default().insert(id, tx);

        HeightSubscription {
            id,
            chain_id,
            rx,
            store: self.clone(),
        }
    }

    /// Number of live observers registered for `chain_id`.
    pub fn observer_count(&self, chain_id: ChainId) -> usize {
        self.inner
            .read()
            .observers
            .get(&chain_id)
            .map_or(0, HashMap::len)
    }

    fn remove_observer(&self, chain_id: ChainId, id: ObserverId) {
        let mut state = self.inner.write();
        if let Some(observers) = state.observers.get_mut(&chain_id) {
            observers.remove(&id);
            if observers.is_empty() {
                state.observers.remove(&chain_id);
            }
        }
    }
}

/// Registration of one observer for one chain's height changes
pub struct HeightSubscription {
    id: ObserverId,
    chain_id: ChainId,
    rx: mpsc::UnboundedReceiver<BlockHeight>,
    store: BlockHeightStore,
}

impl HeightSubscription {
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Wait for the next height delivered for this chain.
    pub async fn recv(&mut self) -> Option<BlockHeight> {
        self.rx.recv().await
    }

    /// Remove this observer from the registration table.
    pub fn unsubscribe(self) {
        // Drop does the removal
    }
}

impl Drop for HeightSubscription {
    fn drop(&mut self) {
        self.store.remove_observer(self.chain_id, self.id);
    }
}
