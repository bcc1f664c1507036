//! Block Listener Module
//!
//! Pumps block notifications from the connected provider into the block height
//! store. It follows the session: when the wallet switches network or
//! disconnects, the old subscription is dropped before a new one is opened, so
//! heights from a previous connection can never be written.

use super::{Connection, Session};
use crate::{state::BlockHeightStore, BlockHeight, ChainId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Block event listener
///
/// Must be started once near application start and kept running for the
/// application's lifetime.
pub struct BlockListener {
    session: Session,
    heights: BlockHeightStore,
}

/// Handle to a running listener
///
/// Dropping the handle stops the listener as well; `shutdown` additionally
/// waits for it to finish.
pub struct ListenerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Provider subscription for one connection
struct ActiveSubscription {
    chain_id: ChainId,
    heights: mpsc::UnboundedReceiver<BlockHeight>,
    task: JoinHandle<()>,
}

impl ActiveSubscription {
    fn open(connection: Connection) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let chain_id = connection.chain_id;
        let provider = connection.provider;

        let task = tokio::spawn(async move {
            if let Err(e) = provider.watch_blocks(tx).await {
                warn!("Block subscription for chain {} failed: {}", chain_id, e);
            }
        });
        debug!("Subscribed to blocks on chain {}", chain_id);

        Self {
            chain_id,
            heights: rx,
            task,
        }
    }
}

impl Drop for ActiveSubscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Unsubscribed from blocks on chain {}", self.chain_id);
    }
}

async fn next_height(active: &mut Option<ActiveSubscription>) -> Option<BlockHeight> {
    match active {
        Some(subscription) => subscription.heights.recv().await,
        None => std::future::pending().await,
    }
}

impl BlockListener {
    /// Creates a new block listener
    ///
    /// # Arguments
    /// * `session` - Wallet session providing the current connection
    /// * `heights` - Store that receives every observed block height
    pub fn new(session: Session, heights: BlockHeightStore) -> Self {
        Self { session, heights }
    }

    /// Start listening in a background task.
    pub fn start(self) -> ListenerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        info!("Block listener started");

        ListenerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut connections = self.session.subscribe();

        loop {
            let current = connections.borrow_and_update().clone();
            let mut active = current.map(ActiveSubscription::open);

            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Block listener stopped");
                        return;
                    }
                    changed = connections.changed() => {
                        if changed.is_err() {
                            info!("Session closed, block listener stopping");
                            return;
                        }
                        // Drop the old subscription before opening the next one
                        break;
                    }
                    height = next_height(&mut active) => match height {
                        Some(height) => {
                            if let Some(subscription) = &active {
                                self.heights.set_block_height(subscription.chain_id, height);
                            }
                        }
                        None => {
                            // Failures were already reported by the subscription task.
                            // No retry until the connection changes.
                            debug!("Block subscription ended");
                            active = None;
                        }
                    },
                }
            }
        }
    }
}

impl ListenerHandle {
    /// Unsubscribe and wait for the listener task to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
