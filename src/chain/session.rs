use super::ChainProvider;
use crate::ChainId;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Active wallet connection: which chain, and the provider that talks to it
#[derive(Clone)]
pub struct Connection {
    pub chain_id: ChainId,
    pub provider: Arc<dyn ChainProvider>,
}

impl Connection {
    pub fn new(chain_id: ChainId, provider: Arc<dyn ChainProvider>) -> Self {
        Self { chain_id, provider }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

/// Current network the session is connected to, if any
///
/// Listeners and refresh controllers subscribe to it and treat every change
/// (network switch, disconnect) as a reason to re-evaluate.
#[derive(Clone)]
pub struct Session {
    tx: Arc<watch::Sender<Option<Connection>>>,
}

impl Session {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn connect(&self, connection: Connection) {
        info!("Session connected to chain {}", connection.chain_id);
        self.tx.send_replace(Some(connection));
    }

    pub fn disconnect(&self) {
        info!("Session disconnected");
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<Connection> {
        self.tx.borrow().clone()
    }

    pub fn chain_id(&self) -> Option<ChainId> {
        self.tx.borrow().as_ref().map(|c| c.chain_id)
    }

    /// Receiver that is notified on every connection change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Connection>> {
        self.tx.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
