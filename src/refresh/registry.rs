use super::{ControllerContext, ControllerStats, RefreshController};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// (token, owner) exactly as consumers pass them
type WatchKey = (String, String);

struct Mounted {
    controller: RefreshController,
    consumers: usize,
}

/// Table of mounted refresh controllers
///
/// A pair gets one controller no matter how many consumers observe it; the
/// controller is torn down when the last consumer unmounts.
pub struct WatchRegistry {
    ctx: ControllerContext,
    watches: Mutex<HashMap<WatchKey, Mounted>>,
}

impl WatchRegistry {
    pub fn new(ctx: ControllerContext) -> Self {
        Self {
            ctx,
            watches: Mutex::new(HashMap::new()),
        }
    }

    /// Register a consumer of (token, owner), returning how many consumers it now has.
    pub fn mount(&self, token: &str, owner: &str) -> usize {
        let mut watches = self.watches.lock();
        let mounted = watches
            .entry((token.to_string(), owner.to_string()))
            .or_insert_with(|| {
                debug!("Mounting balance watch for {} / {}", token, owner);
                Mounted {
                    controller: RefreshController::spawn(&self.ctx, token, owner),
                    consumers: 0,
                }
            });
        mounted.consumers += 1;
        mounted.consumers
    }

    /// Remove one consumer of (token, owner)
    ///
    /// Returns `false` if the pair was not mounted.
    pub fn unmount(&self, token: &str, owner: &str) -> bool {
        let key = (token.to_string(), owner.to_string());
        let mut watches = self.watches.lock();
        let Some(mounted) = watches.get_mut(&key) else {
            return false;
        };

        mounted.consumers -= 1;
        if mounted.consumers == 0 {
            debug!("Tearing down balance watch for {} / {}", token, owner);
            watches.remove(&key);
        }
        true
    }

    /// Consumers currently observing (token, owner).
    pub fn consumers(&self, token: &str, owner: &str) -> usize {
        self.watches
            .lock()
            .get(&(token.to_string(), owner.to_string()))
            .map_or(0, |m| m.consumers)
    }

    pub fn stats(&self, token: &str, owner: &str) -> Option<ControllerStats> {
        self.watches
            .lock()
            .get(&(token.to_string(), owner.to_string()))
            .map(|m| m.controller.stats())
    }

    /// Number of mounted pairs.
    pub fn len(&self) -> usize {
        self.watches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down every controller.
    pub fn clear(&self) {
        let drained: Vec<Mounted> = self.watches.lock().drain().map(|(_, m)| m).collect();
        debug!("Tearing down {} balance watches", drained.len());
    }
}
