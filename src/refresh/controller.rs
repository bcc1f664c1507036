//! Balance Refresh Controller
//!
//! One controller keeps one (token, owner) balance fresh. It watches the
//! session and the block height of the connected chain, and whenever the cached
//! entry was not fetched at the current height it issues a fetch and writes the
//! result to the balance store.
//!
//! # Supersession
//!
//! Every re-evaluation that moves the target (new height, other chain, no
//! chain) and every teardown bumps the controller's generation. A fetch
//! captures the generation it was issued under and only writes if the
//! generation is unchanged when it settles. The check and the write happen
//! under the controller lock, so a superseded fetch can never land after the
//! fetch that replaced it was issued.

use crate::{
    chain::{AddressValidator, Connection, Session},
    state::{BalanceStore, BlockHeightStore, HeightSubscription},
    BlockHeight, ChainId, OwnerAddress, TokenKey,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Shared collaborators every controller needs
#[derive(Clone)]
pub struct ControllerContext {
    pub session: Session,
    pub heights: BlockHeightStore,
    pub balances: BalanceStore,
    pub validator: Arc<dyn AddressValidator>,
}

/// What a controller is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching {
        chain_id: ChainId,
        height: BlockHeight,
    },
}

/// Counters for the fetches a controller has issued and how they ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub issued: u64,
    /// Settled fetches whose result (value or failure) was written
    pub stored: u64,
    /// Settled fetches that had been superseded and were dropped
    pub discarded: u64,
}

#[derive(Debug)]
struct ControllerState {
    generation: u64,
    phase: Phase,
    torn_down: bool,
    stats: ControllerStats,
}

impl ControllerState {
    /// Invalidate whatever fetch is in flight.
    fn supersede(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.phase = Phase::Idle;
    }
}

/// Captured at issue time, checked before the store is touched
#[derive(Debug, Clone, Copy)]
struct FetchTicket {
    generation: u64,
    chain_id: ChainId,
    height: BlockHeight,
}

/// Keeps the cached balance of one (token, owner) pair in step with the chain
///
/// Dropping the controller tears it down: fetches already in flight run to
/// completion but their results are discarded.
pub struct RefreshController {
    token: TokenKey,
    owner: OwnerAddress,
    state: Arc<Mutex<ControllerState>>,
    task: Option<JoinHandle<()>>,
}

impl RefreshController {
    /// Validate the pair and start watching it
    ///
    /// A malformed owner or token yields an inert controller that never fetches.
    pub fn spawn(ctx: &ControllerContext, token: &str, owner: &str) -> Self {
        let token_key = TokenKey::from_raw(token);
        let owner_key = OwnerAddress::new(owner);
        let state = Arc::new(Mutex::new(ControllerState {
            generation: 0,
            phase: Phase::Idle,
            torn_down: false,
            stats: ControllerStats::default(),
        }));

        let valid = ctx.validator.is_address(owner)
            && (token_key.is_native() || ctx.validator.is_address(token));

        let task = valid.then(|| {
            let worker = Worker {
                ctx: ctx.clone(),
                token: token_key.clone(),
                owner: owner_key.clone(),
                state: state.clone(),
            };
            tokio::spawn(worker.run())
        });

        Self {
            token: token_key,
            owner: owner_key,
            state,
            task,
        }
    }

    pub fn token(&self) -> &TokenKey {
        &self.token
    }

    pub fn owner(&self) -> &OwnerAddress {
        &self.owner
    }

    /// `false` when the pair failed validation and nothing will ever be fetched.
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn stats(&self) -> ControllerStats {
        self.state.lock().stats
    }

    /// Tear the controller down.
    pub fn shutdown(self) {
        // Drop does the teardown
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        {
            let mut state = self.state.lock();
            state.torn_down = true;
            state.supersede();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Background half of a controller
struct Worker {
    ctx: ControllerContext,
    token: TokenKey,
    owner: OwnerAddress,
    state: Arc<Mutex<ControllerState>>,
}

async fn next_height(subscription: &mut Option<HeightSubscription>) -> Option<BlockHeight> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

impl Worker {
    async fn run(self) {
        let mut connections = self.ctx.session.subscribe();

        loop {
            let connection = connections.borrow_and_update().clone();
            // Subscribe before the first evaluation so no height is missed in between
            let mut heights = connection
                .as_ref()
                .map(|c| self.ctx.heights.subscribe(c.chain_id));
            self.evaluate(connection.as_ref());

            loop {
                tokio::select! {
                    changed = connections.changed() => {
                        if changed.is_err() {
                            self.state.lock().supersede();
                            return;
                        }
                        break;
                    }
                    height = next_height(&mut heights) => match height {
                        Some(_) => self.evaluate(connection.as_ref()),
                        None => heights = None,
                    },
                }
            }
        }
    }

    /// Decide whether the cached entry needs a fetch for the current height.
    fn evaluate(&self, connection: Option<&Connection>) {
        let mut state = self.state.lock();
        if state.torn_down {
            return;
        }

        let Some(connection) = connection else {
            state.supersede();
            return;
        };
        let chain_id = connection.chain_id;
        let Some(height) = self.ctx.heights.get_block_height(chain_id) else {
            state.supersede();
            return;
        };

        if state.phase == (Phase::Fetching { chain_id, height }) {
            return;
        }
        state.supersede();

        let cached = self.ctx.balances.get_balance(chain_id, &self.owner, &self.token);
        if cached.is_some_and(|entry| entry.is_fresh_at(height)) {
            return;
        }

        let ticket = FetchTicket {
            generation: state.generation,
            chain_id,
            height,
        };
        state.phase = Phase::Fetching { chain_id, height };
        state.stats.issued += 1;
        drop(state);

        debug!(
            "Fetching {} balance of {} on chain {} at height {}",
            self.token, self.owner, chain_id, height
        );
        tokio::spawn(fetch_balance(
            self.state.clone(),
            self.ctx.balances.clone(),
            connection.clone(),
            self.token.clone(),
            self.owner.clone(),
            ticket,
        ));
    }
}

async fn fetch_balance(
    state: Arc<Mutex<ControllerState>>,
    balances: BalanceStore,
    connection: Connection,
    token: TokenKey,
    owner: OwnerAddress,
    ticket: FetchTicket,
) {
    let result = match &token {
        TokenKey::Native => connection.provider.native_balance(owner.as_str()).await,
        TokenKey::Contract(address) => {
            connection
                .provider
                .token_balance(address, owner.as_str())
                .await
        }
    };

    let mut state = state.lock();
    if state.generation != ticket.generation {
        state.stats.discarded += 1;
        debug!(
            "Discarding superseded {} balance of {} fetched for height {}",
            token, owner, ticket.height
        );
        return;
    }

    let value = match result {
        Ok(value) => Some(value),
        Err(e) => {
            // Cached as a failure at this height; the next block retries
            debug!("Balance fetch for {} / {} failed: {}", token, owner, e);
            None
        }
    };
    balances.upsert_balance(ticket.chain_id, &owner, &token, value, ticket.height);
    state.phase = Phase::Idle;
    state.stats.stored += 1;
}
