//! State Management Module
//!
//! In-memory, process-wide caches shared by every component:
//! - `BlockHeightStore`: latest block height per chain
//! - `BalanceStore`: balances per (chain, owner, token) with the height they were fetched at

mod balances;
mod block_height;

pub use balances::BalanceStore;
pub use block_height::{BlockHeightStore, HeightSubscription};
