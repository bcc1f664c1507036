//! Client-side cache that keeps block heights and account balances fresh with
//! respect to a live chain connection.
//! Balances are fetched per block and tagged with the height they were fetched
//! at, so nothing computed against an older block is ever served once a newer
//! block is known.

pub mod types; // Chain ids, heights, balance keys and entries, provider errors.
pub mod state; // Process-wide block height and balance stores.
pub mod chain; // Provider seam, wallet session and the block listener.
pub mod refresh; // Per (token, owner) refresh controllers and their registry.
pub mod tracker; // Consumer-facing read path and watch lifecycle.
pub mod api; // JSON-RPC endpoint over the tracker.
pub mod config; // Defines and loads service configuration.

#[cfg(test)]
mod testing;

// Re-export commonly used types for easier access.
pub use types::*;
pub use config::Config;
pub use tracker::BalanceTracker;
