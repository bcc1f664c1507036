//! Balance Refresh Module
//!
//! Keeps watched balances fresh with respect to the chain:
//! - RefreshController: per (token, owner) unit that fetches on every new block
//! - WatchRegistry: mounts one controller per observed pair and tears it down
//!   when nobody observes the pair any more

mod controller;
mod registry;


pub use controller::{ControllerContext, ControllerStats, Phase, RefreshController};
pub use registry::WatchRegistry;
