//! Chain Integration Module
//!
//! This module handles everything that talks to, or describes, the live chain:
//! - Provider seam for balances and block notifications (ethers websocket backend)
//! - The wallet session exposing the currently connected network
//! - The block listener pumping new heights into the block height store

mod listener;
mod provider;
mod session;

pub use listener::{BlockListener, ListenerHandle};
pub use provider::{AddressValidator, ChainProvider, EthAddressValidator, EthersProvider};
pub use session::{Connection, Session};
