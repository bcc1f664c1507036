//! API Module
//!
//! JSON-RPC endpoint exposing block heights and cached balances.

mod server;
pub use server::Server;
