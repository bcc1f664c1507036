use ethers::types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a network (EIP-155 chain id)
pub type ChainId = u64;

/// Height of the most recently observed block on a chain
pub type BlockHeight = u64;

/// Cached balance value. `None` records that the fetch for that height failed.
pub type BalanceValue = Option<U256>;

/// Token string that stands for the chain's base currency
pub const NATIVE_TOKEN: &str = "ETH";

/// Account whose balances are tracked
///
/// Kept as the raw string the consumer passed in; the stores never normalise keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerAddress(String);

impl OwnerAddress {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which asset a balance is held in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKey {
    /// The chain's native currency
    Native,
    /// An ERC20-style token contract
    Contract(String),
}

impl TokenKey {
    /// Maps a consumer token string to its key without validating it.
    pub fn from_raw(raw: &str) -> Self {
        if raw == NATIVE_TOKEN {
            TokenKey::Native
        } else {
            TokenKey::Contract(raw.to_string())
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, TokenKey::Native)
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKey::Native => f.write_str(NATIVE_TOKEN),
            TokenKey::Contract(address) => f.write_str(address),
        }
    }
}

/// Cached balance together with the height its fetch was issued at
///
/// Entries are never edited in place; the balance store swaps in a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub value: BalanceValue,
    pub fetched_at_height: BlockHeight,
}

impl BalanceEntry {
    /// An entry is fresh only while the chain is still at the height it was fetched for.
    pub fn is_fresh_at(&self, current: BlockHeight) -> bool {
        self.fetched_at_height == current
    }
}

/// Errors raised by the chain provider
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("rpc call failed: {0}")]
    Rpc(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("block subscription failed: {0}")]
    Subscription(String),
}

impl From<ethers::providers::ProviderError> for ProviderError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        ProviderError::Rpc(err.to_string())
    }
}
