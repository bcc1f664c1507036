//! Provider seam
//!
//! Everything the cache needs from a live node: block notifications and the two
//! "latest state" balance queries. `EthersProvider` is the websocket-backed
//! implementation used by the binary; tests script their own.

use crate::{BlockHeight, ChainId, ProviderError};
use async_trait::async_trait;
use ethers::{
    contract::abigen,
    providers::{Middleware, Provider, Ws},
    types::{Address, U256},
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

abigen!(
    Erc20,
    r#"[
        function balanceOf(address owner) external view returns (uint256)
    ]"#
);

/// Node connection used to follow the chain and query balances
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Native-currency balance of `owner` at the latest block.
    async fn native_balance(&self, owner: &str) -> Result<U256, ProviderError>;

    /// ERC20 `balanceOf(owner)` on the `token` contract at the latest block.
    async fn token_balance(&self, token: &str, owner: &str) -> Result<U256, ProviderError>;

    /// Forward every new block height into `sink`
    ///
    /// Returns once `sink` is closed (the subscriber went away) or the upstream
    /// subscription ends.
    async fn watch_blocks(&self, sink: mpsc::UnboundedSender<BlockHeight>)
        -> Result<(), ProviderError>;
}

/// Predicate deciding whether a string is a well-formed account or contract address
pub trait AddressValidator: Send + Sync {
    fn is_address(&self, candidate: &str) -> bool;
}

impl<F> AddressValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_address(&self, candidate: &str) -> bool {
        self(candidate)
    }
}

/// Accepts 20-byte hex addresses with a `0x` prefix
#[derive(Debug, Clone, Copy, Default)]
pub struct EthAddressValidator;

impl AddressValidator for EthAddressValidator {
    fn is_address(&self, candidate: &str) -> bool {
        candidate.starts_with("0x") && candidate.parse::<Address>().is_ok()
    }
}

fn parse_address(raw: &str) -> Result<Address, ProviderError> {
    raw.parse::<Address>()
        .map_err(|_| ProviderError::InvalidAddress(raw.to_string()))
}

/// Node-reported chain ids beyond `u64` are refused rather than truncated.
fn chain_id_from(raw: U256) -> Result<ChainId, ProviderError> {
    u64::try_from(raw)
        .map_err(|e| ProviderError::Rpc(format!("chain id {} out of range: {}", raw, e)))
}

/// Websocket JSON-RPC provider
pub struct EthersProvider {
    provider: Arc<Provider<Ws>>,
}

impl EthersProvider {
    /// Open a websocket connection and ask the node which chain it serves.
    pub async fn connect(url: &str) -> Result<(Self, ChainId), ProviderError> {
        let ws = Ws::connect(url)
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))?;
        let provider = Arc::new(Provider::new(ws));
        let chain_id = chain_id_from(provider.get_chainid().await?)?;
        info!("Connected to {} (chain id {})", url, chain_id);

        Ok((Self { provider }, chain_id))
    }
}

#[async_trait]
impl ChainProvider for EthersProvider {
    async fn native_balance(&self, owner: &str) -> Result<U256, ProviderError> {
        let owner = parse_address(owner)?;
        Ok(self.provider.get_balance(owner, None).await?)
    }

    async fn token_balance(&self, token: &str, owner: &str) -> Result<U256, ProviderError> {
        let contract = Erc20::new(parse_address(token)?, self.provider.clone());
        contract
            .balance_of(parse_address(owner)?)
            .call()
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))
    }

    async fn watch_blocks(
        &self,
        sink: mpsc::UnboundedSender<BlockHeight>,
    ) -> Result<(), ProviderError> {
        let mut blocks = self
            .provider
            .subscribe_blocks()
            .await
            .map_err(|e| ProviderError::Subscription(e.to_string()))?;

        while let Some(block) = blocks.next().await {
            let Some(number) = block.number else {
                // Pending blocks carry no number
                continue;
            };
            if sink.send(number.as_u64()).is_err() {
                debug!("Block subscriber went away, closing subscription");
                break;
            }
        }
        Ok(())
    }
}
