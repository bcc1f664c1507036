//! Scripted provider and helpers shared by the in-crate tests

use crate::{chain::ChainProvider, BlockHeight, ProviderError};
use async_trait::async_trait;
use ethers::types::U256;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Balance query waiting for the test to settle it
pub(crate) struct BalanceRequest {
    /// `None` for native-currency queries
    pub token: Option<String>,
    pub owner: String,
    respond: oneshot::Sender<Result<U256, ProviderError>>,
}

impl BalanceRequest {
    pub fn resolve(self, value: u64) {
        let _ = self.respond.send(Ok(U256::from(value)));
    }

    pub fn reject(self) {
        let _ = self
            .respond
            .send(Err(ProviderError::Rpc("execution reverted".to_string())));
    }
}

/// Provider whose calls are handed to the test instead of a node
pub(crate) struct MockProvider {
    requests: mpsc::UnboundedSender<BalanceRequest>,
    block_sinks: mpsc::UnboundedSender<mpsc::UnboundedSender<BlockHeight>>,
}

/// Test side of a [`MockProvider`]
pub(crate) struct MockHandles {
    requests: mpsc::UnboundedReceiver<BalanceRequest>,
    block_sinks: mpsc::UnboundedReceiver<mpsc::UnboundedSender<BlockHeight>>,
}

impl MockProvider {
    pub fn new() -> (Self, MockHandles) {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (sinks_tx, sinks_rx) = mpsc::unbounded_channel();
        (
            Self {
                requests: requests_tx,
                block_sinks: sinks_tx,
            },
            MockHandles {
                requests: requests_rx,
                block_sinks: sinks_rx,
            },
        )
    }

    async fn query(&self, token: Option<&str>, owner: &str) -> Result<U256, ProviderError> {
        let (tx, rx) = oneshot::channel();
        let request = BalanceRequest {
            token: token.map(str::to_string),
            owner: owner.to_string(),
            respond: tx,
        };
        self.requests
            .send(request)
            .map_err(|_| ProviderError::Rpc("mock closed".to_string()))?;
        rx.await
            .map_err(|_| ProviderError::Rpc("request dropped".to_string()))?
    }
}

#[async_trait]
impl ChainProvider for MockProvider {
    async fn native_balance(&self, owner: &str) -> Result<U256, ProviderError> {
        self.query(None, owner).await
    }

    async fn token_balance(&self, token: &str, owner: &str) -> Result<U256, ProviderError> {
        self.query(Some(token), owner).await
    }

    async fn watch_blocks(
        &self,
        sink: mpsc::UnboundedSender<BlockHeight>,
    ) -> Result<(), ProviderError> {
        self.block_sinks
            .send(sink.clone())
            .map_err(|_| ProviderError::Subscription("mock closed".to_string()))?;
        sink.closed().await;
        Ok(())
    }
}

impl MockHandles {
    /// Next balance query issued against the provider.
    pub async fn next_request(&mut self) -> BalanceRequest {
        tokio::time::timeout(TEST_TIMEOUT, self.requests.recv())
            .await
            .expect("timed out waiting for a balance request")
            .expect("mock provider dropped")
    }

    /// Asserts that no balance query is pending right now.
    pub async fn assert_no_request(&mut self) {
        settle().await;
        assert!(
            self.requests.try_recv().is_err(),
            "unexpected balance request"
        );
    }

    /// Sink handed to the provider by the next block subscription.
    pub async fn next_block_sink(&mut self) -> mpsc::UnboundedSender<BlockHeight> {
        tokio::time::timeout(TEST_TIMEOUT, self.block_sinks.recv())
            .await
            .expect("timed out waiting for a block subscription")
            .expect("mock provider dropped")
    }
}

/// Let spawned tasks run until they are all parked.
pub(crate) async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Poll `condition` until it holds, failing the test after a timeout.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    let result = tokio::time::timeout(TEST_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not reached before timeout");
}
