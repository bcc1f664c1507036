//! API Server Module
//!
//! This module implements a JSON-RPC server that exposes the balance cache to
//! consumers living outside the process. Reads are answered from the cache;
//! `watchBalance` / `unwatchBalance` mount and unmount refresh controllers.

use crate::{config::ApiConfig, tracker::BalanceTracker, ChainId};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared application state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    tracker: Arc<BalanceTracker>,
}

/// The main API server struct
pub struct Server {
    config: ApiConfig,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Listening address
    /// * `tracker` - Balance tracker answering the queries
    pub fn new(config: ApiConfig, tracker: Arc<BalanceTracker>) -> Self {
        Self {
            config,
            state: AppState { tracker },
        }
    }

    /// Router serving JSON-RPC on `POST /`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn start(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

/// JSON-RPC 2.0 request structure
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Value,
}

/// JSON-RPC 2.0 response structure
///
/// Either `result` or `error` is populated, never both.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

/// JSON-RPC error object
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// Parameters naming a watched pair
#[derive(Debug, Deserialize)]
struct PairParams {
    token: String,
    owner: String,
}

const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn failure(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        }
    }
}

/// Main RPC request handler
///
/// Routes the request to the method handler by name.
async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    debug!("Received RPC request: {}", request.method);
    let JsonRpcRequest {
        method, params, id, ..
    } = request;

    let outcome = match method.as_str() {
        "blockNumber" => block_number(&state, params),
        "getBalance" => get_balance(&state, params),
        "watchBalance" => watch_balance(&state, params),
        "unwatchBalance" => unwatch_balance(&state, params),
        _ => Err((METHOD_NOT_FOUND, "Method not found".to_string())),
    };

    Json(match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err((code, message)) => JsonRpcResponse::failure(id, code, message),
    })
}

type MethodResult = Result<Value, (i32, String)>;

fn invalid_params(e: impl std::fmt::Display) -> (i32, String) {
    (INVALID_PARAMS, format!("Invalid params: {}", e))
}

/// `blockNumber` with params `[]`, `null` or `[chainId]`
fn block_number(state: &AppState, params: Value) -> MethodResult {
    let chain_id = match params {
        Value::Null => None,
        params => serde_json::from_value::<Vec<ChainId>>(params)
            .map_err(invalid_params)?
            .first()
            .copied(),
    };
    Ok(state
        .tracker
        .current_block_height(chain_id)
        .map_or(Value::Null, Value::from))
}

fn get_balance(state: &AppState, params: Value) -> MethodResult {
    let pair: PairParams = serde_json::from_value(params).map_err(invalid_params)?;
    // "loading" covers both not-yet-fetched and stale entries
    Ok(match state.tracker.address_balance(&pair.token, &pair.owner) {
        None => json!({ "status": "loading" }),
        Some(None) => json!({ "status": "failed" }),
        Some(Some(value)) => json!({ "status": "available", "value": value }),
    })
}

fn watch_balance(state: &AppState, params: Value) -> MethodResult {
    let pair: PairParams = serde_json::from_value(params).map_err(invalid_params)?;
    let consumers = state.tracker.watch(&pair.token, &pair.owner);
    debug!("{} / {} now has {} consumers", pair.token, pair.owner, consumers);
    Ok(Value::Bool(true))
}

fn unwatch_balance(state: &AppState, params: Value) -> MethodResult {
    let pair: PairParams = serde_json::from_value(params).map_err(invalid_params)?;
    Ok(Value::Bool(state.tracker.unwatch(&pair.token, &pair.owner)))
}
