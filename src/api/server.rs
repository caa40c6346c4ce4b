//! API Server Module
//!
//! This module implements a JSON-RPC server in front of the nonce registry.
//! The transaction submission path calls `newNonce` before stamping a
//! transaction and `removeNonce` when a stamped transaction is dropped.

use crate::{
    config::Config,
    state::{ManagedState, StateCache},
    AccountState,
    AddressNonceParams,
    AddressParams,
    NonceResponse,
    RpcError,
};
use axum::{Router, routing::post, Json, extract::State};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state that is accessible across all request handlers
///
/// - `nonces`: the registry handing out provisional nonces
/// - `state_cache`: the in-memory ledger the registry polls
#[derive(Clone)]
pub struct AppState {
    nonces: Arc<ManagedState<StateCache>>,
    state_cache: StateCache,
}

impl AppState {
    pub fn new(state_cache: StateCache) -> Self {
        Self {
            nonces: Arc::new(ManagedState::new(state_cache.clone())),
            state_cache,
        }
    }

    pub fn nonces(&self) -> &ManagedState<StateCache> {
        &self.nonces
    }
}

/// The main API server struct
pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Server configuration (host, port, etc.)
    /// * `state_cache` - The ledger the nonce registry resyncs against
    pub fn new(config: Config, state_cache: StateCache) -> Self {
        Self {
            config,
            state: AppState::new(state_cache),
        }
    }

    /// Router with a single POST endpoint at "/"
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .with_state(state)
    }

    /// Binds to the configured address and serves requests until shutdown
    pub async fn start(self) -> anyhow::Result<()> {
        let app = Self::router(self.state);

        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

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
/// Either `result` or `error` will be populated, but not both.
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

impl JsonRpcResponse {
    fn new(id: Value, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(err) => (
                None,
                Some(JsonRpcError {
                    code: err.code(),
                    message: err.to_string(),
                }),
            ),
        };
        Self {
            jsonrpc: "2.0".to_string(),
            result,
            error,
            id,
        }
    }
}

/// Main RPC request handler
///
/// Routes the request to the appropriate handler based on the method name.
async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    info!("Received RPC request: {}", request.method);

    let outcome = dispatch(&state, &request.method, request.params);
    if let Err(err) = &outcome {
        warn!("RPC request {} failed: {}", request.method, err);
    }

    Json(JsonRpcResponse::new(request.id, outcome))
}

fn dispatch(state: &AppState, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "newNonce" => {
            let AddressParams { address } = parse(params)?;
            let nonce = state
                .nonces
                .new_nonce(address)
                .ok_or(RpcError::NoncesExhausted(address))?;
            to_value(NonceResponse { address, nonce })
        }
        "removeNonce" => {
            let AddressNonceParams { address, nonce } = parse(params)?;
            state.nonces.remove_nonce(address, nonce);
            to_value(state.nonces.window(address))
        }
        "pendingNonce" => {
            let AddressParams { address } = parse(params)?;
            let nonce = state
                .nonces
                .pending_nonce(address)
                .ok_or(RpcError::NoncesExhausted(address))?;
            to_value(NonceResponse { address, nonce })
        }
        "nonceWindow" => {
            let AddressParams { address } = parse(params)?;
            to_value(state.nonces.window(address))
        }
        "resetNonce" => {
            let AddressNonceParams { address, nonce } = parse(params)?;
            state.nonces.reset_account(address, nonce);
            to_value(state.nonces.window(address))
        }
        "applyAccountState" => {
            let account: AccountState = parse(params)?;
            state.state_cache.update(account);
            Ok(Value::Bool(true))
        }
        other => Err(RpcError::MethodNotFound(other.to_string())),
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    Ok(serde_json::from_value(params)?)
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{self, Body},
        http::{Request, StatusCode},
    };
    use ethers::types::Address;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_state(nonce: u64) -> (AppState, Address) {
        let addr = Address::repeat_byte(0x42);
        let cache = StateCache::new();
        cache.set_nonce(addr, nonce);
        (AppState::new(cache), addr)
    }

    async fn call(state: &AppState, method: &str, params: Value) -> Value {
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        let response = Server::router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from(request.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_new_and_remove_nonce() {
        let (state, addr) = test_state(100);

        for expected in 100..103u64 {
            let response = call(&state, "newNonce", json!({ "address": addr })).await;
            assert_eq!(response["result"]["nonce"], json!(expected));
        }

        let response = call(&state, "removeNonce", json!({ "address": addr, "nonce": 101 })).await;
        assert_eq!(response["result"]["reserved"], json!([100]));
        assert_eq!(response["result"]["next"], json!(101));

        let response = call(&state, "newNonce", json!({ "address": addr })).await;
        assert_eq!(response["result"]["nonce"], json!(101));
    }

    #[tokio::test]
    async fn test_apply_account_state_resyncs() {
        let (state, addr) = test_state(5);
        call(&state, "newNonce", json!({ "address": addr })).await;

        let account = AccountState {
            address: addr,
            balance: Default::default(),
            nonce: 20,
        };
        let response = call(&state, "applyAccountState", serde_json::to_value(&account).unwrap()).await;
        assert_eq!(response["result"], json!(true));

        let response = call(&state, "pendingNonce", json!({ "address": addr })).await;
        assert_eq!(response["result"]["nonce"], json!(20));
        let response = call(&state, "newNonce", json!({ "address": addr })).await;
        assert_eq!(response["result"]["nonce"], json!(20));
    }

    #[tokio::test]
    async fn test_window_and_reset() {
        let (state, addr) = test_state(0);

        let response = call(&state, "nonceWindow", json!({ "address": addr })).await;
        assert_eq!(response["result"], Value::Null);
        assert!(response.get("error").is_none());

        let response = call(&state, "resetNonce", json!({ "address": addr, "nonce": 9 })).await;
        assert_eq!(response["result"]["base"], json!(9));
        assert_eq!(response["result"]["reserved"], json!([]));
        assert!(state.nonces().has_account(&addr));
    }

    #[tokio::test]
    async fn test_nonce_space_exhausted() {
        let (state, addr) = test_state(0);
        let account = AccountState {
            address: addr,
            balance: Default::default(),
            nonce: u64::MAX,
        };
        call(&state, "applyAccountState", serde_json::to_value(&account).unwrap()).await;

        let response = call(&state, "newNonce", json!({ "address": addr })).await;
        assert_eq!(response["result"]["nonce"], json!(u64::MAX));

        let response = call(&state, "pendingNonce", json!({ "address": addr })).await;
        assert_eq!(response["error"]["code"], json!(-32000));

        let response = call(&state, "newNonce", json!({ "address": addr })).await;
        assert_eq!(response["error"]["code"], json!(-32000));

        let response = call(&state, "nonceWindow", json!({ "address": addr })).await;
        assert_eq!(response["result"]["reserved"], json!([u64::MAX]));
        assert_eq!(response["result"]["next"], Value::Null);

        // Freeing the top slot makes it available again
        call(&state, "removeNonce", json!({ "address": addr, "nonce": u64::MAX })).await;
        let response = call(&state, "newNonce", json!({ "address": addr })).await;
        assert_eq!(response["result"]["nonce"], json!(u64::MAX));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (state, _) = test_state(0);

        let response = call(&state, "sendTransaction", json!({})).await;
        assert_eq!(response["error"]["code"], json!(-32601));
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let (state, _) = test_state(0);

        let response = call(&state, "newNonce", json!({ "address": "not-an-address" })).await;
        assert_eq!(response["error"]["code"], json!(-32602));

        let response = call(&state, "removeNonce", json!({ "address": Address::zero() })).await;
        assert_eq!(response["error"]["code"], json!(-32602));
    }
}
