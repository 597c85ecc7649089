//! HTTP transport for the command surface.
//!
//! Every command is a POST to `/<command>` with a JSON params object (an
//! absent body counts as `{}`). Responses are always 200 with the normalized
//! JSON record; failure is in the body, not the status code.

use crate::rpc::service::WalletRpc;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct RpcState {
    pub rpc: Arc<WalletRpc>,
    pub app_name: String,
}

pub fn create_router(rpc: Arc<WalletRpc>) -> Router {
    create_router_with_name(rpc, "walletd")
}

pub fn create_router_with_name(rpc: Arc<WalletRpc>, app_name: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/:command", post(dispatch))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(RpcState { rpc, app_name: app_name.into() })
}

async fn health(State(s): State<RpcState>) -> impl IntoResponse {
    let logged_in = s.rpc.lifecycle().is_logged_in().await;
    Json(serde_json::json!({ "status": "ok", "service": s.app_name, "logged_in": logged_in }))
}

async fn dispatch(
    State(s): State<RpcState>,
    Path(command): Path<String>,
    params: Option<Json<Value>>,
) -> Json<Value> {
    let params = params.map(|Json(v)| v).unwrap_or(Value::Object(Default::default()));
    Json(s.rpc.handle(&command, params).await)
}
