//! `POST /mcp` — the JSON-RPC tool endpoint.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::auth::{self, API_KEY_QUERY_PARAM};
use crate::rpc::RpcResponse;
use crate::AppState;

/// Hands the raw body to the dispatcher. Authentication happens inside the
/// dispatcher so a rejected request still gets a JSON-RPC error envelope.
pub async fn mcp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> (StatusCode, Json<RpcResponse>) {
    let credential = auth::credential_from_request(
        &headers,
        query.get(API_KEY_QUERY_PARAM).map(String::as_str),
    );
    let (status, response) = state.dispatcher.handle(&body, credential);
    (status, Json(response))
}
