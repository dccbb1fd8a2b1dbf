//! Axum HTTP handlers for the Certum server.
//!
//! Provides the JSON-RPC endpoint plus a few read-only REST endpoints for
//! verifiers that do not speak JSON-RPC.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use certum_core::{CertificateId, ContentHash};
use certum_registry::{RegistryError, RegistryErrorDetail};
use std::sync::Arc;

use crate::{error_kind_name, handle_request, rpc_codes, JsonRpcRequest, JsonRpcResponse, RootState};

/// Header carrying the authenticated caller identity.
pub const CALLER_HEADER: &str = "x-certum-caller";

/// Build the Axum router with all endpoints.
pub fn build_router(state: Arc<RootState>) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/health", get(handle_health))
        .route("/verify/{hash}", get(handle_verify))
        .route("/certificates/{id}", get(handle_certificate))
        .with_state(state)
}

/// HTTP status for a registry error kind.
pub fn http_status(kind: RegistryError) -> StatusCode {
    match kind {
        RegistryError::Authorization => StatusCode::FORBIDDEN,
        RegistryError::NotFound => StatusCode::NOT_FOUND,
        RegistryError::InvalidState => StatusCode::CONFLICT,
        RegistryError::Validation => StatusCode::BAD_REQUEST,
        RegistryError::Precondition => StatusCode::PRECONDITION_FAILED,
        RegistryError::AuditFailure | RegistryError::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_body(e: &RegistryErrorDetail) -> (StatusCode, Json<serde_json::Value>) {
    (
        http_status(e.kind),
        Json(serde_json::json!({
            "error": e.to_string(),
            "kind": error_kind_name(e.kind),
        })),
    )
}

/// The caller header, if present. `Err` when it is not valid UTF-8.
fn caller_from_headers(headers: &HeaderMap) -> Result<Option<String>, ()> {
    match headers.get(CALLER_HEADER) {
        Some(v) => v.to_str().map(|s| Some(s.trim().to_string())).map_err(|_| ()),
        None => Ok(None),
    }
}

/// POST /rpc -- JSON-RPC over HTTP. The caller header, when present,
/// replaces any `caller` in the params.
async fn handle_rpc(
    State(state): State<Arc<RootState>>,
    headers: HeaderMap,
    Json(mut request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(()) => {
            return Json(JsonRpcResponse::error(
                request.id.clone(),
                rpc_codes::INVALID_REQUEST,
                format!("{} header must be valid UTF-8", CALLER_HEADER),
            ))
        }
    };

    if let Some(caller) = caller {
        let params = request
            .params
            .get_or_insert_with(|| serde_json::json!({}));
        match params.as_object_mut() {
            Some(obj) => {
                obj.insert("caller".into(), serde_json::Value::String(caller));
            }
            None => {
                return Json(JsonRpcResponse::error(
                    request.id.clone(),
                    rpc_codes::INVALID_PARAMS,
                    "params must be an object".into(),
                ))
            }
        }
    }

    Json(handle_request(&state, &request))
}

/// GET /health -- server info
async fn handle_health(State(state): State<Arc<RootState>>) -> impl IntoResponse {
    let registry = &state.registry;
    match (registry.active_count(), registry.total_issued()) {
        (Ok(active), Ok(total)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "active_count": active,
                "total_issued": total,
            })),
        ),
        (Err(e), _) | (_, Err(e)) => error_body(&e),
    }
}

/// GET /verify/{hash} -- was this exact content registered?
async fn handle_verify(
    State(state): State<Arc<RootState>>,
    Path(hash): Path<String>,
) -> impl IntoResponse {
    let hash = match ContentHash::parse(&hash) {
        Ok(h) => h,
        Err(e) => return error_body(&RegistryErrorDetail::from(e)),
    };
    match state.registry.verify_by_hash(&hash) {
        Ok(v) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "hash": hash,
                "is_valid": v.is_valid,
                "certificate_id": v.certificate_id,
                "holder": v.holder,
            })),
        ),
        Err(e) => error_body(&e),
    }
}

/// GET /certificates/{id} -- full record including current status
async fn handle_certificate(
    State(state): State<Arc<RootState>>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.registry.certificate(CertificateId(id)) {
        Ok(cert) => (StatusCode::OK, Json(serde_json::json!(cert))),
        Err(e) => error_body(&e),
    }
}
