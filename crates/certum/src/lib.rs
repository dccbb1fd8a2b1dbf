//! Certum Root Library
//!
//! Host for the Certum certificate registry. Provides configuration, error
//! handling, the JSON-RPC dispatch over the registry's operation surface,
//! and the timer-driven expiration sweep.
//!
//! # Architecture
//!
//! The binary is a thin host. It builds one `Registry` from configuration,
//! routes JSON-RPC requests to it over stdio or HTTP, and runs the sweep on
//! an interval. Caller identity arrives with each request; the host does
//! not authenticate it.

pub mod config;
pub mod error;
pub mod http;
pub mod sweep;

pub use config::{RootConfig, ServerConfig, SweepConfig, Transport};
pub use error::{RootError, RootResult};

use certum_core::{AuditChainWriter, CertificateId, Clock, ContentHash, Identity, SystemClock};
use certum_registry::{
    AuditChain, MintRequest, Registry, RegistryError, RegistryErrorDetail, RegistryResult,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// JSON-RPC types
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    pub id: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: serde_json::json!(1),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }

    /// Create an error response with additional data.
    pub fn error_with_data(
        id: serde_json::Value,
        code: i64,
        message: String,
        data: serde_json::Value,
    ) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: Some(data),
            }),
            id,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC error codes (standard + Certum-specific)
// ---------------------------------------------------------------------------

pub mod rpc_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Caller lacks the role or ownership the operation needs.
    pub const AUTHORIZATION_ERROR: i64 = -32010;
    /// Unknown certificate, issuer, or active-index position.
    pub const NOT_FOUND: i64 = -32011;
    /// Transition out of a terminal state, or a roster conflict.
    pub const INVALID_STATE: i64 = -32012;
    /// Malformed identity, URI, hash, expiration, or name.
    pub const VALIDATION_ERROR: i64 = -32013;
    /// Expiry attempted before the deadline.
    pub const PRECONDITION_FAILED: i64 = -32014;
}

/// JSON-RPC code for a registry error kind.
pub fn rpc_code(kind: RegistryError) -> i64 {
    match kind {
        RegistryError::Authorization => rpc_codes::AUTHORIZATION_ERROR,
        RegistryError::NotFound => rpc_codes::NOT_FOUND,
        RegistryError::InvalidState => rpc_codes::INVALID_STATE,
        RegistryError::Validation => rpc_codes::VALIDATION_ERROR,
        RegistryError::Precondition => rpc_codes::PRECONDITION_FAILED,
        RegistryError::AuditFailure | RegistryError::Internal => rpc_codes::INTERNAL_ERROR,
    }
}

/// Stable machine-readable name for a registry error kind.
pub fn error_kind_name(kind: RegistryError) -> &'static str {
    match kind {
        RegistryError::Authorization => "authorization",
        RegistryError::NotFound => "not_found",
        RegistryError::InvalidState => "invalid_state",
        RegistryError::Validation => "validation",
        RegistryError::Precondition => "precondition",
        RegistryError::AuditFailure => "audit_failure",
        RegistryError::Internal => "internal",
    }
}

// ---------------------------------------------------------------------------
// Root state
// ---------------------------------------------------------------------------

/// Runtime state for the Certum host.
///
/// Created by `initialize_root` and shared by every transport and the
/// sweep task.
pub struct RootState {
    pub config: RootConfig,
    pub registry: Arc<Registry>,
    pub audit: Arc<AuditChain>,
}

impl RootState {
    /// Write the audit log to `path` as JSON lines, oldest entry first.
    pub fn export_audit(&self, path: &Path) -> RootResult<usize> {
        let entries = self.audit.entries()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        for entry in &entries {
            serde_json::to_writer(&mut file, entry)?;
            file.write_all(b"\n")?;
        }
        Ok(entries.len())
    }
}

/// Initialize the host from configuration using the system clock.
///
/// # Contract
/// - Precondition: config is valid and names a superadmin
/// - Postcondition: the registry is empty and ready to handle requests
pub fn initialize_root(config: RootConfig) -> RootResult<RootState> {
    initialize_root_with_clock(config, Arc::new(SystemClock))
}

/// Initialize the host with an explicit clock.
pub fn initialize_root_with_clock(
    config: RootConfig,
    clock: Arc<dyn Clock>,
) -> RootResult<RootState> {
    config.validate()?;
    let superadmin = config.require_superadmin()?.clone();

    info!(
        superadmin = %superadmin,
        data_dir = %config.data_dir.display(),
        transport = ?config.server.transport,
        "initializing certum root"
    );

    std::fs::create_dir_all(&config.data_dir).map_err(|e| {
        RootError::Internal(format!(
            "failed to create data directory {}: {}",
            config.data_dir.display(),
            e
        ))
    })?;

    let audit = Arc::new(AuditChain::new());
    let registry = Arc::new(Registry::new(superadmin, clock, audit.clone()));

    info!("certum root initialized successfully");

    Ok(RootState {
        config,
        registry,
        audit,
    })
}

/// Flush the audit log into the data directory.
///
/// The registry is in-memory only; the export is what survives the
/// process.
pub fn shutdown_root(state: &RootState) -> RootResult<()> {
    info!("shutting down certum root");
    let path = state.config.data_dir.join("audit.jsonl");
    let written = state.export_audit(&path)?;
    info!(entries = written, path = %path.display(), "audit log exported");
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Process a JSON-RPC request against the registry.
///
/// # Contract
/// - Postcondition: a JsonRpcResponse is generated; registry errors carry
///   their kind in `error.data.kind`
pub fn handle_request(state: &RootState, request: &JsonRpcRequest) -> JsonRpcResponse {
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(
            request.id.clone(),
            rpc_codes::INVALID_REQUEST,
            format!("unsupported JSON-RPC version: {}", request.jsonrpc),
        );
    }

    debug!(method = %request.method, "handling request");

    let result = match request.method.as_str() {
        "initialize" => Ok(handle_initialize()),
        "health" => handle_health(state),

        // Issuer roster
        "registerIssuer" => handle_register_issuer(state, request),
        "revokeIssuer" => handle_revoke_issuer(state, request),
        "isRegisteredIssuer" => handle_is_registered_issuer(state, request),
        "issuerName" => handle_issuer_name(state, request),
        "listIssuers" => handle_list_issuers(state),

        // Lifecycle
        "mint" => handle_mint(state, request),
        "revoke" => handle_revoke(state, request),
        "expire" => handle_expire(state, request),

        // Certificate reads
        "isExpiredComputed" => with_id(state, request, |r, id| {
            Ok(serde_json::json!({ "expired": r.is_expired_computed(id)? }))
        }),
        "isExpiredOfficial" => with_id(state, request, |r, id| {
            Ok(serde_json::json!({ "expired": r.is_expired_official(id)? }))
        }),
        "isRevoked" => with_id(state, request, |r, id| {
            Ok(serde_json::json!({ "revoked": r.is_revoked(id)? }))
        }),
        "certificate" => with_id(state, request, |r, id| Ok(serde_json::json!(r.certificate(id)?))),
        "status" => with_id(state, request, |r, id| {
            Ok(serde_json::json!({ "status": r.status(id)? }))
        }),
        "expirationTimestamp" => with_id(state, request, |r, id| {
            Ok(serde_json::json!({ "expiration_timestamp": r.expiration_timestamp(id)? }))
        }),
        "contentUri" => with_id(state, request, |r, id| {
            Ok(serde_json::json!({ "content_uri": r.content_uri(id)? }))
        }),
        "holderOf" => with_id(state, request, |r, id| {
            Ok(serde_json::json!({ "holder": r.holder_of(id)? }))
        }),
        "totalIssued" => registry_call(|| {
            Ok(serde_json::json!({ "total": state.registry.total_issued()? }))
        }),

        // Active set
        "activeCount" => registry_call(|| {
            Ok(serde_json::json!({ "count": state.registry.active_count()? }))
        }),
        "activeIdAt" => handle_active_id_at(state, request),

        // Verification
        "verifyByHash" => handle_verify_by_hash(state, request),
        "verifyFile" => handle_verify_file(state, request),

        // Expiration sweep
        "checkDue" => handle_check_due(state, request),
        "commitDue" => handle_commit_due(state, request),
        "sweep" => handle_sweep(state, request),
        "upkeepNeeded" => handle_upkeep_needed(state, request),

        // Audit
        "audit/list" => handle_audit_list(state, request),
        "audit/verify" => handle_audit_verify(state),

        _ => {
            warn!(method = %request.method, "unknown method");
            Err(HandlerError::Rpc(
                rpc_codes::METHOD_NOT_FOUND,
                format!("unknown method: {}", request.method),
            ))
        }
    };

    match result {
        Ok(value) => JsonRpcResponse::success(request.id.clone(), value),
        Err(HandlerError::Rpc(code, message)) => {
            JsonRpcResponse::error(request.id.clone(), code, message)
        }
        Err(HandlerError::Registry(detail)) => {
            let mut data = serde_json::json!({ "kind": error_kind_name(detail.kind) });
            if let Some(id) = detail.certificate_id {
                data["certificate_id"] = serde_json::json!(id);
            }
            JsonRpcResponse::error_with_data(
                request.id.clone(),
                rpc_code(detail.kind),
                detail.to_string(),
                data,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Request handlers (internal)
// ---------------------------------------------------------------------------

enum HandlerError {
    Rpc(i64, String),
    Registry(RegistryErrorDetail),
}

impl From<RegistryErrorDetail> for HandlerError {
    fn from(e: RegistryErrorDetail) -> Self {
        HandlerError::Registry(e)
    }
}

type HandlerResult = Result<serde_json::Value, HandlerError>;

fn parse_params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, HandlerError> {
    let params = request
        .params
        .clone()
        .unwrap_or_else(|| serde_json::json!({}));
    serde_json::from_value(params).map_err(|e| {
        HandlerError::Rpc(
            rpc_codes::INVALID_PARAMS,
            format!("invalid params for {}: {}", request.method, e),
        )
    })
}

fn to_value<T: Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| {
        HandlerError::Rpc(
            rpc_codes::INTERNAL_ERROR,
            format!("failed to serialize result: {}", e),
        )
    })
}

fn registry_call(f: impl FnOnce() -> RegistryResult<serde_json::Value>) -> HandlerResult {
    f().map_err(HandlerError::Registry)
}

#[derive(Deserialize)]
struct IdParams {
    id: CertificateId,
}

fn with_id(
    state: &RootState,
    request: &JsonRpcRequest,
    f: impl FnOnce(&Registry, CertificateId) -> RegistryResult<serde_json::Value>,
) -> HandlerResult {
    let params: IdParams = parse_params(request)?;
    registry_call(|| f(&state.registry, params.id))
}

fn handle_initialize() -> serde_json::Value {
    serde_json::json!({
        "serverInfo": {
            "name": "certum",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_health(state: &RootState) -> HandlerResult {
    let registry = &state.registry;
    Ok(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "superadmin": registry.superadmin(),
        "active_count": registry.active_count()?,
        "total_issued": registry.total_issued()?,
        "audit_entries": state.audit.len(),
    }))
}

/// Identities and hashes in the subject of an operation are parsed here
/// rather than by serde, so a malformed value is a validation error and not
/// a params error.
fn parse_identity(value: &str) -> Result<Identity, HandlerError> {
    Identity::parse(value).map_err(|e| HandlerError::Registry(e.into()))
}

#[derive(Deserialize)]
struct RegisterIssuerParams {
    caller: Identity,
    identity: String,
    name: String,
}

fn handle_register_issuer(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: RegisterIssuerParams = parse_params(request)?;
    let identity = parse_identity(&p.identity)?;
    let record = state
        .registry
        .register_issuer(&p.caller, &identity, &p.name)?;
    to_value(&record)
}

#[derive(Deserialize)]
struct RevokeIssuerParams {
    caller: Identity,
    identity: String,
}

fn handle_revoke_issuer(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: RevokeIssuerParams = parse_params(request)?;
    let identity = parse_identity(&p.identity)?;
    state.registry.revoke_issuer(&p.caller, &identity)?;
    Ok(serde_json::json!({ "identity": identity, "revoked": true }))
}

#[derive(Deserialize)]
struct IdentityParams {
    identity: String,
}

fn handle_is_registered_issuer(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: IdentityParams = parse_params(request)?;
    let registered = state
        .registry
        .is_registered_issuer(&parse_identity(&p.identity)?)?;
    Ok(serde_json::json!({ "registered": registered }))
}

fn handle_issuer_name(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: IdentityParams = parse_params(request)?;
    let name = state.registry.issuer_name(&parse_identity(&p.identity)?)?;
    Ok(serde_json::json!({ "name": name }))
}

fn handle_list_issuers(state: &RootState) -> HandlerResult {
    let issuers = state.registry.issuers()?;
    Ok(serde_json::json!({ "total": issuers.len(), "issuers": issuers }))
}

#[derive(Deserialize)]
struct MintParams {
    caller: Identity,
    holder: String,
    content_uri: String,
    #[serde(default)]
    content_hash: Option<String>,
    #[serde(default)]
    expiration_timestamp: u64,
}

fn handle_mint(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: MintParams = parse_params(request)?;
    let content_hash = p
        .content_hash
        .as_deref()
        .map(ContentHash::parse)
        .transpose()
        .map_err(|e| HandlerError::Registry(e.into()))?;
    let mint = MintRequest {
        holder: parse_identity(&p.holder)?,
        content_uri: p.content_uri,
        content_hash,
        expiration_timestamp: p.expiration_timestamp,
    };
    let id = state.registry.mint(&p.caller, &mint)?;
    Ok(serde_json::json!({ "id": id }))
}

#[derive(Deserialize)]
struct RevokeParams {
    caller: Identity,
    id: CertificateId,
}

fn handle_revoke(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: RevokeParams = parse_params(request)?;
    state.registry.revoke(&p.caller, p.id)?;
    Ok(serde_json::json!({ "id": p.id, "status": "revoked" }))
}

#[derive(Deserialize)]
struct ExpireParams {
    #[serde(default)]
    caller: Option<Identity>,
    id: CertificateId,
}

fn handle_expire(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: ExpireParams = parse_params(request)?;
    state.registry.expire(p.caller.as_ref(), p.id)?;
    Ok(serde_json::json!({ "id": p.id, "status": "expired" }))
}

#[derive(Deserialize)]
struct IndexParams {
    index: usize,
}

fn handle_active_id_at(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: IndexParams = parse_params(request)?;
    let id = state.registry.active_id_at(p.index)?;
    Ok(serde_json::json!({ "id": id }))
}

#[derive(Deserialize)]
struct HashParams {
    hash: String,
}

fn handle_verify_by_hash(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: HashParams = parse_params(request)?;
    let hash = ContentHash::parse(&p.hash).map_err(|e| HandlerError::Registry(e.into()))?;
    to_value(&state.registry.verify_by_hash(&hash)?)
}

#[derive(Deserialize)]
struct FileParams {
    /// Hex-encoded file content.
    content: String,
}

fn handle_verify_file(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: FileParams = parse_params(request)?;
    let hex_str = p.content.strip_prefix("0x").unwrap_or(&p.content);
    let bytes = hex::decode(hex_str).map_err(|e| {
        HandlerError::Rpc(
            rpc_codes::INVALID_PARAMS,
            format!("content must be hex-encoded: {}", e),
        )
    })?;
    to_value(&state.registry.verify_file(&bytes)?)
}

#[derive(Deserialize)]
struct BatchParams {
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    max_batch: Option<usize>,
}

impl BatchParams {
    fn max_batch(&self, state: &RootState) -> Result<usize, HandlerError> {
        let max_batch = self.max_batch.unwrap_or(state.config.sweep.max_batch);
        if max_batch > config::MAX_SWEEP_BATCH {
            return Err(HandlerError::Rpc(
                rpc_codes::INVALID_PARAMS,
                format!(
                    "max_batch must be at most {}, got {}",
                    config::MAX_SWEEP_BATCH,
                    max_batch
                ),
            ));
        }
        Ok(max_batch)
    }
}

fn handle_check_due(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: BatchParams = parse_params(request)?;
    let scan = state
        .registry
        .check_due_from(p.offset, p.max_batch(state)?)?;
    to_value(&scan)
}

#[derive(Deserialize)]
struct CommitDueParams {
    ids: Vec<CertificateId>,
}

fn handle_commit_due(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: CommitDueParams = parse_params(request)?;
    if p.ids.len() > config::MAX_SWEEP_BATCH {
        return Err(HandlerError::Rpc(
            rpc_codes::INVALID_PARAMS,
            format!("at most {} ids per commit", config::MAX_SWEEP_BATCH),
        ));
    }
    to_value(&state.registry.commit_due(&p.ids))
}

fn handle_sweep(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: BatchParams = parse_params(request)?;
    let (report, next_offset) = state
        .registry
        .scheduler()
        .sweep_window(p.offset, p.max_batch(state)?)?;
    let mut value = to_value(&report)?;
    value["next_offset"] = serde_json::json!(next_offset);
    Ok(value)
}

fn handle_upkeep_needed(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: BatchParams = parse_params(request)?;
    let scan = state
        .registry
        .check_due_from(p.offset, p.max_batch(state)?)?;
    Ok(serde_json::json!({
        "upkeep_needed": !scan.due.is_empty(),
        "due": scan.due,
    }))
}

#[derive(Deserialize)]
struct AuditListParams {
    #[serde(default = "default_audit_limit")]
    limit: usize,
}

fn default_audit_limit() -> usize {
    20
}

fn audit_error(e: certum_core::CoreError) -> HandlerError {
    HandlerError::Rpc(rpc_codes::INTERNAL_ERROR, e.to_string())
}

fn handle_audit_list(state: &RootState, request: &JsonRpcRequest) -> HandlerResult {
    let p: AuditListParams = parse_params(request)?;
    let entries = state.audit.recent(p.limit).map_err(audit_error)?;
    Ok(serde_json::json!({
        "total": state.audit.len(),
        "entries": entries,
    }))
}

fn handle_audit_verify(state: &RootState) -> HandlerResult {
    let valid = state.audit.verify_chain().map_err(audit_error)?;
    let head = state.audit.head().map_err(audit_error)?;
    Ok(serde_json::json!({
        "valid": valid,
        "length": state.audit.len(),
        "head": head,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
