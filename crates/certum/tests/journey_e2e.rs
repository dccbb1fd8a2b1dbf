//! End-to-end journey tests over the JSON-RPC surface.
//!
//! Journey 1: Roster management by the superadmin
//! Journey 2: Issue, verify, revoke
//! Journey 3: Expiry through the check/commit sweep
//! Journey 4: HTTP transport (health, rpc with caller header, verify)

use certum::{
    handle_request, initialize_root_with_clock, rpc_codes, JsonRpcRequest, RootConfig, RootState,
    ServerConfig, SweepConfig,
};
use certum_core::{ContentHash, Identity, ManualClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static JOURNEY_COUNTER: AtomicU64 = AtomicU64::new(0);

const ADMIN: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const ISSUER: &str = "0x1111111111111111111111111111111111111111";
const OTHER_ISSUER: &str = "0x2222222222222222222222222222222222222222";
const HOLDER: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const START: u64 = 1_700_000_000;

fn journey_state() -> (RootState, Arc<ManualClock>) {
    let id = JOURNEY_COUNTER.fetch_add(1, Ordering::SeqCst);
    let tid = std::thread::current().id();
    let dir = std::env::temp_dir().join(format!("certum-journey-{:?}-{}", tid, id));
    let config = RootConfig {
        superadmin: Some(Identity::parse(ADMIN).unwrap()),
        data_dir: dir,
        server: ServerConfig::default(),
        sweep: SweepConfig::default(),
    };
    let clock = Arc::new(ManualClock::new(START));
    let state = initialize_root_with_clock(config, clock.clone()).unwrap();
    (state, clock)
}

fn rpc(state: &RootState, method: &str, params: serde_json::Value) -> serde_json::Value {
    let response = handle_request(state, &JsonRpcRequest::new(method, Some(params)));
    assert!(
        response.error.is_none(),
        "{} failed: {:?}",
        method,
        response.error
    );
    response.result.unwrap()
}

fn rpc_err(state: &RootState, method: &str, params: serde_json::Value) -> i64 {
    let response = handle_request(state, &JsonRpcRequest::new(method, Some(params)));
    response
        .error
        .unwrap_or_else(|| panic!("{} unexpectedly succeeded", method))
        .code
}

fn register(state: &RootState, identity: &str, name: &str) {
    rpc(
        state,
        "registerIssuer",
        serde_json::json!({ "caller": ADMIN, "identity": identity, "name": name }),
    );
}

fn mint(state: &RootState, expiration: u64, file: Option<&[u8]>) -> u64 {
    let mut params = serde_json::json!({
        "caller": ISSUER,
        "holder": HOLDER,
        "content_uri": "ipfs://bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi",
        "expiration_timestamp": expiration,
    });
    if let Some(bytes) = file {
        params["content_hash"] = serde_json::json!(ContentHash::of_bytes(bytes).to_hex());
    }
    rpc(state, "mint", params)["id"].as_u64().unwrap()
}

fn cleanup(state: &RootState) {
    let _ = std::fs::remove_dir_all(&state.config.data_dir);
}

// ============================================================================
// Journey 1: Roster management
// ============================================================================

#[test]
fn test_journey_issuer_roster() {
    let (state, _) = journey_state();

    let record = rpc(
        &state,
        "registerIssuer",
        serde_json::json!({ "caller": ADMIN, "identity": ISSUER, "name": "Acme University" }),
    );
    assert_eq!(record["display_name"], "Acme University");
    assert_eq!(record["is_active"], true);

    let registered = rpc(&state, "isRegisteredIssuer", serde_json::json!({ "identity": ISSUER }));
    assert_eq!(registered["registered"], true);
    let name = rpc(&state, "issuerName", serde_json::json!({ "identity": ISSUER }));
    assert_eq!(name["name"], "Acme University");

    // Only the superadmin may touch the roster.
    assert_eq!(
        rpc_err(
            &state,
            "registerIssuer",
            serde_json::json!({ "caller": ISSUER, "identity": OTHER_ISSUER, "name": "Other" })
        ),
        rpc_codes::AUTHORIZATION_ERROR
    );
    assert_eq!(
        rpc_err(
            &state,
            "registerIssuer",
            serde_json::json!({ "caller": ADMIN, "identity": ISSUER, "name": "Acme again" })
        ),
        rpc_codes::INVALID_STATE
    );
    assert_eq!(
        rpc_err(
            &state,
            "registerIssuer",
            serde_json::json!({ "caller": ADMIN, "identity": OTHER_ISSUER, "name": "  " })
        ),
        rpc_codes::VALIDATION_ERROR
    );

    rpc(
        &state,
        "revokeIssuer",
        serde_json::json!({ "caller": ADMIN, "identity": ISSUER }),
    );
    let registered = rpc(&state, "isRegisteredIssuer", serde_json::json!({ "identity": ISSUER }));
    assert_eq!(registered["registered"], false);
    assert_eq!(
        rpc_err(
            &state,
            "revokeIssuer",
            serde_json::json!({ "caller": ADMIN, "identity": ISSUER })
        ),
        rpc_codes::INVALID_STATE
    );
    assert_eq!(
        rpc_err(
            &state,
            "revokeIssuer",
            serde_json::json!({ "caller": ADMIN, "identity": OTHER_ISSUER })
        ),
        rpc_codes::NOT_FOUND
    );

    let listed = rpc(&state, "listIssuers", serde_json::json!({}));
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["issuers"][0]["is_active"], false);

    cleanup(&state);
}

// ============================================================================
// Journey 2: Issue, verify, revoke
// ============================================================================

#[test]
fn test_journey_issue_verify_revoke() {
    let (state, _) = journey_state();
    register(&state, ISSUER, "Acme University");
    register(&state, OTHER_ISSUER, "Other College");

    let file = b"%PDF-1.7 diploma for holder b";
    let id = mint(&state, 0, Some(file));
    assert_eq!(id, 1);

    let cert = rpc(&state, "certificate", serde_json::json!({ "id": id }));
    assert_eq!(cert["issuer"], ISSUER);
    assert_eq!(cert["holder"], HOLDER);
    assert_eq!(cert["status"], "active");
    assert_eq!(
        rpc(&state, "holderOf", serde_json::json!({ "id": id }))["holder"],
        HOLDER
    );
    assert!(rpc(&state, "contentUri", serde_json::json!({ "id": id }))["content_uri"]
        .as_str()
        .unwrap()
        .starts_with("ipfs://"));
    assert_eq!(rpc(&state, "activeCount", serde_json::json!({}))["count"], 1);
    assert_eq!(
        rpc(&state, "activeIdAt", serde_json::json!({ "index": 0 }))["id"],
        id
    );

    let hash = ContentHash::of_bytes(file).to_hex();
    let verified = rpc(&state, "verifyByHash", serde_json::json!({ "hash": hash }));
    assert_eq!(verified["is_valid"], true);
    assert_eq!(verified["certificate_id"], id);
    assert_eq!(verified["holder"], HOLDER);

    let verified = rpc(
        &state,
        "verifyFile",
        serde_json::json!({ "content": hex::encode(file) }),
    );
    assert_eq!(verified["is_valid"], true);

    let forged = rpc(
        &state,
        "verifyFile",
        serde_json::json!({ "content": hex::encode(b"forged") }),
    );
    assert_eq!(forged["is_valid"], false);
    assert!(forged["certificate_id"].is_null());

    // Another issuer cannot revoke it; the original issuer can.
    assert_eq!(
        rpc_err(
            &state,
            "revoke",
            serde_json::json!({ "caller": OTHER_ISSUER, "id": id })
        ),
        rpc_codes::AUTHORIZATION_ERROR
    );
    rpc(&state, "revoke", serde_json::json!({ "caller": ISSUER, "id": id }));
    assert_eq!(
        rpc(&state, "isRevoked", serde_json::json!({ "id": id }))["revoked"],
        true
    );
    assert_eq!(rpc(&state, "activeCount", serde_json::json!({}))["count"], 0);
    assert_eq!(
        rpc_err(
            &state,
            "revoke",
            serde_json::json!({ "caller": ADMIN, "id": id })
        ),
        rpc_codes::INVALID_STATE
    );
    assert_eq!(
        rpc_err(&state, "activeIdAt", serde_json::json!({ "index": 0 })),
        rpc_codes::NOT_FOUND
    );

    // Still verifiable by hash after revocation.
    let verified = rpc(&state, "verifyByHash", serde_json::json!({ "hash": hash }));
    assert_eq!(verified["is_valid"], true);

    // The same content cannot be bound twice.
    let code = rpc_err(
        &state,
        "mint",
        serde_json::json!({
            "caller": ISSUER,
            "holder": HOLDER,
            "content_uri": "ipfs://again",
            "content_hash": hash,
        }),
    );
    assert_eq!(code, rpc_codes::VALIDATION_ERROR);
    assert_eq!(rpc(&state, "totalIssued", serde_json::json!({}))["total"], 1);

    let audit = rpc(&state, "audit/verify", serde_json::json!({}));
    assert_eq!(audit["valid"], true);
    assert_eq!(audit["length"], 4);

    cleanup(&state);
}

// ============================================================================
// Journey 3: Expiry sweep
// ============================================================================

#[test]
fn test_journey_expiry_sweep() {
    let (state, clock) = journey_state();
    register(&state, ISSUER, "Acme University");

    let x = mint(&state, START + 60, None);
    let y = mint(&state, START + 86_400, None);
    let z = mint(&state, START + 60, None);

    assert_eq!(
        rpc(&state, "upkeepNeeded", serde_json::json!({}))["upkeep_needed"],
        false
    );
    assert_eq!(
        rpc_err(&state, "expire", serde_json::json!({ "id": x })),
        rpc_codes::PRECONDITION_FAILED
    );

    clock.advance(65);
    assert_eq!(
        rpc(&state, "isExpiredComputed", serde_json::json!({ "id": x }))["expired"],
        true
    );
    assert_eq!(
        rpc(&state, "isExpiredOfficial", serde_json::json!({ "id": x }))["expired"],
        false
    );

    let upkeep = rpc(&state, "upkeepNeeded", serde_json::json!({}));
    assert_eq!(upkeep["upkeep_needed"], true);

    let scan = rpc(&state, "checkDue", serde_json::json!({ "max_batch": 10 }));
    let mut due: Vec<u64> = scan["due"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    due.sort();
    assert_eq!(due, vec![x, z]);

    // z is revoked between check and commit.
    rpc(&state, "revoke", serde_json::json!({ "caller": ISSUER, "id": z }));

    let report = rpc(&state, "commitDue", serde_json::json!({ "ids": due }));
    assert_eq!(report["committed"], serde_json::json!([x]));
    assert_eq!(report["skipped"][0]["certificate_id"], z);
    assert_eq!(report["skipped"][0]["reason"]["reason"], "revoked");

    assert_eq!(
        rpc(&state, "isExpiredOfficial", serde_json::json!({ "id": x }))["expired"],
        true
    );
    assert_eq!(
        rpc(&state, "isExpiredOfficial", serde_json::json!({ "id": y }))["expired"],
        false
    );
    assert_eq!(
        rpc(&state, "status", serde_json::json!({ "id": z }))["status"],
        "revoked"
    );
    assert_eq!(rpc(&state, "activeCount", serde_json::json!({}))["count"], 1);

    // A sweep after everything lapsed finishes the job.
    clock.advance(86_400);
    let report = rpc(&state, "sweep", serde_json::json!({}));
    assert_eq!(report["committed"], serde_json::json!([y]));
    assert_eq!(report["next_offset"], 0);
    assert_eq!(rpc(&state, "activeCount", serde_json::json!({}))["count"], 0);

    let listed = rpc(&state, "audit/list", serde_json::json!({ "limit": 100 }));
    let kinds: Vec<&str> = listed["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"]["kind"]["event"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.iter().filter(|k| **k == "certificate_expired").count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == "sweep_skipped").count(), 1);

    cleanup(&state);
}

// ============================================================================
// Journey 4: HTTP transport
// ============================================================================

#[tokio::test]
async fn test_journey_http_transport() {
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    let (state, _) = journey_state();
    let data_dir = state.config.data_dir.clone();
    let state = Arc::new(state);
    let app = certum::http::build_router(state.clone());

    // 1. GET /health
    let req = axum::http::Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body_json["status"], "ok");
    assert_eq!(body_json["active_count"], 0);

    // 2. POST /rpc with the caller in a header
    let register_body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "registerIssuer",
        "params": { "identity": ISSUER, "name": "Acme University" },
        "id": 1
    });
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json")
        .header(certum::http::CALLER_HEADER, ADMIN)
        .body(Body::from(register_body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(body_json["error"].is_null(), "{:?}", body_json["error"]);
    assert_eq!(body_json["result"]["is_active"], true);

    // 3. The header wins over a spoofed caller in params
    let spoofed = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "registerIssuer",
        "params": { "caller": ADMIN, "identity": OTHER_ISSUER, "name": "Spoof" },
        "id": 2
    });
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json")
        .header(certum::http::CALLER_HEADER, HOLDER)
        .body(Body::from(spoofed.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body_json["error"]["code"], rpc_codes::AUTHORIZATION_ERROR);
    assert_eq!(body_json["error"]["data"]["kind"], "authorization");

    // 4. Mint through the registry, then verify over GET /verify/{hash}
    let file = b"transcript";
    let mint_body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "mint",
        "params": {
            "holder": HOLDER,
            "content_uri": "ipfs://transcript",
            "content_hash": ContentHash::of_bytes(file).to_hex(),
        },
        "id": 3
    });
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json")
        .header(certum::http::CALLER_HEADER, ISSUER)
        .body(Body::from(mint_body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let id = body_json["result"]["id"].as_u64().unwrap();

    let req = axum::http::Request::builder()
        .method("GET")
        .uri(format!("/verify/{}", ContentHash::of_bytes(file).to_hex()))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body_json["is_valid"], true);
    assert_eq!(body_json["certificate_id"], id);

    // 5. Malformed hash is a 400, unknown certificate a 404
    let req = axum::http::Request::builder()
        .method("GET")
        .uri("/verify/not-a-hash")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), 400);

    let req = axum::http::Request::builder()
        .method("GET")
        .uri("/certificates/999")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), 404);

    let req = axum::http::Request::builder()
        .method("GET")
        .uri(format!("/certificates/{}", id))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body_json["status"], "active");

    let _ = std::fs::remove_dir_all(data_dir);
}
