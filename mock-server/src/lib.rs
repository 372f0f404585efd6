//! In-memory stand-in for the Witness API.
//!
//! Leaves are kept in insertion order and every insertion anchors a new
//! checkpoint on the default chain. Roots, node hashes and proofs use a
//! non-cryptographic digest: they are self-consistent (a proof served here
//! verifies here) but carry no security meaning.

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const DEFAULT_CHAIN_ID: u64 = 8453;
pub const DEFAULT_TOKEN: &str = "test-token";

/// Unix time of the checkpoint anchoring the first leaf.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
/// Seconds between consecutive checkpoints.
pub const CHECKPOINT_INTERVAL: u64 = 60;
const GENESIS_BLOCK: u64 = 1_000;

/// Forces every route to misbehave, for exercising client error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `500` with an empty body.
    EmptyServerError,
    /// `200` with a truncated JSON body.
    MalformedBody,
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        match self {
            Fault::EmptyServerError => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            Fault::MalformedBody => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"numLeaves": "#,
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Bearer token accepted by `POST /postLeafHash`.
    pub token: String,
    pub fault: Option<Fault>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN.to_string(),
            fault: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub chain_id: u64,
    pub tree_size: u64,
    pub root_hash: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub timestamp: u64,
}

#[derive(Debug, Default)]
pub struct Ledger {
    leaves: Vec<String>,
    checkpoints: Vec<Checkpoint>,
}

impl Ledger {
    pub fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn index_of(&self, leaf_hash: &str) -> Option<u64> {
        self.leaves
            .iter()
            .position(|l| l.eq_ignore_ascii_case(leaf_hash))
            .map(|i| i as u64)
    }

    /// Append a leaf and anchor the new root on the default chain.
    pub fn insert(&mut self, leaf_hash: &str) -> u64 {
        let index = self.len();
        self.leaves.push(leaf_hash.to_ascii_lowercase());
        let size = self.len();
        self.checkpoints.push(Checkpoint {
            chain_id: DEFAULT_CHAIN_ID,
            tree_size: size,
            root_hash: self.root(size),
            tx_hash: digest(&["tx", &size.to_string()]),
            block_number: GENESIS_BLOCK + size,
            timestamp: GENESIS_TIMESTAMP + (size - 1) * CHECKPOINT_INTERVAL,
        });
        index
    }

    pub fn root(&self, size: u64) -> String {
        let leaves: Vec<&str> = self.leaves[..size as usize].iter().map(String::as_str).collect();
        digest(&leaves)
    }

    /// Hash of the complete subtree at `level` / `index`, if it exists yet.
    pub fn node(&self, level: u32, index: u64) -> Option<String> {
        let width = 1u64.checked_shl(level)?;
        let start = index.checked_mul(width)?;
        let end = start.checked_add(width)?;
        if end > self.len() {
            return None;
        }
        if level == 0 {
            return Some(self.leaves[start as usize].clone());
        }
        let leaves: Vec<&str> = self.leaves[start as usize..end as usize]
            .iter()
            .map(String::as_str)
            .collect();
        Some(digest(&leaves))
    }

    fn chain(&self, chain_id: u64) -> impl Iterator<Item = &Checkpoint> + '_ {
        self.checkpoints.iter().filter(move |c| c.chain_id == chain_id)
    }
}

pub type Db = Arc<RwLock<Ledger>>;

#[derive(Clone)]
struct AppState {
    db: Db,
    token: Arc<str>,
}

/// Error body in the shape the Witness API uses.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    message: String,
    code: &'static str,
    issues: Option<Vec<Value>>,
}

impl Failure {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            code: "NOT_FOUND",
            issues: None,
        }
    }

    fn bad_request(message: impl Into<String>, issues: Option<Vec<Value>>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: "BAD_REQUEST",
            issues,
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut body = json!({ "message": self.message, "code": self.code });
        if let Some(issues) = self.issues {
            body["issues"] = Value::Array(issues);
        }
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    if let Some(fault) = config.fault {
        return Router::new().fallback(move || async move { fault });
    }

    let state = AppState {
        db: Arc::new(RwLock::new(Ledger::default())),
        token: config.token.into(),
    };
    Router::new()
        .route("/_health", get(health))
        .route("/getLatestCheckpoint", get(latest_checkpoint))
        .route("/getLatestCheckpointForAllChains", get(latest_checkpoint_all_chains))
        .route(
            "/getEarliestCheckpointCoveringLeafIndex",
            get(earliest_checkpoint_covering_leaf_index),
        )
        .route("/getCheckpointByTransactionHash", get(checkpoint_by_transaction_hash))
        .route("/getCheckpointByTimestamp", get(checkpoint_by_timestamp))
        .route("/getLeafIndexByHash", get(leaf_index_by_hash))
        .route("/getTimestampByLeafHash", get(timestamp_by_leaf_hash))
        .route("/getNodeHashById", get(node_hash_by_id))
        .route("/getProofForLeafHash", get(proof_for_leaf_hash))
        .route("/postProof", post(verify_proof))
        .route("/getTreeState", get(tree_state))
        .route("/postLeafHash", post(insert_leaf_hash))
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

type ApiResult = Result<Json<Value>, Failure>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    chain_id: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafIndexParams {
    leaf_index: u64,
    chain_id: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxParams {
    tx_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampParams {
    timestamp: u64,
    chain_id: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafParams {
    leaf_hash: String,
    chain_id: Option<u64>,
}

#[derive(Deserialize)]
pub struct NodeParams {
    level: u32,
    index: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofParams {
    leaf_hash: String,
    target_tree_size: Option<u64>,
    chain_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofBody {
    pub left_hashes: Vec<String>,
    pub right_hashes: Vec<String>,
    pub target_root_hash: String,
    pub leaf_hash: String,
    pub leaf_index: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafBody {
    leaf_hash: String,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn latest_checkpoint(State(state): State<AppState>, Query(q): Query<ChainParams>) -> ApiResult {
    let chain_id = q.chain_id.unwrap_or(DEFAULT_CHAIN_ID);
    let ledger = state.db.read().await;
    let checkpoint = ledger
        .chain(chain_id)
        .last()
        .ok_or_else(|| Failure::not_found(format!("No checkpoint found for chain {chain_id}")))?;
    Ok(Json(json!(checkpoint)))
}

async fn latest_checkpoint_all_chains(State(state): State<AppState>) -> Json<Value> {
    let ledger = state.db.read().await;
    let mut latest: BTreeMap<String, &Checkpoint> = BTreeMap::new();
    for checkpoint in &ledger.checkpoints {
        latest.insert(checkpoint.chain_id.to_string(), checkpoint);
    }
    Json(json!(latest))
}

async fn earliest_checkpoint_covering_leaf_index(
    State(state): State<AppState>,
    Query(q): Query<LeafIndexParams>,
) -> ApiResult {
    let ledger = state.db.read().await;
    let checkpoint = ledger
        .chain(q.chain_id.unwrap_or(DEFAULT_CHAIN_ID))
        .find(|c| c.tree_size > q.leaf_index)
        .ok_or_else(|| Failure::not_found(format!("No checkpoint covers leaf {}", q.leaf_index)))?;
    Ok(Json(json!(checkpoint)))
}

async fn checkpoint_by_transaction_hash(
    State(state): State<AppState>,
    Query(q): Query<TxParams>,
) -> ApiResult {
    let ledger = state.db.read().await;
    let checkpoint = ledger
        .checkpoints
        .iter()
        .find(|c| c.tx_hash.eq_ignore_ascii_case(&q.tx_hash))
        .ok_or_else(|| Failure::not_found("not found"))?;
    Ok(Json(json!(checkpoint)))
}

async fn checkpoint_by_timestamp(
    State(state): State<AppState>,
    Query(q): Query<TimestampParams>,
) -> ApiResult {
    let ledger = state.db.read().await;
    let checkpoint = ledger
        .chain(q.chain_id.unwrap_or(DEFAULT_CHAIN_ID))
        .find(|c| c.timestamp >= q.timestamp)
        .ok_or_else(|| Failure::not_found(format!("No checkpoint at or after {}", q.timestamp)))?;
    Ok(Json(json!(checkpoint)))
}

async fn leaf_index_by_hash(State(state): State<AppState>, Query(q): Query<LeafParams>) -> ApiResult {
    let ledger = state.db.read().await;
    let index = ledger
        .index_of(&q.leaf_hash)
        .ok_or_else(|| Failure::not_found("Leaf not found"))?;
    Ok(Json(json!({ "leafHash": q.leaf_hash, "leafIndex": index })))
}

async fn timestamp_by_leaf_hash(
    State(state): State<AppState>,
    Query(q): Query<LeafParams>,
) -> ApiResult {
    let ledger = state.db.read().await;
    let index = ledger
        .index_of(&q.leaf_hash)
        .ok_or_else(|| Failure::not_found("Leaf not found"))?;
    let checkpoint = ledger
        .chain(q.chain_id.unwrap_or(DEFAULT_CHAIN_ID))
        .find(|c| c.tree_size > index)
        .ok_or_else(|| Failure::not_found("Leaf not yet checkpointed on this chain"))?;
    Ok(Json(json!({
        "leafHash": q.leaf_hash,
        "timestamp": checkpoint.timestamp,
        "checkpoint": checkpoint,
    })))
}

async fn node_hash_by_id(State(state): State<AppState>, Query(q): Query<NodeParams>) -> ApiResult {
    let ledger = state.db.read().await;
    let hash = ledger
        .node(q.level, q.index)
        .ok_or_else(|| Failure::not_found(format!("Node {}/{} not found", q.level, q.index)))?;
    Ok(Json(json!({ "level": q.level, "index": q.index, "hash": hash })))
}

async fn proof_for_leaf_hash(State(state): State<AppState>, Query(q): Query<ProofParams>) -> ApiResult {
    let ledger = state.db.read().await;
    let index = ledger
        .index_of(&q.leaf_hash)
        .ok_or_else(|| Failure::not_found("Leaf not found"))?;
    let size = q.target_tree_size.unwrap_or(ledger.len());
    if size > ledger.len() || size <= index {
        return Err(Failure::bad_request(
            "Invalid target tree size",
            Some(vec![json!({
                "message": format!("targetTreeSize must be in {}..={}", index + 1, ledger.len()),
                "path": ["targetTreeSize"],
            })]),
        ));
    }
    let checkpoint = ledger
        .chain(q.chain_id.unwrap_or(DEFAULT_CHAIN_ID))
        .find(|c| c.tree_size == size);
    let i = index as usize;
    Ok(Json(json!({
        "leafIndex": index,
        "leafHash": ledger.leaves[i],
        "leftHashes": &ledger.leaves[..i],
        "rightHashes": &ledger.leaves[i + 1..size as usize],
        "targetRootHash": ledger.root(size),
        "targetTreeSize": size,
        "checkpoint": checkpoint,
    })))
}

async fn verify_proof(Json(proof): Json<ProofBody>) -> Json<Value> {
    let success = proof.left_hashes.len() as u64 == proof.leaf_index && {
        let mut leaves: Vec<&str> = proof.left_hashes.iter().map(String::as_str).collect();
        leaves.push(&proof.leaf_hash);
        leaves.extend(proof.right_hashes.iter().map(String::as_str));
        let leaves: Vec<String> = leaves.iter().map(|l| l.to_ascii_lowercase()).collect();
        let leaves: Vec<&str> = leaves.iter().map(String::as_str).collect();
        digest(&leaves).eq_ignore_ascii_case(&proof.target_root_hash)
    };
    Json(json!({ "success": success }))
}

async fn tree_state(State(state): State<AppState>) -> Json<Value> {
    let ledger = state.db.read().await;
    Json(json!({ "numLeaves": ledger.len(), "rootHash": ledger.root(ledger.len()) }))
}

async fn insert_leaf_hash(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LeafBody>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    let expected = format!("Bearer {}", state.token);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return Err(Failure {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized".to_string(),
            code: "UNAUTHORIZED",
            issues: None,
        });
    }

    if !is_hash(&body.leaf_hash) {
        return Err(Failure::bad_request(
            "Invalid input",
            Some(vec![json!({
                "message": "leafHash must be a 0x-prefixed 32-byte hex string",
                "path": ["leafHash"],
            })]),
        ));
    }

    let mut ledger = state.db.write().await;
    if ledger.index_of(&body.leaf_hash).is_some() {
        return Err(Failure {
            status: StatusCode::CONFLICT,
            message: "Leaf already exists".to_string(),
            code: "CONFLICT",
            issues: None,
        });
    }
    let index = ledger.insert(&body.leaf_hash);
    tracing::info!(leaf_index = index, leaf_hash = %body.leaf_hash, "inserted leaf");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "leafHash": body.leaf_hash, "leafIndex": index })),
    ))
}

pub fn is_hash(s: &str) -> bool {
    s.len() == 66 && s.starts_with("0x") && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Deterministic 32-byte pseudo digest of an ordered list of strings.
pub fn digest(parts: &[&str]) -> String {
    let mut out = String::from("0x");
    for lane in 0u8..4 {
        let mut hasher = DefaultHasher::new();
        lane.hash(&mut hasher);
        parts.hash(&mut hasher);
        out.push_str(&format!("{:016x}", hasher.finish()));
    }
    out
}
