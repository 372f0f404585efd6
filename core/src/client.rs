//! Typed operations of the Witness API.
//!
//! # Design
//! `WitnessClient` holds a `RequestDispatcher` and nothing else. Each method
//! checks its required identifiers, applies defaults, shapes one
//! `RequestSpec` and returns the dispatcher's result verbatim. Whether an
//! endpoint needs a token is left to the server; an unauthenticated call to a
//! protected route comes back as an `ApiError` like any other rejection.

use serde_json::json;

use crate::config::ClientConfig;
use crate::dispatch::{RequestDispatcher, RequestSpec};
use crate::error::ApiError;
use crate::http::{Transport, UreqTransport};
use crate::types::{
    Checkpoint, CheckpointSet, HealthStatus, InsertedLeaf, LeafIndex, LeafTimestamp, NodeHash,
    Proof, ProofRequest, ProofVerification, TreeState,
};

/// Chain used when a caller does not pick one (Base mainnet).
pub const DEFAULT_CHAIN_ID: u64 = 8453;

/// Wire paths of the Witness API.
pub mod paths {
    pub const HEALTH: &str = "/_health";
    pub const LATEST_CHECKPOINT: &str = "/getLatestCheckpoint";
    pub const LATEST_CHECKPOINT_ALL_CHAINS: &str = "/getLatestCheckpointForAllChains";
    pub const EARLIEST_CHECKPOINT_COVERING_LEAF_INDEX: &str =
        "/getEarliestCheckpointCoveringLeafIndex";
    pub const CHECKPOINT_BY_TRANSACTION_HASH: &str = "/getCheckpointByTransactionHash";
    pub const CHECKPOINT_BY_TIMESTAMP: &str = "/getCheckpointByTimestamp";
    pub const LEAF_INDEX_BY_HASH: &str = "/getLeafIndexByHash";
    pub const TIMESTAMP_BY_LEAF_HASH: &str = "/getTimestampByLeafHash";
    pub const NODE_HASH_BY_ID: &str = "/getNodeHashById";
    pub const PROOF_FOR_LEAF_HASH: &str = "/getProofForLeafHash";
    pub const POST_PROOF: &str = "/postProof";
    pub const TREE_STATE: &str = "/getTreeState";
    pub const POST_LEAF_HASH: &str = "/postLeafHash";
}

/// Blocking client for the Witness API.
///
/// Cheap to share across threads: the only state is the immutable config and
/// the transport.
#[derive(Debug, Clone)]
pub struct WitnessClient<T = UreqTransport> {
    dispatcher: RequestDispatcher<T>,
}

impl WitnessClient<UreqTransport> {
    /// Client for the production endpoint. A token enables the
    /// `Authorization` header on every request.
    pub fn new(token: Option<&str>) -> Self {
        let mut config = ClientConfig::new();
        if let Some(token) = token {
            config = config.with_token(token);
        }
        Self::with_config(config)
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            dispatcher: RequestDispatcher::new(config),
        }
    }
}

impl<T: Transport> WitnessClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            dispatcher: RequestDispatcher::with_transport(config, transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.dispatcher.config()
    }

    pub fn dispatcher(&self) -> &RequestDispatcher<T> {
        &self.dispatcher
    }

    fn call<R: From<serde_json::Value>>(&self, spec: RequestSpec) -> Result<R, ApiError> {
        self.dispatcher.dispatch(spec).map(R::from)
    }

    /// `GET /_health`
    pub fn health(&self) -> Result<HealthStatus, ApiError> {
        self.call(RequestSpec::get(paths::HEALTH))
    }

    /// `GET /getLatestCheckpoint` – latest on-chain checkpoint for a chain.
    pub fn get_latest_checkpoint(&self, chain_id: Option<u64>) -> Result<Checkpoint, ApiError> {
        self.call(
            RequestSpec::get(paths::LATEST_CHECKPOINT)
                .query("chainId", chain_id.unwrap_or(DEFAULT_CHAIN_ID)),
        )
    }

    /// `GET /getLatestCheckpointForAllChains`
    pub fn get_latest_checkpoint_for_all_chains(&self) -> Result<CheckpointSet, ApiError> {
        self.call(RequestSpec::get(paths::LATEST_CHECKPOINT_ALL_CHAINS))
    }

    /// `GET /getEarliestCheckpointCoveringLeafIndex` – first checkpoint whose
    /// tree includes `leaf_index`.
    pub fn get_earliest_checkpoint_covering_leaf_index(
        &self,
        leaf_index: u64,
        chain_id: Option<u64>,
    ) -> Result<Checkpoint, ApiError> {
        self.call(
            RequestSpec::get(paths::EARLIEST_CHECKPOINT_COVERING_LEAF_INDEX)
                .query("leafIndex", leaf_index)
                .query("chainId", chain_id.unwrap_or(DEFAULT_CHAIN_ID)),
        )
    }

    /// `GET /getCheckpointByTransactionHash`
    pub fn get_checkpoint_by_transaction_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Checkpoint, ApiError> {
        let tx_hash = required("txHash", tx_hash)?;
        self.call(RequestSpec::get(paths::CHECKPOINT_BY_TRANSACTION_HASH).query("txHash", tx_hash))
    }

    /// `GET /getCheckpointByTimestamp` – first checkpoint at or after
    /// `timestamp` (unix seconds).
    pub fn get_checkpoint_by_timestamp(
        &self,
        timestamp: u64,
        chain_id: Option<u64>,
    ) -> Result<Checkpoint, ApiError> {
        self.call(
            RequestSpec::get(paths::CHECKPOINT_BY_TIMESTAMP)
                .query("timestamp", timestamp)
                .query("chainId", chain_id.unwrap_or(DEFAULT_CHAIN_ID)),
        )
    }

    /// `GET /getLeafIndexByHash`
    pub fn get_leaf_index_by_hash(&self, leaf_hash: &str) -> Result<LeafIndex, ApiError> {
        let leaf_hash = required("leafHash", leaf_hash)?;
        self.call(RequestSpec::get(paths::LEAF_INDEX_BY_HASH).query("leafHash", leaf_hash))
    }

    /// `GET /getTimestampByLeafHash`
    pub fn get_timestamp_by_leaf_hash(
        &self,
        leaf_hash: &str,
        chain_id: Option<u64>,
    ) -> Result<LeafTimestamp, ApiError> {
        let leaf_hash = required("leafHash", leaf_hash)?;
        self.call(
            RequestSpec::get(paths::TIMESTAMP_BY_LEAF_HASH)
                .query("leafHash", leaf_hash)
                .query("chainId", chain_id.unwrap_or(DEFAULT_CHAIN_ID)),
        )
    }

    /// `GET /getNodeHashById`
    pub fn get_node_hash_by_id(&self, level: u64, index: u64) -> Result<NodeHash, ApiError> {
        self.call(
            RequestSpec::get(paths::NODE_HASH_BY_ID)
                .query("level", level)
                .query("index", index),
        )
    }

    /// `GET /getProofForLeafHash`. Without `target_tree_size` the server
    /// proves against its current tree.
    pub fn get_proof_for_leaf_hash(
        &self,
        leaf_hash: &str,
        target_tree_size: Option<u64>,
        chain_id: Option<u64>,
    ) -> Result<Proof, ApiError> {
        let leaf_hash = required("leafHash", leaf_hash)?;
        self.call(
            RequestSpec::get(paths::PROOF_FOR_LEAF_HASH)
                .query("leafHash", leaf_hash)
                .query_opt("targetTreeSize", target_tree_size)
                .query("chainId", chain_id.unwrap_or(DEFAULT_CHAIN_ID)),
        )
    }

    /// `POST /postProof` – ask the server to verify a proof.
    pub fn post_proof(&self, proof: &ProofRequest) -> Result<ProofVerification, ApiError> {
        required("leafHash", &proof.leaf_hash)?;
        required("targetRootHash", &proof.target_root_hash)?;
        let body = serde_json::to_value(proof).map_err(ApiError::serialization)?;
        self.call(RequestSpec::post(paths::POST_PROOF, body))
    }

    /// `GET /getTreeState`
    pub fn get_tree_state(&self) -> Result<TreeState, ApiError> {
        self.call(RequestSpec::get(paths::TREE_STATE))
    }

    /// `POST /postLeafHash` – insert a leaf. Requires a token server-side.
    pub fn post_leaf_hash(&self, leaf_hash: &str) -> Result<InsertedLeaf, ApiError> {
        let leaf_hash = required("leafHash", leaf_hash)?;
        self.call(RequestSpec::post(
            paths::POST_LEAF_HASH,
            json!({ "leafHash": leaf_hash }),
        ))
    }
}

/// Reject empty identifiers before they turn into a malformed request.
fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::invalid_argument(name));
    }
    Ok(value)
}
