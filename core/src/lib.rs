//! Blocking client for the Witness hash-tree notarization API.
//!
//! # Overview
//! Submits leaf hashes, fetches inclusion proofs and checkpoints anchored on
//! several chains, and asks the server to verify proofs. All tree logic lives
//! server-side; this crate only shapes requests and classifies responses.
//!
//! # Design
//! - `WitnessClient` exposes one method per API operation and delegates to a
//!   single `RequestDispatcher`.
//! - The dispatcher builds plain-data `HttpRequest` values, hands them to a
//!   `Transport` (ureq by default) and classifies the `HttpResponse`.
//! - Every failure, transport or API or decode, is one `ApiError`.
//! - Response payloads stay opaque JSON behind thin named wrappers.
//!
//! ```no_run
//! use witness_client::WitnessClient;
//!
//! let client = WitnessClient::new(Some("my-token"));
//! let state = client.get_tree_state()?;
//! println!("{}", state.as_value());
//! # Ok::<(), witness_client::ApiError>(())
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod types;

#[cfg(test)]
mod testutil;

pub use client::{WitnessClient, DEFAULT_CHAIN_ID};
pub use config::{ClientConfig, ConfigError, DEFAULT_BASE_URL};
pub use dispatch::{QueryValue, RequestDispatcher, RequestSpec};
pub use error::{ApiError, ErrorCode, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
pub use types::{
    Checkpoint, CheckpointSet, HealthStatus, InsertedLeaf, LeafIndex, LeafTimestamp, NodeHash,
    Proof, ProofRequest, ProofVerification, TreeState,
};
