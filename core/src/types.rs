//! Payload types for the Witness API.
//!
//! # Design
//! The server owns the schema of checkpoints, proofs and tree state and may
//! add fields at any time, so responses are kept as opaque JSON. Each wrapper
//! is `#[serde(transparent)]` over a `serde_json::Value` and derefs to it:
//! unknown fields survive, missing fields never fail decoding, and nothing is
//! renamed. The wrappers only name what an operation returns.
//!
//! `ProofRequest` is the one typed request body.

use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

macro_rules! opaque_payload {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Value);

        impl $name {
            pub fn into_inner(self) -> Value {
                self.0
            }

            pub fn as_value(&self) -> &Value {
                &self.0
            }
        }

        impl From<Value> for $name {
            fn from(value: Value) -> Self {
                Self(value)
            }
        }

        impl Deref for $name {
            type Target = Value;

            fn deref(&self) -> &Value {
                &self.0
            }
        }
    };
}

opaque_payload!(
    /// Response of the health endpoint.
    HealthStatus
);
opaque_payload!(
    /// A tree root anchored on a chain.
    Checkpoint
);
opaque_payload!(
    /// Latest checkpoint per chain, keyed by chain id.
    CheckpointSet
);
opaque_payload!(LeafIndex);
opaque_payload!(LeafTimestamp);
opaque_payload!(NodeHash);
opaque_payload!(
    /// Inclusion proof for a leaf: sibling hashes plus the root they lead to.
    Proof
);
opaque_payload!(ProofVerification);
opaque_payload!(
    /// Current size and root of the server-side tree.
    TreeState
);
opaque_payload!(
    /// Leaf hash and index assigned by the server after insertion.
    InsertedLeaf
);

/// Body of a proof verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    pub left_hashes: Vec<String>,
    pub right_hashes: Vec<String>,
    pub target_root_hash: String,
    pub leaf_hash: String,
    #[serde(deserialize_with = "u64_from_string_or_number")]
    pub leaf_index: u64,
}

impl ProofRequest {
    /// Extract the verification body from a proof returned by the server.
    /// Extra fields on the proof are ignored.
    pub fn from_proof(proof: &Proof) -> Result<Self, serde_json::Error> {
        Self::deserialize(proof.as_value())
    }
}

// Large indices come back as decimal strings.
fn u64_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
