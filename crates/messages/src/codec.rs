//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! ```text
//! [version: u8][payload: bincode-encoded message]
//! ```
//!
//! - Version is currently `1`
//! - Payload is the bincode-encoded gossip struct (e.g. [`BlockGraphGossip`])
//!
//! Message type is determined by the gossip topic, not by a field in the
//! message, which keeps the wire format minimal.

use crate::{BlockGraphGossip, Topic};
use tessera_types::BlockGraph;
use thiserror::Error;

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unknown wire version: {0}")]
    UnknownVersion(u8),

    #[error("Message too short")]
    MessageTooShort,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),
}

/// Encode a block-graph for the `ADD_BLOCK_GRAPH` topic.
pub fn encode_block_graph(gossip: &BlockGraphGossip) -> Result<Vec<u8>, CodecError> {
    let payload =
        bincode::serialize(gossip).map_err(|e| CodecError::Encode(e.to_string()))?;

    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(WIRE_VERSION);
    bytes.extend(payload);
    Ok(bytes)
}

/// Decode an `ADD_BLOCK_GRAPH` payload from wire format.
pub fn decode_block_graph(topic: &str, data: &[u8]) -> Result<BlockGraph, CodecError> {
    if data.is_empty() {
        return Err(CodecError::MessageTooShort);
    }

    let version = data[0];
    if version != WIRE_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }

    let parsed = Topic::parse(topic).ok_or_else(|| CodecError::UnknownTopic(topic.to_string()))?;
    match parsed {
        Topic::AddBlockGraph => {
            let gossip: BlockGraphGossip = bincode::deserialize(&data[1..])
                .map_err(|e| CodecError::Decode(e.to_string()))?;
            Ok(gossip.into_block_graph())
        }
    }
}
