//! Gossip message types and the wire codec.
//!
//! Messages are thin wrappers around the consensus types; the wire format is
//! a version byte followed by the bincode-encoded wrapper, with the message
//! type determined by the gossip topic (topic-based dispatch).

mod codec;
mod gossip;
mod topic;

pub use codec::{decode_block_graph, encode_block_graph, CodecError, WIRE_VERSION};
pub use gossip::BlockGraphGossip;
pub use topic::Topic;

/// Marker for types that travel over the gossip network.
pub trait NetworkMessage {
    /// Stable identifier used in topic construction.
    fn message_type_id() -> &'static str;
}
