//! Interpreter output: totally ordered block deliveries.

use crate::{Hash, NodeId};
use serde::{Deserialize, Serialize};

/// One delivered `(hash, round, node, data)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpretedBlock {
    pub hash: Hash,
    pub round: u64,
    pub node: NodeId,
    /// Serialized [`crate::Block`] payload; may be empty for placeholder
    /// entries, which consumers skip.
    pub data: Vec<u8>,
}

/// An ordered batch of deliveries for a round.
///
/// Tuples are ordered by `(round, node)`; the ordering is total for the
/// delivered set of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpreted {
    pub round: u64,
    pub blocks: Vec<InterpretedBlock>,
}

impl Interpreted {
    pub fn new(round: u64, blocks: Vec<InterpretedBlock>) -> Self {
        Self { round, blocks }
    }
}
