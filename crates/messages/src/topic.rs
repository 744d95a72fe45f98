//! Gossip topics.

/// Gossip topics understood by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Carries a serialized block-graph proposal.
    AddBlockGraph,
}

impl Topic {
    /// Message type identifier for this topic.
    pub fn message_type(&self) -> &'static str {
        match self {
            Topic::AddBlockGraph => "block_graph.add",
        }
    }

    /// Parse a full topic string.
    pub fn parse(topic: &str) -> Option<Self> {
        match topic {
            "tessera/block_graph.add/1.0.0" => Some(Topic::AddBlockGraph),
            _ => None,
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tessera/{}/1.0.0", self.message_type())
    }
}
