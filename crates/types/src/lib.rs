//! Core types for the Tessera ledger consensus core.
//!
//! This crate provides the foundational types used throughout the consensus
//! implementation:
//!
//! - **Primitives**: [`Hash`], hex encoding
//! - **Identifiers**: [`NodeId`]
//! - **Ledger types**: [`Block`], [`Transaction`], [`BlockPos`]
//! - **Consensus types**: [`BlockGraph`], [`GraphSide`], [`Interpreted`]
//! - **Signing helpers**: domain-separated digests for co-signatures
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod block;
mod blockgraph;
mod hash;
mod identifiers;
mod interpreted;
mod signing;
mod transaction;

pub use block::{Block, BlockPos};
pub use blockgraph::{BlockGraph, GraphIdentity, GraphSide};
pub use hash::{Hash, HexError};
pub use identifiers::NodeId;
pub use interpreted::{Interpreted, InterpretedBlock};
pub use signing::{block_graph_digest, DOMAIN_BLOCK_GRAPH};
pub use transaction::{Transaction, TxnId, TXN_ID_LEN};
