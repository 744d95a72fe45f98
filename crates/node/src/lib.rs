//! Node wiring for the Tessera consensus core.
//!
//! Composes the storage layer, the consensus tasks and the injected
//! collaborators into a running node:
//!
//! - [`NodeBuilder`] / [`Node`]: construction, genesis seeding, task
//!   supervision and graceful shutdown
//! - [`KeystoreSigner`]: in-process ed25519 signing service
//! - [`telemetry`]: logging initialization

mod runner;
mod signer;
pub mod telemetry;

pub use runner::{Node, NodeBuilder, NodeError, ShutdownHandle};
pub use signer::{verify_signature, KeystoreSigner};
