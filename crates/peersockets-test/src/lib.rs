//! PeerSockets Test Harness - Multi-node swarms and end-to-end scenarios
//!
//! This crate provides:
//! - An in-memory multi-node swarm harness
//! - Seeded presence churn generation
//! - End-to-end messaging, presence and teardown scenarios

pub mod churn;
pub mod harness;
pub mod integration;

pub use churn::*;
pub use harness::*;
pub use integration::*;
