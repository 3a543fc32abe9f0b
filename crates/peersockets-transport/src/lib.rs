//! PeerSockets Transport Layer - collaborator interfaces
//!
//! This crate provides:
//! - Drive resolution (`DriveResolver`)
//! - Topic pub/sub and swarm presence (`NetworkClient`)
//! - An in-memory loopback swarm for testing

pub mod client;
pub mod drive;
pub mod memory;

pub use client::*;
pub use drive::*;
pub use memory::{MemoryClient, MemoryDriveResolver, MemoryNetwork, MemoryStats};
