//! Cluster backends implementing the external interfaces of
//! [`crate::core::catalog`].

pub mod memory;

pub use memory::{InMemoryCluster, PlacedProcess, TargetProfile};
