//! Infrastructure adapters standing in for the live cluster.

pub mod cluster;
pub use cluster::{InMemoryCluster, PlacedProcess, TargetProfile};
