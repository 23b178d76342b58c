//! Index replica ("barrel")
//!
//! A barrel owns one copy of the inverted index, the link graph and the query
//! counters. It is fed by the broadcast channel and answers queries routed to
//! it by the gateway.

pub mod http;
pub mod index;
pub mod server;
pub mod store;

pub use index::{Index, PageInfo, QueryStats};
pub use server::{ReplicaServer, RunningReplica};
pub use store::ReplicaStore;
