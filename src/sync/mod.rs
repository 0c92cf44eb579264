//! Reconciliation with the remote authority: the gateway contract, an
//! in-memory gateway, the three-way merge, the sync engine and its
//! periodic scheduler.

pub mod engine;
pub mod gateway;
pub mod memory_gateway;
pub mod merge;
pub mod scheduler;

pub use engine::{Delivery, SkipReason, SyncEngine, SyncOutcome, SyncReport};
pub use gateway::{GatewayError, GatewayResult, RemoteGateway};
pub use memory_gateway::InMemoryGateway;
pub use merge::{merge_json, merge_values, three_way_merge, Merged};
pub use scheduler::{SyncScheduler, DEFAULT_SYNC_INTERVAL};
