//! State module for tracking worker pool progress
//!
//! # Components
//!
//! - `PoolState`: lifecycle of the whole pool (running, draining, stopped)
//! - `WorkerSlot`: what an individual worker is processing
//! - `WorkerRole`: which queue a worker drains

mod pool_state;
mod worker_slot;

// Re-export main types
pub use pool_state::PoolState;
pub use worker_slot::{WorkerRole, WorkerSlot};
