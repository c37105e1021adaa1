//! Cache-coherence protocol
//!
//! Key conventions plus the explicit `InvalidationPlan` each mutation
//! applies after the store write and the audit append.

pub mod keys;
pub mod plan;

pub use plan::InvalidationPlan;
