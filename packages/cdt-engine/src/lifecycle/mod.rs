//! CDT lifecycle
//!
//! - `transition`: the status table
//! - `finance`: derived end date and estimated return
//! - `input`: caller identity and payloads
//! - `service`: `CdtService`, the mutation pipeline and cached reads

pub mod finance;
pub mod input;
pub mod service;
pub mod transition;

pub use input::{Actor, CdtPatch, NewCdt, Role};
pub use service::{CachedValue, CdtService, MaturitySweep, Mutation, MAX_PAGE_LIMIT};
pub use transition::{allowed_next, validate_transition};
