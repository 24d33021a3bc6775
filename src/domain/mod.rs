//! Domain layer - Entity types, classification and port definitions
//!
//! This module defines the core traits (ports) that adapters implement,
//! following hexagonal architecture principles.

pub mod ports;
pub mod quantity;
pub mod state;

pub use ports::*;
pub use state::{classify, protocol, url_string, ReconciliationState};
