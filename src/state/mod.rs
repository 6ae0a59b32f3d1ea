//! State module for tracking pagination progress
//!
//! # Components
//!
//! - `SeedState`: the tagged state of one seed inside the frontier
//! - `FailureReason`: why a seed was abandoned before its last page

mod seed_state;

// Re-export main types
pub use seed_state::{FailureReason, InvalidTransition, SeedState};
