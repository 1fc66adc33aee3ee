//! tna-reconcile
//!
//! Record reconciliation between the pre-match and in-play feeds.
//!
//! The two feeds share no identifier. Records are paired on a derived
//! identity (normalized participant set + start time within a tolerance)
//! and merged field by field under an explicit precedence table.
//!
//! Deterministic, pure logic. No IO, no wall-clock.

mod engine;
mod key;
pub mod normalize;
pub mod precedence;
mod types;

pub use engine::merge;
pub use key::MatchKey;
pub use precedence::{merge_fields, precedence_for, MergedFields, Precedence};
pub use types::*;
