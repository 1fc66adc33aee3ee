//! tna-sources
//!
//! Upstream feed adapters. Each adapter turns one provider's native JSON into
//! [`tna_schemas::RawRecord`] values tagged with its feed.
//!
//! This crate owns the adapter boundary and the HTTP clients only. It does
//! **not** validate or match records; that is `tna-reconcile`.

pub mod inplay;
pub mod prematch;
pub mod provider;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use inplay::InplayHttpSource;
pub use prematch::PrematchHttpSource;
pub use provider::{fetch_with_timeout, Source, SourceError};
