//! tna-daemon library target.
//!
//! Exposes the router, shared state and refresh loop for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod refresh;
pub mod routes;
pub mod state;
