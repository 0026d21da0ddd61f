//! `striker-core` -- pure domain logic for the Striker dashboard client.
//!
//! Nothing in this crate performs I/O. It holds the wire model shared with
//! the external command executor (jobs, entities, capacity), the state
//! classifier that turns free-text backend states into severities, and the
//! placement filter used when provisioning a new server.

pub mod capacity;
pub mod classify;
pub mod entity;
pub mod error;
pub mod job;
pub mod network;
pub mod placement;
pub mod routes;
pub mod types;
