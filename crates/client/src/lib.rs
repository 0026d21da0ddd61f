//! `striker-client` -- command dispatch and convergence for the Striker
//! dashboard.
//!
//! Talks to the external command executor over HTTP. Mutating commands go
//! through a [`confirm::ConfirmationWorkflow`] and the
//! [`gateway::CommandGateway`]; everything the executor reports back is
//! observed through the [`poller::StatusPoller`].

pub mod api;
pub mod config;
pub mod confirm;
pub mod converge;
pub mod fetch;
pub mod gateway;
pub mod poller;
pub mod selection;
