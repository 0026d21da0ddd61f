//! `striker-watch` -- follows the executor from a terminal.
//!
//! Either tails one job until it completes ([`job`]) or logs severity
//! changes across the anvil inventory ([`inventory`]).

pub mod inventory;
pub mod job;
